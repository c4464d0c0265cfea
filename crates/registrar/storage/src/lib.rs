//! Registrar storage abstractions.
//!
//! The approval engine reads and writes four tables, each behind its own
//! trait:
//! - governed objects ([`ObjectStore`])
//! - revisions ([`RevisionStore`])
//! - change requests ([`ChangeRequestStore`])
//! - approvals ([`ApprovalStore`])
//!
//! [`RegistryStore`] bundles them. Every call is a synchronous
//! read-modify-write; `save_*` is an upsert of the record as the caller
//! currently holds it. A relational backend implements the same traits.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod error;
pub mod memory;
mod traits;

pub use error::{StorageError, StorageResult};
pub use memory::InMemoryRegistryStore;
pub use traits::{ApprovalStore, ChangeRequestStore, ObjectStore, RegistryStore, RevisionStore};
