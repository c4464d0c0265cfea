//! Registrar domain types.
//!
//! Everything the approval engine persists is described here:
//! - identifiers for objects, revisions, change requests and approvals
//! - the lifecycle state enums, serialized with their stable lowercase tags
//! - the closed set of governed object kinds and their revision payloads
//! - the stored records themselves
//!
//! Cross references between records are always ids. Nothing in this crate
//! holds a live pointer to another record.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod fields;
mod ids;
mod kind;
mod records;
mod state;

pub use fields::{
    AccountFields, ApproverFields, ApproverSetFields, ContactFields, DomainFields, DsDataEntry,
    HostFields, RevisionFields,
};
pub use ids::{ApprovalId, ChangeRequestId, EntityRef, ObjectId, ObjectRef, RevisionId};
pub use kind::{ObjectKind, UnknownObjectKind};
pub use records::{Approval, ChangeRequest, FieldChange, GovernedObject, Revision};
pub use state::{
    ApprovalAction, ApprovalState, ChangeRequestState, DesiredState, ObjectState,
    RevisionState, UnknownAction, UnknownState,
};
