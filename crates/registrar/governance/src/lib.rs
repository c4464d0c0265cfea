//! Registrar approval engine.
//!
//! Changes to governed objects go live only after every required approver
//! set has signed off. This crate owns everything from "approval started"
//! onward:
//! - the revision lifecycle ([`start_approval_process`], [`cancel`], [`promote`])
//! - change requests and their quorum ([`QuorumTally`])
//! - per-approver-set approvals and signature intake ([`submit_signature`])
//! - the cascade that re-derives dependent state to a fixed point ([`cascade::run`])
//!
//! All entry points take a [`GovernanceContext`] holding the store, keyring
//! resolution, notifier and configuration.
//!
//! ```ignore
//! let ctx = GovernanceContext::new(&store, &StoreKeyringSource, &TracingNotifier, &config);
//! let report = ctx.bootstrap("admin")?;
//! ctx.start_approval_process(report.approver_ratification, "admin")?;
//! ```

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod approval;
mod attestation;
mod authoring;
mod bootstrap;
pub mod cascade;
mod change_request;
mod config;
mod context;
mod error;
mod export;
mod keyring;
mod kinds;
mod notify;
mod object;
pub mod quorum;
mod revision;
mod service;

pub use approval::submit_signature;
pub use attestation::{
    can_approve, download_attestation, signers, verify_attestation, ApprovalAttestation,
    CounterSignature,
};
pub use authoring::{create_object, propose_revision, RevisionDraft};
pub use bootstrap::{bootstrap_registry, BootstrapReport};
pub use cascade::{StateUpdate, WorkItem};
pub use config::{BootstrapConfig, CascadeConfig, GovernanceConfig, NotificationConfig};
pub use context::GovernanceContext;
pub use error::{ErrorKind, GovernanceError, GovernanceResult};
pub use export::{diff_revisions, export_object, ObjectExport, RevisionExport};
pub use keyring::{KeyringSource, StoreKeyringSource};
pub use kinds::{handler_for, KindHandler};
pub use notify::{Notice, NoticeKind, Notifier, NotifyError, RecordingNotifier, TracingNotifier};
pub use quorum::{ApproverSetValidity, ApproverSetView, QuorumTally};
pub use revision::{cancel, decline, promote, start_approval_process, supersede};

/// Recorded as `updated_by` on transitions made by the cascade itself.
pub const SYSTEM_USER: &str = "system";
