//! Error types for the approval engine.

use registrar_storage::StorageError;
use registrar_types::{
    ApprovalId, ChangeRequestId, EntityRef, ObjectId, ObjectRef, RevisionId, UnknownObjectKind,
};
use thiserror::Error;

/// How a caller should react to a [`GovernanceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Broken registry setup. Fatal, never retried.
    Configuration,
    /// Wrong state for the requested transition. Re-fetch and re-decide.
    Precondition,
    /// Signature or attestation rejected. The signature may be resubmitted.
    Verification,
    /// Backend failure. Re-run `update_state` from the reported entity.
    Storage,
}

/// Errors raised by the approval engine.
#[derive(Debug, Error)]
pub enum GovernanceError {
    #[error("{entity} is {found}, expected {expected}")]
    InvalidState {
        entity: EntityRef,
        expected: &'static str,
        found: String,
    },

    #[error("cannot promote revision {revision}: change request {change_request} is not approved")]
    NotApproved {
        revision: RevisionId,
        change_request: ChangeRequestId,
    },

    #[error("revision {revision} has no change request")]
    NoChangeRequest { revision: RevisionId },

    #[error("{object} already has pending revision {revision}")]
    PendingRevisionExists {
        object: ObjectRef,
        revision: RevisionId,
    },

    #[error("invalid revision for {object}: {}", .errors.join("; "))]
    InvalidRevision {
        object: ObjectRef,
        errors: Vec<String>,
    },

    #[error("{username} is not a member of approver set {approver_set} for approval {approval}")]
    NotAnApprover {
        approval: ApprovalId,
        approver_set: ObjectId,
        username: String,
    },

    #[error("registry is already bootstrapped")]
    AlreadyBootstrapped,

    #[error("{0} not found")]
    NotFound(EntityRef),

    #[error("no signature found in upload for approval {approval}: {reason}")]
    NoSignatureFound { approval: ApprovalId, reason: String },

    #[error("unknown action {action:?} in attestation for approval {approval}")]
    UnknownAction { approval: ApprovalId, action: String },

    #[error("signature for approval {approval} rejected: {reason}")]
    SignatureInvalid { approval: ApprovalId, reason: String },

    #[error(
        "attestation for approval {approval} does not match change request {change_request}: {}",
        .errors.join("; ")
    )]
    AttestationMismatch {
        approval: ApprovalId,
        change_request: ChangeRequestId,
        errors: Vec<String>,
    },

    #[error(
        "change request {change_request} no longer matches its object: {}",
        .errors.join("; ")
    )]
    ChangeRequestMismatch {
        change_request: ChangeRequestId,
        errors: Vec<String>,
    },

    #[error("change request {change_request} has no approval for required approver set {approver_set}")]
    MissingApproval {
        change_request: ChangeRequestId,
        approver_set: ObjectId,
    },

    #[error(transparent)]
    UnknownObjectType(#[from] UnknownObjectKind),

    #[error("configuration error: {0}")]
    InvalidConfig(String),

    #[error("cascade did not settle within {limit} steps (last: {last})")]
    CascadeLimit { limit: usize, last: EntityRef },

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A cascade step failed; `entity` is where to resume.
    #[error("while updating {entity}: {source}")]
    Interrupted {
        entity: EntityRef,
        #[source]
        source: Box<GovernanceError>,
    },
}

impl GovernanceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GovernanceError::InvalidState { .. }
            | GovernanceError::NotApproved { .. }
            | GovernanceError::NoChangeRequest { .. }
            | GovernanceError::PendingRevisionExists { .. }
            | GovernanceError::InvalidRevision { .. }
            | GovernanceError::NotAnApprover { .. }
            | GovernanceError::AlreadyBootstrapped
            | GovernanceError::NotFound(_) => ErrorKind::Precondition,
            GovernanceError::NoSignatureFound { .. }
            | GovernanceError::UnknownAction { .. }
            | GovernanceError::SignatureInvalid { .. }
            | GovernanceError::AttestationMismatch { .. }
            | GovernanceError::ChangeRequestMismatch { .. } => ErrorKind::Verification,
            GovernanceError::MissingApproval { .. }
            | GovernanceError::UnknownObjectType(_)
            | GovernanceError::InvalidConfig(_)
            | GovernanceError::CascadeLimit { .. }
            | GovernanceError::Encoding(_) => ErrorKind::Configuration,
            GovernanceError::Storage(_) => ErrorKind::Storage,
            GovernanceError::Interrupted { source, .. } => source.kind(),
        }
    }

    /// The underlying error, looking through cascade context.
    pub fn root_cause(&self) -> &GovernanceError {
        match self {
            GovernanceError::Interrupted { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// The entity to resume from, when the error came out of a cascade.
    pub fn resume_from(&self) -> Option<EntityRef> {
        match self {
            GovernanceError::Interrupted { entity, .. } => Some(*entity),
            _ => None,
        }
    }

    pub(crate) fn at(self, entity: EntityRef) -> Self {
        match self {
            GovernanceError::Interrupted { .. } => self,
            other => GovernanceError::Interrupted {
                entity,
                source: Box::new(other),
            },
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Storage
    }

    pub(crate) fn invalid_state(
        entity: impl Into<EntityRef>,
        expected: &'static str,
        found: impl ToString,
    ) -> Self {
        GovernanceError::InvalidState {
            entity: entity.into(),
            expected,
            found: found.to_string(),
        }
    }
}

impl From<serde_json::Error> for GovernanceError {
    fn from(err: serde_json::Error) -> Self {
        GovernanceError::Encoding(err.to_string())
    }
}

/// Result type for approval engine operations.
pub type GovernanceResult<T> = Result<T, GovernanceError>;
