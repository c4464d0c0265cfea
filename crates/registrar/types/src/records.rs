//! Stored records.

use crate::fields::RevisionFields;
use crate::ids::{ApprovalId, ChangeRequestId, ObjectId, ObjectRef, RevisionId};
use crate::state::{ApprovalState, ChangeRequestState, DesiredState, ObjectState, RevisionState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An entity whose changes require approval.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GovernedObject {
    pub object: ObjectRef,
    pub state: ObjectState,
    /// The promoted, live revision.
    pub current_revision: Option<RevisionId>,
    /// At most one revision still moving through approval.
    pub pending_revision: Option<RevisionId>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

impl GovernedObject {
    pub fn new(object: ObjectRef, created_by: impl Into<String>) -> Self {
        let created_by = created_by.into();
        let now = Utc::now();
        Self {
            object,
            state: ObjectState::New,
            current_revision: None,
            pending_revision: None,
            created_at: now,
            created_by: created_by.clone(),
            updated_at: now,
            updated_by: created_by,
        }
    }

    pub fn touch(&mut self, by: &str) {
        self.updated_at = Utc::now();
        self.updated_by = by.to_string();
    }
}

/// A proposed snapshot of a governed object's fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    pub id: RevisionId,
    pub object: ObjectRef,
    pub state: RevisionState,
    pub desired_state: DesiredState,
    pub fields: RevisionFields,
    pub required_approver_sets: Vec<ObjectId>,
    pub informed_approver_sets: Vec<ObjectId>,
    pub change_request: Option<ChangeRequestId>,
    /// External ticket reference for the change.
    pub issue_cr: String,
    pub notes: String,
    pub approval_started_at: Option<DateTime<Utc>>,
    pub approval_started_by: Option<String>,
    pub promoted_at: Option<DateTime<Utc>>,
    pub superseded_at: Option<DateTime<Utc>>,
    pub approval_failed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

impl Revision {
    pub fn new(
        id: RevisionId,
        object: ObjectRef,
        desired_state: DesiredState,
        fields: RevisionFields,
        created_by: impl Into<String>,
    ) -> Self {
        let created_by = created_by.into();
        let now = Utc::now();
        Self {
            id,
            object,
            state: RevisionState::New,
            desired_state,
            fields,
            required_approver_sets: Vec::new(),
            informed_approver_sets: Vec::new(),
            change_request: None,
            issue_cr: String::new(),
            notes: String::new(),
            approval_started_at: None,
            approval_started_by: None,
            promoted_at: None,
            superseded_at: None,
            approval_failed_at: None,
            created_at: now,
            created_by: created_by.clone(),
            updated_at: now,
            updated_by: created_by,
        }
    }

    pub fn touch(&mut self, by: &str) {
        self.updated_at = Utc::now();
        self.updated_by = by.to_string();
    }
}

/// One changed leaf between the current and the proposed revision.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    /// Dotted path into the exported revision, e.g. `fields.approvers.0`.
    pub path: String,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
}

/// The approval ticket opened for one revision.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChangeRequest {
    pub id: ChangeRequestId,
    pub object: ObjectRef,
    pub proposed_revision: RevisionId,
    /// Current revision of the object when the request was opened.
    pub initial_revision: Option<RevisionId>,
    pub state: ChangeRequestState,
    pub change_json: String,
    pub change_diff: Vec<FieldChange>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

impl ChangeRequest {
    pub fn touch(&mut self, by: &str) {
        self.updated_at = Utc::now();
        self.updated_by = by.to_string();
    }
}

/// One approver set's decision on one change request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Approval {
    pub id: ApprovalId,
    pub change_request: ChangeRequestId,
    pub approver_set: ObjectId,
    pub state: ApprovalState,
    /// The capstone approval, signed only after every other one resolved.
    pub is_final: bool,
    /// Clear-signed attestation uploaded by a signer.
    pub signature: Option<String>,
    pub signed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

impl Approval {
    pub fn new(
        id: ApprovalId,
        change_request: ChangeRequestId,
        approver_set: ObjectId,
        created_by: impl Into<String>,
    ) -> Self {
        let created_by = created_by.into();
        let now = Utc::now();
        Self {
            id,
            change_request,
            approver_set,
            state: ApprovalState::New,
            is_final: false,
            signature: None,
            signed_at: None,
            created_at: now,
            created_by: created_by.clone(),
            updated_at: now,
            updated_by: created_by,
        }
    }

    pub fn is_signed(&self) -> bool {
        self.signature.as_deref().is_some_and(|sig| !sig.is_empty())
    }

    pub fn touch(&mut self, by: &str) {
        self.updated_at = Utc::now();
        self.updated_by = by.to_string();
    }
}
