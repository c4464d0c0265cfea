//! Entry points exposed to request handlers.

use crate::approval;
use crate::attestation::{self, ApprovalAttestation};
use crate::bootstrap::{self, BootstrapReport};
use crate::cascade::{self, StateUpdate, WorkItem};
use crate::context::GovernanceContext;
use crate::error::GovernanceResult;
use crate::revision;
use registrar_types::{ApprovalId, EntityRef, RevisionId};
use tracing::instrument;

impl GovernanceContext<'_> {
    /// Re-derive `entity` and everything that depends on it.
    ///
    /// A revision is evaluated through its change request and its object;
    /// an interrupted approval start is finished first.
    /// Calling this twice with no mutation in between reports
    /// `changed == false` the second time.
    #[instrument(skip(self))]
    pub fn update_state(&self, entity: EntityRef) -> GovernanceResult<StateUpdate> {
        let seeds = match entity {
            EntityRef::Object(object) => {
                self.object(object)?;
                vec![WorkItem::Object(object)]
            }
            EntityRef::Revision(id) => {
                let revision = self.revision(id)?;
                if let Some(update) = revision::resume_start(self, &revision)? {
                    return Ok(update);
                }
                let mut seeds: Vec<WorkItem> = revision
                    .change_request
                    .map(WorkItem::ChangeRequest)
                    .into_iter()
                    .collect();
                seeds.push(WorkItem::Object(revision.object));
                seeds
            }
            EntityRef::ChangeRequest(id) => {
                self.change_request(id)?;
                vec![WorkItem::ChangeRequest(id)]
            }
            EntityRef::Approval(id) => {
                self.approval(id)?;
                vec![WorkItem::Approval(id)]
            }
        };
        cascade::run(self, seeds)
    }

    #[instrument(skip(self))]
    pub fn start_approval_process(
        &self,
        revision: RevisionId,
        acting_user: &str,
    ) -> GovernanceResult<StateUpdate> {
        revision::start_approval_process(self, revision, acting_user)
    }

    #[instrument(skip(self))]
    pub fn cancel_revision(
        &self,
        revision: RevisionId,
        acting_user: &str,
    ) -> GovernanceResult<StateUpdate> {
        revision::cancel(self, revision, acting_user)
    }

    /// See [`approval::submit_signature`].
    #[instrument(skip(self, signature))]
    pub fn submit_signature(
        &self,
        approval: ApprovalId,
        signature: &[u8],
        acting_user: &str,
    ) -> GovernanceResult<bool> {
        let text = String::from_utf8_lossy(signature);
        approval::submit_signature(self, approval, &text, acting_user)
    }

    #[instrument(skip(self))]
    pub fn download_attestation(
        &self,
        approval: ApprovalId,
        acting_user: &str,
        action: &str,
    ) -> GovernanceResult<ApprovalAttestation> {
        attestation::download_attestation(self, approval, acting_user, action)
    }

    pub fn bootstrap(&self, acting_user: &str) -> GovernanceResult<BootstrapReport> {
        bootstrap::bootstrap_registry(self, acting_user)
    }
}
