//! Explicit collaborators for every engine entry point.

use crate::config::GovernanceConfig;
use crate::error::{GovernanceError, GovernanceResult};
use crate::keyring::KeyringSource;
use crate::notify::Notifier;
use registrar_storage::RegistryStore;
use registrar_types::{
    Approval, ApprovalId, ChangeRequest, ChangeRequestId, EntityRef, GovernedObject, ObjectId,
    ObjectRef, Revision, RevisionId,
};

/// Store, keyring resolution, notifications and configuration.
///
/// Cheap to copy; holds only borrows. There is no process-wide state.
#[derive(Clone, Copy)]
pub struct GovernanceContext<'a> {
    pub store: &'a dyn RegistryStore,
    pub keyrings: &'a dyn KeyringSource,
    pub notifier: &'a dyn Notifier,
    pub config: &'a GovernanceConfig,
}

impl<'a> GovernanceContext<'a> {
    pub fn new(
        store: &'a dyn RegistryStore,
        keyrings: &'a dyn KeyringSource,
        notifier: &'a dyn Notifier,
        config: &'a GovernanceConfig,
    ) -> Self {
        Self {
            store,
            keyrings,
            notifier,
            config,
        }
    }

    pub fn root_approver_set(&self) -> ObjectId {
        self.config.root_approver_set
    }

    pub fn object(&self, object: ObjectRef) -> GovernanceResult<GovernedObject> {
        self.store
            .get_object(object)?
            .ok_or(GovernanceError::NotFound(EntityRef::Object(object)))
    }

    pub fn revision(&self, id: RevisionId) -> GovernanceResult<Revision> {
        self.store
            .get_revision(id)?
            .ok_or(GovernanceError::NotFound(EntityRef::Revision(id)))
    }

    pub fn change_request(&self, id: ChangeRequestId) -> GovernanceResult<ChangeRequest> {
        self.store
            .get_change_request(id)?
            .ok_or(GovernanceError::NotFound(EntityRef::ChangeRequest(id)))
    }

    pub fn approval(&self, id: ApprovalId) -> GovernanceResult<Approval> {
        self.store
            .get_approval(id)?
            .ok_or(GovernanceError::NotFound(EntityRef::Approval(id)))
    }

    pub fn approvals(&self, change_request: ChangeRequestId) -> GovernanceResult<Vec<Approval>> {
        Ok(self.store.list_approvals(change_request)?)
    }

    /// The revision currently live for `object`, if any.
    pub fn current_revision(&self, object: &GovernedObject) -> GovernanceResult<Option<Revision>> {
        object
            .current_revision
            .map(|id| self.revision(id))
            .transpose()
    }
}
