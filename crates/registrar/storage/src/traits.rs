use crate::StorageResult;
use registrar_types::{
    Approval, ApprovalId, ChangeRequest, ChangeRequestId, GovernedObject, ObjectId, ObjectKind,
    ObjectRef, Revision, RevisionId,
};

/// Storage interface for governed objects.
pub trait ObjectStore: Send + Sync {
    /// Reserve the next id in `kind`'s table.
    fn allocate_object_id(&self, kind: ObjectKind) -> StorageResult<ObjectId>;

    /// Insert a new object. Fails with `Conflict` if the id is taken.
    fn insert_object(&self, object: &GovernedObject) -> StorageResult<()>;

    fn get_object(&self, object: ObjectRef) -> StorageResult<Option<GovernedObject>>;

    fn save_object(&self, object: &GovernedObject) -> StorageResult<()>;

    /// All objects of one kind, ordered by id.
    fn list_objects(&self, kind: ObjectKind) -> StorageResult<Vec<GovernedObject>>;

    /// Drop `revision` as the object's pending revision.
    ///
    /// The revision row itself is kept. Returns false when `revision` was
    /// not the pending one.
    fn purge_pending_revision(&self, object: ObjectRef, revision: RevisionId)
        -> StorageResult<bool>;
}

/// Storage interface for revisions.
pub trait RevisionStore: Send + Sync {
    fn allocate_revision_id(&self) -> StorageResult<RevisionId>;

    fn get_revision(&self, id: RevisionId) -> StorageResult<Option<Revision>>;

    fn save_revision(&self, revision: &Revision) -> StorageResult<()>;

    /// Every revision of one object, oldest first.
    fn list_revisions(&self, object: ObjectRef) -> StorageResult<Vec<Revision>>;

    /// Approver sets whose live revision lists `approver` as a member.
    fn approver_sets_containing(&self, approver: ObjectId) -> StorageResult<Vec<ObjectId>>;
}

/// Storage interface for change requests.
pub trait ChangeRequestStore: Send + Sync {
    fn allocate_change_request_id(&self) -> StorageResult<ChangeRequestId>;

    fn get_change_request(&self, id: ChangeRequestId) -> StorageResult<Option<ChangeRequest>>;

    fn save_change_request(&self, change_request: &ChangeRequest) -> StorageResult<()>;

    fn list_change_requests(&self, object: ObjectRef) -> StorageResult<Vec<ChangeRequest>>;
}

/// Storage interface for approvals.
pub trait ApprovalStore: Send + Sync {
    fn allocate_approval_id(&self) -> StorageResult<ApprovalId>;

    fn get_approval(&self, id: ApprovalId) -> StorageResult<Option<Approval>>;

    fn save_approval(&self, approval: &Approval) -> StorageResult<()>;

    /// Approvals of one change request, in creation order.
    fn list_approvals(&self, change_request: ChangeRequestId) -> StorageResult<Vec<Approval>>;

    /// Approvals bound to one approver set, in creation order.
    fn list_approvals_for_set(&self, approver_set: ObjectId) -> StorageResult<Vec<Approval>>;
}

/// Composite storage contract consumed by the approval engine.
pub trait RegistryStore:
    ObjectStore + RevisionStore + ChangeRequestStore + ApprovalStore + Send + Sync
{
}

impl<T> RegistryStore for T where
    T: ObjectStore + RevisionStore + ChangeRequestStore + ApprovalStore + Send + Sync
{
}
