//! Shared harness for the approval engine integration tests.

#![allow(dead_code)]

use registrar_crypto::KeyPair;
use registrar_governance::{
    create_object, GovernanceConfig, GovernanceContext, GovernanceResult, RecordingNotifier,
    RevisionDraft, StoreKeyringSource,
};
use registrar_storage::{
    ApprovalStore, ChangeRequestStore, InMemoryRegistryStore, ObjectStore, RevisionStore,
    StorageError, StorageResult,
};
use registrar_types::{
    Approval, ApprovalId, ApprovalState, ApproverFields, ApproverSetFields, ChangeRequest,
    ChangeRequestId, DesiredState, GovernedObject, HostFields, ObjectId, ObjectKind, ObjectRef,
    Revision, RevisionFields, RevisionId,
};
use std::sync::Mutex;

pub const ROOT: &str = "root";

// ---------------------------------------------------------------------------
// Fault injection
// ---------------------------------------------------------------------------

/// In-memory store whose saves can be made to fail.
///
/// After [`FaultyStore::fail_after`]`(n)` the next `n` saves succeed and
/// every later one fails until [`FaultyStore::heal`].
#[derive(Default)]
pub struct FaultyStore {
    inner: InMemoryRegistryStore,
    countdown: Mutex<Option<usize>>,
}

impl FaultyStore {
    pub fn fail_after(&self, saves: usize) {
        *self.countdown.lock().unwrap() = Some(saves);
    }

    pub fn heal(&self) {
        *self.countdown.lock().unwrap() = None;
    }

    fn check(&self, table: &str) -> StorageResult<()> {
        let mut countdown = self
            .countdown
            .lock()
            .map_err(|_| StorageError::Backend("fault lock poisoned".into()))?;
        match countdown.as_mut() {
            Some(0) => Err(StorageError::Backend(format!(
                "injected failure saving {}",
                table
            ))),
            Some(remaining) => {
                *remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl ObjectStore for FaultyStore {
    fn allocate_object_id(&self, kind: ObjectKind) -> StorageResult<ObjectId> {
        self.inner.allocate_object_id(kind)
    }

    fn insert_object(&self, object: &GovernedObject) -> StorageResult<()> {
        self.check("objects")?;
        self.inner.insert_object(object)
    }

    fn get_object(&self, object: ObjectRef) -> StorageResult<Option<GovernedObject>> {
        self.inner.get_object(object)
    }

    fn save_object(&self, object: &GovernedObject) -> StorageResult<()> {
        self.check("objects")?;
        self.inner.save_object(object)
    }

    fn list_objects(&self, kind: ObjectKind) -> StorageResult<Vec<GovernedObject>> {
        self.inner.list_objects(kind)
    }

    fn purge_pending_revision(
        &self,
        object: ObjectRef,
        revision: RevisionId,
    ) -> StorageResult<bool> {
        self.check("objects")?;
        self.inner.purge_pending_revision(object, revision)
    }
}

impl RevisionStore for FaultyStore {
    fn allocate_revision_id(&self) -> StorageResult<RevisionId> {
        self.inner.allocate_revision_id()
    }

    fn get_revision(&self, id: RevisionId) -> StorageResult<Option<Revision>> {
        self.inner.get_revision(id)
    }

    fn save_revision(&self, revision: &Revision) -> StorageResult<()> {
        self.check("revisions")?;
        self.inner.save_revision(revision)
    }

    fn list_revisions(&self, object: ObjectRef) -> StorageResult<Vec<Revision>> {
        self.inner.list_revisions(object)
    }

    fn approver_sets_containing(&self, approver: ObjectId) -> StorageResult<Vec<ObjectId>> {
        self.inner.approver_sets_containing(approver)
    }
}

impl ChangeRequestStore for FaultyStore {
    fn allocate_change_request_id(&self) -> StorageResult<ChangeRequestId> {
        self.inner.allocate_change_request_id()
    }

    fn get_change_request(&self, id: ChangeRequestId) -> StorageResult<Option<ChangeRequest>> {
        self.inner.get_change_request(id)
    }

    fn save_change_request(&self, change_request: &ChangeRequest) -> StorageResult<()> {
        self.check("change_requests")?;
        self.inner.save_change_request(change_request)
    }

    fn list_change_requests(&self, object: ObjectRef) -> StorageResult<Vec<ChangeRequest>> {
        self.inner.list_change_requests(object)
    }
}

impl ApprovalStore for FaultyStore {
    fn allocate_approval_id(&self) -> StorageResult<ApprovalId> {
        self.inner.allocate_approval_id()
    }

    fn get_approval(&self, id: ApprovalId) -> StorageResult<Option<Approval>> {
        self.inner.get_approval(id)
    }

    fn save_approval(&self, approval: &Approval) -> StorageResult<()> {
        self.check("approvals")?;
        self.inner.save_approval(approval)
    }

    fn list_approvals(&self, change_request: ChangeRequestId) -> StorageResult<Vec<Approval>> {
        self.inner.list_approvals(change_request)
    }

    fn list_approvals_for_set(&self, approver_set: ObjectId) -> StorageResult<Vec<Approval>> {
        self.inner.list_approvals_for_set(approver_set)
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub store: FaultyStore,
    pub notifier: RecordingNotifier,
    pub config: GovernanceConfig,
    pub root_key: KeyPair,
}

impl Harness {
    /// An empty registry configured with a freshly generated root key.
    pub fn new() -> Self {
        let root_key = KeyPair::generate();
        let mut config = GovernanceConfig::default();
        config.bootstrap.name = "Root Approver".into();
        config.bootstrap.username = ROOT.into();
        config.bootstrap.email_address = "root@example.net".into();
        config.bootstrap.role = "Registry Operator".into();
        config.bootstrap.default_set_title = "Registry Operators".into();
        config.bootstrap.public_key = Some(root_key.public_key_hex());
        config.notifications.app_url = "https://registrar.example.net".into();
        Self {
            store: FaultyStore::default(),
            notifier: RecordingNotifier::new(),
            config,
            root_key,
        }
    }

    /// A registry whose root approver and root set are ratified and active.
    pub fn bootstrapped() -> Self {
        let harness = Self::new();
        let report = harness.ctx().bootstrap(ROOT).unwrap();
        harness.ratify(report.approver_ratification);
        harness.ratify(report.approver_set_ratification);
        harness
    }

    pub fn ctx(&self) -> GovernanceContext<'_> {
        GovernanceContext::new(&self.store, &StoreKeyringSource, &self.notifier, &self.config)
    }

    pub fn root_set(&self) -> ObjectId {
        self.config.root_approver_set
    }

    fn ratify(&self, revision: RevisionId) {
        self.ctx().start_approval_process(revision, ROOT).unwrap();
        let capstone = self.capstone(self.change_request_for(revision).id);
        self.decide(capstone.id, ROOT, &self.root_key, "approve")
            .unwrap();
    }

    // -- signing -------------------------------------------------------------

    /// Sign the attestation for `action` and upload it.
    pub fn decide(
        &self,
        approval: ApprovalId,
        username: &str,
        key: &KeyPair,
        action: &str,
    ) -> GovernanceResult<bool> {
        let signed = self.sign(approval, username, key, action);
        self.ctx()
            .submit_signature(approval, signed.as_bytes(), username)
    }

    pub fn sign(&self, approval: ApprovalId, username: &str, key: &KeyPair, action: &str) -> String {
        let attestation = self
            .ctx()
            .download_attestation(approval, username, action)
            .unwrap();
        key.clear_sign(&attestation.to_payload().unwrap()).unwrap()
    }

    // -- authoring -----------------------------------------------------------

    /// Create an approver and get it approved by the root set.
    pub fn add_approver(&self, username: &str) -> (ObjectId, KeyPair) {
        let key = KeyPair::generate();
        let fields = RevisionFields::Approver(ApproverFields {
            name: format!("{} approver", username),
            email_address: format!("{}@example.net", username),
            role: "Engineer".into(),
            username: username.into(),
            employee_id: 1000,
            department: "Operations".into(),
            is_admin: false,
            fingerprint: key.fingerprint(),
            public_key: key.public_key_hex(),
        });
        let (object, revision) = create_object(
            &self.ctx(),
            ObjectKind::Approver,
            RevisionDraft::new(DesiredState::Active, fields),
            ROOT,
        )
        .unwrap();
        self.approve_with_root(revision.id);
        (object.object.id, key)
    }

    /// Create an approver set and get it approved by the root set.
    pub fn add_approver_set(&self, title: &str, members: &[ObjectId]) -> ObjectId {
        let fields = RevisionFields::ApproverSet(ApproverSetFields {
            title: title.into(),
            description: String::new(),
            approvers: members.to_vec(),
        });
        let (object, revision) = create_object(
            &self.ctx(),
            ObjectKind::ApproverSet,
            RevisionDraft::new(DesiredState::Active, fields),
            ROOT,
        )
        .unwrap();
        self.approve_with_root(revision.id);
        object.object.id
    }

    /// Create a host whose first revision needs `required` (or the root set).
    pub fn propose_host(&self, name: &str, required: &[ObjectId]) -> (ObjectRef, RevisionId) {
        let draft = RevisionDraft::new(DesiredState::Active, host_fields(name, &["192.0.2.10"]))
            .required(required.iter().copied());
        let (object, revision) =
            create_object(&self.ctx(), ObjectKind::Host, draft, "alice").unwrap();
        (object.object, revision.id)
    }

    /// Start approval for `revision` and sign its capstone as root.
    pub fn approve_with_root(&self, revision: RevisionId) {
        self.ctx().start_approval_process(revision, ROOT).unwrap();
        let capstone = self.capstone(self.change_request_for(revision).id);
        assert_eq!(capstone.state, ApprovalState::PendingApproval);
        assert!(self
            .decide(capstone.id, ROOT, &self.root_key, "approve")
            .unwrap());
    }

    // -- lookups -------------------------------------------------------------

    pub fn object(&self, object: ObjectRef) -> GovernedObject {
        self.ctx().object(object).unwrap()
    }

    pub fn revision(&self, id: RevisionId) -> Revision {
        self.ctx().revision(id).unwrap()
    }

    pub fn change_request_for(&self, revision: RevisionId) -> ChangeRequest {
        let cr = self.revision(revision).change_request.unwrap();
        self.ctx().change_request(cr).unwrap()
    }

    pub fn approvals(&self, change_request: ChangeRequestId) -> Vec<Approval> {
        self.ctx().approvals(change_request).unwrap()
    }

    pub fn capstone(&self, change_request: ChangeRequestId) -> Approval {
        self.approvals(change_request)
            .into_iter()
            .find(|a| a.is_final)
            .unwrap()
    }

    pub fn approval_for(&self, change_request: ChangeRequestId, set: ObjectId) -> Approval {
        self.approvals(change_request)
            .into_iter()
            .find(|a| a.approver_set == set && !a.is_final)
            .unwrap()
    }
}

pub fn host_fields(name: &str, addresses: &[&str]) -> RevisionFields {
    RevisionFields::Host(HostFields {
        host_name: name.into(),
        host_addresses: addresses.iter().map(|a| a.to_string()).collect(),
        ..HostFields::default()
    })
}
