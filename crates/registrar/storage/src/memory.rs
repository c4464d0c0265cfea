//! In-memory reference implementation of the registrar storage traits.
//!
//! Deterministic and test-friendly. Ids are allocated per table starting
//! at 1; saving a record with an explicit id advances the sequence past it.

use crate::traits::{ApprovalStore, ChangeRequestStore, ObjectStore, RevisionStore};
use crate::{StorageError, StorageResult};
use registrar_types::{
    Approval, ApprovalId, ChangeRequest, ChangeRequestId, GovernedObject, ObjectId, ObjectKind,
    ObjectRef, Revision, RevisionFields, RevisionId,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

struct Table<K, V> {
    rows: BTreeMap<K, V>,
    last_id: i64,
}

impl<K, V> Default for Table<K, V> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            last_id: 0,
        }
    }
}

impl<K: Ord, V> Table<K, V> {
    fn allocate(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn upsert(&mut self, raw_id: i64, key: K, row: V) {
        self.last_id = self.last_id.max(raw_id);
        self.rows.insert(key, row);
    }
}

#[derive(Default)]
struct ObjectTable {
    rows: BTreeMap<ObjectRef, GovernedObject>,
    last_ids: HashMap<ObjectKind, i64>,
}

impl ObjectTable {
    fn upsert(&mut self, object: &GovernedObject) {
        let last = self.last_ids.entry(object.object.kind).or_insert(0);
        *last = (*last).max(object.object.id.get());
        self.rows.insert(object.object, object.clone());
    }
}

/// In-memory registry store.
#[derive(Default)]
pub struct InMemoryRegistryStore {
    objects: RwLock<ObjectTable>,
    revisions: RwLock<Table<RevisionId, Revision>>,
    change_requests: RwLock<Table<ChangeRequestId, ChangeRequest>>,
    approvals: RwLock<Table<ApprovalId, Approval>>,
}

impl InMemoryRegistryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn read<'a, T>(lock: &'a RwLock<T>, table: &str) -> StorageResult<RwLockReadGuard<'a, T>> {
    lock.read()
        .map_err(|_| StorageError::Backend(format!("{} lock poisoned", table)))
}

fn write<'a, T>(lock: &'a RwLock<T>, table: &str) -> StorageResult<RwLockWriteGuard<'a, T>> {
    lock.write()
        .map_err(|_| StorageError::Backend(format!("{} lock poisoned", table)))
}

fn require_positive(raw: i64, what: &str) -> StorageResult<()> {
    if raw <= 0 {
        return Err(StorageError::InvalidInput(format!(
            "{} id must be positive, got {}",
            what, raw
        )));
    }
    Ok(())
}

impl ObjectStore for InMemoryRegistryStore {
    fn allocate_object_id(&self, kind: ObjectKind) -> StorageResult<ObjectId> {
        let mut guard = write(&self.objects, "objects")?;
        let last = guard.last_ids.entry(kind).or_insert(0);
        *last += 1;
        Ok(ObjectId::new(*last))
    }

    fn insert_object(&self, object: &GovernedObject) -> StorageResult<()> {
        require_positive(object.object.id.get(), object.object.kind.as_str())?;
        let mut guard = write(&self.objects, "objects")?;
        if guard.rows.contains_key(&object.object) {
            return Err(StorageError::Conflict(format!(
                "{} already exists",
                object.object
            )));
        }
        guard.upsert(object);
        Ok(())
    }

    fn get_object(&self, object: ObjectRef) -> StorageResult<Option<GovernedObject>> {
        let guard = read(&self.objects, "objects")?;
        Ok(guard.rows.get(&object).cloned())
    }

    fn save_object(&self, object: &GovernedObject) -> StorageResult<()> {
        require_positive(object.object.id.get(), object.object.kind.as_str())?;
        let mut guard = write(&self.objects, "objects")?;
        guard.upsert(object);
        Ok(())
    }

    fn list_objects(&self, kind: ObjectKind) -> StorageResult<Vec<GovernedObject>> {
        let guard = read(&self.objects, "objects")?;
        Ok(guard
            .rows
            .values()
            .filter(|object| object.object.kind == kind)
            .cloned()
            .collect())
    }

    fn purge_pending_revision(
        &self,
        object: ObjectRef,
        revision: RevisionId,
    ) -> StorageResult<bool> {
        let mut guard = write(&self.objects, "objects")?;
        let row = guard
            .rows
            .get_mut(&object)
            .ok_or_else(|| StorageError::NotFound(format!("{} not found", object)))?;
        if row.pending_revision != Some(revision) {
            return Ok(false);
        }
        row.pending_revision = None;
        debug!(object = %object, revision_id = %revision, "pending revision purged");
        Ok(true)
    }
}

impl RevisionStore for InMemoryRegistryStore {
    fn allocate_revision_id(&self) -> StorageResult<RevisionId> {
        let mut guard = write(&self.revisions, "revisions")?;
        Ok(RevisionId::new(guard.allocate()))
    }

    fn get_revision(&self, id: RevisionId) -> StorageResult<Option<Revision>> {
        let guard = read(&self.revisions, "revisions")?;
        Ok(guard.rows.get(&id).cloned())
    }

    fn save_revision(&self, revision: &Revision) -> StorageResult<()> {
        require_positive(revision.id.get(), "revision")?;
        if revision.fields.kind() != revision.object.kind {
            return Err(StorageError::InvariantViolation(format!(
                "revision {} carries {} fields for {}",
                revision.id,
                revision.fields.kind(),
                revision.object
            )));
        }
        let mut guard = write(&self.revisions, "revisions")?;
        if let Some(existing) = guard.rows.get(&revision.id) {
            if existing.object != revision.object {
                return Err(StorageError::InvariantViolation(format!(
                    "revision {} belongs to {}, not {}",
                    revision.id, existing.object, revision.object
                )));
            }
        }
        guard.upsert(revision.id.get(), revision.id, revision.clone());
        Ok(())
    }

    fn list_revisions(&self, object: ObjectRef) -> StorageResult<Vec<Revision>> {
        let guard = read(&self.revisions, "revisions")?;
        Ok(guard
            .rows
            .values()
            .filter(|revision| revision.object == object)
            .cloned()
            .collect())
    }

    fn approver_sets_containing(&self, approver: ObjectId) -> StorageResult<Vec<ObjectId>> {
        let guard = read(&self.revisions, "revisions")?;
        let mut sets: Vec<ObjectId> = guard
            .rows
            .values()
            .filter(|revision| revision.state.is_live())
            .filter_map(|revision| match &revision.fields {
                RevisionFields::ApproverSet(fields) if fields.approvers.contains(&approver) => {
                    Some(revision.object.id)
                }
                _ => None,
            })
            .collect();
        sets.sort();
        sets.dedup();
        Ok(sets)
    }
}

impl ChangeRequestStore for InMemoryRegistryStore {
    fn allocate_change_request_id(&self) -> StorageResult<ChangeRequestId> {
        let mut guard = write(&self.change_requests, "change_requests")?;
        Ok(ChangeRequestId::new(guard.allocate()))
    }

    fn get_change_request(&self, id: ChangeRequestId) -> StorageResult<Option<ChangeRequest>> {
        let guard = read(&self.change_requests, "change_requests")?;
        Ok(guard.rows.get(&id).cloned())
    }

    fn save_change_request(&self, change_request: &ChangeRequest) -> StorageResult<()> {
        require_positive(change_request.id.get(), "change request")?;
        let mut guard = write(&self.change_requests, "change_requests")?;
        guard.upsert(
            change_request.id.get(),
            change_request.id,
            change_request.clone(),
        );
        Ok(())
    }

    fn list_change_requests(&self, object: ObjectRef) -> StorageResult<Vec<ChangeRequest>> {
        let guard = read(&self.change_requests, "change_requests")?;
        Ok(guard
            .rows
            .values()
            .filter(|cr| cr.object == object)
            .cloned()
            .collect())
    }
}

impl ApprovalStore for InMemoryRegistryStore {
    fn allocate_approval_id(&self) -> StorageResult<ApprovalId> {
        let mut guard = write(&self.approvals, "approvals")?;
        Ok(ApprovalId::new(guard.allocate()))
    }

    fn get_approval(&self, id: ApprovalId) -> StorageResult<Option<Approval>> {
        let guard = read(&self.approvals, "approvals")?;
        Ok(guard.rows.get(&id).cloned())
    }

    fn save_approval(&self, approval: &Approval) -> StorageResult<()> {
        require_positive(approval.id.get(), "approval")?;
        let mut guard = write(&self.approvals, "approvals")?;
        guard.upsert(approval.id.get(), approval.id, approval.clone());
        Ok(())
    }

    fn list_approvals(&self, change_request: ChangeRequestId) -> StorageResult<Vec<Approval>> {
        let guard = read(&self.approvals, "approvals")?;
        Ok(guard
            .rows
            .values()
            .filter(|approval| approval.change_request == change_request)
            .cloned()
            .collect())
    }

    fn list_approvals_for_set(&self, approver_set: ObjectId) -> StorageResult<Vec<Approval>> {
        let guard = read(&self.approvals, "approvals")?;
        Ok(guard
            .rows
            .values()
            .filter(|approval| approval.approver_set == approver_set)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RegistryStore;
    use registrar_types::{
        ApproverSetFields, DesiredState, HostFields, ObjectState, RevisionState,
    };

    fn host_revision(store: &InMemoryRegistryStore, object: ObjectRef) -> Revision {
        Revision::new(
            store.allocate_revision_id().unwrap(),
            object,
            DesiredState::Active,
            RevisionFields::Host(HostFields::default()),
            "alice",
        )
    }

    #[test]
    fn sequences_are_per_table_and_per_kind() {
        let store = InMemoryRegistryStore::new();
        assert_eq!(
            store.allocate_object_id(ObjectKind::Host).unwrap(),
            ObjectId::new(1)
        );
        assert_eq!(
            store.allocate_object_id(ObjectKind::Approver).unwrap(),
            ObjectId::new(1)
        );
        assert_eq!(
            store.allocate_object_id(ObjectKind::Host).unwrap(),
            ObjectId::new(2)
        );
        assert_eq!(store.allocate_approval_id().unwrap(), ApprovalId::new(1));
    }

    #[test]
    fn explicit_ids_advance_the_sequence() {
        let store = InMemoryRegistryStore::new();
        let object = ObjectRef::new(ObjectKind::Host, ObjectId::new(5));
        store.insert_object(&GovernedObject::new(object, "alice")).unwrap();
        assert_eq!(
            store.allocate_object_id(ObjectKind::Host).unwrap(),
            ObjectId::new(6)
        );
    }

    #[test]
    fn insert_conflicts_but_save_upserts() {
        let store = InMemoryRegistryStore::new();
        let object = ObjectRef::new(ObjectKind::Host, ObjectId::new(1));
        let mut record = GovernedObject::new(object, "alice");
        store.insert_object(&record).unwrap();
        assert!(matches!(
            store.insert_object(&record),
            Err(StorageError::Conflict(_))
        ));

        record.state = ObjectState::Active;
        store.save_object(&record).unwrap();
        assert_eq!(
            store.get_object(object).unwrap().unwrap().state,
            ObjectState::Active
        );
    }

    #[test]
    fn purge_only_clears_matching_pending_revision() {
        let store = InMemoryRegistryStore::new();
        let object = ObjectRef::new(ObjectKind::Host, ObjectId::new(1));
        let revision = host_revision(&store, object);
        store.save_revision(&revision).unwrap();
        let mut record = GovernedObject::new(object, "alice");
        record.pending_revision = Some(revision.id);
        store.insert_object(&record).unwrap();

        assert!(!store
            .purge_pending_revision(object, RevisionId::new(99))
            .unwrap());
        assert!(store.purge_pending_revision(object, revision.id).unwrap());
        assert!(store.get_object(object).unwrap().unwrap().pending_revision.is_none());
        assert!(store.get_revision(revision.id).unwrap().is_some());
    }

    #[test]
    fn revision_fields_must_match_object_kind() {
        let store = InMemoryRegistryStore::new();
        let object = ObjectRef::approver(ObjectId::new(1));
        let revision = host_revision(&store, object);
        assert!(matches!(
            store.save_revision(&revision),
            Err(StorageError::InvariantViolation(_))
        ));
    }

    #[test]
    fn approver_set_membership_uses_live_revisions() {
        let store = InMemoryRegistryStore::new();
        let set = ObjectRef::approver_set(ObjectId::new(3));
        let fields = RevisionFields::ApproverSet(ApproverSetFields {
            title: "Ops".into(),
            description: String::new(),
            approvers: vec![ObjectId::new(7)],
        });

        let mut draft = Revision::new(
            store.allocate_revision_id().unwrap(),
            set,
            DesiredState::Active,
            fields,
            "alice",
        );
        store.save_revision(&draft).unwrap();
        assert!(store
            .approver_sets_containing(ObjectId::new(7))
            .unwrap()
            .is_empty());

        draft.state = RevisionState::Active;
        store.save_revision(&draft).unwrap();
        assert_eq!(
            store.approver_sets_containing(ObjectId::new(7)).unwrap(),
            vec![ObjectId::new(3)]
        );
    }

    #[test]
    fn usable_as_trait_object() {
        let store = InMemoryRegistryStore::new();
        let dyn_store: &dyn RegistryStore = &store;
        assert!(dyn_store.list_objects(ObjectKind::Host).unwrap().is_empty());
        assert!(matches!(
            dyn_store.save_approval(&Approval::new(
                ApprovalId::new(0),
                ChangeRequestId::new(1),
                ObjectId::new(1),
                "alice"
            )),
            Err(StorageError::InvalidInput(_))
        ));
    }
}
