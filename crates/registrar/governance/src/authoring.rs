//! Creating governed objects and proposing revisions of them.

use crate::context::GovernanceContext;
use crate::error::{GovernanceError, GovernanceResult};
use crate::kinds::handler_for;
use registrar_types::{
    DesiredState, GovernedObject, ObjectId, ObjectKind, ObjectRef, Revision, RevisionFields,
};
use tracing::info;

/// Field values and approval routing for a new revision.
#[derive(Debug, Clone, PartialEq)]
pub struct RevisionDraft {
    pub desired_state: DesiredState,
    pub fields: RevisionFields,
    pub required_approver_sets: Vec<ObjectId>,
    pub informed_approver_sets: Vec<ObjectId>,
    pub issue_cr: String,
    pub notes: String,
}

impl RevisionDraft {
    pub fn new(desired_state: DesiredState, fields: RevisionFields) -> Self {
        Self {
            desired_state,
            fields,
            required_approver_sets: Vec::new(),
            informed_approver_sets: Vec::new(),
            issue_cr: String::new(),
            notes: String::new(),
        }
    }

    pub fn required(mut self, sets: impl IntoIterator<Item = ObjectId>) -> Self {
        self.required_approver_sets.extend(sets);
        self
    }

    pub fn informed(mut self, sets: impl IntoIterator<Item = ObjectId>) -> Self {
        self.informed_approver_sets.extend(sets);
        self
    }
}

/// Create an object of `kind` with `draft` as its first pending revision.
pub fn create_object(
    ctx: &GovernanceContext<'_>,
    kind: ObjectKind,
    draft: RevisionDraft,
    acting_user: &str,
) -> GovernanceResult<(GovernedObject, Revision)> {
    let object_ref = ObjectRef::new(kind, ctx.store.allocate_object_id(kind)?);
    check_draft(ctx, object_ref, &draft)?;

    let object = GovernedObject::new(object_ref, acting_user);
    ctx.store.insert_object(&object)?;
    info!(object = %object_ref, created_by = acting_user, "object created");

    let revision = propose_revision(ctx, object_ref, draft, acting_user)?;
    Ok((ctx.object(object_ref)?, revision))
}

/// Attach `draft` as the object's pending revision, in state `new`.
pub fn propose_revision(
    ctx: &GovernanceContext<'_>,
    object_ref: ObjectRef,
    draft: RevisionDraft,
    acting_user: &str,
) -> GovernanceResult<Revision> {
    let mut object = ctx.object(object_ref)?;
    if let Some(pending) = object.pending_revision {
        if ctx.revision(pending)?.state.is_open() {
            return Err(GovernanceError::PendingRevisionExists {
                object: object_ref,
                revision: pending,
            });
        }
    }
    check_draft(ctx, object_ref, &draft)?;

    let mut revision = Revision::new(
        ctx.store.allocate_revision_id()?,
        object_ref,
        draft.desired_state,
        draft.fields,
        acting_user,
    );
    revision.required_approver_sets = draft.required_approver_sets;
    revision.informed_approver_sets = draft.informed_approver_sets;
    revision.issue_cr = draft.issue_cr;
    revision.notes = draft.notes;
    ctx.store.save_revision(&revision)?;

    object.pending_revision = Some(revision.id);
    object.touch(acting_user);
    ctx.store.save_object(&object)?;

    info!(
        object = %object_ref,
        revision = %revision.id,
        desired_state = %revision.desired_state,
        "revision proposed"
    );
    Ok(revision)
}

fn check_draft(
    ctx: &GovernanceContext<'_>,
    object_ref: ObjectRef,
    draft: &RevisionDraft,
) -> GovernanceResult<()> {
    let mut errors = handler_for(object_ref.kind).validate(ctx, object_ref, &draft.fields)?;
    if draft.desired_state == DesiredState::Bootstrap {
        errors.push("bootstrap is reserved for the root approver and approver set".to_string());
    }
    for set in draft
        .required_approver_sets
        .iter()
        .chain(&draft.informed_approver_sets)
    {
        if ctx.store.get_object(ObjectRef::approver_set(*set))?.is_none() {
            errors.push(format!("approver set {} does not exist", set));
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(GovernanceError::InvalidRevision {
            object: object_ref,
            errors,
        })
    }
}
