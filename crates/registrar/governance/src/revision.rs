//! Revision lifecycle.
//!
//! `new → pendingapproval → {active | inactive} → superseded`, with
//! `cancelled` reachable from both open states and `approvalfailed` from
//! `pendingapproval`. The bootstrap revision of the root approver and root
//! approver set is live from creation.

use crate::cascade::{self, StateUpdate, WorkItem};
use crate::change_request::{informed_sets, required_sets};
use crate::context::GovernanceContext;
use crate::error::{GovernanceError, GovernanceResult};
use crate::export::{diff_revisions, RevisionExport};
use crate::kinds::handler_for;
use crate::notify::{dispatch, NoticeKind};
use crate::object::settled_state;
use chrono::Utc;
use registrar_types::{
    Approval, ChangeRequest, ChangeRequestState, EntityRef, GovernedObject, ObjectId, Revision,
    RevisionId, RevisionState,
};
use tracing::info;

/// Open a change request for a `new` revision and request its approvals.
///
/// Writes go change request, approvals, object, and finally the revision,
/// which binds the change request. A start that stopped before that last
/// write picks up the change request it already stored.
pub fn start_approval_process(
    ctx: &GovernanceContext<'_>,
    revision_id: RevisionId,
    acting_user: &str,
) -> GovernanceResult<StateUpdate> {
    let revision = ctx.revision(revision_id)?;
    if revision.state != RevisionState::New {
        return Err(GovernanceError::invalid_state(
            revision_id,
            "new",
            revision.state,
        ));
    }
    let object = ctx.object(revision.object)?;
    match object.pending_revision {
        Some(pending) if pending == revision_id => {}
        Some(pending) => {
            return Err(GovernanceError::PendingRevisionExists {
                object: object.object,
                revision: pending,
            })
        }
        None => {
            return Err(GovernanceError::invalid_state(
                revision_id,
                "the pending revision of its object",
                "detached",
            ))
        }
    }

    let handler = handler_for(object.object.kind);
    let errors = handler.validate(ctx, object.object, &revision.fields)?;
    if !errors.is_empty() {
        return Err(GovernanceError::InvalidRevision {
            object: object.object,
            errors,
        });
    }

    let change_request = match unfinished_change_request(ctx, &revision)? {
        Some(existing) => {
            info!(
                revision = %revision_id,
                change_request_id = %existing.id,
                "resuming approval start"
            );
            existing
        }
        None => open_change_request(ctx, &object, &revision, acting_user)?,
    };
    complete_start(ctx, revision, object, change_request, acting_user)
}

/// Finish the start of `revision` if it stopped after storing its change
/// request. `None` when there is nothing to finish.
pub(crate) fn resume_start(
    ctx: &GovernanceContext<'_>,
    revision: &Revision,
) -> GovernanceResult<Option<StateUpdate>> {
    if revision.state != RevisionState::New {
        return Ok(None);
    }
    let object = ctx.object(revision.object)?;
    if object.pending_revision != Some(revision.id) {
        return Ok(None);
    }
    let Some(change_request) = unfinished_change_request(ctx, revision)? else {
        return Ok(None);
    };
    let acting_user = change_request.created_by.clone();
    complete_start(ctx, revision.clone(), object, change_request, &acting_user).map(Some)
}

/// A change request stored for `revision` that no revision is bound to yet.
fn unfinished_change_request(
    ctx: &GovernanceContext<'_>,
    revision: &Revision,
) -> GovernanceResult<Option<ChangeRequest>> {
    if revision.change_request.is_some() {
        return Ok(None);
    }
    Ok(ctx
        .store
        .list_change_requests(revision.object)?
        .into_iter()
        .find(|cr| cr.proposed_revision == revision.id && cr.state == ChangeRequestState::New))
}

fn open_change_request(
    ctx: &GovernanceContext<'_>,
    object: &GovernedObject,
    revision: &Revision,
    acting_user: &str,
) -> GovernanceResult<ChangeRequest> {
    let proposed = RevisionExport::from(revision);
    let current = ctx.current_revision(object)?;
    let current = current.as_ref().map(RevisionExport::from);
    let now = Utc::now();
    let change_request = ChangeRequest {
        id: ctx.store.allocate_change_request_id()?,
        object: object.object,
        proposed_revision: revision.id,
        initial_revision: object.current_revision,
        state: ChangeRequestState::New,
        change_json: serde_json::to_string(&proposed)?,
        change_diff: diff_revisions(current.as_ref(), &proposed)?,
        created_at: now,
        created_by: acting_user.to_string(),
        updated_at: now,
        updated_by: acting_user.to_string(),
    };
    ctx.store.save_change_request(&change_request)?;
    Ok(change_request)
}

fn complete_start(
    ctx: &GovernanceContext<'_>,
    mut revision: Revision,
    mut object: GovernedObject,
    change_request: ChangeRequest,
    acting_user: &str,
) -> GovernanceResult<StateUpdate> {
    let revision_id = revision.id;
    let previous = object.state;
    let sets = persist_start(ctx, &mut revision, &mut object, &change_request, acting_user)
        .map_err(|e| e.at(EntityRef::Revision(revision_id)))?;

    info!(
        revision = %revision.id,
        change_request_id = %change_request.id,
        object = %object.object,
        approver_sets = sets.len(),
        changed_fields = change_request.change_diff.len(),
        from = %previous,
        to = %object.state,
        "approval process started"
    );

    let informed = informed_sets(ctx, &object, &revision)?;
    if !informed.is_empty() {
        dispatch(
            ctx,
            NoticeKind::ChangeRequestOpened,
            object.object,
            change_request.id,
            None,
            &informed,
        );
    }

    let mut update = StateUpdate {
        changed: true,
        ..StateUpdate::default()
    };
    update.merge(cascade::run(ctx, [WorkItem::ChangeRequest(change_request.id)])?);
    Ok(update)
}

/// Store the approvals still missing, the object's pending state and
/// finally the bound revision. Returns the required sets.
fn persist_start(
    ctx: &GovernanceContext<'_>,
    revision: &mut Revision,
    object: &mut GovernedObject,
    change_request: &ChangeRequest,
    acting_user: &str,
) -> GovernanceResult<Vec<ObjectId>> {
    let sets = required_sets(ctx, object, revision)?;
    let existing = ctx.approvals(change_request.id)?;
    for set in &sets {
        if existing.iter().any(|a| a.approver_set == *set) {
            continue;
        }
        let approval = Approval::new(
            ctx.store.allocate_approval_id()?,
            change_request.id,
            *set,
            acting_user,
        );
        ctx.store.save_approval(&approval)?;
    }

    object.state = object.state.pending_variant();
    object.touch(acting_user);
    ctx.store.save_object(object)?;

    revision.state = RevisionState::PendingApproval;
    revision.change_request = Some(change_request.id);
    revision.approval_started_at = Some(Utc::now());
    revision.approval_started_by = Some(acting_user.to_string());
    revision.touch(acting_user);
    ctx.store.save_revision(revision)?;
    Ok(sets)
}

/// Make an approved revision live.
pub fn promote(
    ctx: &GovernanceContext<'_>,
    revision_id: RevisionId,
    acting_user: &str,
) -> GovernanceResult<Revision> {
    let mut revision = ctx.revision(revision_id)?;
    promote_revision(ctx, &mut revision, acting_user)?;
    Ok(revision)
}

/// Retire a live revision.
pub fn supersede(
    ctx: &GovernanceContext<'_>,
    revision_id: RevisionId,
    acting_user: &str,
) -> GovernanceResult<Revision> {
    let mut revision = ctx.revision(revision_id)?;
    supersede_revision(ctx, &mut revision, acting_user)?;
    Ok(revision)
}

/// Mark a revision in approval as failed.
pub fn decline(
    ctx: &GovernanceContext<'_>,
    revision_id: RevisionId,
    acting_user: &str,
) -> GovernanceResult<Revision> {
    let mut revision = ctx.revision(revision_id)?;
    decline_revision(ctx, &mut revision, acting_user)?;
    Ok(revision)
}

/// Withdraw an open revision and cancel its change request.
pub fn cancel(
    ctx: &GovernanceContext<'_>,
    revision_id: RevisionId,
    acting_user: &str,
) -> GovernanceResult<StateUpdate> {
    let mut revision = ctx.revision(revision_id)?;
    if !revision.state.is_open() {
        return Err(GovernanceError::invalid_state(
            revision_id,
            "new or pendingapproval",
            revision.state,
        ));
    }
    let change_request = match revision.change_request {
        Some(id) => Some(id),
        None => unfinished_change_request(ctx, &revision)?.map(|cr| cr.id),
    };

    revision.state = RevisionState::Cancelled;
    revision.touch(acting_user);
    ctx.store.save_revision(&revision)?;

    let mut update = StateUpdate {
        changed: true,
        ..StateUpdate::default()
    };
    if ctx
        .store
        .purge_pending_revision(revision.object, revision_id)?
    {
        let mut object = ctx.object(revision.object)?;
        let previous = object.state;
        object.state = settled_state(ctx, &object)?;
        object.touch(acting_user);
        ctx.store.save_object(&object)?;
        info!(
            revision = %revision_id,
            object = %object.object,
            from = %previous,
            to = %object.state,
            "pending revision cancelled"
        );
    }

    if let Some(change_request) = change_request {
        update.merge(cascade::run(ctx, [WorkItem::ChangeRequest(change_request)])?);
    }
    Ok(update)
}

pub(crate) fn promote_revision(
    ctx: &GovernanceContext<'_>,
    revision: &mut Revision,
    acting_user: &str,
) -> GovernanceResult<()> {
    let target = RevisionState::from(revision.desired_state);
    if revision.state == target && revision.promoted_at.is_some() {
        return Ok(());
    }
    if !revision.state.is_open() {
        return Err(GovernanceError::invalid_state(
            revision.id,
            "new or pendingapproval",
            revision.state,
        ));
    }
    let Some(cr_id) = revision.change_request else {
        return Err(GovernanceError::NoChangeRequest {
            revision: revision.id,
        });
    };
    let change_request = ctx.change_request(cr_id)?;
    if change_request.state != ChangeRequestState::Approved {
        return Err(GovernanceError::NotApproved {
            revision: revision.id,
            change_request: cr_id,
        });
    }

    revision.state = target;
    revision.promoted_at = Some(Utc::now());
    revision.touch(acting_user);
    ctx.store.save_revision(revision)?;
    info!(
        revision = %revision.id,
        object = %revision.object,
        state = %revision.state,
        "revision promoted"
    );
    Ok(())
}

pub(crate) fn supersede_revision(
    ctx: &GovernanceContext<'_>,
    revision: &mut Revision,
    acting_user: &str,
) -> GovernanceResult<()> {
    if !revision.state.is_live() {
        return Err(GovernanceError::invalid_state(
            revision.id,
            "active, inactive or bootstrap",
            revision.state,
        ));
    }
    revision.state = RevisionState::Superseded;
    revision.superseded_at = Some(Utc::now());
    revision.touch(acting_user);
    ctx.store.save_revision(revision)?;
    info!(revision = %revision.id, object = %revision.object, "revision superseded");
    Ok(())
}

pub(crate) fn decline_revision(
    ctx: &GovernanceContext<'_>,
    revision: &mut Revision,
    acting_user: &str,
) -> GovernanceResult<()> {
    if revision.state != RevisionState::PendingApproval {
        return Err(GovernanceError::invalid_state(
            revision.id,
            "pendingapproval",
            revision.state,
        ));
    }
    revision.state = RevisionState::ApprovalFailed;
    revision.approval_failed_at = Some(Utc::now());
    revision.touch(acting_user);
    ctx.store.save_revision(revision)?;
    info!(revision = %revision.id, object = %revision.object, "revision declined");
    Ok(())
}
