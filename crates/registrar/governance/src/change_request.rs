//! Change request state machine.

use crate::cascade::{Step, WorkItem};
use crate::context::GovernanceContext;
use crate::error::{GovernanceError, GovernanceResult};
use crate::kinds::handler_for;
use crate::quorum::QuorumTally;
use crate::SYSTEM_USER;
use registrar_types::{
    Approval, ApprovalState, ChangeRequest, ChangeRequestId, ChangeRequestState, GovernedObject,
    ObjectId, Revision, RevisionState,
};
use tracing::{debug, error, info};

pub(crate) fn evaluate(
    ctx: &GovernanceContext<'_>,
    id: ChangeRequestId,
) -> GovernanceResult<Step> {
    let mut change_request = ctx.change_request(id)?;
    let before = change_request.state;
    let mut step = Step::default();

    match change_request.state {
        ChangeRequestState::New => {
            let object = ctx.object(change_request.object)?;
            let revision = ctx.revision(change_request.proposed_revision)?;
            if is_abandoned(&change_request, &object, &revision) {
                change_request.state = ChangeRequestState::Cancelled;
            } else if revision.change_request.is_none() {
                // The start that opened it has not bound the revision yet.
                debug!(change_request_id = %id, revision = %revision.id, "awaiting start");
            } else {
                let approvals = open_for_approval(ctx, &change_request, &object, &revision)?;
                step.follow_ups
                    .extend(approvals.iter().map(|a| WorkItem::Approval(a.id)));
                change_request.state = ChangeRequestState::PendingApproval;
            }
        }
        ChangeRequestState::PendingApproval => {
            let object = ctx.object(change_request.object)?;
            let revision = ctx.revision(change_request.proposed_revision)?;
            let approvals = ctx.approvals(id)?;
            if is_abandoned(&change_request, &object, &revision) {
                change_request.state = ChangeRequestState::Cancelled;
            } else {
                let tally = QuorumTally::from_approvals(&approvals);
                debug!(
                    change_request_id = %id,
                    total = tally.total,
                    approved = tally.approved,
                    declined = tally.declined,
                    skipped = tally.skipped,
                    "quorum"
                );
                if tally.is_declined() {
                    change_request.state = ChangeRequestState::Declined;
                } else if tally.is_approved() {
                    change_request.state = ChangeRequestState::Approved;
                }
            }
            step.follow_ups
                .extend(approvals.iter().map(|a| WorkItem::Approval(a.id)));
        }
        ChangeRequestState::Approved
        | ChangeRequestState::Declined
        | ChangeRequestState::Cancelled => {
            step.follow_ups.extend(
                ctx.approvals(id)?
                    .iter()
                    .filter(|a| a.state.is_open())
                    .map(|a| WorkItem::Approval(a.id)),
            );
        }
    }
    step.follow_ups.push(WorkItem::Object(change_request.object));

    if change_request.state != before {
        if change_request.state.is_terminal() {
            // Approvals must see the decision before the object acts on it.
            step.follow_ups.extend(
                ctx.approvals(id)?
                    .iter()
                    .map(|a| WorkItem::Approval(a.id)),
            );
        }
        change_request.touch(SYSTEM_USER);
        ctx.store.save_change_request(&change_request)?;
        step.changed = true;
        info!(
            change_request_id = %id,
            object = %change_request.object,
            from = %before,
            to = %change_request.state,
            "change request updated"
        );
    }
    Ok(step)
}

/// The proposed revision is no longer what the object is waiting on, or
/// it is bound to another change request.
fn is_abandoned(
    change_request: &ChangeRequest,
    object: &GovernedObject,
    revision: &Revision,
) -> bool {
    object.pending_revision != Some(change_request.proposed_revision)
        || revision.state == RevisionState::Cancelled
        || revision
            .change_request
            .is_some_and(|bound| bound != change_request.id)
}

/// Approver sets that must approve `revision`, falling back to the root set.
pub(crate) fn required_sets(
    ctx: &GovernanceContext<'_>,
    object: &GovernedObject,
    revision: &Revision,
) -> GovernanceResult<Vec<ObjectId>> {
    let sets = handler_for(object.object.kind).required_approver_sets(ctx, object, revision)?;
    if sets.is_empty() {
        Ok(vec![ctx.root_approver_set()])
    } else {
        Ok(sets)
    }
}

/// Approver sets told when a change request for `revision` opens.
pub(crate) fn informed_sets(
    ctx: &GovernanceContext<'_>,
    object: &GovernedObject,
    revision: &Revision,
) -> GovernanceResult<Vec<ObjectId>> {
    handler_for(object.object.kind).informed_approver_sets(ctx, object, revision)
}

/// Check every required set has an approval and put the capstone in place.
fn open_for_approval(
    ctx: &GovernanceContext<'_>,
    change_request: &ChangeRequest,
    object: &GovernedObject,
    revision: &Revision,
) -> GovernanceResult<Vec<Approval>> {
    let mut approvals = ctx.approvals(change_request.id)?;
    for set in required_sets(ctx, object, revision)? {
        if !approvals.iter().any(|a| a.approver_set == set) {
            error!(
                change_request_id = %change_request.id,
                approver_set = %set,
                "required approver set has no approval"
            );
            return Err(GovernanceError::MissingApproval {
                change_request: change_request.id,
                approver_set: set,
            });
        }
    }

    let root = ctx.root_approver_set();
    match approvals.iter_mut().find(|a| a.approver_set == root) {
        Some(capstone) if capstone.is_final => {}
        Some(capstone) => {
            capstone.is_final = true;
            capstone.state = ApprovalState::New;
            capstone.touch(SYSTEM_USER);
            ctx.store.save_approval(capstone)?;
        }
        None => {
            let mut capstone = Approval::new(
                ctx.store.allocate_approval_id()?,
                change_request.id,
                root,
                SYSTEM_USER,
            );
            capstone.is_final = true;
            ctx.store.save_approval(&capstone)?;
            debug!(
                change_request_id = %change_request.id,
                approval_id = %capstone.id,
                "capstone approval created"
            );
            approvals.push(capstone);
        }
    }
    Ok(approvals)
}
