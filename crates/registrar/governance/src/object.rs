//! Governed object state: applies change request decisions.

use crate::cascade::Step;
use crate::context::GovernanceContext;
use crate::error::{GovernanceError, GovernanceResult};
use crate::kinds::handler_for;
use crate::revision::{decline_revision, promote_revision, supersede_revision};
use crate::SYSTEM_USER;
use registrar_types::{ChangeRequestState, GovernedObject, ObjectRef, ObjectState, RevisionState};
use tracing::{info, warn};

pub(crate) fn evaluate(
    ctx: &GovernanceContext<'_>,
    object_ref: ObjectRef,
) -> GovernanceResult<Step> {
    let mut object = ctx.object(object_ref)?;
    let mut step = Step::default();
    if !object.state.is_pending() {
        return Ok(step);
    }
    let before = object.clone();

    match object.pending_revision {
        None => object.state = settled_state(ctx, &object)?,
        Some(pending) => {
            let mut revision = ctx.revision(pending)?;
            if revision.state.is_terminal() {
                warn!(
                    object = %object_ref,
                    revision = %pending,
                    state = %revision.state,
                    "dropping finished pending revision"
                );
                object.pending_revision = None;
                object.state = settled_state(ctx, &object)?;
            } else if let Some(cr_id) = revision.change_request {
                let change_request = ctx.change_request(cr_id)?;
                match change_request.state {
                    ChangeRequestState::Approved => {
                        let handler = handler_for(object_ref.kind);
                        let errors = handler.verify_change_request(ctx, &object, &change_request)?;
                        if !errors.is_empty() {
                            step.errors.push(GovernanceError::ChangeRequestMismatch {
                                change_request: cr_id,
                                errors,
                            });
                            return Ok(step);
                        }
                        promote_revision(ctx, &mut revision, SYSTEM_USER)?;
                        if let Some(current) = object.current_revision {
                            let mut current = ctx.revision(current)?;
                            if current.state.is_live() {
                                supersede_revision(ctx, &mut current, SYSTEM_USER)?;
                            }
                        }
                        object.current_revision = Some(revision.id);
                        object.pending_revision = None;
                        object.state = revision.desired_state.into();
                        step.follow_ups = handler.dependents_on_promotion(ctx, &object)?;
                    }
                    ChangeRequestState::Declined => {
                        decline_revision(ctx, &mut revision, SYSTEM_USER)?;
                        object.pending_revision = None;
                        object.state = settled_state(ctx, &object)?;
                    }
                    ChangeRequestState::Cancelled => {
                        object.pending_revision = None;
                        object.state = settled_state(ctx, &object)?;
                    }
                    ChangeRequestState::New | ChangeRequestState::PendingApproval => {}
                }
            }
        }
    }

    if object.state == before.state
        && object.current_revision == before.current_revision
        && object.pending_revision == before.pending_revision
    {
        return Ok(step);
    }

    object.touch(SYSTEM_USER);
    ctx.store.save_object(&object)?;
    step.changed = true;
    info!(
        object = %object_ref,
        from = %before.state,
        to = %object.state,
        current_revision = ?object.current_revision.map(|r| r.get()),
        "object updated"
    );
    Ok(step)
}

/// State an object falls back to when nothing is pending.
pub(crate) fn settled_state(
    ctx: &GovernanceContext<'_>,
    object: &GovernedObject,
) -> GovernanceResult<ObjectState> {
    if let Some(current) = ctx.current_revision(object)? {
        match current.state {
            RevisionState::Active => return Ok(ObjectState::Active),
            RevisionState::Inactive => return Ok(ObjectState::Inactive),
            RevisionState::Bootstrap => return Ok(ObjectState::Bootstrap),
            _ => {}
        }
    }
    Ok(match object.state {
        ObjectState::Bootstrap | ObjectState::PendingBootstrap => ObjectState::Bootstrap,
        _ => ObjectState::New,
    })
}
