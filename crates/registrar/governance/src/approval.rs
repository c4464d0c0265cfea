//! Approval state machine and signature intake.

use crate::attestation::{verify_attestation, ApprovalAttestation};
use crate::cascade::{self, Step, WorkItem};
use crate::context::GovernanceContext;
use crate::error::{GovernanceError, GovernanceResult};
use crate::kinds::handler_for;
use crate::notify::{dispatch, NoticeKind};
use crate::quorum::check_validity_of_approver_set;
use crate::SYSTEM_USER;
use chrono::Utc;
use registrar_crypto::SignedEnvelope;
use registrar_types::{
    Approval, ApprovalAction, ApprovalId, ApprovalState, ChangeRequest, ChangeRequestState,
};
use tracing::{info, warn};

/// What checking a stored signature produced.
enum Verdict {
    Accepted(ApprovalAction),
    Rejected(GovernanceError),
}

/// Re-derive one approval. Always asks for its change request next.
pub(crate) fn evaluate(ctx: &GovernanceContext<'_>, id: ApprovalId) -> GovernanceResult<Step> {
    let mut approval = ctx.approval(id)?;
    let change_request = ctx.change_request(approval.change_request)?;
    let mut step = Step::then([WorkItem::ChangeRequest(change_request.id)]);
    let before = approval.clone();

    if change_request.state.is_terminal() {
        if let Some(next) = after_decision(approval.state) {
            approval.state = next;
        }
    } else {
        match approval.state {
            ApprovalState::New => {
                if change_request.state == ChangeRequestState::PendingApproval {
                    approval.state =
                        check_validity_of_approver_set(ctx, &approval, &change_request)?;
                }
            }
            ApprovalState::PendingApproval if approval.is_signed() => {
                match check_signature(ctx, &approval, &change_request)? {
                    Verdict::Accepted(action) => approval.state = action.outcome(),
                    Verdict::Rejected(err) => {
                        warn!(
                            approval_id = %approval.id,
                            change_request_id = %change_request.id,
                            error = %err,
                            "stored signature rejected, clearing it"
                        );
                        approval.signature = None;
                        approval.signed_at = None;
                        step.errors.push(err);
                    }
                }
            }
            ApprovalState::PendingApproval
            | ApprovalState::NoValidApprovers
            | ApprovalState::InactiveApproverSet => {
                approval.state = check_validity_of_approver_set(ctx, &approval, &change_request)?;
            }
            _ => {}
        }
    }

    if approval.state == before.state && approval.signature == before.signature {
        return Ok(step);
    }

    approval.touch(SYSTEM_USER);
    ctx.store.save_approval(&approval)?;
    step.changed = true;
    info!(
        approval_id = %approval.id,
        change_request_id = %change_request.id,
        from = %before.state,
        to = %approval.state,
        "approval updated"
    );

    if approval.state != before.state {
        let notice = match approval.state {
            ApprovalState::PendingApproval => Some(NoticeKind::ApprovalRequested),
            s @ (ApprovalState::Approved | ApprovalState::Declined | ApprovalState::Cancelled) => {
                Some(NoticeKind::ApprovalResolved(s))
            }
            _ => None,
        };
        if let Some(kind) = notice {
            dispatch(
                ctx,
                kind,
                change_request.object,
                change_request.id,
                Some(approval.id),
                &[approval.approver_set],
            );
        }
    }
    Ok(step)
}

/// Where an approval goes once its change request is decided.
fn after_decision(state: ApprovalState) -> Option<ApprovalState> {
    match state {
        ApprovalState::New | ApprovalState::PendingApproval => Some(ApprovalState::Cancelled),
        ApprovalState::NoValidApprovers => Some(ApprovalState::SkippedNoValidApprovers),
        ApprovalState::InactiveApproverSet => Some(ApprovalState::SkippedInactiveApproverSet),
        _ => None,
    }
}

/// Verify a stored signature against the set's keyring as it is now, then
/// against what the change request currently proposes.
fn check_signature(
    ctx: &GovernanceContext<'_>,
    approval: &Approval,
    change_request: &ChangeRequest,
) -> GovernanceResult<Verdict> {
    let text = approval.signature.as_deref().unwrap_or_default();
    let keyring = ctx.keyrings.keyring_for(ctx.store, approval.approver_set)?;
    let message = match keyring.open(text) {
        Ok(message) => message,
        Err(e) => {
            return Ok(Verdict::Rejected(GovernanceError::SignatureInvalid {
                approval: approval.id,
                reason: e.to_string(),
            }))
        }
    };
    let attestation = match ApprovalAttestation::from_payload(approval.id, &message.payload) {
        Ok(attestation) => attestation,
        Err(e) => return Ok(Verdict::Rejected(e)),
    };

    let object = ctx.object(change_request.object)?;
    let mut errors =
        handler_for(object.object.kind).verify_change_request(ctx, &object, change_request)?;
    errors.extend(verify_attestation(
        ctx,
        approval,
        change_request,
        &object,
        &attestation,
    )?);
    if attestation.username != message.signer.username {
        errors.push(format!(
            "attestation names {}, but the key belongs to {}",
            attestation.username, message.signer.username
        ));
    }

    if errors.is_empty() {
        Ok(Verdict::Accepted(attestation.action))
    } else {
        Ok(Verdict::Rejected(GovernanceError::AttestationMismatch {
            approval: approval.id,
            change_request: change_request.id,
            errors,
        }))
    }
}

/// Accept an uploaded clear-signed attestation for an approval.
///
/// Returns `Ok(false)` when the exact same signature was already stored;
/// only its timestamp is refreshed then. Nothing is persisted when the
/// signature fails cryptographic checks.
pub fn submit_signature(
    ctx: &GovernanceContext<'_>,
    approval_id: ApprovalId,
    signature: &str,
    acting_user: &str,
) -> GovernanceResult<bool> {
    let envelope =
        SignedEnvelope::parse(signature).map_err(|e| GovernanceError::NoSignatureFound {
            approval: approval_id,
            reason: e.to_string(),
        })?;

    let mut approval = ctx.approval(approval_id)?;
    if approval.signature.as_deref() == Some(signature) {
        approval.signed_at = Some(Utc::now());
        approval.touch(acting_user);
        ctx.store.save_approval(&approval)?;
        info!(approval_id = %approval_id, "signature resubmitted unchanged");
        return Ok(false);
    }

    // Quorum may have moved since the attestation was downloaded.
    cascade::run(ctx, [WorkItem::Approval(approval_id)])?;
    let mut approval = ctx.approval(approval_id)?;
    if approval.state != ApprovalState::PendingApproval {
        return Err(GovernanceError::invalid_state(
            approval_id,
            "pendingapproval",
            approval.state,
        ));
    }

    let keyring = ctx.keyrings.keyring_for(ctx.store, approval.approver_set)?;
    let signer = keyring
        .verify(&envelope)
        .map_err(|e| GovernanceError::SignatureInvalid {
            approval: approval_id,
            reason: e.to_string(),
        })?;
    let attestation = ApprovalAttestation::from_payload(approval_id, envelope.payload())?;
    info!(
        approval_id = %approval_id,
        signer = %signer.username,
        fingerprint = %signer.fingerprint,
        action = %attestation.action,
        "signature accepted for verification"
    );

    approval.signature = Some(signature.to_string());
    approval.signed_at = Some(Utc::now());
    approval.touch(acting_user);
    ctx.store.save_approval(&approval)?;

    let update = cascade::run(ctx, [WorkItem::Approval(approval_id)])?;
    if ctx.approval(approval_id)?.is_signed() {
        return Ok(true);
    }

    // Structural verification cleared the signature again.
    let rejection = update.errors.into_iter().find(|e| {
        matches!(
            e.root_cause(),
            GovernanceError::AttestationMismatch { approval, .. }
            | GovernanceError::SignatureInvalid { approval, .. }
            | GovernanceError::UnknownAction { approval, .. } if *approval == approval_id
        )
    });
    Err(rejection.unwrap_or(GovernanceError::SignatureInvalid {
        approval: approval_id,
        reason: "signature was not accepted".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decided_change_requests_close_open_approvals() {
        assert_eq!(
            after_decision(ApprovalState::New),
            Some(ApprovalState::Cancelled)
        );
        assert_eq!(
            after_decision(ApprovalState::PendingApproval),
            Some(ApprovalState::Cancelled)
        );
        assert_eq!(
            after_decision(ApprovalState::NoValidApprovers),
            Some(ApprovalState::SkippedNoValidApprovers)
        );
        assert_eq!(
            after_decision(ApprovalState::InactiveApproverSet),
            Some(ApprovalState::SkippedInactiveApproverSet)
        );
        assert_eq!(after_decision(ApprovalState::Approved), None);
        assert_eq!(after_decision(ApprovalState::Declined), None);
    }
}
