//! Attestations: the exact document an approver signs offline.

use crate::context::GovernanceContext;
use crate::error::{GovernanceError, GovernanceResult};
use crate::export::{export_object, ObjectExport};
use registrar_crypto::{KeyringEntry, SignedEnvelope};
use registrar_types::{
    Approval, ApprovalAction, ApprovalId, ApprovalState, ChangeRequest, ChangeRequestId,
    GovernedObject, ObjectId, ObjectKind,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Another approval's stored signature, embedded in the capstone attestation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSignature {
    pub approval_id: ApprovalId,
    pub approver_set: ObjectId,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalAttestation {
    pub approval_id: ApprovalId,
    pub change_request_id: ChangeRequestId,
    pub object_type: ObjectKind,
    pub object_id: ObjectId,
    pub username: String,
    pub action: ApprovalAction,
    pub export: ObjectExport,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signatures: Vec<CounterSignature>,
}

impl ApprovalAttestation {
    /// Pretty JSON, the text placed inside the signed envelope.
    pub fn to_payload(&self) -> GovernanceResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Decode a signed payload, checking the action before anything else.
    pub fn from_payload(approval: ApprovalId, payload: &str) -> GovernanceResult<Self> {
        let value: Value =
            serde_json::from_str(payload).map_err(|e| GovernanceError::SignatureInvalid {
                approval,
                reason: format!("attestation is not JSON: {}", e),
            })?;
        let action = value
            .get("action")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if action.parse::<ApprovalAction>().is_err() {
            return Err(GovernanceError::UnknownAction { approval, action });
        }
        serde_json::from_value(value).map_err(|e| GovernanceError::SignatureInvalid {
            approval,
            reason: format!("attestation is malformed: {}", e),
        })
    }
}

/// Build the attestation `acting_user` must sign to record `action`.
pub fn download_attestation(
    ctx: &GovernanceContext<'_>,
    approval_id: ApprovalId,
    acting_user: &str,
    action: &str,
) -> GovernanceResult<ApprovalAttestation> {
    let action: ApprovalAction =
        action
            .parse()
            .map_err(|_| GovernanceError::UnknownAction {
                approval: approval_id,
                action: action.to_string(),
            })?;

    let approval = ctx.approval(approval_id)?;
    if approval.state != ApprovalState::PendingApproval {
        return Err(GovernanceError::invalid_state(
            approval_id,
            "pendingapproval",
            approval.state,
        ));
    }
    if !can_approve(ctx, &approval, acting_user)? {
        return Err(GovernanceError::NotAnApprover {
            approval: approval_id,
            approver_set: approval.approver_set,
            username: acting_user.to_string(),
        });
    }

    let change_request = ctx.change_request(approval.change_request)?;
    let object = ctx.object(change_request.object)?;
    let signatures = if approval.is_final {
        counter_signatures(ctx, &approval)?
    } else {
        Vec::new()
    };

    Ok(ApprovalAttestation {
        approval_id,
        change_request_id: change_request.id,
        object_type: object.object.kind,
        object_id: object.object.id,
        username: acting_user.to_string(),
        action,
        export: export_object(ctx, &object)?,
        signatures,
    })
}

/// Whether `username` may currently sign for the approval's approver set.
pub fn can_approve(
    ctx: &GovernanceContext<'_>,
    approval: &Approval,
    username: &str,
) -> GovernanceResult<bool> {
    let keyring = ctx.keyrings.keyring_for(ctx.store, approval.approver_set)?;
    Ok(keyring.find_by_username(username).is_some())
}

/// Members of the approver set whose key produced the stored signature.
pub fn signers(
    ctx: &GovernanceContext<'_>,
    approval_id: ApprovalId,
) -> GovernanceResult<Vec<KeyringEntry>> {
    let approval = ctx.approval(approval_id)?;
    let Some(text) = approval.signature.as_deref().filter(|s| !s.is_empty()) else {
        return Ok(Vec::new());
    };
    let Ok(envelope) = SignedEnvelope::parse(text) else {
        return Ok(Vec::new());
    };
    let keyring = ctx.keyrings.keyring_for(ctx.store, approval.approver_set)?;
    Ok(keyring.verify(&envelope).into_iter().cloned().collect())
}

fn counter_signatures(
    ctx: &GovernanceContext<'_>,
    capstone: &Approval,
) -> GovernanceResult<Vec<CounterSignature>> {
    Ok(ctx
        .approvals(capstone.change_request)?
        .into_iter()
        .filter(|a| a.id != capstone.id)
        .filter_map(|a| {
            a.signature.filter(|s| !s.is_empty()).map(|signature| CounterSignature {
                approval_id: a.id,
                approver_set: a.approver_set,
                signature,
            })
        })
        .collect())
}

/// Compare a signed attestation with what is actually proposed right now.
pub fn verify_attestation(
    ctx: &GovernanceContext<'_>,
    approval: &Approval,
    change_request: &ChangeRequest,
    object: &GovernedObject,
    attestation: &ApprovalAttestation,
) -> GovernanceResult<Vec<String>> {
    let mut errors = Vec::new();

    if attestation.approval_id != approval.id {
        errors.push(format!(
            "attestation is for approval {}, not {}",
            attestation.approval_id, approval.id
        ));
    }
    if attestation.change_request_id != change_request.id {
        errors.push(format!(
            "attestation is for change request {}, not {}",
            attestation.change_request_id, change_request.id
        ));
    }
    if attestation.object_type != object.object.kind || attestation.object_id != object.object.id {
        errors.push(format!(
            "attestation is for {} {}, not {}",
            attestation.object_type, attestation.object_id, object.object
        ));
    }

    let export = export_object(ctx, object)?;
    if attestation.export.pending_revision != export.pending_revision {
        errors.push("signed proposal differs from the pending revision".to_string());
    }
    if attestation.export.current_revision != export.current_revision {
        errors.push("signed proposal was made against a different current revision".to_string());
    }

    if approval.is_final {
        let mut expected = counter_signatures(ctx, approval)?;
        let mut attested = attestation.signatures.clone();
        expected.sort_by_key(|s| s.approval_id);
        attested.sort_by_key(|s| s.approval_id);
        if expected != attested {
            errors.push("capstone attestation does not carry the current approval signatures".to_string());
        }
    }

    Ok(errors)
}
