//! Quorum resolution.
//!
//! Decides whether an approver set can currently approve anything, and
//! whether a change request's approvals add up to a decision.

use crate::context::GovernanceContext;
use crate::error::{GovernanceError, GovernanceResult};
use registrar_storage::RegistryStore;
use registrar_types::{
    Approval, ApprovalState, ApproverFields, ApproverSetFields, ChangeRequest, DesiredState,
    GovernedObject, ObjectId, ObjectKind, ObjectRef,
};
use tracing::{debug, warn};

/// One member of an approver set with its live fields.
#[derive(Debug, Clone)]
pub struct MemberView {
    pub approver: GovernedObject,
    pub fields: Option<ApproverFields>,
}

/// An approver set resolved through the store at call time.
#[derive(Debug, Clone)]
pub struct ApproverSetView {
    pub set: GovernedObject,
    pub fields: Option<ApproverSetFields>,
    pub members: Vec<MemberView>,
}

/// Whether an approver set can decide right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApproverSetValidity {
    Valid,
    Inactive,
    NoValidApprovers,
}

impl ApproverSetView {
    pub fn load(store: &dyn RegistryStore, id: ObjectId) -> GovernanceResult<Self> {
        let object = ObjectRef::approver_set(id);
        let set = store
            .get_object(object)?
            .ok_or(GovernanceError::NotFound(object.into()))?;

        let fields = match set.current_revision {
            Some(revision) => store
                .get_revision(revision)?
                .and_then(|r| r.fields.as_approver_set().cloned()),
            None => None,
        };

        let mut members = Vec::new();
        for approver_id in fields.iter().flat_map(|f| f.approvers.iter().copied()) {
            let Some(approver) = store.get_object(ObjectRef::approver(approver_id))? else {
                warn!(approver_set = %id, approver = %approver_id, "approver set lists a missing approver");
                continue;
            };
            let fields = match approver.current_revision {
                Some(revision) => store
                    .get_revision(revision)?
                    .and_then(|r| r.fields.as_approver().cloned()),
                None => None,
            };
            members.push(MemberView { approver, fields });
        }

        Ok(Self {
            set,
            fields,
            members,
        })
    }

    pub fn validity(&self) -> ApproverSetValidity {
        if self.set.state.is_inactive() {
            return ApproverSetValidity::Inactive;
        }
        if !self.members.iter().any(|m| m.approver.state.is_active()) {
            return ApproverSetValidity::NoValidApprovers;
        }
        ApproverSetValidity::Valid
    }

    /// Email addresses of members that may currently sign.
    pub fn active_member_emails(&self) -> Vec<String> {
        self.members
            .iter()
            .filter(|m| m.approver.state.is_active())
            .filter_map(|m| m.fields.as_ref().map(|f| f.email_address.clone()))
            .filter(|email| !email.is_empty())
            .collect()
    }
}

/// Counts of approval states on one change request.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QuorumTally {
    pub total: usize,
    pub approved: usize,
    pub declined: usize,
    /// Auto-skipped approvals (no valid approvers, inactive set).
    pub skipped: usize,
    pub final_present: bool,
    pub non_final_total: usize,
    pub non_final_resolved: usize,
}

impl QuorumTally {
    pub fn from_states<I>(states: I) -> Self
    where
        I: IntoIterator<Item = (ApprovalState, bool)>,
    {
        let mut tally = QuorumTally::default();
        for (state, is_final) in states {
            tally.total += 1;
            match state {
                ApprovalState::Approved => tally.approved += 1,
                ApprovalState::Declined => tally.declined += 1,
                s if s.is_resolved() => tally.skipped += 1,
                _ => {}
            }
            if is_final {
                tally.final_present = true;
            } else {
                tally.non_final_total += 1;
                if state.is_resolved() {
                    tally.non_final_resolved += 1;
                }
            }
        }
        tally
    }

    pub fn from_approvals<'a, I>(approvals: I) -> Self
    where
        I: IntoIterator<Item = &'a Approval>,
    {
        Self::from_states(approvals.into_iter().map(|a| (a.state, a.is_final)))
    }

    pub fn resolved(&self) -> usize {
        self.approved + self.skipped
    }

    pub fn is_declined(&self) -> bool {
        self.declined > 0
    }

    /// At least one approval and nothing outstanding.
    pub fn is_approved(&self) -> bool {
        !self.is_declined() && self.approved >= 1 && self.resolved() == self.total
    }

    /// Every approval except the capstone has resolved.
    pub fn ready_for_final_approval(&self) -> bool {
        self.final_present && self.non_final_resolved == self.non_final_total
    }
}

/// True for the change request that ratifies a bootstrap identity.
///
/// The root approver and root approver set start life in `bootstrap`
/// with nobody active to approve them, so their first change request is
/// always eligible.
pub fn is_bootstrap_exception(
    ctx: &GovernanceContext<'_>,
    change_request: &ChangeRequest,
) -> GovernanceResult<bool> {
    let is_root = match change_request.object.kind {
        ObjectKind::Approver => change_request.object.id == ctx.config.root_approver,
        ObjectKind::ApproverSet => change_request.object.id == ctx.config.root_approver_set,
        _ => false,
    };
    if !is_root {
        return Ok(false);
    }
    let Some(initial) = change_request.initial_revision else {
        return Ok(false);
    };
    let initial = ctx.revision(initial)?;
    Ok(initial.desired_state == DesiredState::Bootstrap)
}

/// Re-derive the state an open approval should hold right now.
pub fn check_validity_of_approver_set(
    ctx: &GovernanceContext<'_>,
    approval: &Approval,
    change_request: &ChangeRequest,
) -> GovernanceResult<ApprovalState> {
    if is_bootstrap_exception(ctx, change_request)? {
        return Ok(ApprovalState::PendingApproval);
    }

    let view = ApproverSetView::load(ctx.store, approval.approver_set)?;
    let state = match view.validity() {
        ApproverSetValidity::Inactive => ApprovalState::InactiveApproverSet,
        ApproverSetValidity::NoValidApprovers => ApprovalState::NoValidApprovers,
        ApproverSetValidity::Valid if !approval.is_final => ApprovalState::PendingApproval,
        ApproverSetValidity::Valid => {
            let tally = QuorumTally::from_approvals(&ctx.approvals(change_request.id)?);
            debug!(
                approval_id = %approval.id,
                change_request_id = %change_request.id,
                resolved = tally.non_final_resolved,
                outstanding = tally.non_final_total - tally.non_final_resolved,
                "capstone readiness"
            );
            if tally.ready_for_final_approval() {
                ApprovalState::PendingApproval
            } else {
                ApprovalState::New
            }
        }
    };
    Ok(state)
}
