//! Fire-and-forget notices about approvals.
//!
//! Delivery is a collaborator concern. A failed notice is logged and never
//! interrupts a state transition.

use crate::context::GovernanceContext;
use crate::quorum::ApproverSetView;
use registrar_types::{ApprovalId, ApprovalState, ChangeRequestId, ObjectId, ObjectRef};
use std::sync::Mutex;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoticeKind {
    /// A change request was opened; sent to informed approver sets.
    ChangeRequestOpened,
    /// An approval became signable.
    ApprovalRequested,
    /// An approval reached approved, declined or cancelled.
    ApprovalResolved(ApprovalState),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub object: ObjectRef,
    pub change_request: ChangeRequestId,
    pub approval: Option<ApprovalId>,
    pub subject: String,
    pub recipients: Vec<String>,
    pub link: Option<String>,
}

#[derive(Debug, Error)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: &Notice) -> Result<(), NotifyError>;
}

/// Writes notices to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: &Notice) -> Result<(), NotifyError> {
        info!(
            object = %notice.object,
            change_request_id = %notice.change_request,
            recipients = notice.recipients.len(),
            subject = %notice.subject,
            "notice"
        );
        Ok(())
    }
}

/// Keeps every notice in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .map(|notices| notices.clone())
            .unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: &Notice) -> Result<(), NotifyError> {
        self.notices
            .lock()
            .map_err(|_| NotifyError("notice log lock poisoned".into()))?
            .push(notice.clone());
        Ok(())
    }
}

/// Build and send a notice addressed to the members of `sets`.
pub(crate) fn dispatch(
    ctx: &GovernanceContext<'_>,
    kind: NoticeKind,
    object: ObjectRef,
    change_request: ChangeRequestId,
    approval: Option<ApprovalId>,
    sets: &[ObjectId],
) {
    if !ctx.config.notifications.enabled {
        return;
    }

    let mut recipients = Vec::new();
    for set in sets {
        match ApproverSetView::load(ctx.store, *set) {
            Ok(view) => recipients.extend(view.active_member_emails()),
            Err(e) => warn!(approver_set = %set, error = %e, "cannot resolve notice recipients"),
        }
    }
    recipients.sort();
    recipients.dedup();

    let subject = match &kind {
        NoticeKind::ChangeRequestOpened => {
            format!("Change request {} opened for {}", change_request, object)
        }
        NoticeKind::ApprovalRequested => format!(
            "Approval {} requested for change request {} on {}",
            approval.map(|a| a.to_string()).unwrap_or_default(),
            change_request,
            object
        ),
        NoticeKind::ApprovalResolved(state) => format!(
            "Approval {} for change request {} is {}",
            approval.map(|a| a.to_string()).unwrap_or_default(),
            change_request,
            state
        ),
    };

    let notice = Notice {
        link: approval.and_then(|a| ctx.config.notifications.approval_link(a)),
        kind,
        object,
        change_request,
        approval,
        subject,
        recipients,
    };

    if let Err(e) = ctx.notifier.notify(&notice) {
        warn!(
            change_request_id = %change_request,
            error = %e,
            "notice not delivered"
        );
    }
}
