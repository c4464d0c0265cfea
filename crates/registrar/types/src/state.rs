//! Lifecycle states.
//!
//! All states serialize to the lowercase tags used in storage and in
//! exported change JSON.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Raised when a stored state tag is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {machine} state: {tag}")]
pub struct UnknownState {
    pub machine: &'static str,
    pub tag: String,
}

macro_rules! state_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $machine:literal {
            $($(#[$vmeta:meta])* $variant:ident => $tag:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($(#[$vmeta])* #[serde(rename = $tag)] $variant),+
        }

        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $tag),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownState;

            fn from_str(tag: &str) -> Result<Self, Self::Err> {
                match tag {
                    $($tag => Ok($name::$variant),)+
                    other => Err(UnknownState {
                        machine: $machine,
                        tag: other.to_string(),
                    }),
                }
            }
        }
    };
}

state_enum!(
    /// State of one proposed snapshot of a governed object.
    RevisionState, "revision" {
        New => "new",
        PendingApproval => "pendingapproval",
        Active => "active",
        Inactive => "inactive",
        /// Installed by registry bootstrap without approval.
        Bootstrap => "bootstrap",
        Superseded => "superseded",
        ApprovalFailed => "approvalfailed",
        Cancelled => "cancelled",
    }
);

impl RevisionState {
    /// Live states are the ones a promoted revision can hold.
    pub fn is_live(self) -> bool {
        matches!(
            self,
            RevisionState::Active | RevisionState::Inactive | RevisionState::Bootstrap
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RevisionState::Superseded | RevisionState::ApprovalFailed | RevisionState::Cancelled
        )
    }

    /// `new` and `pendingapproval`: the revision may still become live.
    pub fn is_open(self) -> bool {
        matches!(self, RevisionState::New | RevisionState::PendingApproval)
    }
}

state_enum!(
    /// The live state a revision asks to be promoted into.
    DesiredState, "desired" {
        Active => "active",
        Inactive => "inactive",
        Bootstrap => "bootstrap",
    }
);

impl From<DesiredState> for RevisionState {
    fn from(desired: DesiredState) -> Self {
        match desired {
            DesiredState::Active => RevisionState::Active,
            DesiredState::Inactive => RevisionState::Inactive,
            DesiredState::Bootstrap => RevisionState::Bootstrap,
        }
    }
}

impl From<DesiredState> for ObjectState {
    fn from(desired: DesiredState) -> Self {
        match desired {
            DesiredState::Active => ObjectState::Active,
            DesiredState::Inactive => ObjectState::Inactive,
            DesiredState::Bootstrap => ObjectState::Bootstrap,
        }
    }
}

state_enum!(
    /// Displayed state of a governed object.
    ObjectState, "object" {
        New => "new",
        PendingNew => "pendingnew",
        Active => "active",
        Inactive => "inactive",
        Bootstrap => "bootstrap",
        PendingBootstrap => "pendingbootstrap",
        ActivePendingApproval => "activependingapproval",
        InactivePendingApproval => "inactivependingapproval",
    }
);

impl ObjectState {
    /// True while a change request for the object is open.
    pub fn is_pending(self) -> bool {
        matches!(
            self,
            ObjectState::PendingNew
                | ObjectState::PendingBootstrap
                | ObjectState::ActivePendingApproval
                | ObjectState::InactivePendingApproval
        )
    }

    /// The pending variant shown while a change is in approval.
    pub fn pending_variant(self) -> ObjectState {
        match self {
            ObjectState::Active | ObjectState::ActivePendingApproval => {
                ObjectState::ActivePendingApproval
            }
            ObjectState::Inactive | ObjectState::InactivePendingApproval => {
                ObjectState::InactivePendingApproval
            }
            ObjectState::Bootstrap | ObjectState::PendingBootstrap => ObjectState::PendingBootstrap,
            ObjectState::New | ObjectState::PendingNew => ObjectState::PendingNew,
        }
    }

    /// Approver sets in these states cannot approve anything.
    pub fn is_inactive(self) -> bool {
        matches!(
            self,
            ObjectState::Inactive | ObjectState::InactivePendingApproval
        )
    }

    /// Approvers in these states count as valid signers for quorum.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            ObjectState::Active | ObjectState::ActivePendingApproval
        )
    }
}

state_enum!(
    ChangeRequestState, "change request" {
        New => "new",
        PendingApproval => "pendingapproval",
        Approved => "approved",
        Declined => "declined",
        Cancelled => "cancelled",
    }
);

impl ChangeRequestState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ChangeRequestState::Approved
                | ChangeRequestState::Declined
                | ChangeRequestState::Cancelled
        )
    }
}

state_enum!(
    ApprovalState, "approval" {
        New => "new",
        PendingApproval => "pendingapproval",
        Approved => "approved",
        Declined => "declined",
        Cancelled => "cancelled",
        /// The bound approver set has no active members right now.
        NoValidApprovers => "novalidapprovers",
        /// The bound approver set is itself inactive.
        InactiveApproverSet => "inactiveapproverset",
        SkippedNoValidApprovers => "skippednovalidapprovers",
        SkippedInactiveApproverSet => "skippedinactiveapproverset",
    }
);

impl ApprovalState {
    /// States that no longer block quorum.
    pub fn is_resolved(self) -> bool {
        matches!(
            self,
            ApprovalState::Approved
                | ApprovalState::NoValidApprovers
                | ApprovalState::InactiveApproverSet
                | ApprovalState::SkippedNoValidApprovers
                | ApprovalState::SkippedInactiveApproverSet
        )
    }

    /// States that will never change again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ApprovalState::Approved
                | ApprovalState::Declined
                | ApprovalState::Cancelled
                | ApprovalState::SkippedNoValidApprovers
                | ApprovalState::SkippedInactiveApproverSet
        )
    }

    /// States whose approval is still waiting on something.
    pub fn is_open(self) -> bool {
        !self.is_terminal()
    }
}

/// Raised when an attestation names an action other than approve/decline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown approval action: {0}")]
pub struct UnknownAction(pub String);

/// The decision a signer attests to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalAction {
    Approve,
    Decline,
}

impl ApprovalAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ApprovalAction::Approve => "approve",
            ApprovalAction::Decline => "decline",
        }
    }

    /// Terminal approval state reached when this action is verified.
    pub fn outcome(self) -> ApprovalState {
        match self {
            ApprovalAction::Approve => ApprovalState::Approved,
            ApprovalAction::Decline => ApprovalState::Declined,
        }
    }
}

impl fmt::Display for ApprovalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApprovalAction {
    type Err = UnknownAction;

    fn from_str(action: &str) -> Result<Self, Self::Err> {
        match action {
            "approve" => Ok(ApprovalAction::Approve),
            "decline" => Ok(ApprovalAction::Decline),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}
