//! Identifiers.
//!
//! Every table allocates its own integer sequence, so an object is only
//! unambiguous together with its kind (see [`ObjectRef`]).

use crate::kind::ObjectKind;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! registry_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
            Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

registry_id!(
    /// Row id of a governed object within its kind's table.
    ObjectId
);
registry_id!(
    /// Row id of a revision.
    RevisionId
);
registry_id!(
    /// Row id of a change request.
    ChangeRequestId
);
registry_id!(
    /// Row id of an approval.
    ApprovalId
);

/// A governed object addressed by kind and id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectRef {
    pub kind: ObjectKind,
    pub id: ObjectId,
}

impl ObjectRef {
    pub const fn new(kind: ObjectKind, id: ObjectId) -> Self {
        Self { kind, id }
    }

    pub const fn approver(id: ObjectId) -> Self {
        Self::new(ObjectKind::Approver, id)
    }

    pub const fn approver_set(id: ObjectId) -> Self {
        Self::new(ObjectKind::ApproverSet, id)
    }

    pub const fn host(id: ObjectId) -> Self {
        Self::new(ObjectKind::Host, id)
    }

    pub const fn contact(id: ObjectId) -> Self {
        Self::new(ObjectKind::Contact, id)
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

/// Any entity whose state the engine can re-derive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "entity", content = "id", rename_all = "snake_case")]
pub enum EntityRef {
    Object(ObjectRef),
    Revision(RevisionId),
    ChangeRequest(ChangeRequestId),
    Approval(ApprovalId),
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Object(object) => write!(f, "{}", object),
            EntityRef::Revision(id) => write!(f, "revision {}", id),
            EntityRef::ChangeRequest(id) => write!(f, "change request {}", id),
            EntityRef::Approval(id) => write!(f, "approval {}", id),
        }
    }
}

impl From<ObjectRef> for EntityRef {
    fn from(object: ObjectRef) -> Self {
        EntityRef::Object(object)
    }
}

impl From<RevisionId> for EntityRef {
    fn from(id: RevisionId) -> Self {
        EntityRef::Revision(id)
    }
}

impl From<ChangeRequestId> for EntityRef {
    fn from(id: ChangeRequestId) -> Self {
        EntityRef::ChangeRequest(id)
    }
}

impl From<ApprovalId> for EntityRef {
    fn from(id: ApprovalId) -> Self {
        EntityRef::Approval(id)
    }
}
