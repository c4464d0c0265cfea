use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The closed set of governed object kinds.
///
/// The serialized tag is the one carried in attestations and change
/// requests, so it must never change for an existing kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectKind {
    /// API / EPP client account.
    #[serde(rename = "apiuser")]
    Account,
    #[serde(rename = "approver")]
    Approver,
    #[serde(rename = "approverset")]
    ApproverSet,
    /// Registrable resource (a name server host).
    #[serde(rename = "host")]
    Host,
    /// Registrable resource (a delegated domain name).
    #[serde(rename = "domain")]
    Domain,
    /// Registrant or administrative contact referenced by domains.
    #[serde(rename = "contact")]
    Contact,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 6] = [
        ObjectKind::Account,
        ObjectKind::Approver,
        ObjectKind::ApproverSet,
        ObjectKind::Host,
        ObjectKind::Domain,
        ObjectKind::Contact,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ObjectKind::Account => "apiuser",
            ObjectKind::Approver => "approver",
            ObjectKind::ApproverSet => "approverset",
            ObjectKind::Host => "host",
            ObjectKind::Domain => "domain",
            ObjectKind::Contact => "contact",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised for a type tag outside [`ObjectKind`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown object type: {0}")]
pub struct UnknownObjectKind(pub String);

impl FromStr for ObjectKind {
    type Err = UnknownObjectKind;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        ObjectKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == tag)
            .ok_or_else(|| UnknownObjectKind(tag.to_string()))
    }
}
