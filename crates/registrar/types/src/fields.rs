//! Per-kind revision payloads.

use crate::ids::ObjectId;
use crate::kind::ObjectKind;
use serde::{Deserialize, Serialize};

/// Field values proposed by a revision, one variant per [`ObjectKind`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RevisionFields {
    #[serde(rename = "apiuser")]
    Account(AccountFields),
    #[serde(rename = "approver")]
    Approver(ApproverFields),
    #[serde(rename = "approverset")]
    ApproverSet(ApproverSetFields),
    #[serde(rename = "host")]
    Host(HostFields),
    #[serde(rename = "domain")]
    Domain(DomainFields),
    #[serde(rename = "contact")]
    Contact(ContactFields),
}

impl RevisionFields {
    pub fn kind(&self) -> ObjectKind {
        match self {
            RevisionFields::Account(_) => ObjectKind::Account,
            RevisionFields::Approver(_) => ObjectKind::Approver,
            RevisionFields::ApproverSet(_) => ObjectKind::ApproverSet,
            RevisionFields::Host(_) => ObjectKind::Host,
            RevisionFields::Domain(_) => ObjectKind::Domain,
            RevisionFields::Contact(_) => ObjectKind::Contact,
        }
    }

    pub fn as_approver(&self) -> Option<&ApproverFields> {
        match self {
            RevisionFields::Approver(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn as_approver_set(&self) -> Option<&ApproverSetFields> {
        match self {
            RevisionFields::ApproverSet(fields) => Some(fields),
            _ => None,
        }
    }
}

/// A client account allowed to talk to the registry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountFields {
    pub name: String,
    pub description: String,
    /// Client certificate serial.
    pub serial: String,
    /// PEM client certificate.
    pub certificate: String,
    pub is_admin: bool,
    pub is_epp_client: bool,
}

/// A person who may sign approvals.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproverFields {
    pub name: String,
    pub email_address: String,
    pub role: String,
    pub username: String,
    pub employee_id: i64,
    pub department: String,
    pub is_admin: bool,
    /// BLAKE3 fingerprint of `public_key`.
    pub fingerprint: String,
    /// Hex Ed25519 verifying key.
    pub public_key: String,
}

/// A group of approvers that decides as one.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproverSetFields {
    pub title: String,
    pub description: String,
    pub approvers: Vec<ObjectId>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostFields {
    pub host_name: String,
    pub host_addresses: Vec<String>,
    pub client_delete_prohibited: bool,
    pub server_delete_prohibited: bool,
    pub client_transfer_prohibited: bool,
    pub server_transfer_prohibited: bool,
    pub client_update_prohibited: bool,
    pub server_update_prohibited: bool,
}

/// A delegated name and what it points at.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainFields {
    pub domain_name: String,
    pub owners: String,
    pub class: String,
    pub registrant: ObjectId,
    pub admin_contact: ObjectId,
    pub tech_contact: ObjectId,
    pub billing_contact: ObjectId,
    /// Name server hosts.
    pub hostnames: Vec<ObjectId>,
    pub ds_data: Vec<DsDataEntry>,
    pub client_delete_prohibited: bool,
    pub server_delete_prohibited: bool,
    pub client_hold: bool,
    pub server_hold: bool,
    pub client_renew_prohibited: bool,
    pub server_renew_prohibited: bool,
    pub client_transfer_prohibited: bool,
    pub server_transfer_prohibited: bool,
    pub client_update_prohibited: bool,
    pub server_update_prohibited: bool,
}

impl DomainFields {
    /// Every contact the domain references, registrant first.
    pub fn contacts(&self) -> [ObjectId; 4] {
        [
            self.registrant,
            self.admin_contact,
            self.tech_contact,
            self.billing_contact,
        ]
    }
}

/// One DNSSEC delegation signer record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DsDataEntry {
    pub key_tag: u32,
    pub algorithm: u8,
    pub digest_type: u8,
    /// Hex digest, upper case.
    pub digest: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactFields {
    pub name: String,
    pub org: String,
    pub address_street: Vec<String>,
    pub address_city: String,
    pub address_state: String,
    pub address_postal_code: String,
    /// ISO 3166-1 alpha-2.
    pub address_country: String,
    /// EPP format, `+CC.NUMBER`.
    pub voice_phone_number: String,
    pub voice_phone_extension: String,
    pub fax_phone_number: String,
    pub fax_phone_extension: String,
    pub email_address: String,
    pub client_delete_prohibited: bool,
    pub server_delete_prohibited: bool,
    pub client_transfer_prohibited: bool,
    pub server_transfer_prohibited: bool,
    pub client_update_prohibited: bool,
    pub server_update_prohibited: bool,
}
