//! Per-kind behaviour of governed objects.
//!
//! Each [`ObjectKind`] gets one handler implementing the same capability
//! set; [`handler_for`] is the object-type registry.

use crate::cascade::WorkItem;
use crate::context::GovernanceContext;
use crate::error::GovernanceResult;
use registrar_crypto::{fingerprint, parse_public_key};
use registrar_types::{
    ChangeRequest, DsDataEntry, GovernedObject, ObjectId, ObjectKind, ObjectRef, Revision,
    RevisionFields,
};
use std::net::IpAddr;

pub trait KindHandler: Send + Sync {
    fn kind(&self) -> ObjectKind;

    /// Field-level problems with a proposed revision. Empty means valid.
    fn validate(
        &self,
        ctx: &GovernanceContext<'_>,
        object: ObjectRef,
        fields: &RevisionFields,
    ) -> GovernanceResult<Vec<String>>;

    /// Approver sets whose approval the revision needs, deduplicated.
    ///
    /// The live revision of the object decides; a proposal cannot release
    /// itself from the sets that govern what it replaces.
    fn required_approver_sets(
        &self,
        ctx: &GovernanceContext<'_>,
        object: &GovernedObject,
        revision: &Revision,
    ) -> GovernanceResult<Vec<ObjectId>> {
        let current = live_revision(ctx, object)?;
        let governing = current.as_ref().unwrap_or(revision);
        Ok(dedup(governing.required_approver_sets.clone()))
    }

    /// Approver sets told about a new change request.
    fn informed_approver_sets(
        &self,
        ctx: &GovernanceContext<'_>,
        object: &GovernedObject,
        revision: &Revision,
    ) -> GovernanceResult<Vec<ObjectId>> {
        let current = live_revision(ctx, object)?;
        let governing = current.as_ref().unwrap_or(revision);
        Ok(dedup(governing.informed_approver_sets.clone()))
    }

    /// Structural consistency between an object and the change request
    /// bound to its pending revision.
    fn verify_change_request(
        &self,
        ctx: &GovernanceContext<'_>,
        object: &GovernedObject,
        change_request: &ChangeRequest,
    ) -> GovernanceResult<Vec<String>> {
        verify_change_request_common(ctx, object, change_request)
    }

    /// Work that must be re-evaluated after a revision of `object` goes live.
    fn dependents_on_promotion(
        &self,
        _ctx: &GovernanceContext<'_>,
        _object: &GovernedObject,
    ) -> GovernanceResult<Vec<WorkItem>> {
        Ok(Vec::new())
    }
}

pub struct AccountKind;
pub struct ApproverKind;
pub struct ApproverSetKind;
pub struct HostKind;
pub struct DomainKind;
pub struct ContactKind;

static ACCOUNT: AccountKind = AccountKind;
static APPROVER: ApproverKind = ApproverKind;
static APPROVER_SET: ApproverSetKind = ApproverSetKind;
static HOST: HostKind = HostKind;
static DOMAIN: DomainKind = DomainKind;
static CONTACT: ContactKind = ContactKind;

pub fn handler_for(kind: ObjectKind) -> &'static dyn KindHandler {
    match kind {
        ObjectKind::Account => &ACCOUNT,
        ObjectKind::Approver => &APPROVER,
        ObjectKind::ApproverSet => &APPROVER_SET,
        ObjectKind::Host => &HOST,
        ObjectKind::Domain => &DOMAIN,
        ObjectKind::Contact => &CONTACT,
    }
}

/// The object's current revision, when it is live.
fn live_revision(
    ctx: &GovernanceContext<'_>,
    object: &GovernedObject,
) -> GovernanceResult<Option<Revision>> {
    Ok(ctx
        .current_revision(object)?
        .filter(|revision| revision.state.is_live()))
}

fn dedup(mut sets: Vec<ObjectId>) -> Vec<ObjectId> {
    let mut seen = Vec::with_capacity(sets.len());
    sets.retain(|id| {
        if seen.contains(id) {
            false
        } else {
            seen.push(*id);
            true
        }
    });
    sets
}

fn kind_mismatch(expected: ObjectKind, fields: &RevisionFields) -> Vec<String> {
    vec![format!(
        "expected {} fields, got {}",
        expected,
        fields.kind()
    )]
}

pub(crate) fn verify_change_request_common(
    ctx: &GovernanceContext<'_>,
    object: &GovernedObject,
    change_request: &ChangeRequest,
) -> GovernanceResult<Vec<String>> {
    let mut errors = Vec::new();

    let Some(pending) = object.pending_revision else {
        errors.push(format!("{} has no pending revision", object.object));
        return Ok(errors);
    };
    let revision = ctx.revision(pending)?;
    if revision.change_request != Some(change_request.id) {
        errors.push(format!(
            "pending revision {} is not bound to change request {}",
            pending, change_request.id
        ));
    }
    if change_request.object != object.object {
        errors.push(format!(
            "change request {} governs {}, not {}",
            change_request.id, change_request.object, object.object
        ));
    }
    if change_request.initial_revision != object.current_revision {
        errors.push(format!(
            "change request {} was opened against a different current revision",
            change_request.id
        ));
    }
    if change_request.proposed_revision != pending {
        errors.push(format!(
            "change request {} proposes revision {}, but revision {} is pending",
            change_request.id, change_request.proposed_revision, pending
        ));
    }
    Ok(errors)
}

impl KindHandler for AccountKind {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Account
    }

    fn validate(
        &self,
        _ctx: &GovernanceContext<'_>,
        _object: ObjectRef,
        fields: &RevisionFields,
    ) -> GovernanceResult<Vec<String>> {
        let RevisionFields::Account(account) = fields else {
            return Ok(kind_mismatch(self.kind(), fields));
        };
        let mut errors = Vec::new();
        if account.name.trim().is_empty() {
            errors.push("account name is required".to_string());
        }
        if account.is_epp_client && account.serial.trim().is_empty() {
            errors.push("EPP client accounts need a certificate serial".to_string());
        }
        Ok(errors)
    }
}

impl KindHandler for ApproverKind {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Approver
    }

    fn validate(
        &self,
        _ctx: &GovernanceContext<'_>,
        _object: ObjectRef,
        fields: &RevisionFields,
    ) -> GovernanceResult<Vec<String>> {
        let RevisionFields::Approver(approver) = fields else {
            return Ok(kind_mismatch(self.kind(), fields));
        };
        let mut errors = Vec::new();
        if approver.name.trim().is_empty() {
            errors.push("approver name is required".to_string());
        }
        if approver.username.trim().is_empty() {
            errors.push("approver username is required".to_string());
        }
        if !is_email_address(&approver.email_address) {
            errors.push(format!(
                "invalid email address: {:?}",
                approver.email_address
            ));
        }
        match parse_public_key(&approver.public_key) {
            Ok(key) => {
                if !approver.fingerprint.is_empty() && approver.fingerprint != fingerprint(&key) {
                    errors.push("fingerprint does not match public key".to_string());
                }
            }
            Err(e) => errors.push(e.to_string()),
        }
        Ok(errors)
    }

    fn verify_change_request(
        &self,
        ctx: &GovernanceContext<'_>,
        object: &GovernedObject,
        change_request: &ChangeRequest,
    ) -> GovernanceResult<Vec<String>> {
        let mut errors = verify_change_request_common(ctx, object, change_request)?;
        let proposed = ctx.revision(change_request.proposed_revision)?;
        if let Some(fields) = proposed.fields.as_approver() {
            if let Err(e) = parse_public_key(&fields.public_key) {
                errors.push(format!("proposed approver key is unusable: {}", e));
            }
        }
        Ok(errors)
    }

    /// Membership validity of every set containing this approver may have
    /// changed, so their open approvals are re-evaluated.
    fn dependents_on_promotion(
        &self,
        ctx: &GovernanceContext<'_>,
        object: &GovernedObject,
    ) -> GovernanceResult<Vec<WorkItem>> {
        let mut items = Vec::new();
        for set in ctx.store.approver_sets_containing(object.object.id)? {
            items.extend(open_approvals_for_set(ctx, set)?);
        }
        Ok(items)
    }
}

impl KindHandler for ApproverSetKind {
    fn kind(&self) -> ObjectKind {
        ObjectKind::ApproverSet
    }

    fn validate(
        &self,
        ctx: &GovernanceContext<'_>,
        _object: ObjectRef,
        fields: &RevisionFields,
    ) -> GovernanceResult<Vec<String>> {
        let RevisionFields::ApproverSet(set) = fields else {
            return Ok(kind_mismatch(self.kind(), fields));
        };
        let mut errors = Vec::new();
        if set.title.trim().is_empty() {
            errors.push("approver set title is required".to_string());
        }
        if set.approvers.is_empty() {
            errors.push("approver set needs at least one approver".to_string());
        }
        for approver in &set.approvers {
            if ctx.store.get_object(ObjectRef::approver(*approver))?.is_none() {
                errors.push(format!("approver {} does not exist", approver));
            }
        }
        Ok(errors)
    }

    /// A live set must also consent to changes of its own membership.
    fn required_approver_sets(
        &self,
        ctx: &GovernanceContext<'_>,
        object: &GovernedObject,
        revision: &Revision,
    ) -> GovernanceResult<Vec<ObjectId>> {
        let current = live_revision(ctx, object)?;
        let governing = current.as_ref().unwrap_or(revision);
        let mut sets = governing.required_approver_sets.clone();
        if object.current_revision.is_some() && !object.state.is_inactive() {
            sets.push(object.object.id);
        }
        Ok(dedup(sets))
    }

    fn dependents_on_promotion(
        &self,
        ctx: &GovernanceContext<'_>,
        object: &GovernedObject,
    ) -> GovernanceResult<Vec<WorkItem>> {
        open_approvals_for_set(ctx, object.object.id)
    }
}

impl KindHandler for HostKind {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Host
    }

    fn validate(
        &self,
        _ctx: &GovernanceContext<'_>,
        _object: ObjectRef,
        fields: &RevisionFields,
    ) -> GovernanceResult<Vec<String>> {
        let RevisionFields::Host(host) = fields else {
            return Ok(kind_mismatch(self.kind(), fields));
        };
        let mut errors = Vec::new();
        if !is_host_name(&host.host_name) {
            errors.push(format!("invalid host name: {:?}", host.host_name));
        }
        for address in &host.host_addresses {
            if address.parse::<IpAddr>().is_err() {
                errors.push(format!("invalid host address: {:?}", address));
            }
        }
        Ok(errors)
    }
}

impl KindHandler for DomainKind {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Domain
    }

    fn validate(
        &self,
        ctx: &GovernanceContext<'_>,
        _object: ObjectRef,
        fields: &RevisionFields,
    ) -> GovernanceResult<Vec<String>> {
        let RevisionFields::Domain(domain) = fields else {
            return Ok(kind_mismatch(self.kind(), fields));
        };
        let mut errors = Vec::new();
        if !is_host_name(&domain.domain_name) {
            errors.push(format!("invalid domain name: {:?}", domain.domain_name));
        }

        let roles = ["registrant", "admin contact", "tech contact", "billing contact"];
        for (role, contact) in roles.into_iter().zip(domain.contacts()) {
            check_reference(ctx, role, ObjectRef::contact(contact), &mut errors)?;
        }

        let mut seen = Vec::with_capacity(domain.hostnames.len());
        for host in &domain.hostnames {
            if seen.contains(host) {
                errors.push(format!("host {} is listed twice", host));
                continue;
            }
            seen.push(*host);
            check_reference(ctx, "name server", ObjectRef::host(*host), &mut errors)?;
        }

        for entry in &domain.ds_data {
            errors.extend(ds_data_errors(entry));
        }
        Ok(errors)
    }
}

impl KindHandler for ContactKind {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Contact
    }

    fn validate(
        &self,
        _ctx: &GovernanceContext<'_>,
        _object: ObjectRef,
        fields: &RevisionFields,
    ) -> GovernanceResult<Vec<String>> {
        let RevisionFields::Contact(contact) = fields else {
            return Ok(kind_mismatch(self.kind(), fields));
        };
        let mut errors = Vec::new();
        if contact.name.trim().is_empty() {
            errors.push("contact name is required".to_string());
        }
        if !is_email_address(&contact.email_address) {
            errors.push(format!(
                "invalid email address: {:?}",
                contact.email_address
            ));
        }
        if contact.address_street.len() > 3 {
            errors.push("at most three street lines are allowed".to_string());
        }
        if contact.address_country.len() != 2
            || !contact
                .address_country
                .chars()
                .all(|c| c.is_ascii_uppercase())
        {
            errors.push(format!(
                "invalid country code: {:?}",
                contact.address_country
            ));
        }
        for (label, number, extension) in [
            (
                "voice",
                &contact.voice_phone_number,
                &contact.voice_phone_extension,
            ),
            ("fax", &contact.fax_phone_number, &contact.fax_phone_extension),
        ] {
            if !number.is_empty() && !is_phone_number(number) {
                errors.push(format!("invalid {} number: {:?}", label, number));
            }
            if !extension.chars().all(|c| c.is_ascii_digit()) {
                errors.push(format!("invalid {} extension: {:?}", label, extension));
            }
            if number.is_empty() && !extension.is_empty() {
                errors.push(format!("{} extension without a number", label));
            }
        }
        Ok(errors)
    }
}

/// A referenced object must exist and have an approved revision.
fn check_reference(
    ctx: &GovernanceContext<'_>,
    role: &str,
    object: ObjectRef,
    errors: &mut Vec<String>,
) -> GovernanceResult<()> {
    match ctx.store.get_object(object)? {
        None => errors.push(format!("{} ({}) does not exist", role, object)),
        Some(found) if found.current_revision.is_none() => {
            errors.push(format!("{} ({}) has no approved revision", role, object))
        }
        Some(_) => {}
    }
    Ok(())
}

// IANA DNSSEC algorithm numbers that may be delegated.
const DNSSEC_ALGORITHMS: [u8; 15] = [1, 2, 3, 5, 6, 7, 8, 10, 12, 13, 14, 15, 16, 253, 254];

fn ds_data_errors(entry: &DsDataEntry) -> Vec<String> {
    let mut errors = Vec::new();
    if entry.key_tag == 0 || entry.key_tag > 65535 {
        errors.push(format!("DS key tag {} is out of range", entry.key_tag));
    }
    if !DNSSEC_ALGORITHMS.contains(&entry.algorithm) {
        errors.push(format!("unknown DNSSEC algorithm {}", entry.algorithm));
    }
    // Hex digest length per digest type.
    let digest_len = match entry.digest_type {
        1 => Some(40),
        2 | 3 => Some(64),
        4 => Some(96),
        other => {
            errors.push(format!("unknown DS digest type {}", other));
            None
        }
    };
    if !entry.digest.chars().all(|c| c.is_ascii_hexdigit()) {
        errors.push(format!("DS digest is not hex: {:?}", entry.digest));
    } else if digest_len.is_some_and(|len| entry.digest.len() != len) {
        errors.push(format!(
            "DS digest for key tag {} has the wrong length",
            entry.key_tag
        ));
    }
    errors
}

fn is_email_address(address: &str) -> bool {
    match address.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    }
}

/// EPP phone number: `+` country code, `.`, subscriber number.
fn is_phone_number(number: &str) -> bool {
    let Some((country, subscriber)) = number
        .strip_prefix('+')
        .and_then(|rest| rest.split_once('.'))
    else {
        return false;
    };
    (1..=3).contains(&country.len())
        && (1..=14).contains(&subscriber.len())
        && country.chars().all(|c| c.is_ascii_digit())
        && subscriber.chars().all(|c| c.is_ascii_digit())
}

fn is_host_name(name: &str) -> bool {
    let name = name.trim_end_matches('.');
    !name.is_empty()
        && name.len() <= 253
        && name.split('.').count() >= 2
        && name.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

fn open_approvals_for_set(
    ctx: &GovernanceContext<'_>,
    set: ObjectId,
) -> GovernanceResult<Vec<WorkItem>> {
    Ok(ctx
        .store
        .list_approvals_for_set(set)?
        .into_iter()
        .filter(|approval| approval.state.is_open())
        .map(|approval| WorkItem::Approval(approval.id))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_covers_every_kind() {
        for kind in ObjectKind::ALL {
            assert_eq!(handler_for(kind).kind(), kind);
        }
    }

    #[test]
    fn dedup_keeps_first_occurrence_order() {
        let sets = dedup(vec![
            ObjectId::new(3),
            ObjectId::new(1),
            ObjectId::new(3),
            ObjectId::new(2),
        ]);
        assert_eq!(sets, vec![ObjectId::new(3), ObjectId::new(1), ObjectId::new(2)]);
    }

    #[test]
    fn host_names() {
        assert!(is_host_name("ns1.example.net"));
        assert!(is_host_name("ns1.example.net."));
        assert!(!is_host_name("localhost"));
        assert!(!is_host_name("-bad.example.net"));
        assert!(!is_host_name("ns_1.example.net"));
    }

    #[test]
    fn phone_numbers_use_epp_format() {
        assert!(is_phone_number("+1.5555550100"));
        assert!(is_phone_number("+353.15550100"));
        assert!(!is_phone_number("5555550100"));
        assert!(!is_phone_number("+1-555-555-0100"));
        assert!(!is_phone_number("+1."));
    }

    #[test]
    fn ds_records_are_checked_against_their_digest_type() {
        let sha256 = DsDataEntry {
            key_tag: 2371,
            algorithm: 13,
            digest_type: 2,
            digest: "A".repeat(64),
        };
        assert!(ds_data_errors(&sha256).is_empty());

        let short = DsDataEntry {
            digest_type: 1,
            ..sha256.clone()
        };
        assert_eq!(ds_data_errors(&short).len(), 1);

        let bad = DsDataEntry {
            key_tag: 0,
            algorithm: 4,
            digest_type: 9,
            digest: "xyz".into(),
        };
        assert_eq!(ds_data_errors(&bad).len(), 4);
    }

    #[test]
    fn email_addresses_need_one_at_sign() {
        assert!(is_email_address("hostmaster@example.net"));
        assert!(!is_email_address("hostmaster"));
        assert!(!is_email_address("a@b@example.net"));
        assert!(!is_email_address("@example.net"));
    }
}
