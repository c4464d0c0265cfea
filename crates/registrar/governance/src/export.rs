//! Canonical exports of governed objects and field-level diffs.
//!
//! The export is what a signer attests to, so it only carries values that
//! do not move while a change request is open: no states, no timestamps.

use crate::context::GovernanceContext;
use crate::error::GovernanceResult;
use registrar_types::{
    DesiredState, FieldChange, GovernedObject, ObjectId, ObjectKind, Revision, RevisionFields,
    RevisionId,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionExport {
    pub id: RevisionId,
    pub desired_state: DesiredState,
    pub fields: RevisionFields,
    pub required_approver_sets: Vec<ObjectId>,
    pub informed_approver_sets: Vec<ObjectId>,
    pub issue_cr: String,
    pub notes: String,
}

impl From<&Revision> for RevisionExport {
    fn from(revision: &Revision) -> Self {
        Self {
            id: revision.id,
            desired_state: revision.desired_state,
            fields: revision.fields.clone(),
            required_approver_sets: revision.required_approver_sets.clone(),
            informed_approver_sets: revision.informed_approver_sets.clone(),
            issue_cr: revision.issue_cr.clone(),
            notes: revision.notes.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectExport {
    pub object_type: ObjectKind,
    pub object_id: ObjectId,
    pub current_revision: Option<RevisionExport>,
    pub pending_revision: Option<RevisionExport>,
}

pub fn export_object(
    ctx: &GovernanceContext<'_>,
    object: &GovernedObject,
) -> GovernanceResult<ObjectExport> {
    let current = ctx.current_revision(object)?;
    let pending = object
        .pending_revision
        .map(|id| ctx.revision(id))
        .transpose()?;
    Ok(ObjectExport {
        object_type: object.object.kind,
        object_id: object.object.id,
        current_revision: current.as_ref().map(RevisionExport::from),
        pending_revision: pending.as_ref().map(RevisionExport::from),
    })
}

/// Leaves that differ between `current` and `proposed`, ignoring revision ids.
pub fn diff_revisions(
    current: Option<&RevisionExport>,
    proposed: &RevisionExport,
) -> GovernanceResult<Vec<FieldChange>> {
    let before = match current {
        Some(current) => without_id(serde_json::to_value(current)?),
        None => Value::Null,
    };
    let after = without_id(serde_json::to_value(proposed)?);
    let mut changes = Vec::new();
    walk(String::new(), Some(&before), Some(&after), &mut changes);
    Ok(changes)
}

fn without_id(mut value: Value) -> Value {
    if let Value::Object(map) = &mut value {
        map.remove("id");
    }
    value
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

fn walk(path: String, before: Option<&Value>, after: Option<&Value>, out: &mut Vec<FieldChange>) {
    let before = before.filter(|v| !v.is_null());
    let after = after.filter(|v| !v.is_null());
    match (before, after) {
        (Some(Value::Object(b)), Some(Value::Object(a))) => {
            let mut keys: Vec<&String> = b.keys().chain(a.keys()).collect();
            keys.sort();
            keys.dedup();
            for key in keys {
                walk(join(&path, key), b.get(key), a.get(key), out);
            }
        }
        (Some(Value::Array(b)), Some(Value::Array(a))) => {
            for index in 0..b.len().max(a.len()) {
                walk(join(&path, &index.to_string()), b.get(index), a.get(index), out);
            }
        }
        (None, Some(Value::Object(a))) => {
            for (key, value) in a {
                walk(join(&path, key), None, Some(value), out);
            }
        }
        (Some(Value::Object(b)), None) => {
            for (key, value) in b {
                walk(join(&path, key), Some(value), None, out);
            }
        }
        (None, Some(Value::Array(a))) => {
            for (index, value) in a.iter().enumerate() {
                walk(join(&path, &index.to_string()), None, Some(value), out);
            }
        }
        (Some(Value::Array(b)), None) => {
            for (index, value) in b.iter().enumerate() {
                walk(join(&path, &index.to_string()), Some(value), None, out);
            }
        }
        (b, a) if b != a => out.push(FieldChange {
            path,
            before: b.cloned(),
            after: a.cloned(),
        }),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use registrar_types::{ApproverSetFields, HostFields};

    fn host_export(id: i64, addresses: &[&str]) -> RevisionExport {
        RevisionExport {
            id: RevisionId::new(id),
            desired_state: DesiredState::Active,
            fields: RevisionFields::Host(HostFields {
                host_name: "ns1.example.net".into(),
                host_addresses: addresses.iter().map(|a| a.to_string()).collect(),
                ..HostFields::default()
            }),
            required_approver_sets: vec![ObjectId::new(1)],
            informed_approver_sets: vec![],
            issue_cr: String::new(),
            notes: String::new(),
        }
    }

    #[test]
    fn identical_revisions_have_no_diff() {
        let diff = diff_revisions(Some(&host_export(1, &["192.0.2.1"])), &host_export(2, &["192.0.2.1"]))
            .unwrap();
        assert!(diff.is_empty());
    }

    #[test]
    fn changed_and_added_list_entries_are_reported() {
        let diff = diff_revisions(
            Some(&host_export(1, &["192.0.2.1"])),
            &host_export(2, &["192.0.2.9", "2001:db8::1"]),
        )
        .unwrap();
        let paths: Vec<&str> = diff.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["fields.host_addresses.0", "fields.host_addresses.1"]
        );
        assert_eq!(diff[1].before, None);
        assert_eq!(diff[1].after, Some(Value::from("2001:db8::1")));
    }

    #[test]
    fn first_revision_diffs_against_nothing() {
        let proposed = RevisionExport {
            id: RevisionId::new(1),
            desired_state: DesiredState::Active,
            fields: RevisionFields::ApproverSet(ApproverSetFields {
                title: "Ops".into(),
                description: String::new(),
                approvers: vec![ObjectId::new(2)],
            }),
            required_approver_sets: vec![],
            informed_approver_sets: vec![],
            issue_cr: String::new(),
            notes: String::new(),
        };
        let diff = diff_revisions(None, &proposed).unwrap();
        assert!(diff.iter().all(|c| c.before.is_none()));
        assert!(diff.iter().any(|c| c.path == "fields.title"));
        assert!(diff.iter().any(|c| c.path == "fields.approvers.0"));
        assert!(!diff.iter().any(|c| c.path == "id"));
    }
}
