//! Quorum across several approver sets.
//!
//! Verifies that:
//! - the capstone approval opens only after every other approval resolved
//! - one decline declines the whole change request
//! - sets with no active members, or that went inactive, are skipped
//! - approver sets must consent to changes of themselves
//! - the live revision, not the proposal, names the sets that must approve

mod common;

use common::{host_fields, Harness, ROOT};
use registrar_crypto::KeyPair;
use registrar_governance::{
    create_object, propose_revision, GovernanceError, NoticeKind, RevisionDraft,
};
use registrar_types::{
    ApprovalState, ApproverSetFields, ChangeRequestState, DesiredState, ObjectId, ObjectKind,
    ObjectRef, ObjectState, RevisionFields, RevisionState,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Team {
    alice: (ObjectId, KeyPair),
    bob: (ObjectId, KeyPair),
    dns: ObjectId,
    security: ObjectId,
}

fn team(h: &Harness) -> Team {
    let alice = h.add_approver("alice");
    let bob = h.add_approver("bob");
    let dns = h.add_approver_set("DNS", &[alice.0]);
    let security = h.add_approver_set("Security", &[bob.0]);
    Team {
        alice,
        bob,
        dns,
        security,
    }
}

/// Propose the same fields again with `desired`, approved by root only.
fn set_approver_state(h: &Harness, approver: ObjectId, desired: DesiredState) {
    let object = h.object(ObjectRef::approver(approver));
    let current = h.revision(object.current_revision.unwrap());
    let revision = propose_revision(
        &h.ctx(),
        object.object,
        RevisionDraft::new(desired, current.fields),
        ROOT,
    )
    .unwrap();
    h.approve_with_root(revision.id);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn capstone_waits_for_every_other_approval() {
    let h = Harness::bootstrapped();
    let t = team(&h);
    let (host, revision) = h.propose_host("ns1.example.net", &[t.dns, t.security]);
    h.ctx().start_approval_process(revision, "carol").unwrap();

    let cr = h.change_request_for(revision).id;
    let dns = h.approval_for(cr, t.dns);
    let security = h.approval_for(cr, t.security);
    assert_eq!(dns.state, ApprovalState::PendingApproval);
    assert_eq!(security.state, ApprovalState::PendingApproval);
    assert_eq!(h.capstone(cr).state, ApprovalState::New);
    assert!(matches!(
        h.ctx().download_attestation(h.capstone(cr).id, ROOT, "approve"),
        Err(GovernanceError::InvalidState { .. })
    ));

    h.decide(dns.id, "alice", &t.alice.1, "approve").unwrap();
    assert_eq!(h.approval_for(cr, t.dns).state, ApprovalState::Approved);
    assert_eq!(h.capstone(cr).state, ApprovalState::New);

    h.decide(security.id, "bob", &t.bob.1, "approve").unwrap();
    assert_eq!(h.capstone(cr).state, ApprovalState::PendingApproval);
    assert_eq!(
        h.ctx().change_request(cr).unwrap().state,
        ChangeRequestState::PendingApproval
    );
    assert_eq!(h.object(host).state, ObjectState::PendingNew);

    h.decide(h.capstone(cr).id, ROOT, &h.root_key, "approve")
        .unwrap();
    assert_eq!(
        h.ctx().change_request(cr).unwrap().state,
        ChangeRequestState::Approved
    );
    assert_eq!(h.object(host).state, ObjectState::Active);
}

#[test]
fn single_decline_declines_the_change_request() {
    let h = Harness::bootstrapped();
    let t = team(&h);
    let (host, revision) = h.propose_host("ns1.example.net", &[t.dns, t.security]);
    h.ctx().start_approval_process(revision, "carol").unwrap();
    let cr = h.change_request_for(revision).id;

    let dns = h.approval_for(cr, t.dns);
    h.decide(dns.id, "alice", &t.alice.1, "decline").unwrap();

    assert_eq!(
        h.ctx().change_request(cr).unwrap().state,
        ChangeRequestState::Declined
    );
    assert_eq!(h.approval_for(cr, t.dns).state, ApprovalState::Declined);
    assert_eq!(
        h.approval_for(cr, t.security).state,
        ApprovalState::Cancelled
    );
    assert_eq!(h.capstone(cr).state, ApprovalState::Cancelled);
    assert_eq!(h.revision(revision).state, RevisionState::ApprovalFailed);
    assert_eq!(h.object(host).state, ObjectState::New);
}

#[test]
fn set_without_active_members_is_skipped() {
    let h = Harness::bootstrapped();
    let t = team(&h);
    set_approver_state(&h, t.alice.0, DesiredState::Inactive);

    let (host, revision) = h.propose_host("ns1.example.net", &[t.dns]);
    h.ctx().start_approval_process(revision, "carol").unwrap();
    let cr = h.change_request_for(revision).id;

    assert_eq!(
        h.approval_for(cr, t.dns).state,
        ApprovalState::NoValidApprovers
    );
    assert_eq!(h.capstone(cr).state, ApprovalState::PendingApproval);

    h.decide(h.capstone(cr).id, ROOT, &h.root_key, "approve")
        .unwrap();
    assert_eq!(h.object(host).state, ObjectState::Active);
    let skipped = h.approval_for(cr, t.dns);
    assert_eq!(skipped.state, ApprovalState::SkippedNoValidApprovers);
    assert!(!skipped.is_signed());
}

#[test]
fn reactivated_member_reopens_the_approval() {
    let h = Harness::bootstrapped();
    let t = team(&h);
    set_approver_state(&h, t.alice.0, DesiredState::Inactive);

    let (_, revision) = h.propose_host("ns1.example.net", &[t.dns, t.security]);
    h.ctx().start_approval_process(revision, "carol").unwrap();
    let cr = h.change_request_for(revision).id;
    assert_eq!(
        h.approval_for(cr, t.dns).state,
        ApprovalState::NoValidApprovers
    );

    set_approver_state(&h, t.alice.0, DesiredState::Active);
    assert_eq!(
        h.approval_for(cr, t.dns).state,
        ApprovalState::PendingApproval
    );
    assert_eq!(h.capstone(cr).state, ApprovalState::New);
}

#[test]
fn set_deactivated_mid_approval_stops_blocking() {
    let h = Harness::bootstrapped();
    let t = team(&h);
    let (host, revision) = h.propose_host("ns1.example.net", &[t.dns]);
    h.ctx().start_approval_process(revision, "carol").unwrap();
    let cr = h.change_request_for(revision).id;
    assert_eq!(
        h.approval_for(cr, t.dns).state,
        ApprovalState::PendingApproval
    );

    // Retire the DNS set; it has to agree to that itself.
    let dns = h.object(ObjectRef::approver_set(t.dns));
    let current = h.revision(dns.current_revision.unwrap());
    let retire = propose_revision(
        &h.ctx(),
        dns.object,
        RevisionDraft::new(DesiredState::Inactive, current.fields),
        ROOT,
    )
    .unwrap();
    h.ctx().start_approval_process(retire.id, ROOT).unwrap();
    let retire_cr = h.change_request_for(retire.id).id;
    h.decide(
        h.approval_for(retire_cr, t.dns).id,
        "alice",
        &t.alice.1,
        "approve",
    )
    .unwrap();
    h.decide(h.capstone(retire_cr).id, ROOT, &h.root_key, "approve")
        .unwrap();
    assert_eq!(h.object(dns.object).state, ObjectState::Inactive);

    let blocked = h.approval_for(cr, t.dns);
    assert_eq!(blocked.state, ApprovalState::InactiveApproverSet);
    assert!(!blocked.is_signed());
    assert_eq!(h.capstone(cr).state, ApprovalState::PendingApproval);

    h.decide(h.capstone(cr).id, ROOT, &h.root_key, "approve")
        .unwrap();
    assert_eq!(h.object(host).state, ObjectState::Active);
    assert_eq!(
        h.approval_for(cr, t.dns).state,
        ApprovalState::SkippedInactiveApproverSet
    );
}

#[test]
fn approver_set_changes_need_the_sets_own_consent() {
    let h = Harness::bootstrapped();
    let t = team(&h);
    let dns = ObjectRef::approver_set(t.dns);

    let revision = propose_revision(
        &h.ctx(),
        dns,
        RevisionDraft::new(
            DesiredState::Active,
            RevisionFields::ApproverSet(ApproverSetFields {
                title: "DNS".into(),
                description: "Zone operators".into(),
                approvers: vec![t.alice.0, t.bob.0],
            }),
        ),
        ROOT,
    )
    .unwrap();
    h.ctx().start_approval_process(revision.id, ROOT).unwrap();
    assert_eq!(h.object(dns).state, ObjectState::ActivePendingApproval);

    let cr = h.change_request_for(revision.id).id;
    let approvals = h.approvals(cr);
    assert_eq!(approvals.len(), 2);
    let own = h.approval_for(cr, t.dns);
    assert_eq!(own.state, ApprovalState::PendingApproval);

    // bob is not a member until the change goes live.
    assert!(matches!(
        h.ctx().download_attestation(own.id, "bob", "approve"),
        Err(GovernanceError::NotAnApprover { .. })
    ));

    h.decide(own.id, "alice", &t.alice.1, "approve").unwrap();
    h.decide(h.capstone(cr).id, ROOT, &h.root_key, "approve")
        .unwrap();

    let live = h.revision(h.object(dns).current_revision.unwrap());
    assert_eq!(
        live.fields.as_approver_set().unwrap().approvers,
        vec![t.alice.0, t.bob.0]
    );
}

#[test]
fn proposal_cannot_drop_the_sets_governing_it() {
    let h = Harness::bootstrapped();
    let t = team(&h);
    let draft = RevisionDraft::new(DesiredState::Active, host_fields("ns1.example.net", &[]))
        .required([t.dns])
        .informed([t.security]);
    let (object, first) = create_object(&h.ctx(), ObjectKind::Host, draft, "carol").unwrap();
    let host = object.object;
    h.ctx().start_approval_process(first.id, "carol").unwrap();
    let cr = h.change_request_for(first.id).id;
    h.decide(h.approval_for(cr, t.dns).id, "alice", &t.alice.1, "approve")
        .unwrap();
    h.decide(h.capstone(cr).id, ROOT, &h.root_key, "approve")
        .unwrap();
    assert_eq!(h.object(host).state, ObjectState::Active);

    // The proposal names no sets at all.
    let second = propose_revision(
        &h.ctx(),
        host,
        RevisionDraft::new(
            DesiredState::Active,
            host_fields("ns1.example.net", &["192.0.2.20"]),
        ),
        "carol",
    )
    .unwrap();
    h.ctx().start_approval_process(second.id, "carol").unwrap();
    let cr = h.change_request_for(second.id).id;

    let sets: Vec<ObjectId> = h
        .approvals(cr)
        .iter()
        .filter(|a| !a.is_final)
        .map(|a| a.approver_set)
        .collect();
    assert_eq!(sets, vec![t.dns]);
    let capstone = h.capstone(cr);
    assert_eq!(capstone.state, ApprovalState::New);
    assert!(matches!(
        h.ctx().download_attestation(capstone.id, ROOT, "approve"),
        Err(GovernanceError::InvalidState { .. })
    ));

    let opened: Vec<_> = h
        .notifier
        .notices()
        .into_iter()
        .filter(|n| n.change_request == cr && n.kind == NoticeKind::ChangeRequestOpened)
        .collect();
    assert_eq!(opened.len(), 1);
    assert_eq!(opened[0].recipients, vec!["bob@example.net".to_string()]);

    h.decide(h.approval_for(cr, t.dns).id, "alice", &t.alice.1, "approve")
        .unwrap();
    assert_eq!(h.revision(second.id).state, RevisionState::PendingApproval);
    h.decide(h.capstone(cr).id, ROOT, &h.root_key, "approve")
        .unwrap();
    assert_eq!(h.revision(second.id).state, RevisionState::Active);
    assert_eq!(h.object(host).current_revision, Some(second.id));
}
