//! Signature intake and verification.
//!
//! Verifies that:
//! - uploads that fail cryptographic checks never change stored state
//! - a valid signature over a different proposal is rejected and cleared
//! - identical resubmissions only refresh the signing time
//! - keyrings reflect approver set membership at submission time

mod common;

use common::{host_fields, Harness, ROOT};
use registrar_crypto::KeyPair;
use registrar_governance::{signers, ErrorKind, GovernanceError};
use registrar_types::{ApprovalId, ApprovalState, ChangeRequestId, DesiredState, ObjectId, ObjectRef};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Fixture {
    h: Harness,
    alice: KeyPair,
    dns: ObjectId,
    cr: ChangeRequestId,
    approval: ApprovalId,
}

/// A pending host change that needs the DNS set (alice) and root.
fn fixture() -> Fixture {
    let h = Harness::bootstrapped();
    let (alice_id, alice) = h.add_approver("alice");
    let dns = h.add_approver_set("DNS", &[alice_id]);
    let (_, revision) = h.propose_host("ns1.example.net", &[dns]);
    h.ctx().start_approval_process(revision, "carol").unwrap();
    let cr = h.change_request_for(revision).id;
    let approval = h.approval_for(cr, dns).id;
    Fixture {
        h,
        alice,
        dns,
        cr,
        approval,
    }
}

fn assert_untouched(h: &Harness, approval: ApprovalId) {
    let approval = h.ctx().approval(approval).unwrap();
    assert_eq!(approval.state, ApprovalState::PendingApproval);
    assert!(approval.signature.is_none());
    assert!(approval.signed_at.is_none());
}

// ---------------------------------------------------------------------------
// Rejections
// ---------------------------------------------------------------------------

#[test]
fn upload_without_signature_block_is_refused() {
    let f = fixture();
    let err = f
        .h
        .ctx()
        .submit_signature(f.approval, b"I approve", "alice")
        .unwrap_err();
    assert!(matches!(err, GovernanceError::NoSignatureFound { .. }));
    assert_eq!(err.kind(), ErrorKind::Verification);
    assert_untouched(&f.h, f.approval);
}

#[test]
fn signature_from_outside_the_set_is_refused() {
    let f = fixture();
    let mallory = KeyPair::generate();
    let signed = f.h.sign(f.approval, "alice", &mallory, "approve");

    let err = f
        .h
        .ctx()
        .submit_signature(f.approval, signed.as_bytes(), "mallory")
        .unwrap_err();
    assert!(matches!(err, GovernanceError::SignatureInvalid { .. }));
    assert_untouched(&f.h, f.approval);
}

#[test]
fn unknown_action_is_refused() {
    let f = fixture();
    let attestation = f
        .h
        .ctx()
        .download_attestation(f.approval, "alice", "approve")
        .unwrap();
    let mut payload = serde_json::to_value(&attestation).unwrap();
    payload["action"] = serde_json::Value::from("abstain");
    let signed = f
        .alice
        .clear_sign(&serde_json::to_string_pretty(&payload).unwrap())
        .unwrap();

    let err = f
        .h
        .ctx()
        .submit_signature(f.approval, signed.as_bytes(), "alice")
        .unwrap_err();
    assert!(matches!(
        err,
        GovernanceError::UnknownAction { ref action, .. } if action == "abstain"
    ));
    assert_untouched(&f.h, f.approval);

    assert!(matches!(
        f.h.ctx().download_attestation(f.approval, "alice", "approved"),
        Err(GovernanceError::UnknownAction { .. })
    ));
}

#[test]
fn signature_over_a_different_proposal_is_cleared() {
    let f = fixture();
    let mut attestation = f
        .h
        .ctx()
        .download_attestation(f.approval, "alice", "approve")
        .unwrap();
    if let Some(pending) = attestation.export.pending_revision.as_mut() {
        pending.fields = host_fields("ns1.example.net", &["198.51.100.66"]);
    }
    let forged = f
        .alice
        .clear_sign(&attestation.to_payload().unwrap())
        .unwrap();

    let err = f
        .h
        .ctx()
        .submit_signature(f.approval, forged.as_bytes(), "alice")
        .unwrap_err();
    match err.root_cause() {
        GovernanceError::AttestationMismatch {
            approval, errors, ..
        } => {
            assert_eq!(*approval, f.approval);
            assert!(errors
                .iter()
                .any(|e| e.contains("differs from the pending revision")));
        }
        other => panic!("unexpected error: {other}"),
    }
    let cleared = f.h.ctx().approval(f.approval).unwrap();
    assert_eq!(cleared.state, ApprovalState::PendingApproval);
    assert!(!cleared.is_signed());

    // A corrected signature is accepted afterwards.
    assert!(f.h.decide(f.approval, "alice", &f.alice, "approve").unwrap());
    assert_eq!(
        f.h.ctx().approval(f.approval).unwrap().state,
        ApprovalState::Approved
    );
}

#[test]
fn signature_for_another_approval_is_cleared() {
    let f = fixture();
    let (_, other_revision) = f.h.propose_host("ns2.example.net", &[f.dns]);
    f.h.ctx()
        .start_approval_process(other_revision, "carol")
        .unwrap();
    let other_cr = f.h.change_request_for(other_revision).id;
    let other = f.h.approval_for(other_cr, f.dns).id;

    let signed = f.h.sign(other, "alice", &f.alice, "approve");
    let err = f
        .h
        .ctx()
        .submit_signature(f.approval, signed.as_bytes(), "alice")
        .unwrap_err();
    assert!(matches!(
        err.root_cause(),
        GovernanceError::AttestationMismatch { .. }
    ));
    assert!(!f.h.ctx().approval(f.approval).unwrap().is_signed());
    assert!(!f.h.ctx().approval(other).unwrap().is_signed());
}

#[test]
fn keyring_is_resolved_at_submission_time() {
    let h = Harness::bootstrapped();
    let (alice_id, _alice) = h.add_approver("alice");
    let (bob_id, bob) = h.add_approver("bob");
    let dns = h.add_approver_set("DNS", &[alice_id, bob_id]);
    let (_, revision) = h.propose_host("ns1.example.net", &[dns]);
    h.ctx().start_approval_process(revision, "carol").unwrap();
    let approval = h.approval_for(h.change_request_for(revision).id, dns).id;

    let signed = h.sign(approval, "bob", &bob, "approve");

    // bob leaves before uploading.
    let object = h.object(ObjectRef::approver(bob_id));
    let current = h.revision(object.current_revision.unwrap());
    let retire = registrar_governance::propose_revision(
        &h.ctx(),
        object.object,
        registrar_governance::RevisionDraft::new(DesiredState::Inactive, current.fields),
        ROOT,
    )
    .unwrap();
    h.approve_with_root(retire.id);

    let err = h
        .ctx()
        .submit_signature(approval, signed.as_bytes(), "bob")
        .unwrap_err();
    assert!(matches!(err, GovernanceError::SignatureInvalid { .. }));
    assert_untouched(&h, approval);
}

// ---------------------------------------------------------------------------
// Acceptance
// ---------------------------------------------------------------------------

#[test]
fn identical_resubmission_only_refreshes_the_timestamp() {
    let f = fixture();
    let signed = f.h.sign(f.approval, "alice", &f.alice, "approve");
    assert!(f
        .h
        .ctx()
        .submit_signature(f.approval, signed.as_bytes(), "alice")
        .unwrap());
    let first = f.h.ctx().approval(f.approval).unwrap();
    assert_eq!(first.state, ApprovalState::Approved);

    assert!(!f
        .h
        .ctx()
        .submit_signature(f.approval, signed.as_bytes(), "alice")
        .unwrap());
    let second = f.h.ctx().approval(f.approval).unwrap();
    assert_eq!(second.state, ApprovalState::Approved);
    assert_eq!(second.signature, first.signature);
    assert!(second.signed_at >= first.signed_at);
}

#[test]
fn capstone_attests_to_the_other_signatures() {
    let f = fixture();
    assert!(f.h.decide(f.approval, "alice", &f.alice, "approve").unwrap());
    let stored = f.h.ctx().approval(f.approval).unwrap().signature.unwrap();

    let signed_by = signers(&f.h.ctx(), f.approval).unwrap();
    assert_eq!(signed_by.len(), 1);
    assert_eq!(signed_by[0].username, "alice");

    let capstone = f.h.capstone(f.cr);
    let attestation = f
        .h
        .ctx()
        .download_attestation(capstone.id, ROOT, "approve")
        .unwrap();
    assert_eq!(attestation.signatures.len(), 1);
    assert_eq!(attestation.signatures[0].approval_id, f.approval);
    assert_eq!(attestation.signatures[0].signature, stored);

    // Dropping the counter-signatures breaks the binding.
    let mut stripped = attestation.clone();
    stripped.signatures.clear();
    let signed = f
        .h
        .root_key
        .clear_sign(&stripped.to_payload().unwrap())
        .unwrap();
    let err = f
        .h
        .ctx()
        .submit_signature(capstone.id, signed.as_bytes(), ROOT)
        .unwrap_err();
    assert!(matches!(
        err.root_cause(),
        GovernanceError::AttestationMismatch { .. }
    ));

    let signed = f
        .h
        .root_key
        .clear_sign(&attestation.to_payload().unwrap())
        .unwrap();
    assert!(f
        .h
        .ctx()
        .submit_signature(capstone.id, signed.as_bytes(), ROOT)
        .unwrap());
    assert_eq!(
        f.h.ctx().approval(capstone.id).unwrap().state,
        ApprovalState::Approved
    );
}
