//! First start of an empty registry.
//!
//! Creates the root approver and the root approver set, each with a live
//! `bootstrap` revision and a `new` revision that ratifies it. The
//! ratifying change requests are eligible immediately; see
//! [`crate::quorum::is_bootstrap_exception`].

use crate::context::GovernanceContext;
use crate::error::{GovernanceError, GovernanceResult};
use crate::kinds::handler_for;
use chrono::Utc;
use registrar_crypto::{fingerprint, parse_public_key};
use registrar_types::{
    ApproverFields, ApproverSetFields, DesiredState, GovernedObject, ObjectRef, ObjectState,
    Revision, RevisionFields, RevisionId, RevisionState,
};
use tracing::info;

/// Ids created by [`bootstrap_registry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapReport {
    pub root_approver: ObjectRef,
    pub root_approver_set: ObjectRef,
    /// `new` revision that ratifies the root approver.
    pub approver_ratification: RevisionId,
    /// `new` revision that ratifies the root approver set.
    pub approver_set_ratification: RevisionId,
}

pub fn bootstrap_registry(
    ctx: &GovernanceContext<'_>,
    acting_user: &str,
) -> GovernanceResult<BootstrapReport> {
    let root_approver = ObjectRef::approver(ctx.config.root_approver);
    let root_set = ObjectRef::approver_set(ctx.config.root_approver_set);
    if ctx.store.get_object(root_approver)?.is_some() || ctx.store.get_object(root_set)?.is_some() {
        return Err(GovernanceError::AlreadyBootstrapped);
    }

    let settings = &ctx.config.bootstrap;
    let public_key = settings.resolve_public_key()?;
    let key = parse_public_key(&public_key)
        .map_err(|e| GovernanceError::InvalidConfig(format!("bootstrap public key: {}", e)))?;

    let approver_fields = RevisionFields::Approver(ApproverFields {
        name: settings.name.clone(),
        email_address: settings.email_address.clone(),
        role: settings.role.clone(),
        username: settings.username.clone(),
        employee_id: settings.employee_id,
        department: settings.department.clone(),
        is_admin: true,
        fingerprint: fingerprint(&key),
        public_key,
    });
    let errors = handler_for(root_approver.kind).validate(ctx, root_approver, &approver_fields)?;
    if !errors.is_empty() {
        return Err(GovernanceError::InvalidConfig(format!(
            "bootstrap approver: {}",
            errors.join("; ")
        )));
    }

    let set_fields = RevisionFields::ApproverSet(ApproverSetFields {
        title: settings.default_set_title.clone(),
        description: settings.default_set_description.clone(),
        approvers: vec![root_approver.id],
    });

    let approver_ratification = seed(ctx, root_approver, approver_fields, acting_user)?;
    let approver_set_ratification = seed(ctx, root_set, set_fields, acting_user)?;

    info!(
        root_approver = %root_approver,
        root_approver_set = %root_set,
        username = %settings.username,
        "registry bootstrapped"
    );
    Ok(BootstrapReport {
        root_approver,
        root_approver_set: root_set,
        approver_ratification,
        approver_set_ratification,
    })
}

/// Insert one root object with its bootstrap and ratifying revisions.
fn seed(
    ctx: &GovernanceContext<'_>,
    object_ref: ObjectRef,
    fields: RevisionFields,
    acting_user: &str,
) -> GovernanceResult<RevisionId> {
    let mut object = GovernedObject::new(object_ref, acting_user);
    object.state = ObjectState::Bootstrap;
    ctx.store.insert_object(&object)?;

    let mut live = Revision::new(
        ctx.store.allocate_revision_id()?,
        object_ref,
        DesiredState::Bootstrap,
        fields.clone(),
        acting_user,
    );
    live.state = RevisionState::Bootstrap;
    live.promoted_at = Some(Utc::now());
    live.required_approver_sets = vec![ctx.root_approver_set()];
    live.notes = "bootstrap".to_string();
    ctx.store.save_revision(&live)?;

    let mut ratify = Revision::new(
        ctx.store.allocate_revision_id()?,
        object_ref,
        DesiredState::Active,
        fields,
        acting_user,
    );
    ratify.required_approver_sets = vec![ctx.root_approver_set()];
    ratify.notes = "ratify bootstrap".to_string();
    ctx.store.save_revision(&ratify)?;

    object.current_revision = Some(live.id);
    object.pending_revision = Some(ratify.id);
    ctx.store.save_object(&object)?;
    Ok(ratify.id)
}
