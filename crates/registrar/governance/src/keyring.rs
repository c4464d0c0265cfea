//! Verification keyring resolution.

use crate::error::GovernanceResult;
use crate::quorum::ApproverSetView;
use registrar_crypto::{parse_public_key, KeyringEntry, VerificationKeyring};
use registrar_storage::RegistryStore;
use registrar_types::{ObjectId, ObjectState};
use tracing::warn;

/// Produces the live verification keys of an approver set.
///
/// Implementations must resolve membership at call time; callers never
/// cache the result across signature attempts.
pub trait KeyringSource: Send + Sync {
    fn keyring_for(
        &self,
        store: &dyn RegistryStore,
        approver_set: ObjectId,
    ) -> GovernanceResult<VerificationKeyring>;
}

/// Resolves keyrings from the approver and approver-set records in the store.
///
/// Members count as signers while active, or while still in their bootstrap
/// states so the root approver can ratify itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct StoreKeyringSource;

impl KeyringSource for StoreKeyringSource {
    fn keyring_for(
        &self,
        store: &dyn RegistryStore,
        approver_set: ObjectId,
    ) -> GovernanceResult<VerificationKeyring> {
        let view = ApproverSetView::load(store, approver_set)?;
        let mut keyring = VerificationKeyring::new();
        for member in view.members {
            if !can_sign(member.approver.state) {
                continue;
            }
            let Some(fields) = member.fields else {
                continue;
            };
            match parse_public_key(&fields.public_key) {
                Ok(key) => keyring.add(KeyringEntry::new(
                    member.approver.object.id,
                    fields.username,
                    key,
                )),
                Err(e) => warn!(
                    approver_set = %approver_set,
                    approver = %member.approver.object.id,
                    error = %e,
                    "skipping approver with unusable public key"
                ),
            }
        }
        Ok(keyring)
    }
}

fn can_sign(state: ObjectState) -> bool {
    state.is_active() || matches!(state, ObjectState::Bootstrap | ObjectState::PendingBootstrap)
}
