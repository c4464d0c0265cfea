use crate::envelope::SignedEnvelope;
use crate::error::{CryptoError, CryptoResult};
use crate::keys::fingerprint;
use ed25519_dalek::VerifyingKey;
use registrar_types::ObjectId;

/// One approver's verification key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyringEntry {
    pub approver: ObjectId,
    pub username: String,
    pub fingerprint: String,
    pub verifying_key: VerifyingKey,
}

impl KeyringEntry {
    pub fn new(approver: ObjectId, username: impl Into<String>, verifying_key: VerifyingKey) -> Self {
        Self {
            approver,
            username: username.into(),
            fingerprint: fingerprint(&verifying_key),
            verifying_key,
        }
    }
}

/// Keys of the members allowed to sign for one approver set.
#[derive(Clone, Debug, Default)]
pub struct VerificationKeyring {
    entries: Vec<KeyringEntry>,
}

/// A payload whose signature verified against a keyring member.
#[derive(Clone, Debug)]
pub struct VerifiedMessage {
    pub payload: String,
    pub signer: KeyringEntry,
}

impl VerificationKeyring {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, entry: KeyringEntry) {
        if self.find_by_key(&entry.verifying_key).is_none() {
            self.entries.push(entry);
        }
    }

    pub fn entries(&self) -> &[KeyringEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn find_by_key(&self, key: &VerifyingKey) -> Option<&KeyringEntry> {
        self.entries.iter().find(|entry| &entry.verifying_key == key)
    }

    pub fn find_by_username(&self, username: &str) -> Option<&KeyringEntry> {
        self.entries.iter().find(|entry| entry.username == username)
    }

    /// Verify `envelope` and return the member who signed it.
    pub fn verify(&self, envelope: &SignedEnvelope) -> CryptoResult<&KeyringEntry> {
        if self.entries.is_empty() {
            return Err(CryptoError::EmptyKeyring);
        }
        let entry = self
            .find_by_key(envelope.signer())
            .ok_or_else(|| CryptoError::UnknownSigner(envelope.signer_fingerprint()))?;
        envelope.verify_with(&entry.verifying_key)?;
        Ok(entry)
    }

    /// Parse and verify a clear-signed upload in one step.
    pub fn open(&self, text: &str) -> CryptoResult<VerifiedMessage> {
        let envelope = SignedEnvelope::parse(text)?;
        let signer = self.verify(&envelope)?.clone();
        Ok(VerifiedMessage {
            payload: envelope.payload().to_string(),
            signer,
        })
    }
}

impl FromIterator<KeyringEntry> for VerificationKeyring {
    fn from_iter<I: IntoIterator<Item = KeyringEntry>>(iter: I) -> Self {
        let mut keyring = VerificationKeyring::new();
        for entry in iter {
            keyring.add(entry);
        }
        keyring
    }
}
