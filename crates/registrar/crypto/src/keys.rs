use crate::envelope::SignedEnvelope;
use crate::error::{CryptoError, CryptoResult};
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use std::fmt;
use zeroize::Zeroizing;

/// Length of a key fingerprint in hex characters.
pub const FINGERPRINT_LEN: usize = 40;

/// An approver's Ed25519 signing key.
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    pub fn from_bytes(secret: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(secret),
        }
    }

    /// Import a hex-encoded 32-byte secret.
    pub fn from_secret_hex(encoded: &str) -> CryptoResult<Self> {
        let bytes = Zeroizing::new(
            hex::decode(encoded.trim())
                .map_err(|e| CryptoError::InvalidKey(format!("secret key is not hex: {}", e)))?,
        );
        let secret: Zeroizing<[u8; 32]> = Zeroizing::new(
            bytes
                .as_slice()
                .try_into()
                .map_err(|_| CryptoError::InvalidKey("secret key must be 32 bytes".into()))?,
        );
        Ok(Self::from_bytes(&secret))
    }

    pub fn secret_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.signing_key.to_bytes()))
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.verifying_key().as_bytes())
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(&self.verifying_key())
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }

    /// Sign `payload` and render it as a clear-signed envelope.
    pub fn clear_sign(&self, payload: &str) -> CryptoResult<String> {
        Ok(SignedEnvelope::sign(self, payload)?.encode())
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("fingerprint", &self.fingerprint())
            .finish_non_exhaustive()
    }
}

/// BLAKE3 fingerprint of a verifying key, truncated to 40 hex characters.
pub fn fingerprint(key: &VerifyingKey) -> String {
    let digest = blake3::hash(key.as_bytes());
    digest.to_hex().as_str()[..FINGERPRINT_LEN].to_string()
}

/// Parse a hex-encoded Ed25519 verifying key.
pub fn parse_public_key(encoded: &str) -> CryptoResult<VerifyingKey> {
    let bytes = hex::decode(encoded.trim())
        .map_err(|e| CryptoError::InvalidKey(format!("public key is not hex: {}", e)))?;
    let bytes: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::InvalidKey("public key must be 32 bytes".into()))?;
    VerifyingKey::from_bytes(&bytes)
        .map_err(|e| CryptoError::InvalidKey(format!("not an Ed25519 point: {}", e)))
}
