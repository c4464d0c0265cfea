//! Clear-signed envelope codec.
//!
//! ```text
//! -----BEGIN REGISTRAR SIGNED MESSAGE-----
//! <payload, lines starting with '-' escaped as "- -">
//! -----BEGIN REGISTRAR SIGNATURE-----
//! Key: <hex verifying key>
//! Signature: <hex signature>
//! -----END REGISTRAR SIGNATURE-----
//! ```
//!
//! The signature covers the payload with `\n` line endings and no trailing
//! newline, which is exactly what [`SignedEnvelope::parse`] reconstructs.

use crate::error::{CryptoError, CryptoResult};
use crate::keys::{fingerprint, parse_public_key, KeyPair};
use ed25519_dalek::{Signature, VerifyingKey};

const MESSAGE_HEADER: &str = "-----BEGIN REGISTRAR SIGNED MESSAGE-----";
const SIGNATURE_HEADER: &str = "-----BEGIN REGISTRAR SIGNATURE-----";
const SIGNATURE_FOOTER: &str = "-----END REGISTRAR SIGNATURE-----";
const KEY_LABEL: &str = "Key:";
const SIGNATURE_LABEL: &str = "Signature:";

/// A payload together with a detached Ed25519 signature over it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedEnvelope {
    payload: String,
    signer: VerifyingKey,
    signature: Signature,
}

impl SignedEnvelope {
    pub fn sign(key: &KeyPair, payload: &str) -> CryptoResult<Self> {
        let payload = canonical_payload(payload);
        if payload.is_empty() {
            return Err(CryptoError::MalformedEnvelope("empty payload".into()));
        }
        let signature = Signature::from_bytes(&key.sign(payload.as_bytes()));
        Ok(Self {
            payload,
            signer: key.verifying_key(),
            signature,
        })
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn signer(&self) -> &VerifyingKey {
        &self.signer
    }

    pub fn signer_fingerprint(&self) -> String {
        fingerprint(&self.signer)
    }

    /// Check the signature against `key`, which need not be the embedded one.
    pub fn verify_with(&self, key: &VerifyingKey) -> CryptoResult<()> {
        key.verify_strict(self.payload.as_bytes(), &self.signature)
            .map_err(|_| CryptoError::BadSignature)
    }

    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(self.payload.len() + 320);
        out.push_str(MESSAGE_HEADER);
        out.push('\n');
        for line in self.payload.split('\n') {
            if line.starts_with('-') {
                out.push_str("- ");
            }
            out.push_str(line);
            out.push('\n');
        }
        out.push_str(SIGNATURE_HEADER);
        out.push('\n');
        out.push_str(&format!("{} {}\n", KEY_LABEL, hex::encode(self.signer.as_bytes())));
        out.push_str(&format!(
            "{} {}\n",
            SIGNATURE_LABEL,
            hex::encode(self.signature.to_bytes())
        ));
        out.push_str(SIGNATURE_FOOTER);
        out.push('\n');
        out
    }

    /// Parse an envelope. Text before the message header is ignored.
    pub fn parse(text: &str) -> CryptoResult<Self> {
        let mut lines = text.lines();

        if !lines.by_ref().any(|line| line.trim_end() == MESSAGE_HEADER) {
            return Err(malformed("missing message header"));
        }

        let mut payload_lines = Vec::new();
        let mut saw_signature_header = false;
        for line in lines.by_ref() {
            if line.trim_end() == SIGNATURE_HEADER {
                saw_signature_header = true;
                break;
            }
            payload_lines.push(line.strip_prefix("- ").unwrap_or(line));
        }
        if !saw_signature_header {
            return Err(malformed("missing signature block"));
        }

        let mut signer = None;
        let mut signature = None;
        let mut saw_footer = false;
        for line in lines {
            let line = line.trim();
            if line == SIGNATURE_FOOTER {
                saw_footer = true;
                break;
            }
            if let Some(value) = line.strip_prefix(KEY_LABEL) {
                signer = Some(parse_public_key(value)?);
            } else if let Some(value) = line.strip_prefix(SIGNATURE_LABEL) {
                signature = Some(parse_signature(value)?);
            } else if !line.is_empty() {
                return Err(malformed("unexpected line in signature block"));
            }
        }
        if !saw_footer {
            return Err(malformed("missing signature footer"));
        }

        let payload = payload_lines.join("\n");
        if payload.is_empty() {
            return Err(malformed("empty payload"));
        }

        Ok(Self {
            payload,
            signer: signer.ok_or_else(|| malformed("missing signer key"))?,
            signature: signature.ok_or_else(|| malformed("missing signature"))?,
        })
    }
}

fn canonical_payload(payload: &str) -> String {
    payload.replace("\r\n", "\n").trim_end_matches('\n').to_string()
}

fn parse_signature(encoded: &str) -> CryptoResult<Signature> {
    let bytes = hex::decode(encoded.trim())
        .map_err(|e| malformed(&format!("signature is not hex: {}", e)))?;
    let bytes: [u8; 64] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| malformed("signature must be 64 bytes"))?;
    Ok(Signature::from_bytes(&bytes))
}

fn malformed(reason: &str) -> CryptoError {
    CryptoError::MalformedEnvelope(reason.to_string())
}
