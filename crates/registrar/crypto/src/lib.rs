//! Registrar signing identities.
//!
//! Approvers sign attestations offline and upload the result as a
//! clear-signed envelope: the attested text followed by the signer's
//! Ed25519 verifying key and signature. This crate provides
//! - key pair generation and hex import/export ([`KeyPair`])
//! - BLAKE3 key fingerprints ([`fingerprint`])
//! - the envelope codec ([`SignedEnvelope`])
//! - verification against the keys of an approver set ([`VerificationKeyring`])

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod envelope;
mod error;
mod keyring;
mod keys;

pub use envelope::SignedEnvelope;
pub use error::{CryptoError, CryptoResult};
pub use keyring::{KeyringEntry, VerificationKeyring, VerifiedMessage};
pub use keys::{fingerprint, parse_public_key, KeyPair};
