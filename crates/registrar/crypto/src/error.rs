use thiserror::Error;

/// Result type for signing and verification.
pub type CryptoResult<T> = Result<T, CryptoError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("signature does not verify")]
    BadSignature,

    #[error("signer {0} is not in the keyring")]
    UnknownSigner(String),

    #[error("keyring is empty")]
    EmptyKeyring,
}
