//! Command implementations
//!
//! Each command writes its report to `out` so it can be driven from tests.

use crate::error::{CliError, CliResult};
use registrar_crypto::{fingerprint, parse_public_key, KeyPair, SignedEnvelope};
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, info};

/// Generate a key pair and store its secret at `path`.
pub fn keygen(path: &Path, force: bool, out: &mut dyn Write) -> CliResult<KeyPair> {
    if path.exists() && !force {
        return Err(CliError::InvalidInput(format!(
            "{} already exists (use --force to replace it)",
            path.display()
        )));
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let key = KeyPair::generate();
    let mut file = fs::File::create(path)?;
    restrict_permissions(&file)?;
    writeln!(file, "{}", key.secret_hex().as_str())?;

    info!(path = %path.display(), fingerprint = %key.fingerprint(), "key generated");
    writeln!(out, "Secret key:  {}", path.display())?;
    writeln!(out, "Public key:  {}", key.public_key_hex())?;
    writeln!(out, "Fingerprint: {}", key.fingerprint())?;
    Ok(key)
}

#[cfg(unix)]
fn restrict_permissions(file: &fs::File) -> CliResult<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_file: &fs::File) -> CliResult<()> {
    Ok(())
}

/// Read a secret key written by [`keygen`].
pub fn load_key(path: &Path) -> CliResult<KeyPair> {
    let encoded = fs::read_to_string(path).map_err(|e| {
        CliError::Config(format!("cannot read key file {}: {}", path.display(), e))
    })?;
    Ok(KeyPair::from_secret_hex(&encoded)?)
}

/// Clear-sign a downloaded attestation.
///
/// When `username` is given the attestation must name that user; the
/// registrar rejects signatures whose attestation names someone else.
pub fn sign(key: &KeyPair, username: Option<&str>, attestation: &str) -> CliResult<String> {
    let payload: serde_json::Value = serde_json::from_str(attestation)
        .map_err(|e| CliError::InvalidInput(format!("attestation is not JSON: {}", e)))?;

    if let Some(expected) = username {
        match payload.get("username").and_then(|v| v.as_str()) {
            Some(named) if named == expected => {}
            Some(named) => {
                return Err(CliError::InvalidInput(format!(
                    "attestation was issued to {}, not {}",
                    named, expected
                )))
            }
            None => {
                return Err(CliError::InvalidInput(
                    "attestation does not name a user".into(),
                ))
            }
        }
    }
    if let Some(action) = payload.get("action").and_then(|v| v.as_str()) {
        debug!(action, fingerprint = %key.fingerprint(), "signing attestation");
    }

    Ok(key.clear_sign(attestation)?)
}

/// Check a clear-signed upload before sending it.
///
/// With no `trusted` keys only the envelope's own key is checked.
/// Returns the signer's fingerprint.
pub fn verify(signed: &str, trusted: &[String], out: &mut dyn Write) -> CliResult<String> {
    let envelope = SignedEnvelope::parse(signed)?;

    if trusted.is_empty() {
        envelope.verify_with(envelope.signer())?;
    } else {
        let keys = trusted
            .iter()
            .map(|k| parse_public_key(k))
            .collect::<Result<Vec<_>, _>>()?;
        let key = keys
            .iter()
            .find(|k| *k == envelope.signer())
            .ok_or_else(|| {
                CliError::InvalidInput(format!(
                    "signer {} is not among the trusted keys",
                    envelope.signer_fingerprint()
                ))
            })?;
        envelope.verify_with(key)?;
    }

    let signer = envelope.signer_fingerprint();
    writeln!(out, "Good signature from {}", signer)?;
    writeln!(out, "{}", envelope.payload())?;
    Ok(signer)
}

/// Fingerprint of a hex-encoded public key.
pub fn fingerprint_of(public_key: &str) -> CliResult<String> {
    Ok(fingerprint(&parse_public_key(public_key)?))
}

/// Read `path`, or stdin for `None` and `-`.
pub fn read_input(path: Option<&Path>) -> CliResult<String> {
    match path {
        Some(p) if p != Path::new("-") => Ok(fs::read_to_string(p)?),
        _ => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

/// Write to `path`, or stdout for `None` and `-`.
pub fn write_output(path: Option<&Path>, contents: &str) -> CliResult<()> {
    match path {
        Some(p) if p != Path::new("-") => Ok(fs::write(p, contents)?),
        _ => {
            std::io::stdout().write_all(contents.as_bytes())?;
            Ok(())
        }
    }
}
