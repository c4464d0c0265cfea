//! Signer configuration

use crate::error::{CliError, CliResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Contents of `regsign.toml`
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct RegsignConfig {
    /// Username the registrar knows this signer by
    pub username: Option<String>,

    /// File holding the hex-encoded secret key
    pub key_file: Option<PathBuf>,
}

impl RegsignConfig {
    /// Load configuration from `path`, or from the default location.
    ///
    /// A missing file yields the default configuration.
    pub fn load(path: Option<&Path>) -> CliResult<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_config_path()?,
        };

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            toml::from_str(&contents).map_err(|e| {
                CliError::Config(format!("{}: {}", config_path.display(), e))
            })
        } else {
            Ok(RegsignConfig::default())
        }
    }

    fn default_config_path() -> CliResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| CliError::Config("Cannot find config directory".into()))?;
        Ok(config_dir.join("registrar").join("regsign.toml"))
    }

    /// Default key location when neither the command line nor the config names one.
    pub fn default_key_file() -> CliResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| CliError::Config("Cannot find config directory".into()))?;
        Ok(config_dir.join("registrar").join("signing.key"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let config = RegsignConfig::load(Some(Path::new("/nonexistent/regsign.toml"))).unwrap();
        assert_eq!(config, RegsignConfig::default());
    }

    #[test]
    fn reads_username_and_key_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("regsign.toml");
        std::fs::write(&path, "username = \"alice\"\nkey_file = \"/keys/alice.key\"\n").unwrap();

        let config = RegsignConfig::load(Some(&path)).unwrap();
        assert_eq!(config.username.as_deref(), Some("alice"));
        assert_eq!(config.key_file, Some(PathBuf::from("/keys/alice.key")));
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("regsign.toml");
        std::fs::write(&path, "username = [").unwrap();

        let err = RegsignConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }
}
