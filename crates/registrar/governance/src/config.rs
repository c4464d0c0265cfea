//! Approval engine configuration.

use crate::error::{GovernanceError, GovernanceResult};
use registrar_types::ObjectId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Engine configuration, passed explicitly to every entry point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceConfig {
    /// Approver set that owns every capstone approval.
    #[serde(default = "default_root_id")]
    pub root_approver_set: ObjectId,

    /// Approver created by bootstrap.
    #[serde(default = "default_root_id")]
    pub root_approver: ObjectId,

    #[serde(default)]
    pub cascade: CascadeConfig,

    #[serde(default)]
    pub bootstrap: BootstrapConfig,

    #[serde(default)]
    pub notifications: NotificationConfig,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            root_approver_set: default_root_id(),
            root_approver: default_root_id(),
            cascade: CascadeConfig::default(),
            bootstrap: BootstrapConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }
}

impl GovernanceConfig {
    /// Load from a TOML file; a missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> GovernanceResult<Self> {
        match path {
            Some(path) if path.exists() => {
                let contents = std::fs::read_to_string(path).map_err(|e| {
                    GovernanceError::InvalidConfig(format!("{}: {}", path.display(), e))
                })?;
                Self::from_toml_str(&contents)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn from_toml_str(contents: &str) -> GovernanceResult<Self> {
        let config: GovernanceConfig =
            toml::from_str(contents).map_err(|e| GovernanceError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> GovernanceResult<()> {
        if self.root_approver_set.get() <= 0 || self.root_approver.get() <= 0 {
            return Err(GovernanceError::InvalidConfig(
                "root ids must be positive".into(),
            ));
        }
        if self.cascade.max_iterations == 0 {
            return Err(GovernanceError::InvalidConfig(
                "cascade.max_iterations must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Limits for the cascade work-list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeConfig {
    /// Evaluations allowed in one cascade before it is reported as runaway.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
        }
    }
}

/// Identity of the root approver installed on an empty registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    pub name: String,
    pub username: String,
    pub employee_id: i64,
    pub email_address: String,
    pub role: String,
    pub department: String,
    pub default_set_title: String,
    pub default_set_description: String,
    /// Hex Ed25519 verifying key of the root approver.
    pub public_key: Option<String>,
    /// File holding the hex key, used when `public_key` is unset.
    pub public_key_file: Option<PathBuf>,
}

impl BootstrapConfig {
    pub fn resolve_public_key(&self) -> GovernanceResult<String> {
        if let Some(key) = self.public_key.as_deref().filter(|k| !k.trim().is_empty()) {
            return Ok(key.trim().to_string());
        }
        let path = self.public_key_file.as_ref().ok_or_else(|| {
            GovernanceError::InvalidConfig("bootstrap public key is not configured".into())
        })?;
        let contents = std::fs::read_to_string(path).map_err(|e| {
            GovernanceError::InvalidConfig(format!(
                "error reading bootstrap key {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(contents.trim().to_string())
    }
}

/// Outbound notice settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub from_email: String,

    /// Base URL used to link notices to approval pages.
    #[serde(default)]
    pub app_url: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            from_email: String::new(),
            app_url: String::new(),
        }
    }
}

impl NotificationConfig {
    pub fn approval_link(&self, approval: registrar_types::ApprovalId) -> Option<String> {
        if self.app_url.is_empty() {
            return None;
        }
        Some(format!(
            "{}/view/approval/{}",
            self.app_url.trim_end_matches('/'),
            approval
        ))
    }
}

fn default_root_id() -> ObjectId {
    ObjectId::new(1)
}

fn default_max_iterations() -> usize {
    1024
}

fn default_true() -> bool {
    true
}
