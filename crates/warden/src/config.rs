use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ServerError, ServerResult};

/// Top-level configuration for the Warden server binary.
///
/// Loaded from a TOML file; command-line flags override individual fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Directory of Policy/PolicySet XML documents loaded at startup.
    pub policy_dir: PathBuf,

    /// Bind address for the HTTP façade.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Port for the HTTP façade.
    #[serde(default = "default_port")]
    pub port: u16,

    /// PEM file with the EC P-256 private key for audit-record signing.
    /// Records are unsigned when absent.
    #[serde(default)]
    pub signing_key: Option<PathBuf>,

    /// JSON-lines audit log path. Audit records go to the structured log
    /// only when absent.
    #[serde(default)]
    pub audit_log: Option<PathBuf>,
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            policy_dir: PathBuf::from("policies"),
            bind: default_bind(),
            port: default_port(),
            signing_key: None,
            audit_log: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file; a missing file yields defaults.
    pub fn load(path: &Path) -> ServerResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config: ServerConfig = toml::from_str(&contents)
            .map_err(|e| ServerError::Config(format!("TOML parse error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ServerResult<()> {
        if self.bind.is_empty() {
            return Err(ServerError::Config("bind address must not be empty".into()));
        }
        if self.port == 0 {
            return Err(ServerError::Config("port must be non-zero".into()));
        }
        Ok(())
    }
}
