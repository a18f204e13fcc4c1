use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;
use crate::types::Result;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// General configuration
    #[serde(default)]
    pub general: GeneralConfig,

    /// Task pool configuration
    #[serde(default)]
    pub pool: PoolConfig,

    /// Certificate material to deploy
    #[serde(default)]
    pub certificate: CertificateConfig,

    /// Deployment targets
    #[serde(default)]
    pub deploy: DeployConfig,
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level
    pub log_level: String,

    /// Emit JSON log lines
    pub structured_logging: bool,

    /// Where to write Prometheus metrics after a run
    pub metrics_path: Option<PathBuf>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            structured_logging: false,
            metrics_path: None,
        }
    }
}

/// Task pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Deployments running at once
    pub concurrency: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { concurrency: 4 }
    }
}

/// Certificate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CertificateConfig {
    /// PEM certificate chain, leaf first
    pub cert_path: PathBuf,

    /// PEM private key
    pub key_path: PathBuf,
}

impl Default for CertificateConfig {
    fn default() -> Self {
        Self {
            cert_path: PathBuf::from("./data/certs/fullchain.pem"),
            key_path: PathBuf::from("./data/certs/privkey.pem"),
        }
    }
}

/// Deployment configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeployConfig {
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

/// One deployment target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Display name, defaults to the provider name
    #[serde(default)]
    pub name: Option<String>,

    /// Registry provider name
    pub provider: String,

    /// Provider configuration, passed to the registry untouched
    #[serde(default)]
    pub config: Value,
}

impl TargetConfig {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.provider)
    }
}

impl Settings {
    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.pool.concurrency == 0 {
            return Err(Error::Config("pool.concurrency must be positive".into()));
        }

        if self.certificate.cert_path.as_os_str().is_empty() {
            return Err(Error::Config("certificate.cert_path cannot be empty".into()));
        }

        if self.certificate.key_path.as_os_str().is_empty() {
            return Err(Error::Config("certificate.key_path cannot be empty".into()));
        }

        let mut names = std::collections::HashSet::new();
        for (index, target) in self.deploy.targets.iter().enumerate() {
            if target.provider.trim().is_empty() {
                return Err(Error::Config(format!("deploy.targets[{}] has no provider", index)));
            }
            if !names.insert(target.display_name()) {
                return Err(Error::Config(format!(
                    "deploy.targets[{}] reuses the name {}",
                    index,
                    target.display_name()
                )));
            }
        }

        Ok(())
    }
}
