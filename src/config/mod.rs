mod settings;

pub use settings::{CertificateConfig, DeployConfig, GeneralConfig, PoolConfig, Settings, TargetConfig};

use std::env;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::Error;
use crate::types::Result;

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "CERTRELAY_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/certrelay.yaml";

/// Load configuration from file and environment variables
pub fn load_settings() -> Result<Settings> {
    // 1. Determine config path from environment or use default
    let explicit = env::var(CONFIG_ENV).ok().map(PathBuf::from);
    let config_path = explicit.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    // 2. Read the file; only an explicitly named file must exist
    let mut settings = if explicit.is_some() || config_path.exists() {
        load_file(&config_path)?
    } else {
        debug!("No configuration file at {}, using defaults", config_path.display());
        Settings::default()
    };

    // 3. Override with environment variables if present
    apply_env_overrides(&mut settings, |key| env::var(key).ok());

    // 4. Validate configuration
    settings.validate()?;

    info!(targets = settings.deploy.targets.len(), "Configuration loaded");
    Ok(settings)
}

/// Parse a YAML configuration file
pub fn load_file(path: &Path) -> Result<Settings> {
    debug!("Loading configuration from {}", path.display());

    let contents = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config file {}: {}", path.display(), e)))?;

    serde_yaml::from_str(&contents)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Apply `CERTRELAY_*` overrides read through `lookup`
pub fn apply_env_overrides<F>(settings: &mut Settings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(level) = lookup("CERTRELAY_LOG_LEVEL") {
        settings.general.log_level = level;
    }

    if let Some(structured) = lookup("CERTRELAY_STRUCTURED_LOGGING") {
        match structured.parse() {
            Ok(value) => settings.general.structured_logging = value,
            Err(_) => warn!("Ignoring invalid CERTRELAY_STRUCTURED_LOGGING={}", structured),
        }
    }

    if let Some(concurrency) = lookup("CERTRELAY_POOL_CONCURRENCY") {
        match concurrency.parse() {
            Ok(value) => settings.pool.concurrency = value,
            Err(_) => warn!("Ignoring invalid CERTRELAY_POOL_CONCURRENCY={}", concurrency),
        }
    }

    if let Some(path) = lookup("CERTRELAY_CERT_PATH") {
        settings.certificate.cert_path = PathBuf::from(path);
    }

    if let Some(path) = lookup("CERTRELAY_KEY_PATH") {
        settings.certificate.key_path = PathBuf::from(path);
    }

    if let Some(path) = lookup("CERTRELAY_METRICS_PATH") {
        settings.general.metrics_path = Some(PathBuf::from(path));
    }
}
