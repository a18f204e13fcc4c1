//! Local filesystem deployer
//!
//! Writes the certificate and key to configured paths, for servers that
//! read their TLS material from disk.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, Dispatch};

use crate::crypto::CertificateIdentity;
use crate::deployer::SslDeployer;
use crate::error::Error;
use crate::telemetry::ProviderLogger;
use crate::types::{DeployResult, Result};
use crate::utils::FsUtils;

/// Registry configuration for the `local` deployer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalDeployerConfig {
    pub cert_path: String,
    pub key_path: String,
}

pub struct LocalDeployer {
    cert_path: PathBuf,
    key_path: PathBuf,
    logger: ProviderLogger,
}

impl LocalDeployer {
    pub fn new(config: LocalDeployerConfig) -> Result<Self> {
        if config.cert_path.trim().is_empty() {
            return Err(Error::Config("certPath is required".into()));
        }
        if config.key_path.trim().is_empty() {
            return Err(Error::Config("keyPath is required".into()));
        }
        if config.cert_path == config.key_path {
            return Err(Error::Config("certPath and keyPath must differ".into()));
        }

        Ok(Self {
            cert_path: PathBuf::from(config.cert_path),
            key_path: PathBuf::from(config.key_path),
            logger: ProviderLogger::default(),
        })
    }

    async fn run(&self, ctx: &CancellationToken, cert_pem: &str, key_pem: &str) -> Result<DeployResult> {
        // Refuse to write material that would not load
        let identity = CertificateIdentity::from_pem(cert_pem)?;
        if key_pem.trim().is_empty() {
            return Err(Error::Certificate("private key is empty".into()));
        }
        if ctx.is_cancelled() {
            return Err(Error::cancelled("local deploy"));
        }

        let current_cert = FsUtils::read_optional(&self.cert_path).await?;
        let current_key = FsUtils::read_optional(&self.key_path).await?;
        if current_cert.as_deref() == Some(cert_pem) && current_key.as_deref() == Some(key_pem) {
            debug!(path = %self.cert_path.display(), "Certificate on disk is already current");
            return Ok(DeployResult::default().with("changed", false));
        }

        self.replace_pair(cert_pem, key_pem).await?;

        info!(
            cert_path = %self.cert_path.display(),
            common_name = %identity.common_name,
            not_after = %identity.not_after,
            "Wrote certificate to disk"
        );
        Ok(DeployResult::default()
            .with("changed", true)
            .with("certPath", self.cert_path.display().to_string())
            .with("keyPath", self.key_path.display().to_string()))
    }
}

impl LocalDeployer {
    /// Stage both files first so a failed write never leaves a new key beside an old certificate
    async fn replace_pair(&self, cert_pem: &str, key_pem: &str) -> Result<()> {
        let staged_cert = FsUtils::staging_path(&self.cert_path);
        let staged_key = FsUtils::staging_path(&self.key_path);

        let staged = async {
            FsUtils::write_file(&staged_cert, cert_pem).await?;
            FsUtils::write_private_file(&staged_key, key_pem).await
        }
        .await;
        if let Err(e) = staged {
            FsUtils::discard(&staged_cert).await;
            FsUtils::discard(&staged_key).await;
            return Err(e);
        }

        FsUtils::commit(&staged_key, &self.key_path).await?;
        FsUtils::commit(&staged_cert, &self.cert_path).await
    }
}

#[async_trait]
impl SslDeployer for LocalDeployer {
    fn name(&self) -> &str {
        "local"
    }

    async fn deploy(&self, ctx: &CancellationToken, cert_pem: &str, key_pem: &str) -> Result<DeployResult> {
        self.logger.scope(self.run(ctx, cert_pem, key_pem)).await
    }

    fn set_logger(&self, dispatch: Dispatch) {
        self.logger.set(dispatch);
    }
}
