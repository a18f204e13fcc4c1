use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Dispatch};

use crate::config::Settings;
use crate::crypto::CertificateIdentity;
use crate::deployer::{collect_reports, deploy_each, DeployReport, DeployTarget};
use crate::error::Error;
use crate::pool::TaskPool;
use crate::registry;
use crate::telemetry::MetricsCollector;
use crate::types::Result;

/// Distributes one certificate to every configured target
pub struct DeployService {
    /// Bounded pool shared by all targets
    pool: TaskPool,
    /// Targets in configuration order
    targets: Vec<DeployTarget>,
    /// Deployment counters
    metrics: Arc<MetricsCollector>,
}

impl DeployService {
    pub fn new(pool: TaskPool, targets: Vec<DeployTarget>, metrics: Arc<MetricsCollector>) -> Self {
        Self { pool, targets, metrics }
    }

    /// Build every target from the registry
    ///
    /// All target configuration errors are reported together.
    pub fn from_settings(settings: &Settings, metrics: Arc<MetricsCollector>) -> Result<Self> {
        let pool = TaskPool::new(settings.pool.concurrency)?;

        let mut targets = Vec::with_capacity(settings.deploy.targets.len());
        let mut errors = Vec::new();
        for target in &settings.deploy.targets {
            match registry::create_deployer(&target.provider, &target.config) {
                Ok(deployer) => targets.push(DeployTarget::new(target.display_name(), deployer)),
                Err(e) => errors.push(e.context(target.display_name(), "configure")),
            }
        }
        Error::aggregate(errors)?;

        Ok(Self::new(pool, targets, metrics))
    }

    pub fn targets(&self) -> &[DeployTarget] {
        &self.targets
    }

    /// Route every deployer's logs to `dispatch`
    pub fn set_logger(&self, dispatch: Dispatch) {
        for target in &self.targets {
            target.deployer.set_logger(dispatch.clone());
        }
    }

    /// Deploy `cert_pem`/`key_pem` everywhere
    ///
    /// The certificate is parsed once up front so a malformed bundle fails
    /// before any target is contacted.
    pub async fn deploy(&self, ctx: &CancellationToken, cert_pem: &str, key_pem: &str) -> Result<Vec<DeployReport>> {
        if self.targets.is_empty() {
            return Err(Error::Config("no deploy targets configured".into()));
        }

        let identity = CertificateIdentity::from_pem(cert_pem)?;
        info!(
            common_name = %identity.common_name,
            not_after = %identity.not_after,
            targets = self.targets.len(),
            "Deploying certificate"
        );

        let outcomes = deploy_each(&self.pool, ctx, &self.targets, cert_pem, key_pem).await;

        for outcome in &outcomes {
            let label = match &outcome.result {
                Ok(_) => "succeeded",
                Err(e) if e.is_cancelled() => "cancelled",
                Err(_) => "failed",
            };
            self.metrics.record_deployment(&outcome.target, label);
        }

        let reports = collect_reports(outcomes);
        match &reports {
            Ok(reports) => info!(deployed = reports.len(), "All targets deployed"),
            Err(e) => warn!(error = %e, "Deployment incomplete"),
        }
        reports
    }
}
