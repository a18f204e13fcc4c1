//! Upload-then-bind deployers
//!
//! Binding APIs come in two generations: newer ones replace the
//! certificate on a resource, older ones only append to a list of bound
//! certificates. [`BindingClient`] names the generation explicitly so the
//! idempotence strategy is chosen at the call site.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, Dispatch};

use crate::deployer::SslDeployer;
use crate::error::Error;
use crate::manager::SslManager;
use crate::telemetry::ProviderLogger;
use crate::types::{DeployResult, Result, UploadResult};
use crate::utils::cancellable;

/// Binding API with set semantics
#[async_trait]
pub trait ReplaceBindingApi: Send + Sync {
    fn vendor(&self) -> &'static str;

    /// Make `certificate` the one served by `resource`
    async fn set_certificate(&self, resource: &str, certificate: &UploadResult) -> Result<()>;
}

/// Binding API with append-only semantics
#[async_trait]
pub trait AppendBindingApi: Send + Sync {
    fn vendor(&self) -> &'static str;

    /// Certificate ids currently bound to `resource`
    async fn list_bound_certificates(&self, resource: &str) -> Result<Vec<String>>;

    async fn append_certificate(&self, resource: &str, certificate: &UploadResult) -> Result<()>;
}

/// Supported binding API generations
#[derive(Clone)]
pub enum BindingClient {
    Replace(Arc<dyn ReplaceBindingApi>),
    Append(Arc<dyn AppendBindingApi>),
}

/// Result of binding one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    Bound,
    /// Append-only API already had the certificate
    AlreadyBound,
}

impl BindingClient {
    pub fn vendor(&self) -> &'static str {
        match self {
            BindingClient::Replace(api) => api.vendor(),
            BindingClient::Append(api) => api.vendor(),
        }
    }

    pub async fn bind(
        &self,
        ctx: &CancellationToken,
        resource: &str,
        certificate: &UploadResult,
    ) -> Result<BindOutcome> {
        match self {
            BindingClient::Replace(api) => {
                cancellable(ctx, "set_certificate", api.set_certificate(resource, certificate))
                    .await
                    .map_err(|e| e.context(api.vendor(), "set_certificate"))?;
                Ok(BindOutcome::Bound)
            }
            BindingClient::Append(api) => {
                let bound = cancellable(ctx, "list_bound_certificates", api.list_bound_certificates(resource))
                    .await
                    .map_err(|e| e.context(api.vendor(), "list_bound_certificates"))?;
                if bound.iter().any(|id| *id == certificate.cert_id) {
                    return Ok(BindOutcome::AlreadyBound);
                }

                cancellable(ctx, "append_certificate", api.append_certificate(resource, certificate))
                    .await
                    .map_err(|e| e.context(api.vendor(), "append_certificate"))?;
                Ok(BindOutcome::Bound)
            }
        }
    }
}

/// Uploads through a manager, then binds the certificate to every resource
pub struct UploadThenBind {
    name: String,
    manager: Arc<dyn SslManager>,
    binding: BindingClient,
    resources: Vec<String>,
    logger: ProviderLogger,
}

impl UploadThenBind {
    pub fn new(
        name: impl Into<String>,
        manager: Arc<dyn SslManager>,
        binding: BindingClient,
        resources: Vec<String>,
    ) -> Result<Self> {
        let resources: Vec<String> = resources
            .into_iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();
        if resources.is_empty() {
            return Err(Error::Config("at least one resource to bind is required".into()));
        }

        Ok(Self {
            name: name.into(),
            manager,
            binding,
            resources,
            logger: ProviderLogger::default(),
        })
    }

    async fn run(&self, ctx: &CancellationToken, cert_pem: &str, key_pem: &str) -> Result<DeployResult> {
        let vendor = self.binding.vendor();
        let certificate = self.manager.upload(ctx, cert_pem, key_pem).await?;

        let mut bound = Vec::new();
        let mut unchanged = Vec::new();
        let mut errors = Vec::new();

        for resource in &self.resources {
            match self.binding.bind(ctx, resource, &certificate).await {
                Ok(BindOutcome::Bound) => {
                    info!(vendor, resource = %resource, cert_id = %certificate.cert_id, "Bound certificate");
                    bound.push(resource.clone());
                }
                Ok(BindOutcome::AlreadyBound) => {
                    debug!(vendor, resource = %resource, cert_id = %certificate.cert_id, "Certificate already bound");
                    unchanged.push(resource.clone());
                }
                Err(e) => errors.push(e.context(resource, "bind")),
            }
        }

        Error::aggregate(errors)?;

        Ok(DeployResult::default()
            .with("certId", certificate.cert_id)
            .with("certName", certificate.cert_name)
            .with("bound", bound)
            .with("unchanged", unchanged))
    }
}

#[async_trait]
impl SslDeployer for UploadThenBind {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deploy(&self, ctx: &CancellationToken, cert_pem: &str, key_pem: &str) -> Result<DeployResult> {
        self.logger.scope(self.run(ctx, cert_pem, key_pem)).await
    }

    fn set_logger(&self, dispatch: Dispatch) {
        self.manager.set_logger(dispatch.clone());
        self.logger.set(dispatch);
    }
}
