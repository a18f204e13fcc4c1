//! Certificate deployers
//!
//! An [`SslDeployer`] makes a certificate active on a concrete resource.
//! Vendors whose binding API takes certificate ids compose an
//! [`SslManager`](crate::manager::SslManager) through [`UploadThenBind`];
//! others push the PEM material directly.

pub mod binding;
pub mod fanout;
pub mod local;
pub mod mock;
pub mod webhook;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::Dispatch;

use crate::types::{DeployResult, Result};

pub use binding::{AppendBindingApi, BindOutcome, BindingClient, ReplaceBindingApi, UploadThenBind};
pub use fanout::{collect_reports, deploy_all, deploy_each, DeployReport, DeployTarget, TargetOutcome};

/// Deployment target interface
#[async_trait]
pub trait SslDeployer: Send + Sync {
    fn name(&self) -> &str;

    /// Bind `cert_pem`/`key_pem` to the target; repeating it leaves the same bound state
    async fn deploy(&self, ctx: &CancellationToken, cert_pem: &str, key_pem: &str) -> Result<DeployResult>;

    fn set_logger(&self, dispatch: Dispatch);
}
