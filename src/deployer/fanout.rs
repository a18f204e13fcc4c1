//! Parallel deployment to several independent targets

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::deployer::SslDeployer;
use crate::error::Error;
use crate::pool::TaskPool;
use crate::types::{DeployResult, Result};

/// A named deployer
#[derive(Clone)]
pub struct DeployTarget {
    pub name: String,
    pub deployer: Arc<dyn SslDeployer>,
}

impl DeployTarget {
    pub fn new(name: impl Into<String>, deployer: Arc<dyn SslDeployer>) -> Self {
        Self {
            name: name.into(),
            deployer,
        }
    }
}

/// Successful deployment of one target
#[derive(Debug, Clone, PartialEq)]
pub struct DeployReport {
    pub target: String,
    pub result: DeployResult,
}

/// Outcome of one target, success or failure
#[derive(Debug)]
pub struct TargetOutcome {
    pub target: String,
    pub result: Result<DeployResult>,
}

/// Deploy to every target through `pool`, one outcome per target in order
///
/// Failures carry the target name. A target whose submission was cancelled
/// yields [`Error::Cancelled`].
pub async fn deploy_each(
    pool: &TaskPool,
    ctx: &CancellationToken,
    targets: &[DeployTarget],
    cert_pem: &str,
    key_pem: &str,
) -> Vec<TargetOutcome> {
    let cert_pem: Arc<str> = Arc::from(cert_pem);
    let key_pem: Arc<str> = Arc::from(key_pem);

    let handles: Vec<_> = targets
        .iter()
        .map(|target| {
            let task_ctx = ctx.clone();
            let cert_pem = cert_pem.clone();
            let key_pem = key_pem.clone();
            pool.submit(
                ctx,
                move |deployer: Arc<dyn SslDeployer>| async move {
                    deployer.deploy(&task_ctx, &cert_pem, &key_pem).await
                },
                target.deployer.clone(),
            )
        })
        .collect();

    let mut outcomes = Vec::with_capacity(targets.len());
    for (target, handle) in targets.iter().zip(handles) {
        let result = match handle.await {
            Some(Ok(result)) => {
                info!(deploy_target = %target.name, "Deployment succeeded");
                Ok(result)
            }
            Some(Err(e)) => {
                warn!(deploy_target = %target.name, error = %e, "Deployment failed");
                Err(e.context(&target.name, "deploy"))
            }
            None => Err(Error::cancelled(format!("deploy {}", target.name))),
        };
        outcomes.push(TargetOutcome {
            target: target.name.clone(),
            result,
        });
    }

    outcomes
}

/// Fold per-target outcomes: every success, or every failure together
pub fn collect_reports(outcomes: Vec<TargetOutcome>) -> Result<Vec<DeployReport>> {
    let mut reports = Vec::with_capacity(outcomes.len());
    let mut errors = Vec::new();

    for outcome in outcomes {
        match outcome.result {
            Ok(result) => reports.push(DeployReport {
                target: outcome.target,
                result,
            }),
            Err(e) => errors.push(e),
        }
    }

    Error::aggregate(errors)?;
    Ok(reports)
}

/// Deploy to every target; success means every target succeeded
pub async fn deploy_all(
    pool: &TaskPool,
    ctx: &CancellationToken,
    targets: &[DeployTarget],
    cert_pem: &str,
    key_pem: &str,
) -> Result<Vec<DeployReport>> {
    collect_reports(deploy_each(pool, ctx, targets, cert_pem, key_pem).await)
}
