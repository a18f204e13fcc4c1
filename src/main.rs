use anyhow::{Context, Result};
use certrelay::{config::load_settings, telemetry, DeployService, MetricsCollector};
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // 1. Load configuration
    let settings = load_settings()?;

    // 2. Initialize logging
    telemetry::init_logging(&settings.general)?;
    info!("Starting certrelay...");

    // 3. Read the certificate material
    let cert_pem = tokio::fs::read_to_string(&settings.certificate.cert_path)
        .await
        .with_context(|| format!("reading {}", settings.certificate.cert_path.display()))?;
    let key_pem = tokio::fs::read_to_string(&settings.certificate.key_path)
        .await
        .with_context(|| format!("reading {}", settings.certificate.key_path.display()))?;

    // 4. Build the deployment targets
    let metrics = Arc::new(MetricsCollector::new()?);
    let service = DeployService::from_settings(&settings, metrics.clone())?;
    service.set_logger(tracing::dispatcher::get_default(|dispatch| dispatch.clone()));
    info!("{} deploy targets configured", service.targets().len());

    // 5. Cancel outstanding work on Ctrl-C
    let ctx = CancellationToken::new();
    let shutdown = ctx.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Shutdown signal received, cancelling deployments...");
            shutdown.cancel();
        }
    });

    // 6. Deploy
    let outcome = service.deploy(&ctx, &cert_pem, &key_pem).await;

    // 7. Export metrics
    if let Some(path) = &settings.general.metrics_path {
        certrelay::utils::FsUtils::write_file(path, metrics.render()?).await?;
        info!("Metrics written to {}", path.display());
    }

    match outcome {
        Ok(reports) => {
            for report in &reports {
                info!(deploy_target = %report.target, result = ?report.result.extended_data, "Deployed");
            }
            info!("certrelay finished successfully");
            Ok(())
        }
        Err(e) => {
            error!("Deployment failed: {}", e);
            Err(e.into())
        }
    }
}
