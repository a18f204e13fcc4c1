use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

use crate::error::Error;
use crate::types::Result;

/// Metrics collector
pub struct MetricsCollector {
    /// Registry
    registry: Registry,
    /// Uploads by outcome (reused, created, failed)
    uploads: IntCounterVec,
    /// Deployments by outcome (succeeded, failed, cancelled)
    deployments: IntCounterVec,
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let uploads = IntCounterVec::new(
            Opts::new("certrelay_uploads_total", "Certificate uploads by outcome"),
            &["vendor", "outcome"],
        )?;
        registry.register(Box::new(uploads.clone()))?;

        let deployments = IntCounterVec::new(
            Opts::new("certrelay_deployments_total", "Certificate deployments by outcome"),
            &["target", "outcome"],
        )?;
        registry.register(Box::new(deployments.clone()))?;

        Ok(Self {
            registry,
            uploads,
            deployments,
        })
    }

    pub fn record_upload(&self, vendor: &str, outcome: &str) {
        self.uploads.with_label_values(&[vendor, outcome]).inc();
    }

    pub fn record_deployment(&self, target: &str, outcome: &str) {
        self.deployments.with_label_values(&[target, outcome]).inc();
    }

    pub fn upload_count(&self, vendor: &str, outcome: &str) -> u64 {
        self.uploads.with_label_values(&[vendor, outcome]).get()
    }

    pub fn deployment_count(&self, target: &str, outcome: &str) -> u64 {
        self.deployments.with_label_values(&[target, outcome]).get()
    }

    /// Render all metrics in the Prometheus text exposition format
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| Error::Internal(format!("Metrics are not UTF-8: {}", e)))
    }
}
