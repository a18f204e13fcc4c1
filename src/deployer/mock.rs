//! In-memory binding API
//!
//! Serves both binding generations: `v2` replaces the certificate on a
//! resource, `v1` only appends.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::deployer::{AppendBindingApi, BindingClient, ReplaceBindingApi, UploadThenBind};
use crate::error::Error;
use crate::manager::mock::{new_manager, MockManagerConfig};
use crate::types::{Result, UploadResult};

const VENDOR: &str = "mockpanel";

/// Binding API generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiVersion {
    /// Append-only bindings
    V1,
    /// Replace semantics
    #[default]
    V2,
}

/// Registry configuration for the `mock` deployer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockDeployerConfig {
    #[serde(default)]
    pub api_version: ApiVersion,
    pub resources: Vec<String>,
    #[serde(default)]
    pub manager: MockManagerConfig,
}

pub fn new_deployer(config: MockDeployerConfig) -> Result<UploadThenBind> {
    let manager = Arc::new(new_manager(config.manager)?);
    let api = Arc::new(InMemoryBindingApi::default());
    let binding = match config.api_version {
        ApiVersion::V1 => BindingClient::Append(api),
        ApiVersion::V2 => BindingClient::Replace(api),
    };
    UploadThenBind::new("mock", manager, binding, config.resources)
}

#[derive(Debug, Default)]
pub struct InMemoryBindingApi {
    /// resource -> bound certificate ids
    bindings: Mutex<HashMap<String, Vec<String>>>,
    rejected: Mutex<HashSet<String>>,
    sets: AtomicUsize,
    appends: AtomicUsize,
}

impl InMemoryBindingApi {
    pub fn bindings(&self, resource: &str) -> Vec<String> {
        self.lock_bindings().get(resource).cloned().unwrap_or_default()
    }

    /// Make every call against `resource` fail
    pub fn reject(&self, resource: &str) {
        self.rejected
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(resource.to_string());
    }

    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    pub fn appends(&self) -> usize {
        self.appends.load(Ordering::SeqCst)
    }

    fn lock_bindings(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<String>>> {
        self.bindings.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_access(&self, operation: &str, resource: &str) -> Result<()> {
        let rejected = self.rejected.lock().unwrap_or_else(|e| e.into_inner());
        if rejected.contains(resource) {
            return Err(Error::vendor(VENDOR, operation, "Forbidden", format!("resource {} is locked", resource)));
        }
        Ok(())
    }
}

#[async_trait]
impl ReplaceBindingApi for InMemoryBindingApi {
    fn vendor(&self) -> &'static str {
        VENDOR
    }

    async fn set_certificate(&self, resource: &str, certificate: &UploadResult) -> Result<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.check_access("SetCertificate", resource)?;
        self.lock_bindings()
            .insert(resource.to_string(), vec![certificate.cert_id.clone()]);
        Ok(())
    }
}

#[async_trait]
impl AppendBindingApi for InMemoryBindingApi {
    fn vendor(&self) -> &'static str {
        VENDOR
    }

    async fn list_bound_certificates(&self, resource: &str) -> Result<Vec<String>> {
        self.check_access("ListCertificates", resource)?;
        Ok(self.bindings(resource))
    }

    async fn append_certificate(&self, resource: &str, certificate: &UploadResult) -> Result<()> {
        self.appends.fetch_add(1, Ordering::SeqCst);
        self.check_access("AddCertificate", resource)?;
        self.lock_bindings()
            .entry(resource.to_string())
            .or_default()
            .push(certificate.cert_id.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::testing;
    use crate::deployer::SslDeployer;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn test_config_from_json() {
        let config: MockDeployerConfig = serde_json::from_value(serde_json::json!({
            "apiVersion": "v1",
            "resources": ["site-a"],
            "manager": { "pagination": "pageNumber" }
        }))
        .unwrap();
        assert_eq!(config.api_version, ApiVersion::V1);
        assert_eq!(config.resources, vec!["site-a"]);

        let missing: std::result::Result<MockDeployerConfig, _> =
            serde_json::from_value(serde_json::json!({ "apiVersion": "v2" }));
        assert!(missing.is_err());
    }

    #[tokio::test]
    async fn test_v1_deployer_deploys_twice_without_duplicates() {
        let issued = testing::issue("example.com", &["example.com"]);
        let deployer = new_deployer(MockDeployerConfig {
            api_version: ApiVersion::V1,
            resources: vec!["site-a".into()],
            manager: MockManagerConfig::default(),
        })
        .unwrap();
        let ctx = CancellationToken::new();

        let first = deployer.deploy(&ctx, &issued.cert_pem, &issued.key_pem).await.unwrap();
        let second = deployer.deploy(&ctx, &issued.cert_pem, &issued.key_pem).await.unwrap();

        assert_eq!(first.extended_data["bound"], serde_json::json!(["site-a"]));
        assert_eq!(second.extended_data["unchanged"], serde_json::json!(["site-a"]));
    }

    #[tokio::test]
    async fn test_replace_overwrites_previous_certificate() {
        let api = InMemoryBindingApi::default();
        let old = UploadResult::new("old", "old");
        let new = UploadResult::new("new", "new");

        api.set_certificate("cdn", &old).await.unwrap();
        api.set_certificate("cdn", &new).await.unwrap();
        assert_eq!(api.bindings("cdn"), vec!["new"]);
        assert_eq!(api.sets(), 2);
    }
}
