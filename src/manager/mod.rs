//! Certificate managers
//!
//! An [`SslManager`] stores a certificate in a vendor's certificate
//! repository and returns a stable identifier. Vendors plug in through the
//! [`CertificateStore`] primitives; [`StoreManager`] wraps them with the
//! dedup-aware upload algorithm from [`dedup`].

pub mod dedup;
pub mod mock;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::Dispatch;

use crate::crypto::{CertificateIdentity, DigestAlgorithm, SanMatch};
use crate::crypto::equality::{common_names_equal, subject_alt_names_equal};
use crate::telemetry::{MetricsCollector, ProviderLogger};
use crate::types::{Result, UploadResult};

pub use dedup::{DedupOptions, DedupUploader, UploadOutcome};

/// Certificate repository interface
#[async_trait]
pub trait SslManager: Send + Sync {
    fn name(&self) -> &str;

    /// Store `cert_pem`/`key_pem`, reusing an identical remote certificate when one exists
    async fn upload(&self, ctx: &CancellationToken, cert_pem: &str, key_pem: &str) -> Result<UploadResult>;

    fn set_logger(&self, dispatch: Dispatch);
}

/// A certificate as listed by a vendor
///
/// Identity fields are optional: many listing endpoints return only some of
/// them, and a missing field never rules a record out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCertificate {
    pub cert_id: String,
    pub cert_name: String,
    pub common_name: Option<String>,
    pub subject_alt_names: Option<Vec<String>>,
    pub not_before: Option<DateTime<Utc>>,
    pub not_after: Option<DateTime<Utc>>,
}

impl RemoteCertificate {
    pub fn new(cert_id: impl Into<String>, cert_name: impl Into<String>) -> Self {
        Self {
            cert_id: cert_id.into(),
            cert_name: cert_name.into(),
            ..Default::default()
        }
    }

    /// Fill every listing field from a parsed identity
    pub fn with_identity(mut self, identity: &CertificateIdentity) -> Self {
        self.common_name = Some(identity.common_name.clone());
        self.subject_alt_names = Some(identity.subject_alt_names.clone());
        self.not_before = Some(identity.not_before);
        self.not_after = Some(identity.not_after);
        self
    }

    /// Cheap filter: false as soon as a known field disagrees with `target`
    pub fn may_match(&self, target: &CertificateIdentity, mode: SanMatch) -> bool {
        if let Some(cn) = &self.common_name {
            if !common_names_equal(cn, &target.common_name) {
                return false;
            }
        }
        if let Some(sans) = &self.subject_alt_names {
            if !subject_alt_names_equal(sans, &target.subject_alt_names, mode) {
                return false;
            }
        }
        if self.not_before.is_some_and(|t| t != target.not_before) {
            return false;
        }
        if self.not_after.is_some_and(|t| t != target.not_after) {
            return false;
        }
        true
    }
}

/// What a vendor's detail endpoint reveals about a stored certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateDetail {
    /// The original certificate PEM
    Pem(String),
    /// Parsed identity fields only
    Fields(CertificateIdentity),
    /// A digest of the stored private key
    KeyDigest { algorithm: DigestAlgorithm, digest: String },
    /// Nothing comparable
    Unavailable,
}

/// How a vendor's listing endpoint pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Pagination {
    /// 1-based page numbers
    PageNumber,
    /// Record offsets
    #[default]
    Offset,
    /// Opaque continuation tokens
    Cursor,
}

/// One listing request; vendors read the fields their pagination style uses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub page_number: usize,
    pub page_size: usize,
    pub offset: usize,
    pub cursor: Option<String>,
}

impl PageRequest {
    pub fn first(page_size: usize) -> Self {
        Self {
            page_number: 1,
            page_size,
            offset: 0,
            cursor: None,
        }
    }
}

/// One page of a vendor listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertificatePage {
    pub records: Vec<RemoteCertificate>,
    /// Total record count, for vendors that report it
    pub total: Option<usize>,
    /// Explicit end-of-data sentinel
    pub has_more: Option<bool>,
    pub next_cursor: Option<String>,
}

/// Identifier assigned by the vendor to a freshly created certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedCertificate {
    pub cert_id: String,
    pub cert_name: String,
}

/// Vendor primitives used by the dedup-aware upload
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CertificateStore: Send + Sync {
    fn vendor(&self) -> &'static str;

    fn pagination(&self) -> Pagination;

    async fn list_certificates(&self, page: &PageRequest) -> Result<CertificatePage>;

    async fn get_certificate_detail(&self, cert_id: &str) -> Result<CertificateDetail>;

    async fn create_certificate(&self, name: &str, cert_pem: &str, key_pem: &str) -> Result<CreatedCertificate>;
}

/// [`SslManager`] over any [`CertificateStore`]
pub struct StoreManager<S> {
    name: String,
    uploader: DedupUploader<S>,
    logger: ProviderLogger,
    metrics: Option<Arc<MetricsCollector>>,
}

impl<S: CertificateStore> StoreManager<S> {
    pub fn new(name: impl Into<String>, store: S, options: DedupOptions) -> Self {
        Self {
            name: name.into(),
            uploader: DedupUploader::new(store, options),
            logger: ProviderLogger::default(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn store(&self) -> &S {
        self.uploader.store()
    }

    fn record(&self, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_upload(&self.name, outcome);
        }
    }
}

#[async_trait]
impl<S: CertificateStore> SslManager for StoreManager<S> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upload(&self, ctx: &CancellationToken, cert_pem: &str, key_pem: &str) -> Result<UploadResult> {
        let outcome = self
            .logger
            .scope(self.uploader.upload(ctx, cert_pem, key_pem))
            .await;

        match outcome {
            Ok(UploadOutcome::Reused(result)) => {
                self.record("reused");
                Ok(result.with_extended("deduplicated", true))
            }
            Ok(UploadOutcome::Created(result)) => {
                self.record("created");
                Ok(result.with_extended("deduplicated", false))
            }
            Err(e) => {
                self.record("failed");
                Err(e)
            }
        }
    }

    fn set_logger(&self, dispatch: Dispatch) {
        self.logger.set(dispatch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::testing;

    #[test]
    fn test_cheap_filter_skips_known_mismatch() {
        let issued = testing::issue("example.com", &["example.com", "www.example.com"]);
        let target = CertificateIdentity::from_pem(&issued.cert_pem).unwrap();

        assert!(RemoteCertificate::new("1", "bare").may_match(&target, SanMatch::Unordered));
        assert!(RemoteCertificate::new("2", "full")
            .with_identity(&target)
            .may_match(&target, SanMatch::Unordered));

        let mut other_cn = RemoteCertificate::new("3", "cn");
        other_cn.common_name = Some("other.com".into());
        assert!(!other_cn.may_match(&target, SanMatch::Unordered));

        let mut fewer_sans = RemoteCertificate::new("4", "sans");
        fewer_sans.subject_alt_names = Some(vec!["example.com".into()]);
        assert!(!fewer_sans.may_match(&target, SanMatch::Unordered));

        let mut expired = RemoteCertificate::new("5", "validity").with_identity(&target);
        expired.not_after = Some(target.not_before);
        assert!(!expired.may_match(&target, SanMatch::Unordered));
    }

    #[tokio::test]
    async fn test_upload_outcomes_are_counted() {
        use crate::manager::mock::{DetailMode, InMemoryCertificateStore};

        let metrics = Arc::new(MetricsCollector::new().unwrap());
        let manager = StoreManager::new(
            "mock",
            InMemoryCertificateStore::new(Pagination::Offset, DetailMode::Pem),
            DedupOptions::default(),
        )
        .with_metrics(metrics.clone());
        let issued = testing::issue("example.com", &["example.com"]);
        let ctx = CancellationToken::new();

        let first = manager.upload(&ctx, &issued.cert_pem, &issued.key_pem).await.unwrap();
        let second = manager.upload(&ctx, &issued.cert_pem, &issued.key_pem).await.unwrap();
        assert!(manager.upload(&ctx, "garbage", &issued.key_pem).await.is_err());

        assert_eq!(first.cert_id, second.cert_id);
        assert_eq!(first.extended_data["deduplicated"], false);
        assert_eq!(second.extended_data["deduplicated"], true);
        assert_eq!(metrics.upload_count("mock", "created"), 1);
        assert_eq!(metrics.upload_count("mock", "reused"), 1);
        assert_eq!(metrics.upload_count("mock", "failed"), 1);
    }
}
