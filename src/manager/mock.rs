//! In-memory certificate repository
//!
//! Emulates the listing/detail/create endpoints of a vendor certificate
//! service. The pagination style, what the detail endpoint returns and
//! whether listings carry identity fields are all configurable, so one type
//! stands in for the different vendor shapes.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::crypto::{key_digest, CertificateIdentity, DigestAlgorithm, KeyNormalization};
use crate::error::Error;
use crate::manager::{
    CertificateDetail, CertificatePage, CertificateStore, CreatedCertificate, DedupOptions, PageRequest,
    Pagination, RemoteCertificate, StoreManager,
};
use crate::types::Result;

const VENDOR: &str = "mockcas";

/// What the detail endpoint returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DetailMode {
    #[default]
    Pem,
    Fields,
    KeyDigest,
}

/// Registry configuration for the `mock` manager
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MockManagerConfig {
    pub pagination: Pagination,
    pub detail: DetailMode,
    pub digest_algorithm: DigestAlgorithm,
    /// Whether listings include CN, SANs and validity
    pub expose_identity: bool,
    #[serde(flatten)]
    pub dedup: DedupOptions,
}

impl Default for MockManagerConfig {
    fn default() -> Self {
        Self {
            pagination: Pagination::default(),
            detail: DetailMode::default(),
            digest_algorithm: DigestAlgorithm::Sha256,
            expose_identity: true,
            dedup: DedupOptions::default(),
        }
    }
}

pub fn new_manager(config: MockManagerConfig) -> Result<StoreManager<InMemoryCertificateStore>> {
    let store = InMemoryCertificateStore::new(config.pagination, config.detail)
        .with_digest_algorithm(config.digest_algorithm)
        .with_key_normalization(config.dedup.key_normalization)
        .expose_identity(config.expose_identity);
    Ok(StoreManager::new("mock", store, config.dedup))
}

/// Vendor traffic seen by an [`InMemoryCertificateStore`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCallCounts {
    pub lists: usize,
    pub details: usize,
    pub creates: usize,
}

#[derive(Debug, Clone)]
struct StoredCertificate {
    summary: RemoteCertificate,
    detail: CertificateDetail,
}

#[derive(Debug)]
pub struct InMemoryCertificateStore {
    pagination: Pagination,
    detail_mode: DetailMode,
    digest_algorithm: DigestAlgorithm,
    key_normalization: KeyNormalization,
    expose_identity: bool,
    certificates: Mutex<Vec<StoredCertificate>>,
    next_id: AtomicU64,
    lists: AtomicUsize,
    details: AtomicUsize,
    creates: AtomicUsize,
}

impl Default for InMemoryCertificateStore {
    fn default() -> Self {
        Self::new(Pagination::default(), DetailMode::default())
    }
}

impl InMemoryCertificateStore {
    pub fn new(pagination: Pagination, detail_mode: DetailMode) -> Self {
        Self {
            pagination,
            detail_mode,
            digest_algorithm: DigestAlgorithm::Sha256,
            key_normalization: KeyNormalization::default(),
            expose_identity: true,
            certificates: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            lists: AtomicUsize::new(0),
            details: AtomicUsize::new(0),
            creates: AtomicUsize::new(0),
        }
    }

    pub fn with_digest_algorithm(mut self, algorithm: DigestAlgorithm) -> Self {
        self.digest_algorithm = algorithm;
        self
    }

    pub fn with_key_normalization(mut self, normalization: KeyNormalization) -> Self {
        self.key_normalization = normalization;
        self
    }

    pub fn expose_identity(mut self, expose: bool) -> Self {
        self.expose_identity = expose;
        self
    }

    pub fn calls(&self) -> StoreCallCounts {
        StoreCallCounts {
            lists: self.lists.load(Ordering::SeqCst),
            details: self.details.load(Ordering::SeqCst),
            creates: self.creates.load(Ordering::SeqCst),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store a certificate as if it had been uploaded earlier
    pub fn seed(&self, cert_pem: &str, key_pem: &str) -> Result<String> {
        let id = self.allocate_id();
        let name = format!("seeded-{}", id);
        self.insert(&id, &name, cert_pem, key_pem)?;
        Ok(id)
    }

    /// Store an arbitrary listing entry and detail
    pub fn seed_raw(&self, summary: RemoteCertificate, detail: CertificateDetail) {
        self.lock().push(StoredCertificate { summary, detail });
    }

    fn allocate_id(&self) -> String {
        format!("cert-{}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn insert(&self, id: &str, name: &str, cert_pem: &str, key_pem: &str) -> Result<()> {
        let identity = CertificateIdentity::from_pem(cert_pem)?;

        let mut summary = RemoteCertificate::new(id, name);
        if self.expose_identity {
            summary = summary.with_identity(&identity);
        }

        let detail = match self.detail_mode {
            DetailMode::Pem => CertificateDetail::Pem(cert_pem.to_string()),
            DetailMode::Fields => CertificateDetail::Fields(identity),
            DetailMode::KeyDigest => CertificateDetail::KeyDigest {
                algorithm: self.digest_algorithm,
                digest: key_digest(key_pem, self.digest_algorithm, &self.key_normalization),
            },
        };

        self.lock().push(StoredCertificate { summary, detail });
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<StoredCertificate>> {
        self.certificates.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn start_index(&self, request: &PageRequest) -> Result<usize> {
        match self.pagination {
            Pagination::PageNumber => Ok(request.page_number.saturating_sub(1) * request.page_size),
            Pagination::Offset => Ok(request.offset),
            Pagination::Cursor => match request.cursor.as_deref() {
                None => Ok(0),
                Some(cursor) => cursor
                    .parse()
                    .map_err(|_| Error::vendor(VENDOR, "ListCertificates", "InvalidCursor", cursor)),
            },
        }
    }
}

#[async_trait]
impl CertificateStore for InMemoryCertificateStore {
    fn vendor(&self) -> &'static str {
        VENDOR
    }

    fn pagination(&self) -> Pagination {
        self.pagination
    }

    async fn list_certificates(&self, request: &PageRequest) -> Result<CertificatePage> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        if request.page_size == 0 {
            return Err(Error::vendor(VENDOR, "ListCertificates", "InvalidPageSize", "page size must be positive"));
        }

        let start = self.start_index(request)?;
        let certificates = self.lock();
        let total = certificates.len();
        let end = total.min(start.saturating_add(request.page_size));
        let records: Vec<RemoteCertificate> = certificates
            .get(start..end)
            .unwrap_or_default()
            .iter()
            .map(|c| c.summary.clone())
            .collect();

        Ok(match self.pagination {
            Pagination::Cursor => CertificatePage {
                records,
                total: None,
                has_more: Some(end < total),
                next_cursor: (end < total).then(|| end.to_string()),
            },
            Pagination::PageNumber | Pagination::Offset => CertificatePage {
                records,
                total: Some(total),
                has_more: None,
                next_cursor: None,
            },
        })
    }

    async fn get_certificate_detail(&self, cert_id: &str) -> Result<CertificateDetail> {
        self.details.fetch_add(1, Ordering::SeqCst);
        self.lock()
            .iter()
            .find(|c| c.summary.cert_id == cert_id)
            .map(|c| c.detail.clone())
            .ok_or_else(|| Error::not_found(VENDOR, format!("certificate {}", cert_id)))
    }

    async fn create_certificate(&self, name: &str, cert_pem: &str, key_pem: &str) -> Result<CreatedCertificate> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if self.lock().iter().any(|c| c.summary.cert_name == name) {
            return Err(Error::vendor(VENDOR, "UploadCertificate", "NameConflict", name));
        }

        let id = self.allocate_id();
        self.insert(&id, name, cert_pem, key_pem)?;
        Ok(CreatedCertificate {
            cert_id: id,
            cert_name: name.to_string(),
        })
    }
}
