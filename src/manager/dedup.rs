//! Dedup-aware upload
//!
//! Several vendors rate-limit certificate creation, so an upload first walks
//! the vendor's listing looking for a certificate that is the same issuance
//! as the one being uploaded. Only when nothing matches is a new object
//! created.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::crypto::{identities_equal, key_digest, pem_matches_identity, CertificateIdentity, KeyNormalization, SanMatch};
use crate::error::Error;
use crate::manager::{CertificateDetail, CertificateStore, PageRequest, Pagination, RemoteCertificate};
use crate::types::{Result, UploadResult};
use crate::utils::cancellable;

pub const DEFAULT_PAGE_SIZE: usize = 100;
pub const DEFAULT_NAME_PREFIX: &str = "certrelay-";

/// Per-vendor tuning of the upload algorithm
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DedupOptions {
    pub page_size: usize,
    /// Prefix of generated certificate names
    pub name_prefix: String,
    pub san_match: SanMatch,
    /// Normalisation the vendor applies before fingerprinting private keys
    pub key_normalization: KeyNormalization,
}

impl Default for DedupOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            name_prefix: DEFAULT_NAME_PREFIX.to_string(),
            san_match: SanMatch::default(),
            key_normalization: KeyNormalization::default(),
        }
    }
}

/// Whether an upload found an existing certificate or created one
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    Reused(UploadResult),
    Created(UploadResult),
}

impl UploadOutcome {
    pub fn is_reused(&self) -> bool {
        matches!(self, UploadOutcome::Reused(_))
    }

    pub fn into_result(self) -> UploadResult {
        match self {
            UploadOutcome::Reused(result) | UploadOutcome::Created(result) => result,
        }
    }
}

/// Runs the lookup-then-create algorithm against one vendor account
pub struct DedupUploader<S> {
    store: S,
    options: DedupOptions,
    /// Keeps one lookup+create sequence in flight per instance
    upload_lock: Mutex<()>,
}

impl<S: CertificateStore> DedupUploader<S> {
    pub fn new(store: S, mut options: DedupOptions) -> Self {
        if options.page_size == 0 {
            options.page_size = DEFAULT_PAGE_SIZE;
        }

        Self {
            store,
            options,
            upload_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn options(&self) -> &DedupOptions {
        &self.options
    }

    pub async fn upload(&self, ctx: &CancellationToken, cert_pem: &str, key_pem: &str) -> Result<UploadOutcome> {
        let target = CertificateIdentity::from_pem(cert_pem)?;
        let vendor = self.store.vendor();

        let _guard = self.upload_lock.lock().await;

        if let Some(existing) = self.find_existing(ctx, cert_pem, key_pem, &target).await? {
            info!(
                vendor,
                cert_id = %existing.cert_id,
                common_name = %target.common_name,
                "Reusing certificate already present at vendor"
            );
            return Ok(UploadOutcome::Reused(UploadResult::new(existing.cert_id, existing.cert_name)));
        }

        let name = format!("{}{}", self.options.name_prefix, Utc::now().timestamp_millis());
        let created = cancellable(
            ctx,
            "create_certificate",
            self.store.create_certificate(&name, cert_pem, key_pem),
        )
        .await
        .map_err(|e| e.context(vendor, "create_certificate"))?;

        if created.cert_id.trim().is_empty() {
            return Err(Error::vendor(
                vendor,
                "create_certificate",
                "EmptyCertId",
                format!("certificate {} was created without an id", name),
            ));
        }

        info!(vendor, cert_id = %created.cert_id, cert_name = %created.cert_name, "Uploaded new certificate");
        let cert_name = if created.cert_name.is_empty() { name } else { created.cert_name };
        Ok(UploadOutcome::Created(UploadResult::new(created.cert_id, cert_name)))
    }

    /// Walk the listing; the first record whose detail matches wins
    async fn find_existing(
        &self,
        ctx: &CancellationToken,
        cert_pem: &str,
        key_pem: &str,
        target: &CertificateIdentity,
    ) -> Result<Option<RemoteCertificate>> {
        let vendor = self.store.vendor();
        let pagination = self.store.pagination();
        let page_size = self.options.page_size;
        let mut request = PageRequest::first(page_size);
        let mut seen = 0usize;

        loop {
            if ctx.is_cancelled() {
                return Err(Error::cancelled("list_certificates"));
            }

            let page = cancellable(ctx, "list_certificates", self.store.list_certificates(&request))
                .await
                .map_err(|e| e.context(vendor, "list_certificates"))?;
            let count = page.records.len();
            seen += count;
            debug!(vendor, page = request.page_number, count, "Listed certificates");

            for record in page.records {
                if !record.may_match(target, self.options.san_match) {
                    trace!(vendor, cert_id = %record.cert_id, "Skipping certificate on listing fields");
                    continue;
                }

                let detail = cancellable(
                    ctx,
                    "get_certificate_detail",
                    self.store.get_certificate_detail(&record.cert_id),
                )
                .await
                .map_err(|e| e.context(vendor, "get_certificate_detail"))?;

                if self.detail_matches(&detail, cert_pem, key_pem, target) {
                    return Ok(Some(record));
                }
            }

            if count == 0 || count < page_size || page.has_more == Some(false) {
                break;
            }
            if page.total.is_some_and(|total| seen >= total) {
                break;
            }

            match pagination {
                Pagination::Cursor => match page.next_cursor {
                    Some(cursor) if !cursor.is_empty() => request.cursor = Some(cursor),
                    _ => break,
                },
                Pagination::PageNumber | Pagination::Offset => {}
            }
            request.page_number += 1;
            request.offset += count;
        }

        Ok(None)
    }

    fn detail_matches(
        &self,
        detail: &CertificateDetail,
        cert_pem: &str,
        key_pem: &str,
        target: &CertificateIdentity,
    ) -> bool {
        let mode = self.options.san_match;
        match detail {
            CertificateDetail::Pem(remote_pem) => pem_matches_identity(remote_pem, cert_pem, target, mode),
            CertificateDetail::Fields(identity) => identities_equal(identity, target, mode),
            CertificateDetail::KeyDigest { algorithm, digest } => {
                let candidate = key_digest(key_pem, *algorithm, &self.options.key_normalization);
                digest.trim().eq_ignore_ascii_case(&candidate)
            }
            CertificateDetail::Unavailable => false,
        }
    }
}
