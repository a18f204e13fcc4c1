//! DNS-01 challenge providers
//!
//! Every DNS vendor is an [`AcmeChallenger`]. Most of them share the same
//! record-level shape, captured by [`DnsChallenger`] over a vendor's
//! [`DnsRecordApi`].

pub mod dns01;
pub mod mock;
pub mod webhook;
pub mod zone_cache;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, Dispatch};

use crate::telemetry::ProviderLogger;
use crate::types::Result;
use crate::utils::cancellable;

pub use dns01::{challenge_fqdn, challenge_value};
pub use zone_cache::ZoneCache;

/// Default time the ACME client waits for a record to propagate
pub const DEFAULT_PROPAGATION_TIMEOUT: Duration = Duration::from_secs(120);
/// Default interval between propagation checks
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_secs(5);

/// DNS-01 plugin interface driven by the ACME client
#[async_trait]
pub trait AcmeChallenger: Send + Sync {
    /// Provider name, as used in the registry
    fn name(&self) -> &str;

    /// Publish the challenge TXT value for `domain`, leaving other values in place
    async fn present(
        &self,
        ctx: &CancellationToken,
        domain: &str,
        token: &str,
        key_authorization: &str,
    ) -> Result<()>;

    /// Remove the record created by [`present`](Self::present); absent records are fine
    async fn clean_up(
        &self,
        ctx: &CancellationToken,
        domain: &str,
        token: &str,
        key_authorization: &str,
    ) -> Result<()>;

    /// `(propagation_timeout, polling_interval)`
    fn timeout(&self) -> (Duration, Duration);

    fn set_logger(&self, dispatch: Dispatch);
}

/// Static propagation timing for one challenger instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChallengeTiming {
    pub propagation_timeout: Duration,
    pub polling_interval: Duration,
}

impl Default for ChallengeTiming {
    fn default() -> Self {
        Self {
            propagation_timeout: DEFAULT_PROPAGATION_TIMEOUT,
            polling_interval: DEFAULT_POLLING_INTERVAL,
        }
    }
}

impl ChallengeTiming {
    /// Build from optional configured seconds; zero or unset keeps the default
    pub fn from_seconds(propagation_timeout: Option<u64>, polling_interval: Option<u64>) -> Self {
        let defaults = Self::default();
        Self {
            propagation_timeout: propagation_timeout
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.propagation_timeout),
            polling_interval: polling_interval
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.polling_interval),
        }
    }
}

/// A TXT record as seen through a vendor API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxtRecord {
    /// Vendor record identifier
    pub id: String,
    /// Fully qualified record name, without trailing dot
    pub name: String,
    pub value: String,
}

/// Record primitives a DNS vendor exposes
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DnsRecordApi: Send + Sync {
    fn vendor(&self) -> &'static str;

    /// TXT records whose name is exactly `fqdn`
    async fn find_txt_records(&self, fqdn: &str) -> Result<Vec<TxtRecord>>;

    async fn create_txt_record(&self, fqdn: &str, value: &str, ttl: u32) -> Result<TxtRecord>;

    /// Delete a record; a vendor "not found" must surface as [`crate::error::Error::NotFound`]
    async fn delete_record(&self, record: &TxtRecord) -> Result<()>;
}

/// Challenger built from a vendor's record primitives
pub struct DnsChallenger<A> {
    name: String,
    api: A,
    timing: ChallengeTiming,
    ttl: u32,
    logger: ProviderLogger,
}

impl<A: DnsRecordApi> DnsChallenger<A> {
    pub fn new(name: impl Into<String>, api: A, timing: ChallengeTiming) -> Self {
        Self {
            name: name.into(),
            api,
            timing,
            ttl: dns01::CHALLENGE_TTL,
            logger: ProviderLogger::default(),
        }
    }

    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    async fn find(&self, ctx: &CancellationToken, fqdn: &str) -> Result<Vec<TxtRecord>> {
        cancellable(ctx, "find_txt_records", self.api.find_txt_records(fqdn))
            .await
            .map_err(|e| e.context(self.api.vendor(), "find_txt_records"))
    }

    /// One record per value: apex and wildcard challenges share a name
    /// but need their own TXT values side by side
    async fn ensure(&self, ctx: &CancellationToken, fqdn: &str, value: &str) -> Result<()> {
        let vendor = self.api.vendor();
        let existing = self.find(ctx, fqdn).await?;

        if existing.iter().any(|r| r.value == value) {
            debug!(vendor, fqdn, "Challenge record already present");
            return Ok(());
        }

        let record = cancellable(ctx, "create_txt_record", self.api.create_txt_record(fqdn, value, self.ttl))
            .await
            .map_err(|e| e.context(vendor, "create_txt_record"))?;
        info!(vendor, fqdn, record_id = %record.id, siblings = existing.len(), "Created challenge record");

        Ok(())
    }

    async fn remove(&self, ctx: &CancellationToken, fqdn: &str, value: &str) -> Result<()> {
        let vendor = self.api.vendor();
        let existing = self.find(ctx, fqdn).await?;

        for record in existing.iter().filter(|r| r.value == value) {
            match cancellable(ctx, "delete_record", self.api.delete_record(record)).await {
                Ok(()) => info!(vendor, fqdn, record_id = %record.id, "Deleted challenge record"),
                Err(e) if e.is_not_found() => {
                    debug!(vendor, fqdn, record_id = %record.id, "Challenge record already gone")
                }
                Err(e) => return Err(e.context(vendor, "delete_record")),
            }
        }

        Ok(())
    }
}

#[async_trait]
impl<A: DnsRecordApi> AcmeChallenger for DnsChallenger<A> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn present(
        &self,
        ctx: &CancellationToken,
        domain: &str,
        _token: &str,
        key_authorization: &str,
    ) -> Result<()> {
        let fqdn = challenge_fqdn(domain);
        let value = challenge_value(key_authorization);
        self.logger.scope(self.ensure(ctx, &fqdn, &value)).await
    }

    async fn clean_up(
        &self,
        ctx: &CancellationToken,
        domain: &str,
        _token: &str,
        key_authorization: &str,
    ) -> Result<()> {
        let fqdn = challenge_fqdn(domain);
        let value = challenge_value(key_authorization);
        self.logger.scope(self.remove(ctx, &fqdn, &value)).await
    }

    fn timeout(&self) -> (Duration, Duration) {
        (self.timing.propagation_timeout, self.timing.polling_interval)
    }

    fn set_logger(&self, dispatch: Dispatch) {
        self.logger.set(dispatch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn record(id: &str, value: &str) -> TxtRecord {
        TxtRecord {
            id: id.to_string(),
            name: "_acme-challenge.example.com".to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn test_timing_defaults() {
        assert_eq!(ChallengeTiming::from_seconds(None, None), ChallengeTiming::default());
        let timing = ChallengeTiming::from_seconds(Some(300), Some(0));
        assert_eq!(timing.propagation_timeout, Duration::from_secs(300));
        assert_eq!(timing.polling_interval, DEFAULT_POLLING_INTERVAL);
    }

    #[tokio::test]
    async fn test_present_creates_when_absent() {
        let value = challenge_value("keyauth");
        let mut api = MockDnsRecordApi::new();
        api.expect_vendor().return_const("mockdns");
        api.expect_find_txt_records()
            .withf(|fqdn| fqdn == "_acme-challenge.example.com")
            .times(1)
            .returning(|_| Ok(Vec::new()));
        api.expect_create_txt_record()
            .withf(move |fqdn, v, ttl| fqdn == "_acme-challenge.example.com" && v == value && *ttl == 60)
            .times(1)
            .returning(|fqdn, v, _| {
                Ok(TxtRecord {
                    id: "1".into(),
                    name: fqdn.to_string(),
                    value: v.to_string(),
                })
            });

        let challenger = DnsChallenger::new("mockdns", api, ChallengeTiming::default());
        challenger
            .present(&CancellationToken::new(), "*.example.com", "token", "keyauth")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_present_keeps_sibling_record() {
        let mut api = MockDnsRecordApi::new();
        api.expect_vendor().return_const("mockdns");
        api.expect_find_txt_records()
            .returning(|_| Ok(vec![record("7", "sibling")]));
        api.expect_create_txt_record()
            .times(1)
            .returning(|fqdn, v, _| {
                Ok(TxtRecord {
                    id: "8".into(),
                    name: fqdn.to_string(),
                    value: v.to_string(),
                })
            });
        api.expect_delete_record().never();

        let challenger = DnsChallenger::new("mockdns", api, ChallengeTiming::default());
        challenger
            .present(&CancellationToken::new(), "example.com", "token", "keyauth")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_clean_up_swallows_not_found() {
        let value = challenge_value("keyauth");
        let mut api = MockDnsRecordApi::new();
        api.expect_vendor().return_const("mockdns");
        api.expect_find_txt_records()
            .returning(move |_| Ok(vec![record("9", &value)]));
        api.expect_delete_record()
            .times(1)
            .returning(|r| Err(Error::not_found("mockdns", &r.id)));

        let challenger = DnsChallenger::new("mockdns", api, ChallengeTiming::default());
        challenger
            .clean_up(&CancellationToken::new(), "example.com", "token", "keyauth")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_errors_name_vendor_and_operation() {
        let mut api = MockDnsRecordApi::new();
        api.expect_vendor().return_const("mockdns");
        api.expect_find_txt_records()
            .returning(|_| Err(Error::transport("mockdns", "GET /records", "connection refused")));

        let challenger = DnsChallenger::new("mockdns", api, ChallengeTiming::default());
        let err = challenger
            .present(&CancellationToken::new(), "example.com", "token", "keyauth")
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("mockdns"));
        assert!(message.contains("find_txt_records"));
    }

    #[tokio::test]
    async fn test_cancelled_present_writes_nothing() {
        let mut api = MockDnsRecordApi::new();
        api.expect_vendor().return_const("mockdns");
        api.expect_find_txt_records().returning(|_| Ok(Vec::new()));
        api.expect_create_txt_record().never();

        let ctx = CancellationToken::new();
        ctx.cancel();
        let challenger = DnsChallenger::new("mockdns", api, ChallengeTiming::default());
        let err = challenger.present(&ctx, "example.com", "t", "k").await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
