//! In-memory DNS provider
//!
//! Behaves like a small hosted-zone API: records live in registered zones,
//! zone ids are resolved through a [`ZoneCache`], and every primitive call is
//! counted so tests can assert on vendor traffic.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::challenge::{ChallengeTiming, DnsChallenger, DnsRecordApi, TxtRecord, ZoneCache};
use crate::error::Error;
use crate::types::Result;

const VENDOR: &str = "mockdns";

/// Registry configuration for the `mock` challenger
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockDnsConfig {
    /// Hosted zones, e.g. `example.com`
    #[serde(default)]
    pub zones: Vec<String>,
    #[serde(default)]
    pub dns_propagation_timeout: Option<u64>,
    #[serde(default)]
    pub dns_polling_interval: Option<u64>,
    #[serde(default)]
    pub dns_ttl: Option<u32>,
}

/// Build a challenger backed by [`InMemoryDnsApi`]
pub fn new_challenger(config: MockDnsConfig) -> Result<DnsChallenger<InMemoryDnsApi>> {
    if config.zones.iter().all(|z| z.trim().is_empty()) {
        return Err(Error::Config("mock challenger requires at least one zone".into()));
    }

    let timing = ChallengeTiming::from_seconds(config.dns_propagation_timeout, config.dns_polling_interval);
    let mut challenger = DnsChallenger::new("mock", InMemoryDnsApi::new(&config.zones), timing);
    if let Some(ttl) = config.dns_ttl {
        challenger = challenger.with_ttl(ttl);
    }
    Ok(challenger)
}

/// Vendor traffic seen by an [`InMemoryDnsApi`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DnsCallCounts {
    pub zone_lookups: usize,
    pub finds: usize,
    pub creates: usize,
    pub deletes: usize,
}

#[derive(Debug, Clone)]
struct StoredRecord {
    zone_id: String,
    record: TxtRecord,
    ttl: u32,
}

#[derive(Debug)]
pub struct InMemoryDnsApi {
    /// zone name -> zone id
    zones: HashMap<String, String>,
    zone_cache: ZoneCache<String>,
    records: Mutex<Vec<StoredRecord>>,
    next_id: AtomicU64,
    zone_lookups: AtomicUsize,
    finds: AtomicUsize,
    creates: AtomicUsize,
    deletes: AtomicUsize,
}

impl InMemoryDnsApi {
    pub fn new<S: AsRef<str>>(zones: &[S]) -> Self {
        let zones = zones
            .iter()
            .map(|z| z.as_ref().trim().trim_end_matches('.').to_ascii_lowercase())
            .filter(|z| !z.is_empty())
            .enumerate()
            .map(|(i, zone)| (zone, format!("zone-{}", i + 1)))
            .collect();

        Self {
            zones,
            zone_cache: ZoneCache::new(),
            records: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            zone_lookups: AtomicUsize::new(0),
            finds: AtomicUsize::new(0),
            creates: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> DnsCallCounts {
        DnsCallCounts {
            zone_lookups: self.zone_lookups.load(Ordering::SeqCst),
            finds: self.finds.load(Ordering::SeqCst),
            creates: self.creates.load(Ordering::SeqCst),
            deletes: self.deletes.load(Ordering::SeqCst),
        }
    }

    /// Records currently stored under `fqdn`
    pub fn records(&self, fqdn: &str) -> Vec<TxtRecord> {
        self.lock_records()
            .iter()
            .filter(|r| r.record.name.eq_ignore_ascii_case(fqdn))
            .map(|r| r.record.clone())
            .collect()
    }

    pub fn ttl_of(&self, record_id: &str) -> Option<u32> {
        self.lock_records()
            .iter()
            .find(|r| r.record.id == record_id)
            .map(|r| r.ttl)
    }

    /// Drop a record behind the provider's back, like a manual edit or TTL expiry
    pub fn remove_externally(&self, record_id: &str) {
        self.lock_records().retain(|r| r.record.id != record_id);
    }

    fn lock_records(&self) -> std::sync::MutexGuard<'_, Vec<StoredRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Longest registered zone containing `fqdn`
    async fn zone_id(&self, fqdn: &str) -> Result<String> {
        let name = fqdn.trim_end_matches('.').to_ascii_lowercase();
        self.zone_cache
            .get_or_try_insert_with(&name, || async {
                self.zone_lookups.fetch_add(1, Ordering::SeqCst);
                self.zones
                    .iter()
                    .filter(|(zone, _)| name == **zone || name.ends_with(&format!(".{}", zone)))
                    .max_by_key(|(zone, _)| zone.len())
                    .map(|(_, id)| id.clone())
                    .ok_or_else(|| Error::vendor(VENDOR, "resolve_zone", "ZoneNotFound", format!("no hosted zone for {}", name)))
            })
            .await
    }
}

#[async_trait]
impl DnsRecordApi for InMemoryDnsApi {
    fn vendor(&self) -> &'static str {
        VENDOR
    }

    async fn find_txt_records(&self, fqdn: &str) -> Result<Vec<TxtRecord>> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        let zone_id = self.zone_id(fqdn).await?;

        Ok(self
            .lock_records()
            .iter()
            .filter(|r| r.zone_id == zone_id && r.record.name.eq_ignore_ascii_case(fqdn))
            .map(|r| r.record.clone())
            .collect())
    }

    async fn create_txt_record(&self, fqdn: &str, value: &str, ttl: u32) -> Result<TxtRecord> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        let zone_id = self.zone_id(fqdn).await?;

        let record = TxtRecord {
            id: self.next_id.fetch_add(1, Ordering::SeqCst).to_string(),
            name: fqdn.to_string(),
            value: value.to_string(),
        };
        self.lock_records().push(StoredRecord {
            zone_id,
            record: record.clone(),
            ttl,
        });
        Ok(record)
    }

    async fn delete_record(&self, record: &TxtRecord) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        let mut records = self.lock_records();
        let before = records.len();
        records.retain(|r| r.record.id != record.id);

        if records.len() == before {
            return Err(Error::not_found(VENDOR, format!("record {}", record.id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::challenge::{challenge_value, AcmeChallenger};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    const FQDN: &str = "_acme-challenge.example.com";

    fn challenger() -> DnsChallenger<InMemoryDnsApi> {
        new_challenger(MockDnsConfig {
            zones: vec!["example.com".into(), "example.org".into()],
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_present_twice_keeps_one_record() {
        let challenger = challenger();
        let ctx = CancellationToken::new();

        challenger.present(&ctx, "example.com", "token", "keyauth").await.unwrap();
        challenger.present(&ctx, "example.com", "token", "keyauth").await.unwrap();

        let records = challenger.api().records(FQDN);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value, challenge_value("keyauth"));
        assert_eq!(challenger.api().calls().creates, 1);
        assert_eq!(challenger.api().ttl_of(&records[0].id), Some(60));
    }

    #[tokio::test]
    async fn test_apex_and_wildcard_challenges_coexist() {
        let challenger = challenger();
        let ctx = CancellationToken::new();

        challenger.present(&ctx, "example.com", "apex-token", "apex-auth").await.unwrap();
        challenger.present(&ctx, "*.example.com", "wild-token", "wild-auth").await.unwrap();

        let mut values: Vec<_> = challenger.api().records(FQDN).into_iter().map(|r| r.value).collect();
        values.sort();
        let mut expected = vec![challenge_value("apex-auth"), challenge_value("wild-auth")];
        expected.sort();
        assert_eq!(values, expected);
        assert_eq!(challenger.api().calls().creates, 2);

        // Cleaning up one leaves the other in place
        challenger.clean_up(&ctx, "example.com", "apex-token", "apex-auth").await.unwrap();
        let remaining = challenger.api().records(FQDN);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].value, challenge_value("wild-auth"));
    }

    #[tokio::test]
    async fn test_clean_up_absent_record_succeeds() {
        let challenger = challenger();
        let ctx = CancellationToken::new();

        challenger.clean_up(&ctx, "example.com", "token", "keyauth").await.unwrap();
        assert_eq!(challenger.api().calls().deletes, 0);
    }

    #[tokio::test]
    async fn test_present_then_clean_up() {
        let challenger = challenger();
        let ctx = CancellationToken::new();

        challenger.present(&ctx, "*.example.com", "token", "keyauth").await.unwrap();
        assert_eq!(challenger.api().records(FQDN).len(), 1);

        challenger.clean_up(&ctx, "*.example.com", "token", "keyauth").await.unwrap();
        assert!(challenger.api().records(FQDN).is_empty());

        // Second cleanup races nothing and still succeeds
        challenger.clean_up(&ctx, "*.example.com", "token", "keyauth").await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_zone_names_vendor_and_operation() {
        let challenger = challenger();
        let err = challenger
            .present(&CancellationToken::new(), "example.net", "token", "keyauth")
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("mockdns"));
        assert!(message.contains("find_txt_records"));
        assert!(message.contains("ZoneNotFound"));
    }

    #[tokio::test]
    async fn test_zone_lookup_is_memoized() {
        let challenger = challenger();
        let ctx = CancellationToken::new();

        for _ in 0..3 {
            challenger.present(&ctx, "example.com", "token", "keyauth").await.unwrap();
        }
        challenger.clean_up(&ctx, "example.com", "token", "keyauth").await.unwrap();

        assert_eq!(challenger.api().calls().zone_lookups, 1);
    }

    #[tokio::test]
    async fn test_concurrent_presents_for_different_domains() {
        let challenger = challenger();
        let ctx = CancellationToken::new();

        let (a, b, c) = tokio::join!(
            challenger.present(&ctx, "example.com", "t", "a"),
            challenger.present(&ctx, "www.example.com", "t", "b"),
            challenger.present(&ctx, "example.org", "t", "c"),
        );
        a.unwrap();
        b.unwrap();
        c.unwrap();

        assert_eq!(challenger.api().records(FQDN).len(), 1);
        assert_eq!(challenger.api().records("_acme-challenge.www.example.com").len(), 1);
        assert_eq!(challenger.api().records("_acme-challenge.example.org").len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_present_makes_no_vendor_call() {
        let challenger = challenger();
        let ctx = CancellationToken::new();
        ctx.cancel();

        let err = challenger.present(&ctx, "example.com", "t", "k").await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(challenger.api().calls(), DnsCallCounts::default());
    }

    #[test]
    fn test_config_validation_and_timing() {
        assert!(matches!(new_challenger(MockDnsConfig::default()), Err(Error::Config(_))));

        let challenger = new_challenger(MockDnsConfig {
            zones: vec!["example.com".into()],
            dns_propagation_timeout: Some(600),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(challenger.timeout(), (Duration::from_secs(600), Duration::from_secs(5)));
    }
}
