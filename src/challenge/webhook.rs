//! Generic webhook DNS provider
//!
//! Talks to a small record API exposed by an in-house DNS system:
//!
//! ```text
//! GET    {url}/records?name={fqdn}&type=TXT   -> {"records": [{"id", "name", "value"}]}
//!                                                 (404 means no records)
//! POST   {url}/records                         -> {"id": "..."}
//! DELETE {url}/records/{id}                    (404 means already gone)
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::challenge::{ChallengeTiming, DnsChallenger, DnsRecordApi, TxtRecord};
use crate::error::Error;
use crate::types::Result;
use crate::utils::http;

const VENDOR: &str = "webhook";

/// Registry configuration for the `webhook` challenger
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookDnsConfig {
    /// Base URL of the record API
    pub url: String,
    /// Header carrying `api_token`; bearer auth when unset
    #[serde(default)]
    pub auth_header: Option<String>,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    #[serde(default)]
    pub dns_propagation_timeout: Option<u64>,
    #[serde(default)]
    pub dns_polling_interval: Option<u64>,
    #[serde(default)]
    pub dns_ttl: Option<u32>,
}

pub fn new_challenger(config: WebhookDnsConfig) -> Result<DnsChallenger<WebhookDnsApi>> {
    let timing = ChallengeTiming::from_seconds(config.dns_propagation_timeout, config.dns_polling_interval);
    let ttl = config.dns_ttl;
    let mut challenger = DnsChallenger::new(VENDOR, WebhookDnsApi::new(config)?, timing);
    if let Some(ttl) = ttl {
        challenger = challenger.with_ttl(ttl);
    }
    Ok(challenger)
}

#[derive(Debug)]
pub struct WebhookDnsApi {
    client: Client,
    base_url: String,
    auth_header: Option<String>,
    api_token: Option<String>,
}

impl WebhookDnsApi {
    pub fn new(config: WebhookDnsConfig) -> Result<Self> {
        let url = http::parse_endpoint("url", &config.url)?;
        let timeout = config
            .timeout_seconds
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
            .unwrap_or(http::DEFAULT_TIMEOUT);

        if config.auth_header.is_some() && config.api_token.is_none() {
            return Err(Error::Config("authHeader is set but apiToken is missing".into()));
        }

        Ok(Self {
            client: http::build_client(VENDOR, timeout)?,
            base_url: url.as_str().trim_end_matches('/').to_string(),
            auth_header: config.auth_header,
            api_token: config.api_token.filter(|t| !t.is_empty()),
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match (&self.auth_header, &self.api_token) {
            (Some(header), Some(token)) => request.header(header.as_str(), token.as_str()),
            (None, Some(token)) => request.bearer_auth(token),
            _ => request,
        }
    }

    fn record_url(&self, id: &str) -> String {
        format!("{}/records/{}", self.base_url, id)
    }
}

#[async_trait]
impl DnsRecordApi for WebhookDnsApi {
    fn vendor(&self) -> &'static str {
        VENDOR
    }

    async fn find_txt_records(&self, fqdn: &str) -> Result<Vec<TxtRecord>> {
        const OP: &str = "GET /records";

        let request = self
            .client
            .get(format!("{}/records", self.base_url))
            .query(&[("name", fqdn), ("type", "TXT")]);
        let response = http::send(VENDOR, OP, self.authorize(request)).await?;
        if http::is_not_found(&response) {
            debug!(fqdn, "No TXT records at webhook");
            return Ok(Vec::new());
        }
        let response = http::ensure_success(VENDOR, OP, response).await?;

        let listing: RecordListResponse = response
            .json()
            .await
            .map_err(|e| Error::vendor(VENDOR, OP, "InvalidResponse", e))?;

        // The endpoint filters by name; keep only exact matches anyway
        Ok(listing
            .records
            .into_iter()
            .filter(|r| r.name.trim_end_matches('.').eq_ignore_ascii_case(fqdn))
            .map(|r| TxtRecord {
                id: r.id,
                name: fqdn.to_string(),
                value: r.value,
            })
            .collect())
    }

    async fn create_txt_record(&self, fqdn: &str, value: &str, ttl: u32) -> Result<TxtRecord> {
        const OP: &str = "POST /records";

        let body = RecordRequest {
            name: fqdn,
            record_type: "TXT",
            value,
            ttl,
        };
        let request = self.client.post(format!("{}/records", self.base_url)).json(&body);
        let response = http::send(VENDOR, OP, self.authorize(request)).await?;
        let response = http::ensure_success(VENDOR, OP, response).await?;

        let created: CreateRecordResponse = response
            .json()
            .await
            .map_err(|e| Error::vendor(VENDOR, OP, "InvalidResponse", e))?;
        if created.id.is_empty() {
            return Err(Error::vendor(VENDOR, OP, "InvalidResponse", "empty record id"));
        }

        debug!(record_id = %created.id, fqdn, "TXT record created via webhook");
        Ok(TxtRecord {
            id: created.id,
            name: fqdn.to_string(),
            value: value.to_string(),
        })
    }

    async fn delete_record(&self, record: &TxtRecord) -> Result<()> {
        const OP: &str = "DELETE /records";

        let request = self.client.delete(self.record_url(&record.id));
        let response = http::send(VENDOR, OP, self.authorize(request)).await?;
        if http::is_not_found(&response) {
            return Err(Error::not_found(VENDOR, format!("record {}", record.id)));
        }
        http::ensure_success(VENDOR, OP, response).await?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct RecordRequest<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    record_type: &'a str,
    value: &'a str,
    ttl: u32,
}

#[derive(Debug, Deserialize)]
struct RecordListResponse {
    #[serde(default)]
    records: Vec<RecordEntry>,
}

#[derive(Debug, Deserialize)]
struct RecordEntry {
    id: String,
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct CreateRecordResponse {
    id: String,
}
