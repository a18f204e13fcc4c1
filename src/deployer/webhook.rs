//! Webhook deployer
//!
//! POSTs the certificate and key as JSON to a configured endpoint, for
//! targets that accept raw PEM material:
//!
//! ```text
//! POST {url}
//! {"certificate": "...", "privateKey": "...", "commonName": "...", "subjectAltNames": [...]}
//! ```

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, Dispatch};

use crate::crypto::CertificateIdentity;
use crate::deployer::SslDeployer;
use crate::error::Error;
use crate::telemetry::ProviderLogger;
use crate::types::{DeployResult, Result};
use crate::utils::{cancellable, http};

const VENDOR: &str = "webhook";
const OPERATION: &str = "POST certificate";

/// Registry configuration for the `webhook` deployer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookDeployerConfig {
    pub url: String,
    /// Extra request headers, e.g. an API key
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

pub struct WebhookDeployer {
    client: Client,
    url: String,
    headers: Vec<(String, String)>,
    logger: ProviderLogger,
}

impl WebhookDeployer {
    pub fn new(config: WebhookDeployerConfig) -> Result<Self> {
        let url = http::parse_endpoint("url", &config.url)?;
        let timeout = config
            .timeout_seconds
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
            .unwrap_or(http::DEFAULT_TIMEOUT);

        let mut headers: Vec<(String, String)> = config.headers.into_iter().collect();
        headers.sort();
        if let Some((name, _)) = headers.iter().find(|(name, _)| name.trim().is_empty()) {
            return Err(Error::Config(format!("invalid header name {:?}", name)));
        }

        Ok(Self {
            client: http::build_client(VENDOR, timeout)?,
            url: url.to_string(),
            headers,
            logger: ProviderLogger::default(),
        })
    }

    async fn run(&self, ctx: &CancellationToken, cert_pem: &str, key_pem: &str) -> Result<DeployResult> {
        let identity = CertificateIdentity::from_pem(cert_pem)?;
        let payload = DeployPayload {
            certificate: cert_pem,
            private_key: key_pem,
            common_name: &identity.common_name,
            subject_alt_names: &identity.subject_alt_names,
        };

        let mut request = self.client.post(&self.url).json(&payload);
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = cancellable(ctx, OPERATION, http::send(VENDOR, OPERATION, request)).await?;
        let response = http::ensure_success(VENDOR, OPERATION, response).await?;
        let status = response.status().as_u16();

        info!(url = %self.url, status, common_name = %identity.common_name, "Certificate pushed to webhook");
        Ok(DeployResult::default().with("status", status))
    }
}

#[async_trait]
impl SslDeployer for WebhookDeployer {
    fn name(&self) -> &str {
        VENDOR
    }

    async fn deploy(&self, ctx: &CancellationToken, cert_pem: &str, key_pem: &str) -> Result<DeployResult> {
        self.logger.scope(self.run(ctx, cert_pem, key_pem)).await
    }

    fn set_logger(&self, dispatch: Dispatch) {
        self.logger.set(dispatch);
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeployPayload<'a> {
    certificate: &'a str,
    private_key: &'a str,
    common_name: &'a str,
    subject_alt_names: &'a [String],
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::testing;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_config_validation() {
        assert!(matches!(WebhookDeployer::new(WebhookDeployerConfig::default()), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_posts_certificate_payload() {
        let server = MockServer::start().await;
        let issued = testing::issue("example.com", &["example.com", "www.example.com"]);

        Mock::given(method("POST"))
            .and(path("/hooks/tls"))
            .and(header("x-api-key", "k-123"))
            .and(body_partial_json(serde_json::json!({
                "certificate": issued.cert_pem,
                "privateKey": issued.key_pem,
                "commonName": "example.com",
                "subjectAltNames": ["example.com", "www.example.com"]
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let deployer = WebhookDeployer::new(WebhookDeployerConfig {
            url: format!("{}/hooks/tls", server.uri()),
            headers: HashMap::from([("X-Api-Key".to_string(), "k-123".to_string())]),
            timeout_seconds: None,
        })
        .unwrap();

        let result = deployer
            .deploy(&CancellationToken::new(), &issued.cert_pem, &issued.key_pem)
            .await
            .unwrap();
        assert_eq!(result.extended_data["status"], 204);
    }

    #[tokio::test]
    async fn test_non_success_is_vendor_error() {
        let server = MockServer::start().await;
        let issued = testing::issue("example.com", &["example.com"]);

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(422).set_body_string("certificate rejected"))
            .mount(&server)
            .await;

        let deployer = WebhookDeployer::new(WebhookDeployerConfig {
            url: server.uri(),
            ..Default::default()
        })
        .unwrap();

        let err = deployer
            .deploy(&CancellationToken::new(), &issued.cert_pem, &issued.key_pem)
            .await
            .unwrap_err();
        match err {
            Error::Vendor { vendor, code, message, .. } => {
                assert_eq!(vendor, "webhook");
                assert_eq!(code, "422");
                assert_eq!(message, "certificate rejected");
            }
            other => panic!("expected vendor error, got {}", other),
        }
    }
}
