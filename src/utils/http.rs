use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use url::Url;

use crate::error::Error;
use crate::types::Result;

/// Default request timeout for vendor HTTP calls
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Validate a configured endpoint; only http and https are accepted
pub fn parse_endpoint(field: &str, raw: &str) -> Result<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(Error::Config(format!("{} is required", field)));
    }

    let url = Url::parse(raw.trim_end_matches('/'))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(Error::Config(format!("{} has unsupported scheme {}", field, other))),
    }
}

pub fn build_client(vendor: &str, timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Config(format!("{}: failed to create HTTP client: {}", vendor, e)))
}

/// Send a request, mapping transport failures to [`Error::Transport`]
pub async fn send(vendor: &str, operation: &str, request: RequestBuilder) -> Result<Response> {
    request
        .send()
        .await
        .map_err(|e| Error::transport(vendor, operation, e))
}

/// Turn a non-2xx response into [`Error::Vendor`] carrying status and body
pub async fn ensure_success(vendor: &str, operation: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(Error::vendor(vendor, operation, status.as_u16(), body.trim()))
}

pub fn is_not_found(response: &Response) -> bool {
    response.status() == StatusCode::NOT_FOUND
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_endpoint() {
        let url = parse_endpoint("url", " https://dns.example.com/api/ ").unwrap();
        assert_eq!(url.as_str(), "https://dns.example.com/api");

        assert!(matches!(parse_endpoint("url", ""), Err(Error::Config(_))));
        assert!(matches!(parse_endpoint("url", "not a url"), Err(Error::Config(_))));
        assert!(matches!(parse_endpoint("url", "ftp://example.com"), Err(Error::Config(_))));
    }
}
