use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};

/// ACME challenge record label
pub const ACME_CHALLENGE_LABEL: &str = "_acme-challenge";

/// Default TTL for challenge records (seconds)
pub const CHALLENGE_TTL: u32 = 60;

/// Strip the wildcard prefix; `*.example.com` is validated at `example.com`
pub fn normalize_domain(domain: &str) -> &str {
    let domain = domain.trim_end_matches('.');
    domain.strip_prefix("*.").unwrap_or(domain)
}

/// Full challenge record name for `domain`
pub fn challenge_fqdn(domain: &str) -> String {
    format!("{}.{}", ACME_CHALLENGE_LABEL, normalize_domain(domain))
}

/// TXT record value: base64url(SHA-256(key authorization)), unpadded
pub fn challenge_value(key_authorization: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(key_authorization.as_bytes()))
}
