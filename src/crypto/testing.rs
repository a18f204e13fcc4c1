//! Real certificates for tests, issued with rcgen

use rcgen::{date_time_ymd, Certificate, CertificateParams, DistinguishedName, DnType};

pub struct IssuedCertificate {
    pub cert_pem: String,
    pub key_pem: String,
}

/// Self-signed certificate with rcgen's default validity window
pub fn issue(common_name: &str, sans: &[&str]) -> IssuedCertificate {
    build(params(common_name, sans))
}

pub fn issue_with_validity(
    common_name: &str,
    sans: &[&str],
    not_before: (i32, u8, u8),
    not_after: (i32, u8, u8),
) -> IssuedCertificate {
    let mut params = params(common_name, sans);
    params.not_before = date_time_ymd(not_before.0, not_before.1, not_before.2);
    params.not_after = date_time_ymd(not_after.0, not_after.1, not_after.2);
    build(params)
}

fn params(common_name: &str, sans: &[&str]) -> CertificateParams {
    let mut params = CertificateParams::new(sans.iter().map(|s| s.to_string()).collect::<Vec<_>>());
    let mut name = DistinguishedName::new();
    name.push(DnType::CommonName, common_name);
    params.distinguished_name = name;
    params
}

fn build(params: CertificateParams) -> IssuedCertificate {
    let cert = Certificate::from_params(params).expect("certificate parameters are valid");
    IssuedCertificate {
        cert_pem: cert.serialize_pem().expect("certificate serializes"),
        key_pem: cert.serialize_private_key_pem(),
    }
}
