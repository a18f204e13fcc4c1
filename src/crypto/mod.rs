pub mod equality;
pub mod x509;

#[cfg(test)]
pub(crate) mod testing;

pub use equality::{certificates_equal, identities_equal, pem_matches_identity, SanMatch};
pub use x509::{key_digest, CertificateIdentity, DigestAlgorithm, KeyNormalization};
