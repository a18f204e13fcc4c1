//! Semantic certificate equality
//!
//! Two certificates are "the same issuance" when their Common Name, Subject
//! Alternative Names and validity window agree. Byte comparison is only a
//! fast path: PEM re-wrapping, appended chains or whitespace make it unreliable.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::crypto::x509::CertificateIdentity;

/// How Subject Alternative Names are compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SanMatch {
    /// Element-wise, for vendors that preserve certificate order
    Ordered,
    /// Set equality, for vendors that reorder or deduplicate names
    #[default]
    Unordered,
}

/// Raw PEM equality, ignoring surrounding whitespace
pub fn pem_equal(a: &str, b: &str) -> bool {
    a.trim() == b.trim()
}

pub fn common_names_equal(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

pub fn subject_alt_names_equal(a: &[String], b: &[String], mode: SanMatch) -> bool {
    match mode {
        SanMatch::Ordered => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.eq_ignore_ascii_case(y))
        }
        SanMatch::Unordered => {
            let left: BTreeSet<String> = a.iter().map(|n| n.to_ascii_lowercase()).collect();
            let right: BTreeSet<String> = b.iter().map(|n| n.to_ascii_lowercase()).collect();
            left == right
        }
    }
}

/// Field-by-field comparison of two parsed identities
pub fn identities_equal(a: &CertificateIdentity, b: &CertificateIdentity, mode: SanMatch) -> bool {
    common_names_equal(&a.common_name, &b.common_name)
        && subject_alt_names_equal(&a.subject_alt_names, &b.subject_alt_names, mode)
        && a.not_before == b.not_before
        && a.not_after == b.not_after
}

/// Compare a PEM returned by a vendor against the certificate being uploaded
///
/// `target` must be the identity parsed from `target_pem`. A `remote_pem` that
/// fails to parse never matches.
pub fn pem_matches_identity(
    remote_pem: &str,
    target_pem: &str,
    target: &CertificateIdentity,
    mode: SanMatch,
) -> bool {
    if pem_equal(remote_pem, target_pem) {
        return true;
    }

    match CertificateIdentity::from_pem(remote_pem) {
        Ok(remote) => identities_equal(&remote, target, mode),
        Err(_) => false,
    }
}

/// Compare two PEM certificates; a parse failure on either side is "not equal"
pub fn certificates_equal(a_pem: &str, b_pem: &str, mode: SanMatch) -> bool {
    match CertificateIdentity::from_pem(b_pem) {
        Ok(b) => pem_matches_identity(a_pem, b_pem, &b, mode),
        Err(_) => false,
    }
}
