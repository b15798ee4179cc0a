// Certificate Evaluator - misconfiguration flags for an observed chain
//
// Everything that varies between runs (clock, revocation answer, trust store)
// is passed in, so the same inputs always give the same flags.

use super::parser::Certificate;
use super::revocation::{RevocationOutcome, RevocationPolicy};
use super::trust::{ChainVerifier, verifies_own_signature};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MisconfigFlags {
    pub expired: bool,
    pub self_signed: bool,
    pub mismatched: bool,
    pub revoked: bool,
    pub untrusted: bool,
    pub wildcard_certificate: bool,
    /// Set when a HardFail policy turned a checker error into `revoked`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revocation_error: Option<String>,
}

pub struct CertificateEvaluator {
    verifier: Option<Arc<dyn ChainVerifier>>,
    policy: RevocationPolicy,
}

impl CertificateEvaluator {
    /// Without a verifier the untrusted flag is never raised
    pub fn new(verifier: Option<Arc<dyn ChainVerifier>>, policy: RevocationPolicy) -> Self {
        Self { verifier, policy }
    }

    pub fn policy(&self) -> RevocationPolicy {
        self.policy
    }

    /// `revocation` is None when no lookup was requested
    pub fn evaluate(
        &self,
        chain: &[Certificate],
        expected_hostname: Option<&str>,
        now: DateTime<Utc>,
        revocation: Option<&RevocationOutcome>,
    ) -> MisconfigFlags {
        let Some(leaf) = chain.first() else {
            return MisconfigFlags::default();
        };

        let (revoked, revocation_error) = match (revocation, self.policy) {
            (None, _) | (Some(RevocationOutcome::Good), _) => (false, None),
            (Some(RevocationOutcome::Revoked), _) => (true, None),
            (Some(RevocationOutcome::Error(e)), RevocationPolicy::HardFail) => (true, Some(e.clone())),
            (Some(RevocationOutcome::Error(_)), RevocationPolicy::SoftFail) => (false, None),
        };

        MisconfigFlags {
            expired: is_expired(leaf, now),
            self_signed: is_self_signed(leaf),
            mismatched: expected_hostname
                .map(|host| !matches_certificate(leaf, host))
                .unwrap_or(false),
            revoked,
            untrusted: self
                .verifier
                .as_ref()
                .map(|v| !v.is_trusted(chain))
                .unwrap_or(false),
            wildcard_certificate: leaf.is_wildcard(),
            revocation_error,
        }
    }
}

/// `now` outside [not_before, not_after]
pub fn is_expired(cert: &Certificate, now: DateTime<Utc>) -> bool {
    now < cert.not_before || now > cert.not_after
}

pub fn is_self_signed(cert: &Certificate) -> bool {
    cert.is_self_issued() && verifies_own_signature(cert)
}

/// Hostname matches a SAN entry, or the CN
pub fn matches_certificate(cert: &Certificate, hostname: &str) -> bool {
    cert.subject_an
        .iter()
        .chain(cert.subject_cn.iter())
        .any(|pattern| matches_hostname(pattern, hostname))
}

/// Case-insensitive match; a leading `*.` stands for exactly one label
pub fn matches_hostname(pattern: &str, hostname: &str) -> bool {
    let pattern = pattern.trim_end_matches('.').to_ascii_lowercase();
    let hostname = hostname.trim_end_matches('.').to_ascii_lowercase();
    if pattern.is_empty() || hostname.is_empty() {
        return false;
    }

    match pattern.strip_prefix("*.") {
        Some(suffix) => match hostname.split_once('.') {
            Some((label, rest)) => !label.is_empty() && rest == suffix,
            None => false,
        },
        None => pattern == hostname,
    }
}
