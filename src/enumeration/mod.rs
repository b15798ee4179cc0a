// Enumerators - repeated single-parameter handshakes discovering what a server accepts
//
// Both enumerators run inside the target's worker slot and finish before the
// slot is released. Inner fan-out is bounded by `cipher_concurrency`.

pub mod ciphers;
pub mod versions;

use crate::ciphers::CipherLevel;
use crate::protocols::Protocol;
use serde::Serialize;
use std::collections::BTreeSet;

pub use ciphers::CipherEnumerator;
pub use versions::VersionEnumerator;

/// A suite the server accepted when offered alone
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SupportedCipher {
    pub name: String,
    pub level: CipherLevel,
}

/// Everything the enumerators found for one target
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnumerationResult {
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub versions: BTreeSet<Protocol>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub ciphers: BTreeSet<SupportedCipher>,
}

impl EnumerationResult {
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty() && self.ciphers.is_empty()
    }

    /// Version names, highest first
    pub fn version_names(&self) -> Vec<String> {
        self.versions.iter().rev().map(|p| p.to_string()).collect()
    }
}
