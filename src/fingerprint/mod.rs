// Fingerprint module - certificate hashes, JA3/JA3S and JARM

pub mod ja3;
pub mod ja3s;
pub mod jarm;
pub mod jarm_probes;

pub use ja3::Ja3Fingerprint;
pub use ja3s::Ja3sFingerprint;
pub use jarm::JarmFingerprinter;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
}

impl FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "md5" => Ok(HashAlgorithm::Md5),
            "sha1" => Ok(HashAlgorithm::Sha1),
            "sha256" => Ok(HashAlgorithm::Sha256),
            other => Err(format!("unknown hash '{}', expected md5, sha1 or sha256", other)),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HashAlgorithm::Md5 => "md5",
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Sha256 => "sha256",
        })
    }
}

/// Lowercase hex digests of a DER certificate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateHashes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl CertificateHashes {
    pub fn compute(der: &[u8], algorithms: &[HashAlgorithm]) -> Self {
        let mut hashes = Self::default();
        for algorithm in algorithms {
            match algorithm {
                HashAlgorithm::Md5 => hashes.md5 = Some(format!("{:x}", md5::compute(der))),
                HashAlgorithm::Sha1 => hashes.sha1 = Some(hex::encode(openssl::sha::sha1(der))),
                HashAlgorithm::Sha256 => hashes.sha256 = Some(hex::encode(Sha256::digest(der))),
            }
        }
        hashes
    }

    pub fn is_empty(&self) -> bool {
        self.md5.is_none() && self.sha1.is_none() && self.sha256.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digests() {
        let hashes = CertificateHashes::compute(
            b"abc",
            &[HashAlgorithm::Md5, HashAlgorithm::Sha1, HashAlgorithm::Sha256],
        );
        assert_eq!(hashes.md5.as_deref(), Some("900150983cd24fb0d6963f7d28e17f72"));
        assert_eq!(
            hashes.sha1.as_deref(),
            Some("a9993e364706816aba3e25717850c26c9cd0d89d")
        );
        assert_eq!(
            hashes.sha256.as_deref(),
            Some("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
    }

    #[test]
    fn test_only_requested_digests() {
        let hashes = CertificateHashes::compute(b"abc", &[HashAlgorithm::Sha256]);
        assert!(hashes.md5.is_none() && hashes.sha1.is_none());
        assert!(!hashes.is_empty());
        assert!(CertificateHashes::compute(b"abc", &[]).is_empty());
    }

    #[test]
    fn test_parse_algorithm() {
        assert_eq!("SHA1".parse::<HashAlgorithm>(), Ok(HashAlgorithm::Sha1));
        assert!("crc32".parse::<HashAlgorithm>().is_err());
    }
}
