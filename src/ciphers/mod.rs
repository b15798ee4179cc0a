// Ciphers module - Cipher suite definitions and security levels

use crate::protocols::Protocol;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Cipher suite information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherSuite {
    pub hexcode: String,
    pub openssl_name: String,
    pub iana_name: String,
    pub protocol: String,
    pub key_exchange: String,
    pub authentication: String,
    pub encryption: String,
    pub mac: String,
    pub bits: u16,
    pub export: bool,
}

/// Security level groups used to partition enumeration candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CipherLevel {
    Insecure,
    Weak,
    Secure,
}

impl fmt::Display for CipherLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CipherLevel::Insecure => write!(f, "insecure"),
            CipherLevel::Weak => write!(f, "weak"),
            CipherLevel::Secure => write!(f, "secure"),
        }
    }
}

/// Which level groups to enumerate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CipherLevelFilter {
    #[default]
    All,
    Secure,
    Weak,
    Insecure,
}

impl CipherLevelFilter {
    /// A level is selected when any filter matches; no filters selects all
    pub fn any_matches(filters: &[CipherLevelFilter], level: CipherLevel) -> bool {
        filters.is_empty() || filters.iter().any(|f| f.matches(level))
    }

    pub fn matches(&self, level: CipherLevel) -> bool {
        match self {
            CipherLevelFilter::All => true,
            CipherLevelFilter::Secure => level == CipherLevel::Secure,
            CipherLevelFilter::Weak => level == CipherLevel::Weak,
            CipherLevelFilter::Insecure => level == CipherLevel::Insecure,
        }
    }
}

impl FromStr for CipherLevelFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(CipherLevelFilter::All),
            "secure" => Ok(CipherLevelFilter::Secure),
            "weak" => Ok(CipherLevelFilter::Weak),
            "insecure" => Ok(CipherLevelFilter::Insecure),
            other => Err(format!("unknown cipher type: {}", other)),
        }
    }
}

impl CipherSuite {
    /// Wire value of the suite
    pub fn code(&self) -> u16 {
        u16::from_str_radix(&self.hexcode, 16).unwrap_or_default()
    }

    pub fn is_tls13(&self) -> bool {
        self.protocol.contains("TLSv1.3")
    }

    /// Lowest protocol version the suite is defined for
    pub fn min_protocol(&self) -> Protocol {
        if self.is_tls13() {
            Protocol::TLS13
        } else if self.protocol.contains("TLSv1.2") {
            Protocol::TLS12
        } else {
            Protocol::SSLv3
        }
    }

    /// Highest protocol version the suite can be negotiated under
    pub fn max_protocol(&self) -> Protocol {
        if self.is_tls13() {
            Protocol::TLS13
        } else {
            Protocol::TLS12
        }
    }

    pub fn has_forward_secrecy(&self) -> bool {
        // Every TLS 1.3 suite uses ephemeral key exchange
        if self.is_tls13() {
            return true;
        }

        self.key_exchange.contains("ECDHE")
            || self.key_exchange.contains("DHE")
            || self.openssl_name.contains("ECDHE")
            || self.openssl_name.contains("DHE")
            || self.openssl_name.starts_with("EDH")
            || self.iana_name.contains("ECDHE")
            || self.iana_name.contains("DHE")
    }

    pub fn is_aead(&self) -> bool {
        self.encryption.contains("GCM")
            || self.encryption.contains("CCM")
            || self.encryption.contains("CHACHA20")
    }

    fn is_null(&self) -> bool {
        self.encryption.contains("NULL") || self.encryption.starts_with("None") || self.bits == 0
    }

    fn is_anonymous(&self) -> bool {
        self.authentication == "None" || self.iana_name.contains("_anon_")
    }

    /// Security level of the suite
    pub fn level(&self) -> CipherLevel {
        if self.is_null()
            || self.export
            || self.is_anonymous()
            || self.encryption.contains("RC4")
            || self.encryption.contains("RC2")
            || self.mac == "MD5"
            || self.bits < 112
        {
            CipherLevel::Insecure
        } else if !self.is_aead() || !self.has_forward_secrecy() || self.encryption.contains("3DES")
        {
            CipherLevel::Weak
        } else {
            CipherLevel::Secure
        }
    }
}

pub mod parser;
