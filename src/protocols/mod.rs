// Protocols module - TLS/SSL protocol versions and wire helpers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// TLS/SSL protocol versions the engine can offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub enum Protocol {
    #[serde(rename = "ssl30")]
    SSLv3,
    #[serde(rename = "tls10")]
    TLS10,
    #[serde(rename = "tls11")]
    TLS11,
    #[serde(rename = "tls12")]
    TLS12,
    #[serde(rename = "tls13")]
    TLS13,
}

impl Protocol {
    /// Get protocol version as wire value
    pub fn as_hex(&self) -> u16 {
        match self {
            Protocol::SSLv3 => 0x0300,
            Protocol::TLS10 => 0x0301,
            Protocol::TLS11 => 0x0302,
            Protocol::TLS12 => 0x0303,
            Protocol::TLS13 => 0x0304,
        }
    }

    /// Get protocol name
    pub fn name(&self) -> &'static str {
        match self {
            Protocol::SSLv3 => "SSLv3",
            Protocol::TLS10 => "TLS 1.0",
            Protocol::TLS11 => "TLS 1.1",
            Protocol::TLS12 => "TLS 1.2",
            Protocol::TLS13 => "TLS 1.3",
        }
    }

    /// Short form used in records and on the command line (e.g. "tls12")
    pub fn short_name(&self) -> &'static str {
        match self {
            Protocol::SSLv3 => "ssl30",
            Protocol::TLS10 => "tls10",
            Protocol::TLS11 => "tls11",
            Protocol::TLS12 => "tls12",
            Protocol::TLS13 => "tls13",
        }
    }

    /// s_client flag forcing exactly this version
    pub fn openssl_flag(&self) -> &'static str {
        match self {
            Protocol::SSLv3 => "-ssl3",
            Protocol::TLS10 => "-tls1",
            Protocol::TLS11 => "-tls1_1",
            Protocol::TLS12 => "-tls1_2",
            Protocol::TLS13 => "-tls1_3",
        }
    }

    /// Check if protocol is deprecated
    pub fn is_deprecated(&self) -> bool {
        matches!(self, Protocol::SSLv3 | Protocol::TLS10 | Protocol::TLS11)
    }

    /// All versions, highest first
    pub fn descending() -> Vec<Protocol> {
        vec![
            Protocol::TLS13,
            Protocol::TLS12,
            Protocol::TLS11,
            Protocol::TLS10,
            Protocol::SSLv3,
        ]
    }

    /// Versions within [min, max], highest first
    pub fn range_descending(min: Protocol, max: Protocol) -> Vec<Protocol> {
        Self::descending()
            .into_iter()
            .filter(|p| *p >= min && *p <= max)
            .collect()
    }

    /// Map a wire value back to a version
    pub fn from_wire(value: u16) -> Option<Protocol> {
        match value {
            0x0300 => Some(Protocol::SSLv3),
            0x0301 => Some(Protocol::TLS10),
            0x0302 => Some(Protocol::TLS11),
            0x0303 => Some(Protocol::TLS12),
            0x0304 => Some(Protocol::TLS13),
            _ => None,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ssl30" | "sslv3" | "ssl 3.0" => Ok(Protocol::SSLv3),
            "tls10" | "tls 1.0" | "tlsv1.0" | "tlsv1" => Ok(Protocol::TLS10),
            "tls11" | "tls 1.1" | "tlsv1.1" => Ok(Protocol::TLS11),
            "tls12" | "tls 1.2" | "tlsv1.2" => Ok(Protocol::TLS12),
            "tls13" | "tls 1.3" | "tlsv1.3" => Ok(Protocol::TLS13),
            _ => Err(format!("Unknown protocol: {}", s)),
        }
    }
}

/// TLS extension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extension {
    pub extension_type: u16,
    pub data: Vec<u8>,
}

impl Extension {
    pub fn new(extension_type: u16, data: Vec<u8>) -> Self {
        Self {
            extension_type,
            data,
        }
    }
}

/// GREASE values (RFC 8701) follow 0xXaXa with matching high nibbles
pub fn is_grease(value: u16) -> bool {
    let low_byte = (value & 0xff) as u8;
    let high_byte = ((value >> 8) & 0xff) as u8;
    (low_byte & 0x0f) == 0x0a && (high_byte & 0x0f) == 0x0a && (low_byte >> 4) == (high_byte >> 4)
}

pub mod handshake;
