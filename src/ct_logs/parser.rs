// CT Log Entry Parser
//
// MerkleTreeLeaf layout (RFC 6962 Section 3.4):
//   version(1) leaf_type(1) timestamp(8) entry_type(2) entry...
// X.509 entries carry the certificate inline. Precert entries only carry the
// TBSCertificate, so the full precertificate is read from extra_data instead.

use super::client::RawLogEntry;
use crate::Result;
use crate::certificates::Certificate;
use crate::error::TlsError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const LEAF_HEADER_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    X509,
    Precert,
}

/// A parsed log entry
#[derive(Debug, Clone, Serialize)]
pub struct CtLogEntry {
    pub source_id: String,
    pub index: u64,
    pub timestamp: DateTime<Utc>,
    pub entry_type: EntryType,
    pub certificate: Certificate,
}

impl CtLogEntry {
    pub fn parse(source_id: &str, index: u64, raw: &RawLogEntry) -> Result<Self> {
        let leaf = decode(&raw.leaf_input, "leaf_input")?;
        if leaf.len() < LEAF_HEADER_LEN {
            return Err(parse_error(format!("leaf_input too short: {} bytes", leaf.len())));
        }
        if leaf[0] != 0 || leaf[1] != 0 {
            return Err(parse_error(format!(
                "unsupported leaf version {} / type {}",
                leaf[0], leaf[1]
            )));
        }

        let mut ts = [0u8; 8];
        ts.copy_from_slice(&leaf[2..10]);
        let millis = u64::from_be_bytes(ts);
        let timestamp = DateTime::<Utc>::from_timestamp_millis(millis as i64)
            .ok_or_else(|| parse_error(format!("timestamp {} out of range", millis)))?;

        let (entry_type, der) = match u16::from_be_bytes([leaf[10], leaf[11]]) {
            0 => (EntryType::X509, read_u24_prefixed(&leaf[LEAF_HEADER_LEN..])?.to_vec()),
            1 => {
                // PrecertChainEntry: pre_certificate, then the chain
                let extra = decode(&raw.extra_data, "extra_data")?;
                (EntryType::Precert, read_u24_prefixed(&extra)?.to_vec())
            }
            other => return Err(parse_error(format!("unknown entry type {}", other))),
        };

        Ok(Self {
            source_id: source_id.to_string(),
            index,
            timestamp,
            entry_type,
            certificate: Certificate::from_der(&der)?,
        })
    }
}

fn decode(field: &str, name: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(field)
        .map_err(|e| parse_error(format!("{} is not base64: {}", name, e)))
}

fn read_u24_prefixed(data: &[u8]) -> Result<&[u8]> {
    let [a, b, c, rest @ ..] = data else {
        return Err(parse_error("missing certificate length".to_string()));
    };
    let len = u32::from_be_bytes([0, *a, *b, *c]) as usize;
    rest.get(..len).ok_or_else(|| {
        parse_error(format!(
            "certificate length {} exceeds {} remaining bytes",
            len,
            rest.len()
        ))
    })
}

fn parse_error(message: String) -> TlsError {
    TlsError::ParseError { message }
}
