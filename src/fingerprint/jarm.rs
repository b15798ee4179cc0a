// JARM active server fingerprinting
// Reference: https://github.com/salesforce/jarm
//
// Ten crafted ClientHellos, one connection each. Every answer is reduced to
// "cipher|version|alpn|extensions" and the ten answers are folded into a
// 62 character fuzzy hash.

use super::jarm_probes::{JarmProbe, PROBES};
use crate::protocols::handshake::ServerFlight;
use crate::resolver::Target;
use crate::utils::Dialer;
use futures::future::join_all;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{debug, trace};

/// Hash reported when no probe got a ServerHello
pub const ZERO_HASH: &str = "00000000000000000000000000000000000000000000000000000000000000";

const FAILED_PROBE: &str = "|||";

/// Bytes read per probe; enough for the ServerHello and the start of the next message
const READ_LIMIT: usize = 1484;

#[derive(Debug, Clone)]
pub struct JarmFingerprinter {
    dialer: Dialer,
    timeout: Duration,
}

impl JarmFingerprinter {
    pub fn new(dialer: Dialer, timeout: Duration) -> Self {
        Self { dialer, timeout }
    }

    /// Run all probes against `target` and return the fuzzy hash
    pub async fn fingerprint(&self, target: &Target) -> String {
        let hostname = target.server_name();
        let answers = join_all(PROBES.iter().map(|probe| self.send_probe(target, hostname, probe))).await;
        let hash = raw_hash_to_fuzzy_hash(&answers);
        debug!("JARM {} -> {}", target, hash);
        hash
    }

    async fn send_probe(&self, target: &Target, hostname: &str, probe: &JarmProbe) -> String {
        let mut stream = match self.dialer.dial(target).await {
            Ok(stream) => stream,
            Err(e) => {
                trace!("JARM dial {} failed: {}", target, e);
                return FAILED_PROBE.to_string();
            }
        };

        let exchange = async {
            stream.write_all(&probe.build(hostname)).await?;
            let mut buffer = vec![0u8; READ_LIMIT];
            let mut filled = 0;
            while filled < READ_LIMIT {
                let n = stream.read(&mut buffer[filled..]).await?;
                if n == 0 {
                    break;
                }
                filled += n;
                if let Ok(flight) = ServerFlight::parse(&buffer[..filled])
                    && (flight.server_hello.is_some() || flight.alert.is_some())
                {
                    break;
                }
            }
            buffer.truncate(filled);
            Ok::<_, std::io::Error>(buffer)
        };

        match timeout(self.timeout, exchange).await {
            Ok(Ok(data)) => summarize_answer(&data),
            Ok(Err(e)) => {
                trace!("JARM probe to {} failed: {}", target, e);
                FAILED_PROBE.to_string()
            }
            Err(_) => FAILED_PROBE.to_string(),
        }
    }
}

/// Reduce a raw server answer to "cipher|version|alpn|extensions"
pub fn summarize_answer(data: &[u8]) -> String {
    let Ok(flight) = ServerFlight::parse(data) else {
        return FAILED_PROBE.to_string();
    };
    if flight.alert.is_some() {
        return FAILED_PROBE.to_string();
    }
    let Some(hello) = flight.server_hello else {
        return FAILED_PROBE.to_string();
    };

    let extensions: Vec<String> = hello
        .extension_ids()
        .iter()
        .map(|id| format!("{:04x}", id))
        .collect();
    format!(
        "{}|{:04x}|{}|{}",
        hello.cipher_hex(),
        hello.version,
        hello.alpn().unwrap_or_default(),
        extensions.join("-")
    )
}

pub fn raw_hash_to_fuzzy_hash(answers: &[String]) -> String {
    if answers.iter().all(|a| a == FAILED_PROBE) {
        return ZERO_HASH.to_string();
    }

    let mut fuzzy = String::new();
    let mut alpn_and_extensions = String::new();
    for answer in answers {
        let parts: Vec<&str> = answer.split('|').collect();
        let [cipher, version, alpn, extensions] = parts.as_slice() else {
            return ZERO_HASH.to_string();
        };
        fuzzy.push_str(&cipher_index(cipher));
        fuzzy.push(version_char(version));
        alpn_and_extensions.push_str(alpn);
        alpn_and_extensions.push_str(extensions);
    }

    let digest = hex::encode(Sha256::digest(alpn_and_extensions.as_bytes()));
    fuzzy.push_str(&digest[..32]);
    fuzzy
}

const CIPHER_LIST_ORDER: [u16; 69] = [
    0x0004, 0x0005, 0x0007, 0x000a, 0x0016, 0x002f, 0x0033, 0x0035, 0x0039, 0x003c, 0x003d,
    0x0041, 0x0045, 0x0067, 0x006b, 0x0084, 0x0088, 0x009a, 0x009c, 0x009d, 0x009e, 0x009f,
    0x00ba, 0x00be, 0x00c0, 0x00c4, 0xc007, 0xc008, 0xc009, 0xc00a, 0xc011, 0xc012, 0xc013,
    0xc014, 0xc023, 0xc024, 0xc027, 0xc028, 0xc02b, 0xc02c, 0xc02f, 0xc030, 0xc060, 0xc061,
    0xc072, 0xc073, 0xc076, 0xc077, 0xc09c, 0xc09d, 0xc09e, 0xc09f, 0xc0a0, 0xc0a1, 0xc0a2,
    0xc0a3, 0xc0ac, 0xc0ad, 0xc0ae, 0xc0af, 0xcc13, 0xcc14, 0xcca8, 0xcca9, 0x1301, 0x1302,
    0x1303, 0x1304, 0x1305,
];

/// 1-based position in the canonical cipher order, two hex digits
fn cipher_index(cipher_hex: &str) -> String {
    let Ok(code) = u16::from_str_radix(cipher_hex, 16) else {
        return "00".to_string();
    };
    let position = CIPHER_LIST_ORDER
        .iter()
        .position(|c| *c == code)
        .unwrap_or(CIPHER_LIST_ORDER.len());
    format!("{:02x}", position + 1)
}

/// 'a' plus the last hex digit of the version
fn version_char(version_hex: &str) -> char {
    if version_hex.len() < 4 {
        return '0';
    }
    version_hex
        .chars()
        .nth(3)
        .and_then(|c| c.to_digit(16))
        .and_then(|d| char::from_u32('a' as u32 + d))
        .unwrap_or('0')
}
