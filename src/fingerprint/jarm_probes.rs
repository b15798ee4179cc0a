// JARM probe builder - the 10 crafted ClientHello packets
//
// Probes vary the offered version, the cipher list and its order, GREASE,
// the ALPN list and the supported_versions extension.

use crate::protocols::Protocol;
use rand::{Rng, RngCore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherList {
    All,
    /// All minus the TLS 1.3 suites
    No13,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherOrder {
    Forward,
    Reverse,
    TopHalf,
    BottomHalf,
    MiddleOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlpnMode {
    Standard,
    /// No h2 or http/1.1
    Rare,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSupport {
    /// supported_versions up to 1.3
    Tls13,
    /// supported_versions up to 1.2
    Tls12,
    /// no supported_versions extension
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JarmProbe {
    pub version: Protocol,
    pub cipher_list: CipherList,
    pub cipher_order: CipherOrder,
    pub grease: bool,
    pub alpn: AlpnMode,
    pub supported_versions: VersionSupport,
    /// Reverse the ALPN and supported_versions lists
    pub reverse_lists: bool,
}

const fn probe(
    version: Protocol,
    cipher_list: CipherList,
    cipher_order: CipherOrder,
    grease: bool,
    alpn: AlpnMode,
    supported_versions: VersionSupport,
    reverse_lists: bool,
) -> JarmProbe {
    JarmProbe {
        version,
        cipher_list,
        cipher_order,
        grease,
        alpn,
        supported_versions,
        reverse_lists,
    }
}

/// The standard probe set, in hashing order
pub const PROBES: [JarmProbe; 10] = [
    probe(Protocol::TLS12, CipherList::All, CipherOrder::Forward, false, AlpnMode::Standard, VersionSupport::Tls12, true),
    probe(Protocol::TLS12, CipherList::All, CipherOrder::Reverse, false, AlpnMode::Standard, VersionSupport::Tls12, false),
    probe(Protocol::TLS12, CipherList::All, CipherOrder::TopHalf, false, AlpnMode::None, VersionSupport::None, false),
    probe(Protocol::TLS12, CipherList::All, CipherOrder::BottomHalf, false, AlpnMode::Rare, VersionSupport::None, false),
    probe(Protocol::TLS12, CipherList::All, CipherOrder::MiddleOut, true, AlpnMode::Rare, VersionSupport::None, true),
    probe(Protocol::TLS11, CipherList::All, CipherOrder::Forward, false, AlpnMode::Standard, VersionSupport::None, false),
    probe(Protocol::TLS13, CipherList::All, CipherOrder::Forward, false, AlpnMode::Standard, VersionSupport::Tls13, true),
    probe(Protocol::TLS13, CipherList::All, CipherOrder::Reverse, false, AlpnMode::Standard, VersionSupport::Tls13, false),
    probe(Protocol::TLS13, CipherList::No13, CipherOrder::Forward, false, AlpnMode::Standard, VersionSupport::Tls13, false),
    probe(Protocol::TLS13, CipherList::All, CipherOrder::MiddleOut, true, AlpnMode::Standard, VersionSupport::Tls13, true),
];

/// Suites offered by every probe, before reordering
pub const JARM_CIPHERS: [u16; 69] = [
    0x0016, 0x0033, 0x0067, 0xc09e, 0xc0a2, 0x009e, 0x0039, 0x006b, 0xc09f, 0xc0a3, 0x009f,
    0x0045, 0x00be, 0x0088, 0x00c4, 0x009a, 0xc008, 0xc009, 0xc023, 0xc0ac, 0xc0ae, 0xc02b,
    0xc00a, 0xc024, 0xc0ad, 0xc0af, 0xc02c, 0xc072, 0xc073, 0xcca9, 0x1302, 0x1301, 0xcc14,
    0xc007, 0xc012, 0xc013, 0xc027, 0xc02f, 0xc014, 0xc028, 0xc030, 0xc060, 0xc061, 0xc076,
    0xc077, 0xcca8, 0x1305, 0x1304, 0x1303, 0xcc13, 0xc011, 0x000a, 0x002f, 0x003c, 0xc09c,
    0xc0a0, 0x009c, 0x0035, 0x003d, 0xc09d, 0xc0a1, 0x009d, 0x0041, 0x00ba, 0x0084, 0x00c0,
    0x0007, 0x0004, 0x0005,
];

const ALPN_STANDARD: &[&str] = &[
    "http/0.9", "http/1.0", "http/1.1", "spdy/1", "spdy/2", "spdy/3", "h2", "h2c", "hq",
];
const ALPN_RARE: &[&str] = &["http/0.9", "http/1.0", "spdy/1", "spdy/2", "spdy/3", "h2c", "hq"];

impl JarmProbe {
    /// Full ClientHello record for `hostname`
    pub fn build(&self, hostname: &str) -> Vec<u8> {
        let mut hello = Vec::new();
        let (record_version, hello_version) = match self.version {
            Protocol::TLS13 => (0x0301u16, 0x0303u16),
            other => (other.as_hex(), other.as_hex()),
        };
        hello.extend_from_slice(&hello_version.to_be_bytes());
        hello.extend_from_slice(&random_bytes(32));
        hello.push(32);
        hello.extend_from_slice(&random_bytes(32));

        let ciphers = self.ciphers();
        hello.extend_from_slice(&((ciphers.len() * 2) as u16).to_be_bytes());
        for cipher in ciphers {
            hello.extend_from_slice(&cipher.to_be_bytes());
        }
        // null compression only
        hello.extend_from_slice(&[0x01, 0x00]);
        hello.extend_from_slice(&self.extensions(hostname));

        let mut handshake = vec![0x01, 0x00];
        handshake.extend_from_slice(&(hello.len() as u16).to_be_bytes());
        handshake.extend_from_slice(&hello);

        let mut record = vec![0x16];
        record.extend_from_slice(&record_version.to_be_bytes());
        record.extend_from_slice(&(handshake.len() as u16).to_be_bytes());
        record.extend_from_slice(&handshake);
        record
    }

    pub fn ciphers(&self) -> Vec<u16> {
        let list: Vec<u16> = match self.cipher_list {
            CipherList::All => JARM_CIPHERS.to_vec(),
            CipherList::No13 => JARM_CIPHERS
                .iter()
                .copied()
                .filter(|c| c >> 8 != 0x13)
                .collect(),
        };
        let mut ordered = reorder(list, self.cipher_order);
        if self.grease {
            ordered.insert(0, random_grease());
        }
        ordered
    }

    fn extensions(&self, hostname: &str) -> Vec<u8> {
        let mut all = Vec::new();
        if self.grease {
            all.extend_from_slice(&random_grease().to_be_bytes());
            all.extend_from_slice(&[0x00, 0x00]);
        }
        all.extend_from_slice(&server_name(hostname));
        // extended_master_secret, max_fragment_length, renegotiation_info
        all.extend_from_slice(&[0x00, 0x17, 0x00, 0x00]);
        all.extend_from_slice(&[0x00, 0x01, 0x00, 0x01, 0x01]);
        all.extend_from_slice(&[0xff, 0x01, 0x00, 0x01, 0x00]);
        // supported_groups, ec_point_formats, session_ticket
        all.extend_from_slice(&[
            0x00, 0x0a, 0x00, 0x0a, 0x00, 0x08, 0x00, 0x1d, 0x00, 0x17, 0x00, 0x18, 0x00, 0x19,
        ]);
        all.extend_from_slice(&[0x00, 0x0b, 0x00, 0x02, 0x01, 0x00]);
        all.extend_from_slice(&[0x00, 0x23, 0x00, 0x00]);
        all.extend_from_slice(&self.alpn_extension());
        // signature_algorithms
        all.extend_from_slice(&[
            0x00, 0x0d, 0x00, 0x14, 0x00, 0x12, 0x04, 0x03, 0x08, 0x04, 0x04, 0x01, 0x05, 0x03,
            0x08, 0x05, 0x05, 0x01, 0x08, 0x06, 0x06, 0x01, 0x02, 0x01,
        ]);
        all.extend_from_slice(&key_share(self.grease));
        // psk_key_exchange_modes
        all.extend_from_slice(&[0x00, 0x2d, 0x00, 0x02, 0x01, 0x01]);
        if self.version == Protocol::TLS13 || self.supported_versions == VersionSupport::Tls12 {
            all.extend_from_slice(&self.supported_versions_extension());
        }

        let mut out = (all.len() as u16).to_be_bytes().to_vec();
        out.extend_from_slice(&all);
        out
    }

    fn alpn_extension(&self) -> Vec<u8> {
        let protocols = match self.alpn {
            AlpnMode::Standard => ALPN_STANDARD,
            AlpnMode::Rare => ALPN_RARE,
            AlpnMode::None => return Vec::new(),
        };
        let mut protocols = protocols.to_vec();
        if self.reverse_lists {
            protocols.reverse();
        }

        let mut list = Vec::new();
        for p in protocols {
            list.push(p.len() as u8);
            list.extend_from_slice(p.as_bytes());
        }
        let mut ext = vec![0x00, 0x10];
        ext.extend_from_slice(&((list.len() + 2) as u16).to_be_bytes());
        ext.extend_from_slice(&(list.len() as u16).to_be_bytes());
        ext.extend_from_slice(&list);
        ext
    }

    fn supported_versions_extension(&self) -> Vec<u8> {
        let mut versions: Vec<u16> = match self.supported_versions {
            VersionSupport::Tls13 => vec![0x0301, 0x0302, 0x0303, 0x0304],
            _ => vec![0x0301, 0x0302, 0x0303],
        };
        if self.reverse_lists {
            versions.reverse();
        }
        if self.grease {
            versions.insert(0, random_grease());
        }

        let mut list = Vec::new();
        for v in versions {
            list.extend_from_slice(&v.to_be_bytes());
        }
        let mut ext = vec![0x00, 0x2b];
        ext.extend_from_slice(&((list.len() + 1) as u16).to_be_bytes());
        ext.push(list.len() as u8);
        ext.extend_from_slice(&list);
        ext
    }
}

pub fn reorder(mut ciphers: Vec<u16>, order: CipherOrder) -> Vec<u16> {
    let len = ciphers.len();
    match order {
        CipherOrder::Forward => ciphers,
        CipherOrder::Reverse => {
            ciphers.reverse();
            ciphers
        }
        CipherOrder::TopHalf => {
            let reversed: Vec<u16> = ciphers.iter().rev().copied().collect();
            let mut out = Vec::new();
            if len % 2 == 1 {
                out.push(ciphers[len / 2]);
            }
            out.extend_from_slice(&reversed[..len / 2]);
            out
        }
        CipherOrder::BottomHalf => {
            let start = if len % 2 == 1 { len / 2 + 1 } else { len / 2 };
            ciphers[start..].to_vec()
        }
        CipherOrder::MiddleOut => {
            let middle = len / 2;
            let mut out = Vec::with_capacity(len);
            if len % 2 == 1 {
                out.push(ciphers[middle]);
                for i in 1..=middle {
                    out.push(ciphers[middle + i]);
                    out.push(ciphers[middle - i]);
                }
            } else {
                out.extend(ciphers[..middle].iter().rev());
                out.extend_from_slice(&ciphers[middle..]);
            }
            out
        }
    }
}

fn server_name(name: &str) -> Vec<u8> {
    let mut entry = vec![0x00];
    entry.extend_from_slice(&(name.len() as u16).to_be_bytes());
    entry.extend_from_slice(name.as_bytes());

    let mut ext = vec![0x00, 0x00];
    ext.extend_from_slice(&((entry.len() + 2) as u16).to_be_bytes());
    ext.extend_from_slice(&(entry.len() as u16).to_be_bytes());
    ext.extend_from_slice(&entry);
    ext
}

fn key_share(grease: bool) -> Vec<u8> {
    let mut shares = Vec::new();
    if grease {
        shares.extend_from_slice(&random_grease().to_be_bytes());
        shares.extend_from_slice(&[0x00, 0x01, 0x00]);
    }
    // x25519, 32 random bytes
    shares.extend_from_slice(&[0x00, 0x1d, 0x00, 0x20]);
    shares.extend_from_slice(&random_bytes(32));

    let mut ext = vec![0x00, 0x33];
    ext.extend_from_slice(&((shares.len() + 2) as u16).to_be_bytes());
    ext.extend_from_slice(&(shares.len() as u16).to_be_bytes());
    ext.extend_from_slice(&shares);
    ext
}

fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

fn random_grease() -> u16 {
    let nibble: u16 = rand::thread_rng().gen_range(0..16);
    let byte = 0x0a | (nibble << 4);
    (byte << 8) | byte
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::handshake::ClientHello;
    use crate::protocols::is_grease;

    #[test]
    fn test_reordering() {
        let list = vec![1, 2, 3, 4];
        assert_eq!(reorder(list.clone(), CipherOrder::Reverse), vec![4, 3, 2, 1]);
        assert_eq!(reorder(list.clone(), CipherOrder::MiddleOut), vec![2, 1, 3, 4]);
        assert_eq!(reorder(list.clone(), CipherOrder::TopHalf), vec![4, 3]);
        assert_eq!(reorder(list, CipherOrder::BottomHalf), vec![3, 4]);

        let odd = vec![1, 2, 3, 4, 5];
        assert_eq!(reorder(odd.clone(), CipherOrder::MiddleOut), vec![3, 4, 2, 5, 1]);
        assert_eq!(reorder(odd.clone(), CipherOrder::TopHalf), vec![3, 5, 4]);
        assert_eq!(reorder(odd, CipherOrder::BottomHalf), vec![4, 5]);
    }

    #[test]
    fn test_no13_list_drops_tls13_suites() {
        let ciphers = PROBES[8].ciphers();
        assert_eq!(ciphers.len(), JARM_CIPHERS.len() - 5);
        assert!(ciphers.iter().all(|c| c >> 8 != 0x13));
    }

    #[test]
    fn test_probes_parse_as_client_hellos() {
        for (i, probe) in PROBES.iter().enumerate() {
            let record = probe.build("jarm.example");
            let hello = ClientHello::parse(&record).unwrap_or_else(|e| panic!("probe {}: {}", i, e));
            assert_eq!(hello.cipher_suites.len(), probe.ciphers().len());
            assert_eq!(is_grease(hello.cipher_suites[0]), probe.grease, "probe {}", i);
            let has_versions = hello.extensions.iter().any(|e| e.extension_type == 0x002b);
            assert_eq!(
                has_versions,
                probe.version == Protocol::TLS13 || probe.supported_versions == VersionSupport::Tls12,
                "probe {}",
                i
            );
        }
    }

    #[test]
    fn test_tls13_probe_record_versions() {
        let record = PROBES[6].build("jarm.example");
        assert_eq!(&record[1..3], &[0x03, 0x01]);
        assert_eq!(&record[9..11], &[0x03, 0x03]);
    }
}
