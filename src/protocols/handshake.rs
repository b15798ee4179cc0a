// TLS Handshake Wire - Constructs ClientHello messages and parses server flights
//
// The parser is deliberately lenient: it accepts handshake messages split across
// records, ignores trailing garbage once a ServerHello has been seen, and stops
// at the first alert.

use super::{Extension, Protocol};
use crate::Result;
use crate::constants::*;
use crate::error::TlsError;
use bytes::{BufMut, BytesMut};

/// ClientHello message builder
pub struct ClientHelloBuilder {
    min_protocol: Protocol,
    max_protocol: Protocol,
    cipher_suites: Vec<u16>,
    extensions: Vec<Extension>,
    session_id: Vec<u8>,
    compression_methods: Vec<u8>,
    random: [u8; 32],
}

impl ClientHelloBuilder {
    /// Create a builder offering exactly one protocol version
    pub fn new(protocol: Protocol) -> Self {
        Self::with_range(protocol, protocol)
    }

    /// Create a builder offering every version in [min, max]
    pub fn with_range(min_protocol: Protocol, max_protocol: Protocol) -> Self {
        let mut random = [0u8; 32];
        // First 4 bytes are Unix time
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or_default();
        random[0..4].copy_from_slice(&timestamp.to_be_bytes());
        use rand::RngCore;
        rand::thread_rng().fill_bytes(&mut random[4..]);

        Self {
            min_protocol,
            max_protocol,
            cipher_suites: Vec::new(),
            extensions: Vec::new(),
            session_id: Vec::new(),
            compression_methods: vec![0],
            random,
        }
    }

    /// Add cipher suite by hex code
    pub fn add_cipher(&mut self, hexcode: u16) -> &mut Self {
        self.cipher_suites.push(hexcode);
        self
    }

    /// Add multiple cipher suites
    pub fn add_ciphers(&mut self, hexcodes: &[u16]) -> &mut Self {
        self.cipher_suites.extend_from_slice(hexcodes);
        self
    }

    pub fn add_extension(&mut self, extension: Extension) -> &mut Self {
        self.extensions.push(extension);
        self
    }

    /// Add Server Name Indication (SNI)
    pub fn add_sni(&mut self, hostname: &str) -> &mut Self {
        let mut data = BytesMut::new();
        data.put_u16((3 + hostname.len()) as u16);
        // Name type (0 = hostname)
        data.put_u8(0);
        data.put_u16(hostname.len() as u16);
        data.put_slice(hostname.as_bytes());

        self.extensions
            .push(Extension::new(EXTENSION_SERVER_NAME, data.to_vec()));
        self
    }

    /// Add supported groups (elliptic curves)
    pub fn add_supported_groups(&mut self, curves: &[u16]) -> &mut Self {
        let mut data = BytesMut::new();
        data.put_u16((curves.len() * 2) as u16);
        for curve in curves {
            data.put_u16(*curve);
        }

        self.extensions
            .push(Extension::new(EXTENSION_SUPPORTED_GROUPS, data.to_vec()));
        self
    }

    /// Add signature algorithms as (hash, signature) pairs
    pub fn add_signature_algorithms(&mut self, algorithms: &[(u8, u8)]) -> &mut Self {
        let mut data = BytesMut::new();
        data.put_u16((algorithms.len() * 2) as u16);
        for (hash, sig) in algorithms {
            data.put_u8(*hash);
            data.put_u8(*sig);
        }

        self.extensions.push(Extension::new(0x000d, data.to_vec()));
        self
    }

    /// Add ALPN (Application-Layer Protocol Negotiation)
    pub fn add_alpn(&mut self, protocols: &[&str]) -> &mut Self {
        let mut data = BytesMut::new();
        let total_len: usize = protocols.iter().map(|p| 1 + p.len()).sum();
        data.put_u16(total_len as u16);
        for protocol in protocols {
            data.put_u8(protocol.len() as u8);
            data.put_slice(protocol.as_bytes());
        }

        self.extensions
            .push(Extension::new(EXTENSION_ALPN, data.to_vec()));
        self
    }

    /// Add ec_point_formats extension (uncompressed only)
    pub fn add_ec_point_formats(&mut self) -> &mut Self {
        self.extensions
            .push(Extension::new(EXTENSION_EC_POINT_FORMATS, vec![1, 0]));
        self
    }

    pub fn add_session_ticket(&mut self) -> &mut Self {
        self.extensions.push(Extension::new(0x0023, vec![]));
        self
    }

    pub fn add_extended_master_secret(&mut self) -> &mut Self {
        self.extensions.push(Extension::new(0x0017, vec![]));
        self
    }

    pub fn add_renegotiation_info(&mut self) -> &mut Self {
        self.extensions.push(Extension::new(0xff01, vec![0]));
        self
    }

    /// Add supported versions (TLS 1.3)
    pub fn add_supported_versions(&mut self, versions: &[u16]) -> &mut Self {
        let mut data = BytesMut::new();
        data.put_u8((versions.len() * 2) as u8);
        for version in versions {
            data.put_u16(*version);
        }

        self.extensions
            .push(Extension::new(EXTENSION_SUPPORTED_VERSIONS, data.to_vec()));
        self
    }

    /// Add an X25519 key_share extension (TLS 1.3)
    pub fn add_key_share(&mut self) -> &mut Self {
        use rand::rngs::OsRng;
        use x25519_dalek::{EphemeralSecret, PublicKey};

        let secret = EphemeralSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        let public_key = public.as_bytes();

        let mut data = BytesMut::new();
        data.put_u16((4 + public_key.len()) as u16);
        data.put_u16(0x001d);
        data.put_u16(public_key.len() as u16);
        data.put_slice(public_key);

        self.extensions.push(Extension::new(0x0033, data.to_vec()));
        self
    }

    /// Add PSK key exchange modes (psk_dhe_ke)
    pub fn add_psk_key_exchange_modes(&mut self) -> &mut Self {
        self.extensions.push(Extension::new(0x002d, vec![1, 1]));
        self
    }

    /// Build the complete ClientHello record
    pub fn build(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();

        buf.put_u8(CONTENT_TYPE_HANDSHAKE);
        let record_version = match self.min_protocol {
            Protocol::SSLv3 => 0x0300,
            _ => 0x0301,
        };
        buf.put_u16(record_version);

        let length_pos = buf.len();
        buf.put_u16(0);

        let handshake_start = buf.len();
        buf.put_u8(HANDSHAKE_TYPE_CLIENT_HELLO);

        let handshake_length_pos = buf.len();
        buf.put_u8(0);
        buf.put_u16(0);

        let hello_start = buf.len();

        // TLS 1.3 is negotiated through supported_versions (RFC 8446 4.1.2)
        let client_version = self.max_protocol.min(Protocol::TLS12).as_hex();
        buf.put_u16(client_version);
        buf.put_slice(&self.random);

        buf.put_u8(self.session_id.len() as u8);
        buf.put_slice(&self.session_id);

        buf.put_u16((self.cipher_suites.len() * 2) as u16);
        for cipher in &self.cipher_suites {
            buf.put_u16(*cipher);
        }

        buf.put_u8(self.compression_methods.len() as u8);
        buf.put_slice(&self.compression_methods);

        if !self.extensions.is_empty() {
            let extensions_start = buf.len();
            buf.put_u16(0);

            for ext in &self.extensions {
                buf.put_u16(ext.extension_type);
                buf.put_u16(ext.data.len() as u16);
                buf.put_slice(&ext.data);
            }

            let extensions_len = buf.len() - extensions_start - 2;
            buf[extensions_start..extensions_start + 2]
                .copy_from_slice(&(extensions_len as u16).to_be_bytes());
        }

        let handshake_len = buf.len() - hello_start;
        buf[handshake_length_pos] = ((handshake_len >> 16) & 0xff) as u8;
        buf[handshake_length_pos + 1..handshake_length_pos + 3]
            .copy_from_slice(&((handshake_len & 0xffff) as u16).to_be_bytes());

        let record_len = buf.len() - handshake_start;
        buf[length_pos..length_pos + 2].copy_from_slice(&(record_len as u16).to_be_bytes());

        buf.to_vec()
    }

    /// Build with the default extension set for the configured version range
    pub fn build_with_defaults(&mut self, hostname: Option<&str>) -> Vec<u8> {
        if let Some(host) = hostname
            && !host.is_empty()
        {
            self.add_sni(host);
        }

        self.add_ec_point_formats();
        self.add_supported_groups(&[
            0x001d, // x25519
            0x0017, // secp256r1
            0x0018, // secp384r1
            0x0019, // secp521r1
        ]);
        self.add_session_ticket();
        self.add_signature_algorithms(&[
            (0x04, 0x03), // ecdsa_secp256r1_sha256
            (0x05, 0x03), // ecdsa_secp384r1_sha384
            (0x06, 0x03), // ecdsa_secp521r1_sha512
            (0x08, 0x07), // ed25519
            (0x08, 0x04), // rsa_pss_rsae_sha256
            (0x08, 0x05), // rsa_pss_rsae_sha384
            (0x08, 0x06), // rsa_pss_rsae_sha512
            (0x04, 0x01), // rsa_pkcs1_sha256
            (0x05, 0x01), // rsa_pkcs1_sha384
            (0x06, 0x01), // rsa_pkcs1_sha512
            (0x02, 0x01), // rsa_pkcs1_sha1
        ]);
        self.add_extended_master_secret();
        self.add_renegotiation_info();

        if self.max_protocol >= Protocol::TLS13 {
            let versions: Vec<u16> =
                Protocol::range_descending(self.min_protocol, self.max_protocol)
                    .iter()
                    .map(|p| p.as_hex())
                    .collect();
            self.add_supported_versions(&versions);
            self.add_psk_key_exchange_modes();
            self.add_key_share();
        }

        self.build()
    }
}

/// Bounds-checked big-endian reader over a handshake body
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(TlsError::ParseError {
                message: format!(
                    "truncated message: need {} bytes at offset {}, have {}",
                    n,
                    self.pos,
                    self.remaining()
                ),
            });
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.bytes(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u24(&mut self) -> Result<usize> {
        let b = self.bytes(3)?;
        Ok(u32::from_be_bytes([0, b[0], b[1], b[2]]) as usize)
    }

    fn extensions(&mut self) -> Result<Vec<Extension>> {
        let mut extensions = Vec::new();
        if self.remaining() < 2 {
            return Ok(extensions);
        }
        let total = self.u16()? as usize;
        let mut block = Reader::new(self.bytes(total)?);
        while block.remaining() >= 4 {
            let extension_type = block.u16()?;
            let len = block.u16()? as usize;
            let data = block.bytes(len)?.to_vec();
            extensions.push(Extension::new(extension_type, data));
        }
        Ok(extensions)
    }
}

/// Fields of a ClientHello needed for JA3
#[derive(Debug, Clone)]
pub struct ClientHello {
    pub version: u16,
    pub cipher_suites: Vec<u16>,
    pub extensions: Vec<Extension>,
}

impl ClientHello {
    /// Parse a ClientHello record (record header included)
    pub fn parse(record: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(record);
        if reader.u8()? != CONTENT_TYPE_HANDSHAKE {
            return Err(TlsError::ParseError {
                message: "not a handshake record".to_string(),
            });
        }
        reader.bytes(4)?;
        if reader.u8()? != HANDSHAKE_TYPE_CLIENT_HELLO {
            return Err(TlsError::ParseError {
                message: "not a ClientHello".to_string(),
            });
        }
        let len = reader.u24()?;
        let mut body = Reader::new(reader.bytes(len)?);

        let version = body.u16()?;
        body.bytes(32)?;
        let session_len = body.u8()? as usize;
        body.bytes(session_len)?;

        let cipher_len = body.u16()? as usize;
        let cipher_bytes = body.bytes(cipher_len)?;
        let cipher_suites = cipher_bytes
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();

        let compression_len = body.u8()? as usize;
        body.bytes(compression_len)?;

        let extensions = body.extensions()?;

        Ok(Self {
            version,
            cipher_suites,
            extensions,
        })
    }

    pub fn supported_groups(&self) -> Vec<u16> {
        self.extensions
            .iter()
            .find(|e| e.extension_type == EXTENSION_SUPPORTED_GROUPS)
            .map(|e| {
                e.data
                    .get(2..)
                    .unwrap_or_default()
                    .chunks_exact(2)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn point_formats(&self) -> Vec<u8> {
        self.extensions
            .iter()
            .find(|e| e.extension_type == EXTENSION_EC_POINT_FORMATS)
            .and_then(|e| e.data.get(1..))
            .map(|formats| formats.to_vec())
            .unwrap_or_default()
    }
}

/// ServerHello message
#[derive(Debug, Clone)]
pub struct ServerHello {
    /// Legacy version field as sent
    pub version: u16,
    pub random: [u8; 32],
    pub session_id: Vec<u8>,
    pub cipher_suite: u16,
    pub compression: u8,
    pub extensions: Vec<Extension>,
}

impl ServerHello {
    /// Parse a ServerHello handshake body (after type and length)
    pub fn parse_body(body: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(body);
        let version = reader.u16()?;
        let mut random = [0u8; 32];
        random.copy_from_slice(reader.bytes(32)?);
        let session_len = reader.u8()? as usize;
        let session_id = reader.bytes(session_len)?.to_vec();
        let cipher_suite = reader.u16()?;
        let compression = reader.u8()?;
        let extensions = reader.extensions()?;

        Ok(Self {
            version,
            random,
            session_id,
            cipher_suite,
            compression,
            extensions,
        })
    }

    /// Version actually negotiated, honouring supported_versions
    pub fn negotiated_version(&self) -> Option<Protocol> {
        let selected = self
            .get_extension(EXTENSION_SUPPORTED_VERSIONS)
            .and_then(|e| e.data.get(0..2))
            .map(|b| u16::from_be_bytes([b[0], b[1]]))
            .unwrap_or(self.version);
        Protocol::from_wire(selected)
    }

    pub fn cipher_hex(&self) -> String {
        format!("{:04x}", self.cipher_suite)
    }

    pub fn extension_ids(&self) -> Vec<u16> {
        self.extensions.iter().map(|e| e.extension_type).collect()
    }

    pub fn get_extension(&self, ext_type: u16) -> Option<&Extension> {
        self.extensions
            .iter()
            .find(|e| e.extension_type == ext_type)
    }

    /// Selected ALPN protocol, if any
    pub fn alpn(&self) -> Option<String> {
        let ext = self.get_extension(EXTENSION_ALPN)?;
        let len = *ext.data.get(2)? as usize;
        ext.data
            .get(3..3 + len)
            .map(|p| String::from_utf8_lossy(p).into_owned())
    }
}

/// Everything the server sent before the key exchange completes
#[derive(Debug, Clone, Default)]
pub struct ServerFlight {
    pub server_hello: Option<ServerHello>,
    /// Raw ServerHello handshake message (type + length + body)
    pub server_hello_raw: Option<Vec<u8>>,
    /// DER certificates, leaf first
    pub certificates: Vec<Vec<u8>>,
    /// (level, description) of the first alert received
    pub alert: Option<(u8, u8)>,
    pub hello_done: bool,
    /// Encrypted records followed the ServerHello (TLS 1.3)
    pub encrypted: bool,
}

impl ServerFlight {
    /// Parse as much of the server's first flight as `data` contains
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut flight = ServerFlight::default();
        let mut handshake = Vec::new();
        let mut offset = 0;

        while offset + 5 <= data.len() {
            let content_type = data[offset];
            let record_length = u16::from_be_bytes([data[offset + 3], data[offset + 4]]) as usize;

            if !(0x14..=0x18).contains(&content_type) || data[offset + 1] != 0x03 {
                if offset == 0 {
                    return Err(TlsError::ParseError {
                        message: format!("not a TLS record (first byte 0x{:02x})", content_type),
                    });
                }
                break;
            }

            offset += 5;
            if offset + record_length > data.len() {
                // Lenient: keep the partial fragment of a handshake record
                if content_type == CONTENT_TYPE_HANDSHAKE {
                    handshake.extend_from_slice(&data[offset..]);
                }
                break;
            }
            let fragment = &data[offset..offset + record_length];
            offset += record_length;

            match content_type {
                CONTENT_TYPE_HANDSHAKE => handshake.extend_from_slice(fragment),
                CONTENT_TYPE_ALERT => {
                    if fragment.len() >= 2 && flight.alert.is_none() {
                        flight.alert = Some((fragment[0], fragment[1]));
                    }
                    break;
                }
                // change_cipher_spec is a TLS 1.3 middlebox-compat no-op
                0x14 => {}
                _ => {
                    flight.encrypted = true;
                    break;
                }
            }
        }

        let mut reader = Reader::new(&handshake);
        while reader.remaining() >= 4 {
            let start = reader.pos;
            let msg_type = reader.u8()?;
            let len = reader.u24()?;
            if reader.remaining() < len {
                break;
            }
            let body = reader.bytes(len)?;

            match msg_type {
                HANDSHAKE_TYPE_SERVER_HELLO => {
                    flight.server_hello = Some(ServerHello::parse_body(body)?);
                    flight.server_hello_raw = Some(handshake[start..start + 4 + len].to_vec());
                }
                HANDSHAKE_TYPE_CERTIFICATE => {
                    flight.certificates = parse_certificate_list(body)?;
                }
                HANDSHAKE_TYPE_SERVER_HELLO_DONE => {
                    flight.hello_done = true;
                    break;
                }
                _ => {}
            }
        }

        Ok(flight)
    }

    /// Whether reading more bytes can change the outcome
    pub fn is_complete(&self) -> bool {
        if self.alert.is_some() || self.hello_done || self.encrypted {
            return true;
        }
        match &self.server_hello {
            Some(hello) => hello.negotiated_version() == Some(Protocol::TLS13),
            None => false,
        }
    }
}

/// Parse the TLS 1.0-1.2 Certificate message body
fn parse_certificate_list(body: &[u8]) -> Result<Vec<Vec<u8>>> {
    let mut reader = Reader::new(body);
    let total = reader.u24()?;
    let mut list = Reader::new(reader.bytes(total.min(reader.remaining()))?);
    let mut certificates = Vec::new();
    while list.remaining() >= 3 {
        let len = list.u24()?;
        certificates.push(list.bytes(len)?.to_vec());
    }
    Ok(certificates)
}

/// Human-readable alert description (RFC 8446 Section 6)
pub fn alert_description(code: u8) -> &'static str {
    match code {
        0 => "close_notify",
        10 => "unexpected_message",
        20 => "bad_record_mac",
        40 => "handshake_failure",
        42 => "bad_certificate",
        47 => "illegal_parameter",
        50 => "decode_error",
        70 => "protocol_version",
        71 => "insufficient_security",
        80 => "internal_error",
        86 => "inappropriate_fallback",
        109 => "missing_extension",
        112 => "unrecognized_name",
        120 => "no_application_protocol",
        _ => "unknown",
    }
}
