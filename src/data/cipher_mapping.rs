// Cipher Mapping Parser - Parses cipher-mapping.txt

use crate::Result;
use crate::ciphers::{CipherLevel, CipherSuite};
use crate::error::TlsError;
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

lazy_static! {
    /// Global cipher database loaded from the embedded table
    pub static ref CIPHER_DB: Arc<CipherDatabase> = Arc::new(CipherDatabase::load());
}

/// Database of all known cipher suites
pub struct CipherDatabase {
    /// Suites in table order
    ordered: Vec<CipherSuite>,
    by_hexcode: HashMap<String, usize>,
    by_openssl_name: HashMap<String, usize>,
    by_iana_name: HashMap<String, usize>,
}

impl CipherDatabase {
    /// Load cipher database from embedded data
    pub fn load() -> Self {
        let data = include_str!("../../data/cipher-mapping.txt");
        Self::parse(data)
    }

    /// Parse cipher-mapping.txt format
    /// Format: 0xHH,0xHH - OpenSSLName  IANAName  Version  Kx=X  Au=Y  Enc=Z  Mac=W
    pub fn parse(data: &str) -> Self {
        let mut db = Self {
            ordered: Vec::new(),
            by_hexcode: HashMap::new(),
            by_openssl_name: HashMap::new(),
            by_iana_name: HashMap::new(),
        };

        for (line_num, line) in data.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            match Self::parse_line(line) {
                Ok(cipher) => {
                    let idx = db.ordered.len();
                    db.by_hexcode.insert(cipher.hexcode.clone(), idx);
                    db.by_openssl_name.insert(cipher.openssl_name.clone(), idx);
                    db.by_iana_name.insert(cipher.iana_name.clone(), idx);
                    db.ordered.push(cipher);
                }
                Err(e) => warn!("cipher table line {} skipped: {}", line_num + 1, e),
            }
        }

        db
    }

    /// Parse a single line from cipher-mapping.txt
    fn parse_line(line: &str) -> Result<CipherSuite> {
        let (hexcode, rest) = line.split_once(" - ").ok_or_else(|| TlsError::ParseError {
            message: "missing ' - ' separator".to_string(),
        })?;

        // "0xCC,0x14" -> "cc14"
        let hexcode = hexcode
            .trim()
            .replace("0x", "")
            .replace(',', "")
            .to_lowercase();

        let fields: Vec<&str> = rest.split_whitespace().collect();
        if fields.len() < 3 {
            return Err(TlsError::ParseError {
                message: "not enough fields".to_string(),
            });
        }

        let openssl_name = fields[0].to_string();
        let iana_name = fields[1].to_string();
        let protocol = fields[2].to_string();

        let mut kx = String::new();
        let mut auth = String::new();
        let mut enc = String::new();
        let mut mac = String::new();

        for field in &fields[3..] {
            if let Some(value) = field.strip_prefix("Kx=") {
                kx = value.to_string();
            } else if let Some(value) = field.strip_prefix("Au=") {
                auth = value.to_string();
            } else if let Some(value) = field.strip_prefix("Enc=") {
                enc = value.to_string();
            } else if let Some(value) = field.strip_prefix("Mac=") {
                mac = value.to_string();
            }
        }

        let bits = Self::extract_bits(&enc);
        let export = openssl_name.contains("EXP") || iana_name.contains("EXPORT");

        Ok(CipherSuite {
            hexcode,
            openssl_name,
            iana_name,
            protocol,
            key_exchange: kx,
            authentication: auth,
            encryption: enc,
            mac,
            bits,
            export,
        })
    }

    /// Extract bit strength from encryption string (e.g., "AES(256)" -> 256)
    fn extract_bits(enc: &str) -> u16 {
        if let Some(start) = enc.find('(')
            && let Some(end) = enc.find(')')
            && let Ok(bits) = enc[start + 1..end].parse::<u16>()
        {
            return bits;
        }

        if enc.contains("3DES") {
            return 168;
        }
        if enc.contains("NULL") || enc.starts_with("None") {
            return 0;
        }

        128
    }

    pub fn get_by_hexcode(&self, hexcode: &str) -> Option<&CipherSuite> {
        self.by_hexcode
            .get(&hexcode.to_lowercase())
            .map(|&i| &self.ordered[i])
    }

    pub fn get_by_code(&self, code: u16) -> Option<&CipherSuite> {
        self.get_by_hexcode(&format!("{:04x}", code))
    }

    pub fn get_by_openssl_name(&self, name: &str) -> Option<&CipherSuite> {
        self.by_openssl_name.get(name).map(|&i| &self.ordered[i])
    }

    pub fn get_by_iana_name(&self, name: &str) -> Option<&CipherSuite> {
        self.by_iana_name.get(name).map(|&i| &self.ordered[i])
    }

    /// Display name for a negotiated suite; IANA name when known
    pub fn name_for_code(&self, code: u16) -> String {
        self.get_by_code(code)
            .map(|c| c.iana_name.clone())
            .unwrap_or_else(|| format!("0x{:04X}", code))
    }

    /// All suites in table order
    pub fn all_ciphers(&self) -> &[CipherSuite] {
        &self.ordered
    }

    pub fn by_level(&self, level: CipherLevel) -> Vec<&CipherSuite> {
        self.ordered.iter().filter(|c| c.level() == level).collect()
    }

    /// Default offer list for a primary probe: everything except NULL/anon/export
    pub fn default_offer(&self) -> Vec<u16> {
        self.ordered
            .iter()
            .filter(|c| c.bits > 0 && !c.export && c.authentication != "None")
            .map(|c| c.code())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.ordered.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cipher_line() {
        let line = "0xCC,0x14 - ECDHE-ECDSA-CHACHA20-POLY1305-OLD  TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256  TLSv1.2  Kx=ECDH  Au=ECDSA  Enc=CHACHA20/POLY1305(256)  Mac=AEAD";

        let cipher = CipherDatabase::parse_line(line).unwrap();

        assert_eq!(cipher.hexcode, "cc14");
        assert_eq!(cipher.protocol, "TLSv1.2");
        assert_eq!(cipher.key_exchange, "ECDH");
        assert_eq!(cipher.authentication, "ECDSA");
        assert_eq!(cipher.bits, 256);
        assert!(!cipher.export);
        assert!(cipher.has_forward_secrecy());
        assert!(cipher.is_aead());
        assert_eq!(cipher.level(), CipherLevel::Secure);
    }

    #[test]
    fn test_parse_export_cipher() {
        let line = "0x00,0x03 - EXP-RC4-MD5  TLS_RSA_EXPORT_WITH_RC4_40_MD5  SSLv3  Kx=RSA(512)  Au=RSA  Enc=RC4(40)  Mac=MD5";

        let cipher = CipherDatabase::parse_line(line).unwrap();

        assert_eq!(cipher.hexcode, "0003");
        assert_eq!(cipher.bits, 40);
        assert!(cipher.export);
        assert_eq!(cipher.level(), CipherLevel::Insecure);
    }

    #[test]
    fn test_malformed_line_is_skipped() {
        let db = CipherDatabase::parse("garbage line\n0x00,0x2F - AES128-SHA  TLS_RSA_WITH_AES_128_CBC_SHA  SSLv3  Kx=RSA  Au=RSA  Enc=AES(128)  Mac=SHA1\n");
        assert_eq!(db.count(), 1);
    }

    #[test]
    fn test_embedded_table() {
        let db = CIPHER_DB.as_ref();
        assert!(db.count() > 50);

        let c02f = db.get_by_code(0xc02f).unwrap();
        assert_eq!(c02f.openssl_name, "ECDHE-RSA-AES128-GCM-SHA256");
        assert_eq!(db.get_by_openssl_name("AES128-SHA").unwrap().hexcode, "002f");
        assert_eq!(db.name_for_code(0x1301), "TLS_AES_128_GCM_SHA256");
        assert_eq!(db.name_for_code(0xfefe), "0xFEFE");

        // Every level group is populated
        for level in [CipherLevel::Secure, CipherLevel::Weak, CipherLevel::Insecure] {
            assert!(!db.by_level(level).is_empty(), "no {} suites", level);
        }
    }

    #[test]
    fn test_default_offer_excludes_anonymous_and_null() {
        let db = CIPHER_DB.as_ref();
        let offer = db.default_offer();
        assert!(offer.contains(&0xc02f));
        assert!(!offer.contains(&0x0001)); // NULL-MD5
        assert!(!offer.contains(&0x0034)); // ADH-AES128-SHA
    }
}
