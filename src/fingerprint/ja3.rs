// JA3 TLS Client Fingerprinting
// Reference: https://github.com/salesforce/ja3

use crate::Result;
use crate::constants::EXTENSION_PADDING;
use crate::protocols::handshake::ClientHello;
use crate::protocols::is_grease;
use serde::{Deserialize, Serialize};

/// JA3 string and its MD5
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ja3Fingerprint {
    /// SSLVersion,Ciphers,Extensions,Curves,PointFormats
    pub ja3_string: String,
    pub ja3_hash: String,
}

impl Ja3Fingerprint {
    pub fn from_client_hello(hello: &ClientHello) -> Self {
        let ciphers: Vec<u16> = hello
            .cipher_suites
            .iter()
            .copied()
            .filter(|c| !is_grease(*c))
            .collect();
        let extensions: Vec<u16> = hello
            .extensions
            .iter()
            .map(|e| e.extension_type)
            .filter(|t| !is_grease(*t) && *t != EXTENSION_PADDING)
            .collect();
        let curves: Vec<u16> = hello
            .supported_groups()
            .into_iter()
            .filter(|c| !is_grease(*c))
            .collect();
        let point_formats = hello.point_formats();

        let ja3_string = [
            hello.version.to_string(),
            join_dash(&ciphers),
            join_dash(&extensions),
            join_dash(&curves),
            join_dash(&point_formats),
        ]
        .join(",");
        let ja3_hash = format!("{:x}", md5::compute(ja3_string.as_bytes()));

        Self {
            ja3_string,
            ja3_hash,
        }
    }

    /// Fingerprint a raw ClientHello record
    pub fn from_record(record: &[u8]) -> Result<Self> {
        Ok(Self::from_client_hello(&ClientHello::parse(record)?))
    }
}

pub(crate) fn join_dash<T: ToString>(values: &[T]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::Extension;

    #[test]
    fn test_ja3_string_filters_grease_and_padding() {
        let hello = ClientHello {
            version: 0x0303,
            cipher_suites: vec![0x0a0a, 0xc02f, 0x1301],
            extensions: vec![
                Extension::new(0x1a1a, vec![]),
                Extension::new(0x0000, vec![]),
                Extension::new(0x000a, vec![0x00, 0x06, 0x2a, 0x2a, 0x00, 0x1d, 0x00, 0x17]),
                Extension::new(0x000b, vec![0x01, 0x00]),
                Extension::new(0x0015, vec![0x00; 4]),
            ],
        };

        let fp = Ja3Fingerprint::from_client_hello(&hello);
        assert_eq!(fp.ja3_string, "771,49199-4865,0-10-11,29-23,0");
        assert_eq!(fp.ja3_hash, format!("{:x}", md5::compute(fp.ja3_string.as_bytes())));
        assert_eq!(fp.ja3_hash.len(), 32);
    }

    #[test]
    fn test_ja3_of_built_hello() {
        let record = crate::protocols::handshake::ClientHelloBuilder::with_range(
            crate::protocols::Protocol::TLS10,
            crate::protocols::Protocol::TLS12,
        )
        .add_ciphers(&[0xc02f, 0x002f])
        .build_with_defaults(Some("ja3.example"));

        let fp = Ja3Fingerprint::from_record(&record).unwrap();
        assert!(fp.ja3_string.starts_with("771,49199-47,"));
    }

    #[test]
    fn test_empty_fields_stay_positional() {
        let hello = ClientHello {
            version: 0x0301,
            cipher_suites: vec![0x002f],
            extensions: vec![],
        };
        assert_eq!(Ja3Fingerprint::from_client_hello(&hello).ja3_string, "769,47,,,");
    }
}
