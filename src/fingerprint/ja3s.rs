// JA3S TLS Server Fingerprinting
// Reference: https://github.com/salesforce/ja3

use super::ja3::join_dash;
use crate::Result;
use crate::constants::HANDSHAKE_TYPE_SERVER_HELLO;
use crate::error::TlsError;
use crate::protocols::handshake::ServerHello;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ja3sFingerprint {
    /// SSLVersion,Cipher,Extensions
    pub ja3s_string: String,
    pub ja3s_hash: String,
}

impl Ja3sFingerprint {
    pub fn from_server_hello(hello: &ServerHello) -> Self {
        let ja3s_string = format!(
            "{},{},{}",
            hello.version,
            hello.cipher_suite,
            join_dash(&hello.extension_ids())
        );
        let ja3s_hash = format!("{:x}", md5::compute(ja3s_string.as_bytes()));
        Self {
            ja3s_string,
            ja3s_hash,
        }
    }

    /// Fingerprint a raw ServerHello handshake message (type and length included)
    pub fn from_message(message: &[u8]) -> Result<Self> {
        match message {
            [HANDSHAKE_TYPE_SERVER_HELLO, _, _, _, body @ ..] => {
                Ok(Self::from_server_hello(&ServerHello::parse_body(body)?))
            }
            _ => Err(TlsError::ParseError {
                message: "not a ServerHello message".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::Extension;

    fn hello() -> ServerHello {
        ServerHello {
            version: 0x0303,
            random: [0; 32],
            session_id: vec![],
            cipher_suite: 0xc02f,
            compression: 0,
            extensions: vec![
                Extension::new(0xff01, vec![0x00]),
                Extension::new(0x000b, vec![0x01, 0x00]),
                Extension::new(0x0023, vec![]),
            ],
        }
    }

    #[test]
    fn test_ja3s_string() {
        let fp = Ja3sFingerprint::from_server_hello(&hello());
        assert_eq!(fp.ja3s_string, "771,49199,65281-11-35");
        assert_eq!(fp.ja3s_hash.len(), 32);
    }

    #[test]
    fn test_from_message_rejects_other_types() {
        assert!(Ja3sFingerprint::from_message(&[0x0b, 0x00, 0x00, 0x00]).is_err());
        assert!(Ja3sFingerprint::from_message(&[]).is_err());
    }

    #[test]
    fn test_from_message() {
        // version, random, empty session id, cipher, compression, no extensions
        let mut body = vec![0x03, 0x03];
        body.extend_from_slice(&[0u8; 32]);
        body.extend_from_slice(&[0x00, 0x13, 0x01, 0x00]);
        let mut message = vec![HANDSHAKE_TYPE_SERVER_HELLO, 0x00, 0x00, body.len() as u8];
        message.extend_from_slice(&body);

        let fp = Ja3sFingerprint::from_message(&message).unwrap();
        assert_eq!(fp.ja3s_string, "771,4865,");
    }
}
