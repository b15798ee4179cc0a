// Cipher Parser - Resolves user-supplied cipher names and hex codes

use super::CipherSuite;
use crate::Result;
use crate::data::CipherDatabase;
use crate::error::TlsError;

/// Resolve one cipher token: OpenSSL name, IANA name, or hex code ("c02f", "0xC02F")
pub fn resolve_cipher<'a>(db: &'a CipherDatabase, token: &str) -> Option<&'a CipherSuite> {
    let token = token.trim();
    if let Some(c) = db
        .get_by_openssl_name(token)
        .or_else(|| db.get_by_iana_name(token))
    {
        return Some(c);
    }

    let hex = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token)
        .replace(",0x", "");
    if hex.len() == 4 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return db.get_by_hexcode(&hex);
    }
    None
}

/// Resolve a list of tokens, each possibly colon- or comma-separated
pub fn parse_cipher_list(db: &CipherDatabase, inputs: &[String]) -> Result<Vec<CipherSuite>> {
    let mut suites: Vec<CipherSuite> = Vec::new();
    for token in inputs
        .iter()
        .flat_map(|s| s.split([':', ',']))
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        let suite = resolve_cipher(db, token).ok_or_else(|| TlsError::CipherError {
            message: format!("unknown cipher suite '{}'", token),
        })?;
        if !suites.iter().any(|s| s.hexcode == suite.hexcode) {
            suites.push(suite.clone());
        }
    }
    Ok(suites)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CIPHER_DB;

    #[test]
    fn test_resolve_by_any_name() {
        let db = CIPHER_DB.as_ref();
        assert_eq!(resolve_cipher(db, "ECDHE-RSA-AES128-GCM-SHA256").unwrap().hexcode, "c02f");
        assert_eq!(resolve_cipher(db, "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256").unwrap().hexcode, "c02f");
        assert_eq!(resolve_cipher(db, "0xC02F").unwrap().hexcode, "c02f");
        assert_eq!(resolve_cipher(db, "1301").unwrap().hexcode, "1301");
        assert!(resolve_cipher(db, "NOT-A-CIPHER").is_none());
    }

    #[test]
    fn test_parse_list_dedups_and_splits() {
        let db = CIPHER_DB.as_ref();
        let input = vec![
            "AES128-SHA:AES256-SHA".to_string(),
            "TLS_RSA_WITH_AES_128_CBC_SHA".to_string(),
        ];
        let suites = parse_cipher_list(db, &input).unwrap();
        assert_eq!(suites.len(), 2);
        assert_eq!(suites[0].hexcode, "002f");
        assert_eq!(suites[1].hexcode, "0035");
    }

    #[test]
    fn test_parse_list_rejects_unknown() {
        let db = CIPHER_DB.as_ref();
        let err = parse_cipher_list(db, &["BOGUS".to_string()]).unwrap_err();
        assert!(err.to_string().contains("BOGUS"));
    }
}
