/*
 * tlsprobe - TLS reconnaissance and certificate hygiene toolkit
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 */

//! Input Validation Module
//!
//! Hostnames, ports and cipher strings are checked before being handed to the
//! external TLS tool (CWE-78, argument injection) or used as SNI.

use std::net::IpAddr;
use thiserror::Error;

/// Maximum length for hostname (RFC 1035)
const MAX_HOSTNAME_LENGTH: usize = 253;

/// Maximum length for label in hostname (RFC 1035)
const MAX_LABEL_LENGTH: usize = 63;

/// Validation error types
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid hostname: {0}")]
    InvalidHostname(String),
    #[error("Invalid port: {0}")]
    InvalidPort(String),
    #[error("Invalid cipher: {0}")]
    InvalidCipher(String),
}

/// Validate hostname according to RFC 1035 and RFC 1123
///
/// IP literals are accepted. A leading `*.` label is accepted so that
/// wildcard names taken from certificates can be checked too.
pub fn validate_hostname(hostname: &str) -> std::result::Result<(), ValidationError> {
    if hostname.is_empty() {
        return Err(ValidationError::InvalidHostname(
            "Hostname cannot be empty".to_string(),
        ));
    }

    if hostname.len() > MAX_HOSTNAME_LENGTH {
        return Err(ValidationError::InvalidHostname(format!(
            "Hostname too long (max {} characters)",
            MAX_HOSTNAME_LENGTH
        )));
    }

    // A leading '-' would be read as an option by the external tool
    if hostname.starts_with('-') {
        return Err(ValidationError::InvalidHostname(
            "Hostname cannot start with '-'".to_string(),
        ));
    }

    if hostname.parse::<IpAddr>().is_ok() {
        return Ok(());
    }

    let name = hostname.strip_prefix("*.").unwrap_or(hostname);
    let name = name.strip_suffix('.').unwrap_or(name);

    for label in name.split('.') {
        if label.is_empty() || label.len() > MAX_LABEL_LENGTH {
            return Err(ValidationError::InvalidHostname(format!(
                "Label '{}' has invalid length (must be 1-{} characters)",
                label, MAX_LABEL_LENGTH
            )));
        }

        let last = label.len() - 1;
        for (i, ch) in label.chars().enumerate() {
            // Underscores appear in real-world names (e.g. _dmarc, service records)
            let is_valid = ch.is_ascii_alphanumeric()
                || ch == '_'
                || (ch == '-' && i != 0 && i != last);
            if !is_valid {
                return Err(ValidationError::InvalidHostname(format!(
                    "Label '{}' contains invalid character or invalid position for hyphen",
                    label
                )));
            }
        }
    }

    Ok(())
}

/// Validate port number (1-65535)
pub fn validate_port(port: u16) -> std::result::Result<(), ValidationError> {
    if port == 0 {
        return Err(ValidationError::InvalidPort(
            "Port must be between 1 and 65535".to_string(),
        ));
    }
    Ok(())
}

/// Validate OpenSSL cipher string syntax
pub fn validate_cipher(cipher: &str) -> std::result::Result<(), ValidationError> {
    if cipher.is_empty() {
        return Err(ValidationError::InvalidCipher(
            "Cipher cannot be empty".to_string(),
        ));
    }

    if cipher.len() > 512 {
        return Err(ValidationError::InvalidCipher(
            "Cipher string too long".to_string(),
        ));
    }

    if cipher.starts_with('-') {
        return Err(ValidationError::InvalidCipher(
            "Cipher cannot start with '-'".to_string(),
        ));
    }

    for ch in cipher.chars() {
        match ch {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '_' | ':' | '!' | '+' | '@' | '=' => continue,
            _ => {
                return Err(ValidationError::InvalidCipher(format!(
                    "Cipher contains invalid character: '{}'",
                    ch
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_hostnames() {
        assert!(validate_hostname("example.com").is_ok());
        assert!(validate_hostname("sub-domain.example.co.uk").is_ok());
        assert!(validate_hostname("*.example.com").is_ok());
        assert!(validate_hostname("192.0.2.10").is_ok());
        assert!(validate_hostname("2001:db8::1").is_ok());
    }

    #[test]
    fn test_invalid_hostnames() {
        assert!(validate_hostname("").is_err());
        assert!(validate_hostname("-connect").is_err());
        assert!(validate_hostname("example.com; rm -rf /").is_err());
        assert!(validate_hostname("bad-.example.com").is_err());
        assert!(validate_hostname("a..b").is_err());
        assert!(validate_hostname(&"a".repeat(254)).is_err());
    }

    #[test]
    fn test_port_and_cipher() {
        assert!(validate_port(443).is_ok());
        assert!(validate_port(0).is_err());
        assert!(validate_cipher("ECDHE-RSA-AES128-GCM-SHA256:!aNULL").is_ok());
        assert!(validate_cipher("AES128-SHA;ls").is_err());
        assert!(validate_cipher("-engine").is_err());
    }
}
