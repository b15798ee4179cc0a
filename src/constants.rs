// tlsprobe - TLS reconnaissance and certificate hygiene toolkit
// Licensed under GPL-3.0

//! TLS wire constants and engine defaults
//!
//! Centralised constants for the raw record parser, the hello builders and
//! the scan defaults. Wire values carry their RFC reference.

use std::time::Duration;

// =============================================================================
// TLS Content Types (RFC 8446 Section 5.1, RFC 5246 Section 6.2.1)
// =============================================================================

/// TLS Content Type: Alert (0x15)
///
/// Reference: RFC 8446 Section 6, RFC 5246 Section 7.2
pub const CONTENT_TYPE_ALERT: u8 = 0x15;

/// TLS Content Type: Handshake (0x16)
///
/// Reference: RFC 8446 Section 4, RFC 5246 Section 7.4
pub const CONTENT_TYPE_HANDSHAKE: u8 = 0x16;

// =============================================================================
// TLS Handshake Types (RFC 8446 Section 4, RFC 5246 Section 7.4)
// =============================================================================

pub const HANDSHAKE_TYPE_CLIENT_HELLO: u8 = 0x01;
pub const HANDSHAKE_TYPE_SERVER_HELLO: u8 = 0x02;

/// Handshake Type: Certificate (0x0B)
///
/// Sent in the clear up to TLS 1.2; encrypted under TLS 1.3.
pub const HANDSHAKE_TYPE_CERTIFICATE: u8 = 0x0b;

pub const HANDSHAKE_TYPE_SERVER_HELLO_DONE: u8 = 0x0e;

// =============================================================================
// Extension Types
// =============================================================================

pub const EXTENSION_SERVER_NAME: u16 = 0x0000;
pub const EXTENSION_SUPPORTED_GROUPS: u16 = 0x000a;
pub const EXTENSION_EC_POINT_FORMATS: u16 = 0x000b;
pub const EXTENSION_ALPN: u16 = 0x0010;

/// Padding is excluded from JA3 strings
pub const EXTENSION_PADDING: u16 = 0x0015;

pub const EXTENSION_SUPPORTED_VERSIONS: u16 = 0x002b;

// =============================================================================
// Limits
// =============================================================================

/// Maximum TLS record payload (2^14, RFC 8446 Section 5.1)
pub const MAX_RECORD_PAYLOAD: usize = 16384;

/// Upper bound on bytes read while waiting for the server's first flight
pub const MAX_SERVER_FLIGHT: usize = 64 * 1024;

// =============================================================================
// Scan defaults
// =============================================================================

pub const DEFAULT_PORT: u16 = 443;
pub const DEFAULT_CONCURRENCY: usize = 300;
pub const DEFAULT_CIPHER_CONCURRENCY: usize = 10;
pub const DEFAULT_RETRIES: usize = 3;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound of the host queue and the record channel
pub const QUEUE_CAPACITY: usize = 1024;

/// Default DNS port for custom resolvers
pub const DEFAULT_DNS_PORT: u16 = 53;

/// Default OpenSSL binary used by the external backend
pub const DEFAULT_OPENSSL_BINARY: &str = "openssl";

// =============================================================================
// CT log defaults
// =============================================================================

pub const CT_LOG_LIST_URL: &str = "https://www.gstatic.com/ct/log_list/v3/log_list.json";
pub const CT_DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);
pub const CT_MAX_BATCH_SIZE: u64 = 1000;

/// Recent-offset start: how far behind the tree head a fresh cursor begins
pub const CT_DEFAULT_RECENT_OFFSET: u64 = 0;

/// Consecutive failures after which a CT source is marked Failed
pub const CT_MAX_SOURCE_FAILURES: u32 = 3;
