// Error types for tlsprobe
//
// TlsError is the crate-wide error. ProbeError is the classified failure of a
// single handshake attempt; the scheduler and the backend chain branch on its kind.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Main error type for tlsprobe operations
#[derive(Debug, Error)]
pub enum TlsError {
    /// DNS resolution failed for the hostname
    #[error("DNS resolution failed for {hostname}: {source}")]
    DnsResolutionFailed {
        hostname: String,
        #[source]
        source: io::Error,
    },

    /// A single probe attempt failed
    #[error(transparent)]
    Probe(#[from] ProbeError),

    /// Generic I/O error
    #[error("I/O error: {source}")]
    IoError {
        #[from]
        source: io::Error,
    },

    /// HTTP client error
    #[error("HTTP error (status {status}): {details}")]
    HttpError { status: u16, details: String },

    /// Parsing error for data formats
    #[error("Parse error: {message}")]
    ParseError { message: String },

    /// OpenSSL-specific errors
    #[error("OpenSSL error: {0}")]
    OpenSslError(#[from] openssl::error::ErrorStack),

    /// Reqwest HTTP client errors
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    /// URL parsing errors
    #[error("Invalid URL: {0}")]
    UrlParseError(#[from] url::ParseError),

    /// Cipher suite errors
    #[error("Cipher suite error: {message}")]
    CipherError { message: String },

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {message}")]
    ConfigError { message: String },

    /// Timeout occurred during operation
    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Invalid input from user or configuration
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Revocation lookup (CRL/OCSP) could not produce an answer
    #[error("Revocation check failed: {message}")]
    RevocationCheck { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// PEM parsing errors
    #[error("PEM parsing error: {0}")]
    PemError(#[from] pem::PemError),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Classification of a failed handshake attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeErrorKind {
    /// No address could be resolved for the host
    Resolution,
    DialTimeout,
    ConnectionRefused,
    /// Connection reset or closed mid-handshake
    ConnectionReset,
    HandshakeFailure,
    /// Server answered with a different version or cipher than forced
    ProtocolMismatch,
    /// The backend cannot express the request (capability gap)
    Unsupported,
    /// The chain failed verification while verification was enforced
    Untrusted,
    Cancelled,
}

impl ProbeErrorKind {
    /// Whether the scheduler may try the same target again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProbeErrorKind::DialTimeout
                | ProbeErrorKind::ConnectionRefused
                | ProbeErrorKind::ConnectionReset
        )
    }

    /// Whether the auto backend chain may move on to the next backend
    pub fn allows_fallback(&self) -> bool {
        matches!(
            self,
            ProbeErrorKind::HandshakeFailure
                | ProbeErrorKind::ProtocolMismatch
                | ProbeErrorKind::Unsupported
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeErrorKind::Resolution => "resolution_error",
            ProbeErrorKind::DialTimeout => "dial_timeout",
            ProbeErrorKind::ConnectionRefused => "connection_refused",
            ProbeErrorKind::ConnectionReset => "connection_reset",
            ProbeErrorKind::HandshakeFailure => "handshake_failure",
            ProbeErrorKind::ProtocolMismatch => "protocol_mismatch",
            ProbeErrorKind::Unsupported => "unsupported",
            ProbeErrorKind::Untrusted => "untrusted_certificate",
            ProbeErrorKind::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ProbeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of one probe attempt
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct ProbeError {
    pub kind: ProbeErrorKind,
    pub message: String,
}

impl ProbeError {
    pub fn new(kind: ProbeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn resolution(host: &str, details: impl fmt::Display) -> Self {
        Self::new(
            ProbeErrorKind::Resolution,
            format!("could not resolve {}: {}", host, details),
        )
    }

    pub fn dial_timeout(addr: &str, duration: Duration) -> Self {
        Self::new(
            ProbeErrorKind::DialTimeout,
            format!("dial {} timed out after {:?}", addr, duration),
        )
    }

    pub fn handshake(details: impl Into<String>) -> Self {
        Self::new(ProbeErrorKind::HandshakeFailure, details)
    }

    pub fn mismatch(details: impl Into<String>) -> Self {
        Self::new(ProbeErrorKind::ProtocolMismatch, details)
    }

    pub fn unsupported(details: impl Into<String>) -> Self {
        Self::new(ProbeErrorKind::Unsupported, details)
    }

    /// A chain rejected under `--verify-cert`; ends the attempt on every backend
    pub fn untrusted(details: impl Into<String>) -> Self {
        Self::new(ProbeErrorKind::Untrusted, details)
    }

    pub fn cancelled() -> Self {
        Self::new(ProbeErrorKind::Cancelled, "run cancelled")
    }

    /// Classify an I/O error raised while establishing the TCP connection
    pub fn from_dial_io(addr: &str, err: &io::Error) -> Self {
        let kind = match err.kind() {
            io::ErrorKind::TimedOut => ProbeErrorKind::DialTimeout,
            io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => {
                ProbeErrorKind::ConnectionReset
            }
            _ => ProbeErrorKind::ConnectionRefused,
        };
        Self::new(kind, format!("dial {}: {}", addr, err))
    }

    /// Classify an I/O error raised after the TCP connection was up
    pub fn from_handshake_io(err: &io::Error) -> Self {
        let kind = match err.kind() {
            io::ErrorKind::TimedOut => ProbeErrorKind::DialTimeout,
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => ProbeErrorKind::ConnectionReset,
            _ => ProbeErrorKind::HandshakeFailure,
        };
        Self::new(kind, err.to_string())
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    pub fn allows_fallback(&self) -> bool {
        self.kind.allows_fallback()
    }
}

/// Conversion from anyhow::Error for the binary edge
impl From<anyhow::Error> for TlsError {
    fn from(err: anyhow::Error) -> Self {
        TlsError::Other(err.to_string())
    }
}

impl From<std::str::Utf8Error> for TlsError {
    fn from(err: std::str::Utf8Error) -> Self {
        TlsError::ParseError {
            message: format!("UTF-8 string error: {}", err),
        }
    }
}

impl From<tokio::time::error::Elapsed> for TlsError {
    fn from(_err: tokio::time::error::Elapsed) -> Self {
        // The elapsed marker carries no duration
        TlsError::Timeout {
            duration: Duration::ZERO,
        }
    }
}

impl From<tokio::task::JoinError> for TlsError {
    fn from(err: tokio::task::JoinError) -> Self {
        TlsError::Other(format!("Task join error: {}", err))
    }
}

/// Helper macro for early returns with a formatted message
#[macro_export]
macro_rules! tls_bail {
    ($msg:literal $(,)?) => {
        return Err($crate::error::TlsError::Other($msg.to_string()))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::error::TlsError::Other(format!($fmt, $($arg)*)))
    };
}
