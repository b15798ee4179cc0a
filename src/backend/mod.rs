// Backend module - Uniform handshake interface over the TLS implementations
//
// Three backends share one trait. They differ in which requests they can
// express, and `check_request` turns a gap into `Unsupported` so the auto
// chain can move on to the next backend.

pub mod auto;
pub mod external;
pub mod native;
pub mod permissive;

use crate::Result;
use crate::certificates::TrustStore;
use crate::error::{ProbeError, TlsError};
use crate::protocols::Protocol;
use crate::resolver::Target;
use crate::utils::Dialer;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

pub use auto::AutoBackend;
pub use external::ExternalBackend;
pub use native::NativeBackend;
pub use permissive::PermissiveBackend;

/// What a backend can do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// Captures raw hello records, so JA3/JA3S can be computed
    pub supports_ja3: bool,
    /// Can stop after the hello exchange
    pub supports_pre_handshake: bool,
    /// Can restrict the offered cipher list
    pub supports_cipher_override: bool,
    pub requires_external_process: bool,
    /// Lowest and highest version it can offer
    pub min_version: Option<Protocol>,
    pub max_version: Option<Protocol>,
}

/// Concrete backend identity, reported in each record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    #[serde(rename = "ctls")]
    StrictNative,
    #[serde(rename = "ztls")]
    Permissive,
    #[serde(rename = "openssl")]
    ExternalProcess,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::StrictNative => "ctls",
            BackendKind::Permissive => "ztls",
            BackendKind::ExternalProcess => "openssl",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend selection on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    Ctls,
    Ztls,
    Openssl,
    #[default]
    Auto,
}

impl FromStr for ScanMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ctls" => Ok(ScanMode::Ctls),
            "ztls" => Ok(ScanMode::Ztls),
            "openssl" => Ok(ScanMode::Openssl),
            "auto" => Ok(ScanMode::Auto),
            other => Err(format!("unknown scan mode '{}', expected ctls, ztls, openssl or auto", other)),
        }
    }
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScanMode::Ctls => "ctls",
            ScanMode::Ztls => "ztls",
            ScanMode::Openssl => "openssl",
            ScanMode::Auto => "auto",
        };
        f.write_str(s)
    }
}

/// Parameters of one handshake attempt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandshakeRequest {
    pub min_version: Option<Protocol>,
    pub max_version: Option<Protocol>,
    /// Offered suites; empty means the backend's default list
    pub ciphers: Vec<u16>,
    /// Stop after the server's hello flight
    pub pre_handshake: bool,
    /// Keep raw ClientHello/ServerHello bytes in the outcome
    pub capture_hellos: bool,
}

impl HandshakeRequest {
    /// Offer exactly one version
    pub fn forced_version(version: Protocol) -> Self {
        Self {
            min_version: Some(version),
            max_version: Some(version),
            ..Default::default()
        }
    }

    /// Offer exactly one suite within the given bounds
    pub fn single_cipher(code: u16, min: Protocol, max: Protocol) -> Self {
        Self {
            min_version: Some(min),
            max_version: Some(max),
            ciphers: vec![code],
            ..Default::default()
        }
    }

    /// The forced version, when min and max pin the same one
    pub fn forced(&self) -> Option<Protocol> {
        match (self.min_version, self.max_version) {
            (Some(min), Some(max)) if min == max => Some(min),
            _ => None,
        }
    }

    /// Effective bounds, clamped to what the backend can offer
    pub fn bounds(&self, caps: &Capabilities) -> (Protocol, Protocol) {
        let floor = caps.min_version.unwrap_or(Protocol::SSLv3);
        let ceiling = caps.max_version.unwrap_or(Protocol::TLS13);
        let min = self.min_version.unwrap_or(floor).max(floor);
        let max = self.max_version.unwrap_or(ceiling).min(ceiling);
        (min, max)
    }
}

/// Result of a completed handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeOutcome {
    pub version: Protocol,
    pub cipher: u16,
    /// DER, leaf first
    pub certificates: Vec<Vec<u8>>,
    /// Raw ClientHello record
    pub client_hello: Option<Vec<u8>>,
    /// Raw ServerHello handshake message
    pub server_hello: Option<Vec<u8>>,
    pub alpn: Option<String>,
}

#[async_trait]
pub trait TlsBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn capabilities(&self) -> Capabilities;

    /// One handshake attempt. No retries here.
    async fn connect(
        &self,
        target: &Target,
        request: &HandshakeRequest,
    ) -> std::result::Result<HandshakeOutcome, ProbeError>;

    /// Like `connect`, also naming the backend that completed the handshake
    async fn connect_attributed(
        &self,
        target: &Target,
        request: &HandshakeRequest,
    ) -> std::result::Result<(BackendKind, HandshakeOutcome), ProbeError> {
        let outcome = self.connect(target, request).await?;
        Ok((self.kind(), outcome))
    }
}

/// Reject requests the backend cannot express
pub fn check_request(
    kind: BackendKind,
    caps: &Capabilities,
    request: &HandshakeRequest,
) -> std::result::Result<(), ProbeError> {
    if request.pre_handshake && !caps.supports_pre_handshake {
        return Err(ProbeError::unsupported(format!("{} cannot stop after the hello exchange", kind)));
    }
    if request.capture_hellos && !caps.supports_ja3 {
        return Err(ProbeError::unsupported(format!("{} does not expose raw hello records", kind)));
    }
    if !request.ciphers.is_empty() && !caps.supports_cipher_override {
        return Err(ProbeError::unsupported(format!("{} cannot restrict cipher suites", kind)));
    }

    let (min, max) = request.bounds(caps);
    if min > max {
        return Err(ProbeError::unsupported(format!(
            "{} cannot offer {}..{}",
            kind,
            request.min_version.map(|p| p.to_string()).unwrap_or_default(),
            request.max_version.map(|p| p.to_string()).unwrap_or_default(),
        )));
    }
    Ok(())
}

/// Shared settings for building backends
#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub dialer: Dialer,
    /// Fail the handshake on an untrusted chain
    pub verify_server_cert: bool,
    pub ca_cert: Option<PathBuf>,
    pub openssl_binary: String,
}

/// The permissive backend has no verifier of its own; under `--verify-cert`
/// it checks observed chains against the trust store.
fn permissive(settings: &BackendSettings) -> Result<PermissiveBackend> {
    let backend = PermissiveBackend::new(settings);
    if !settings.verify_server_cert {
        return Ok(backend);
    }
    let store = TrustStore::new(settings.ca_cert.as_deref())?;
    Ok(backend.with_verifier(Arc::new(store)))
}

/// Build the backend (or fallback chain) for a scan mode
pub fn build_backend(mode: ScanMode, settings: &BackendSettings) -> Result<Arc<dyn TlsBackend>> {
    let backend: Arc<dyn TlsBackend> = match mode {
        ScanMode::Ctls => Arc::new(NativeBackend::new(settings)?),
        ScanMode::Ztls => Arc::new(permissive(settings)?),
        ScanMode::Openssl => {
            if !external::check_tool_available(&settings.openssl_binary) {
                return Err(TlsError::ConfigError {
                    message: format!("openssl binary '{}' not found", settings.openssl_binary),
                });
            }
            Arc::new(ExternalBackend::new(settings))
        }
        ScanMode::Auto => {
            let mut chain: Vec<Arc<dyn TlsBackend>> = vec![
                Arc::new(NativeBackend::new(settings)?),
                Arc::new(permissive(settings)?),
            ];
            if external::check_tool_available(&settings.openssl_binary) {
                chain.push(Arc::new(ExternalBackend::new(settings)));
            } else {
                tracing::debug!("openssl not available, auto chain without external backend");
            }
            Arc::new(AutoBackend::new(chain))
        }
    };
    Ok(backend)
}
