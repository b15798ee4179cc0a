// Auto backend - priority-ordered fallback chain
//
// Falls through only on capability gaps and backend-specific handshake
// failures. Refused, reset, timed-out and cancelled attempts are definitive
// and returned as-is.

use super::{BackendKind, Capabilities, HandshakeOutcome, HandshakeRequest, TlsBackend};
use crate::error::ProbeError;
use crate::resolver::Target;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

pub struct AutoBackend {
    chain: Vec<Arc<dyn TlsBackend>>,
}

impl AutoBackend {
    pub fn new(chain: Vec<Arc<dyn TlsBackend>>) -> Self {
        Self { chain }
    }

    pub fn chain(&self) -> &[Arc<dyn TlsBackend>] {
        &self.chain
    }

    /// Try each backend in order; report the first success and which backend produced it.
    pub async fn connect_with_kind(
        &self,
        target: &Target,
        request: &HandshakeRequest,
    ) -> Result<(BackendKind, HandshakeOutcome), ProbeError> {
        let mut last_error = ProbeError::unsupported("no backend configured");

        for backend in &self.chain {
            match backend.connect(target, request).await {
                Ok(outcome) => return Ok((backend.kind(), outcome)),
                Err(e) if e.allows_fallback() => {
                    debug!("{}: {} fell through ({})", target, backend.kind(), e);
                    last_error = e;
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error)
    }
}

#[async_trait]
impl TlsBackend for AutoBackend {
    /// Kind of the first backend in the chain
    fn kind(&self) -> BackendKind {
        self.chain
            .first()
            .map(|b| b.kind())
            .unwrap_or(BackendKind::StrictNative)
    }

    /// Union of the chain's capabilities
    fn capabilities(&self) -> Capabilities {
        self.chain
            .iter()
            .map(|b| b.capabilities())
            .fold(Capabilities::default(), |acc, c| Capabilities {
                supports_ja3: acc.supports_ja3 || c.supports_ja3,
                supports_pre_handshake: acc.supports_pre_handshake || c.supports_pre_handshake,
                supports_cipher_override: acc.supports_cipher_override || c.supports_cipher_override,
                requires_external_process: acc.requires_external_process
                    || c.requires_external_process,
                min_version: match (acc.min_version, c.min_version) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    (a, b) => a.or(b),
                },
                max_version: match (acc.max_version, c.max_version) {
                    (Some(a), Some(b)) => Some(a.max(b)),
                    (a, b) => a.or(b),
                },
            })
    }

    async fn connect(
        &self,
        target: &Target,
        request: &HandshakeRequest,
    ) -> Result<HandshakeOutcome, ProbeError> {
        self.connect_with_kind(target, request)
            .await
            .map(|(_, outcome)| outcome)
    }

    async fn connect_attributed(
        &self,
        target: &Target,
        request: &HandshakeRequest,
    ) -> Result<(BackendKind, HandshakeOutcome), ProbeError> {
        self.connect_with_kind(target, request).await
    }
}
