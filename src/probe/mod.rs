// Probe Executor - one bounded handshake attempt against one target
//
// No retries and no shared state: the scheduler owns the retry loop, the
// enumerators own the fan-out.

use crate::backend::{BackendKind, HandshakeRequest, TlsBackend};
use crate::data::CIPHER_DB;
use crate::error::ProbeError;
use crate::protocols::Protocol;
use crate::resolver::Target;
use crate::utils::Shutdown;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::trace;

/// A completed handshake
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub target: Target,
    pub backend: BackendKind,
    pub version: Protocol,
    pub cipher: u16,
    pub cipher_name: String,
    /// DER, leaf first
    pub certificates: Vec<Vec<u8>>,
    pub client_hello: Option<Vec<u8>>,
    pub server_hello: Option<Vec<u8>>,
    pub alpn: Option<String>,
    pub elapsed: Duration,
}

impl ProbeResult {
    pub fn leaf(&self) -> Option<&[u8]> {
        self.certificates.first().map(Vec::as_slice)
    }
}

#[derive(Clone)]
pub struct ProbeExecutor {
    backend: Arc<dyn TlsBackend>,
    timeout: Duration,
    shutdown: Shutdown,
}

impl ProbeExecutor {
    pub fn new(backend: Arc<dyn TlsBackend>, timeout: Duration, shutdown: Shutdown) -> Self {
        Self {
            backend,
            timeout,
            shutdown,
        }
    }

    pub fn backend(&self) -> &Arc<dyn TlsBackend> {
        &self.backend
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run one attempt, bounded by the attempt timeout and the run's cancellation
    pub async fn probe(
        &self,
        target: &Target,
        request: &HandshakeRequest,
    ) -> Result<ProbeResult, ProbeError> {
        if self.shutdown.is_triggered() {
            return Err(ProbeError::cancelled());
        }

        let started = Instant::now();
        let attempt = tokio::time::timeout(
            self.timeout,
            self.backend.connect_attributed(target, request),
        );

        let (backend, outcome) = tokio::select! {
            _ = self.shutdown.cancelled() => return Err(ProbeError::cancelled()),
            result = attempt => match result {
                Ok(inner) => inner?,
                Err(_) => return Err(ProbeError::dial_timeout(&target.socket_addr().to_string(), self.timeout)),
            },
        };

        let elapsed = started.elapsed();
        trace!("{} handshake via {} took {:?}", target, backend, elapsed);

        Ok(ProbeResult {
            target: target.clone(),
            backend,
            version: outcome.version,
            cipher: outcome.cipher,
            cipher_name: CIPHER_DB.name_for_code(outcome.cipher),
            certificates: outcome.certificates,
            client_hello: outcome.client_hello,
            server_hello: outcome.server_hello,
            alpn: outcome.alpn,
            elapsed,
        })
    }
}
