// Permissive backend - raw ClientHello plus a lenient server-flight parser
//
// The exchange always stops once the server's first flight is in: no key
// exchange is performed. Under TLS 1.3 the certificate is encrypted, so a
// handshake that does not pin its versions is capped at TLS 1.2 to keep the
// certificate readable.

use super::{
    BackendKind, BackendSettings, Capabilities, HandshakeOutcome, HandshakeRequest, TlsBackend,
    check_request,
};
use crate::certificates::{Certificate, ChainVerifier};
use crate::constants::MAX_SERVER_FLIGHT;
use crate::data::CIPHER_DB;
use crate::error::ProbeError;
use crate::protocols::Protocol;
use crate::protocols::handshake::{ClientHelloBuilder, ServerFlight, alert_description};
use crate::resolver::Target;
use crate::utils::Dialer;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

const ALERT_PROTOCOL_VERSION: u8 = 70;
const ALERT_INAPPROPRIATE_FALLBACK: u8 = 86;

pub struct PermissiveBackend {
    dialer: Dialer,
    /// Present when the observed chain must verify
    verifier: Option<Arc<dyn ChainVerifier>>,
}

impl PermissiveBackend {
    pub fn new(settings: &BackendSettings) -> Self {
        Self {
            dialer: settings.dialer.clone(),
            verifier: None,
        }
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn ChainVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Upper version bound actually offered. 1.3 hides the certificate, so
    /// it is only offered when the request pins it.
    fn offered_max(request: &HandshakeRequest, min: Protocol, max: Protocol) -> Protocol {
        if request.forced().is_none() && min <= Protocol::TLS12 && max > Protocol::TLS12 {
            Protocol::TLS12
        } else {
            max
        }
    }

    /// Suites offered when the request does not name any
    fn default_suites(min: Protocol, max: Protocol) -> Vec<u16> {
        CIPHER_DB
            .default_offer()
            .into_iter()
            .filter(|code| {
                CIPHER_DB
                    .get_by_code(*code)
                    .is_some_and(|c| c.min_protocol() <= max && c.max_protocol() >= min)
            })
            .collect()
    }
}

/// Exchange one ClientHello for the server's first flight
pub async fn exchange_hello<S>(stream: &mut S, client_hello: &[u8]) -> Result<ServerFlight, ProbeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream
        .write_all(client_hello)
        .await
        .map_err(|e| ProbeError::from_handshake_io(&e))?;

    let mut buffer = Vec::with_capacity(4096);
    let mut chunk = [0u8; 4096];

    loop {
        let n = stream
            .read(&mut chunk)
            .await
            .map_err(|e| ProbeError::from_handshake_io(&e))?;

        if n == 0 {
            if buffer.is_empty() {
                return Err(ProbeError::handshake("server closed the connection without replying"));
            }
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);

        let flight = ServerFlight::parse(&buffer)
            .map_err(|e| ProbeError::handshake(format!("malformed server response: {}", e)))?;
        if flight.is_complete() || buffer.len() >= MAX_SERVER_FLIGHT {
            return Ok(flight);
        }
    }

    ServerFlight::parse(&buffer)
        .map_err(|e| ProbeError::handshake(format!("malformed server response: {}", e)))
}

/// Judge a parsed flight against what was offered
pub fn evaluate_flight(
    flight: &ServerFlight,
    min: Protocol,
    max: Protocol,
    offered: &[u16],
) -> Result<(Protocol, u16), ProbeError> {
    let Some(hello) = &flight.server_hello else {
        return Err(match flight.alert {
            Some((_, ALERT_PROTOCOL_VERSION)) | Some((_, ALERT_INAPPROPRIATE_FALLBACK)) => {
                ProbeError::mismatch("server rejected the offered protocol version")
            }
            Some((_, code)) => ProbeError::handshake(format!(
                "server sent alert {} ({})",
                code,
                alert_description(code)
            )),
            None => ProbeError::handshake("no ServerHello in server response"),
        });
    };

    let version = hello.negotiated_version().ok_or_else(|| {
        ProbeError::mismatch(format!("server selected unknown version 0x{:04x}", hello.version))
    })?;
    if version < min || version > max {
        return Err(ProbeError::mismatch(format!(
            "server selected {} outside offered {}..{}",
            version, min, max
        )));
    }
    if !offered.contains(&hello.cipher_suite) {
        return Err(ProbeError::mismatch(format!(
            "server selected unoffered suite 0x{:04x}",
            hello.cipher_suite
        )));
    }

    Ok((version, hello.cipher_suite))
}

#[async_trait]
impl TlsBackend for PermissiveBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Permissive
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_ja3: true,
            supports_pre_handshake: true,
            supports_cipher_override: true,
            requires_external_process: false,
            min_version: Some(Protocol::SSLv3),
            max_version: Some(Protocol::TLS13),
        }
    }

    async fn connect(
        &self,
        target: &Target,
        request: &HandshakeRequest,
    ) -> Result<HandshakeOutcome, ProbeError> {
        let caps = self.capabilities();
        check_request(self.kind(), &caps, request)?;
        let (min, max) = request.bounds(&caps);
        let max = Self::offered_max(request, min, max);

        let offered = if request.ciphers.is_empty() {
            Self::default_suites(min, max)
        } else {
            request.ciphers.clone()
        };

        let mut builder = ClientHelloBuilder::with_range(min, max);
        builder.add_ciphers(&offered);
        let client_hello = builder.build_with_defaults(target.sni.as_deref());

        let mut stream = self.dialer.dial(target).await?;
        let flight = exchange_hello(&mut stream, &client_hello).await?;
        let (version, cipher) = evaluate_flight(&flight, min, max, &offered)?;

        // Chains hidden by 1.3 cannot be judged here
        if let Some(verifier) = &self.verifier
            && !flight.certificates.is_empty()
            && !verifier.is_trusted(&Certificate::parse_chain(&flight.certificates))
        {
            return Err(ProbeError::untrusted(format!(
                "{} presented an untrusted chain",
                target
            )));
        }

        debug!(
            "{} answered {} 0x{:04x} with {} certificate(s)",
            target,
            version,
            cipher,
            flight.certificates.len()
        );

        let alpn = flight.server_hello.as_ref().and_then(|h| h.alpn());
        Ok(HandshakeOutcome {
            version,
            cipher,
            certificates: flight.certificates,
            client_hello: request.capture_hellos.then_some(client_hello),
            server_hello: if request.capture_hellos {
                flight.server_hello_raw
            } else {
                None
            },
            alpn,
        })
    }
}
