// Strict native backend - rustls handshake, fails closed on malformed input

use super::{
    BackendKind, BackendSettings, Capabilities, HandshakeOutcome, HandshakeRequest, TlsBackend,
    check_request,
};
use crate::Result;
use crate::error::{ProbeError, TlsError};
use crate::protocols::Protocol;
use crate::resolver::Target;
use crate::utils::Dialer;
use async_trait::async_trait;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, IpAddr as PkiIpAddr, ServerName, UnixTime};
use rustls::{
    AlertDescription, ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme,
    SupportedProtocolVersion,
};
use std::path::Path;
use std::sync::Arc;
use tokio_rustls::TlsConnector;
use tracing::debug;

/// Accepts any chain; trust is judged later by the certificate evaluator
#[derive(Debug)]
struct NoVerifier {
    schemes: Vec<SignatureScheme>,
}

impl ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.schemes.clone()
    }
}

/// Load every certificate from a PEM bundle
pub fn load_pem_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let data = std::fs::read(path)?;
    let certs: Vec<CertificateDer<'static>> = pem::parse_many(&data)?
        .into_iter()
        .filter(|p| p.tag() == "CERTIFICATE")
        .map(|p| CertificateDer::from(p.into_contents()))
        .collect();

    if certs.is_empty() {
        return Err(TlsError::InvalidInput {
            message: format!("no certificates found in {}", path.display()),
        });
    }
    Ok(certs)
}

/// rustls-based backend (TLS 1.2 and 1.3 only)
pub struct NativeBackend {
    dialer: Dialer,
    /// Present when the chain must verify during the handshake
    roots: Option<Arc<RootCertStore>>,
}

impl NativeBackend {
    pub fn new(settings: &BackendSettings) -> Result<Self> {
        let roots = if settings.verify_server_cert {
            let mut store = RootCertStore::empty();
            store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            if let Some(path) = &settings.ca_cert {
                for cert in load_pem_certificates(path)? {
                    store.add(cert).map_err(|e| TlsError::InvalidInput {
                        message: format!("bad CA certificate in {}: {}", path.display(), e),
                    })?;
                }
            }
            Some(Arc::new(store))
        } else {
            None
        };

        Ok(Self {
            dialer: settings.dialer.clone(),
            roots,
        })
    }

    fn client_config(
        &self,
        request: &HandshakeRequest,
        min: Protocol,
        max: Protocol,
    ) -> std::result::Result<ClientConfig, ProbeError> {
        let mut provider = rustls::crypto::ring::default_provider();
        if !request.ciphers.is_empty() {
            provider
                .cipher_suites
                .retain(|s| request.ciphers.contains(&u16::from(s.suite())));
            if provider.cipher_suites.is_empty() {
                return Err(ProbeError::unsupported("rustls implements none of the requested suites"));
            }
        }

        let versions: Vec<&'static SupportedProtocolVersion> = [
            (Protocol::TLS13, &rustls::version::TLS13),
            (Protocol::TLS12, &rustls::version::TLS12),
        ]
        .into_iter()
        .filter(|(p, _)| *p >= min && *p <= max)
        .map(|(_, v)| v)
        .collect();

        let schemes = provider
            .signature_verification_algorithms
            .supported_schemes();

        let builder = ClientConfig::builder_with_provider(Arc::new(provider))
            .with_protocol_versions(&versions)
            .map_err(|e| ProbeError::unsupported(format!("rustls config: {}", e)))?;

        let mut config = match &self.roots {
            Some(roots) => builder
                .with_root_certificates(roots.clone())
                .with_no_client_auth(),
            None => builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(NoVerifier { schemes }))
                .with_no_client_auth(),
        };
        config.enable_sni = true;
        Ok(config)
    }
}

fn server_name(target: &Target) -> std::result::Result<ServerName<'static>, ProbeError> {
    match &target.sni {
        Some(sni) => ServerName::try_from(sni.clone())
            .map_err(|e| ProbeError::handshake(format!("invalid server name '{}': {}", sni, e))),
        // IP names are never sent as SNI
        None => Ok(ServerName::IpAddress(PkiIpAddr::from(target.ip))),
    }
}

/// Map a handshake error to the probe taxonomy
fn classify(err: std::io::Error) -> ProbeError {
    let tls_error = err
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<rustls::Error>());

    match tls_error {
        Some(rustls::Error::AlertReceived(AlertDescription::ProtocolVersion)) => {
            ProbeError::mismatch("server rejected the offered protocol version")
        }
        Some(rustls::Error::PeerIncompatible(reason)) => {
            ProbeError::mismatch(format!("peer incompatible: {:?}", reason))
        }
        Some(rustls::Error::InvalidCertificate(reason)) => {
            ProbeError::untrusted(format!("invalid peer certificate: {:?}", reason))
        }
        Some(rustls::Error::AlertReceived(alert)) => {
            ProbeError::handshake(format!("server sent alert {:?}", alert))
        }
        Some(other) => ProbeError::handshake(other.to_string()),
        None => ProbeError::from_handshake_io(&err),
    }
}

#[async_trait]
impl TlsBackend for NativeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::StrictNative
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_ja3: false,
            supports_pre_handshake: false,
            supports_cipher_override: true,
            requires_external_process: false,
            min_version: Some(Protocol::TLS12),
            max_version: Some(Protocol::TLS13),
        }
    }

    async fn connect(
        &self,
        target: &Target,
        request: &HandshakeRequest,
    ) -> std::result::Result<HandshakeOutcome, ProbeError> {
        let caps = self.capabilities();
        check_request(self.kind(), &caps, request)?;
        let (min, max) = request.bounds(&caps);

        let config = self.client_config(request, min, max)?;
        let name = server_name(target)?;
        let stream = self.dialer.dial(target).await?;

        let connector = TlsConnector::from(Arc::new(config));
        let tls = connector.connect(name, stream).await.map_err(classify)?;
        let (_, conn) = tls.get_ref();

        let version = conn
            .protocol_version()
            .and_then(|v| Protocol::from_wire(u16::from(v)))
            .ok_or_else(|| ProbeError::handshake("no negotiated protocol version"))?;
        let cipher = conn
            .negotiated_cipher_suite()
            .map(|s| u16::from(s.suite()))
            .ok_or_else(|| ProbeError::handshake("no negotiated cipher suite"))?;

        if !request.ciphers.is_empty() && !request.ciphers.contains(&cipher) {
            return Err(ProbeError::mismatch(format!("server chose unoffered suite 0x{:04x}", cipher)));
        }

        let certificates = conn
            .peer_certificates()
            .map(|chain| chain.iter().map(|c| c.as_ref().to_vec()).collect())
            .unwrap_or_default();
        let alpn = conn
            .alpn_protocol()
            .map(|p| String::from_utf8_lossy(p).into_owned());

        debug!("{} negotiated {} 0x{:04x} via rustls", target, version, cipher);

        Ok(HandshakeOutcome {
            version,
            cipher,
            certificates,
            client_hello: None,
            server_hello: None,
            alpn,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProbeErrorKind;
    use crate::resolver::IpVersion;
    use std::time::Duration;

    fn settings() -> BackendSettings {
        BackendSettings {
            dialer: Dialer::new(Duration::from_secs(1), None),
            verify_server_cert: false,
            ca_cert: None,
            openssl_binary: "openssl".to_string(),
        }
    }

    fn local_target(port: u16) -> Target {
        Target {
            host: "127.0.0.1".to_string(),
            ip: "127.0.0.1".parse().unwrap(),
            port,
            sni: None,
            random_sni: false,
            ip_version: IpVersion::V4,
        }
    }

    #[tokio::test]
    async fn test_legacy_version_is_capability_gap() {
        let backend = NativeBackend::new(&settings()).unwrap();
        let err = backend
            .connect(&local_target(1), &HandshakeRequest::forced_version(Protocol::TLS10))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ProbeErrorKind::Unsupported);
    }

    #[tokio::test]
    async fn test_unknown_suite_is_capability_gap() {
        let backend = NativeBackend::new(&settings()).unwrap();
        // RC4-SHA is not in rustls
        let request = HandshakeRequest::single_cipher(0x0005, Protocol::TLS12, Protocol::TLS12);
        let err = backend.connect(&local_target(1), &request).await.unwrap_err();
        assert_eq!(err.kind, ProbeErrorKind::Unsupported);
    }

    #[tokio::test]
    async fn test_tls13_suite_with_tls12_only_is_rejected() {
        let backend = NativeBackend::new(&settings()).unwrap();
        let request = HandshakeRequest::single_cipher(0x1301, Protocol::TLS12, Protocol::TLS12);
        let err = backend.connect(&local_target(1), &request).await.unwrap_err();
        assert_eq!(err.kind, ProbeErrorKind::Unsupported);
    }

    #[test]
    fn test_rejected_chain_is_definitive() {
        let err = classify(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            rustls::Error::InvalidCertificate(rustls::CertificateError::UnknownIssuer),
        ));
        assert_eq!(err.kind, ProbeErrorKind::Untrusted);
        assert!(!err.allows_fallback());

        let err = classify(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            rustls::Error::AlertReceived(AlertDescription::HandshakeFailure),
        ));
        assert_eq!(err.kind, ProbeErrorKind::HandshakeFailure);
    }

    #[tokio::test]
    async fn test_garbage_server_fails_closed() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            if let Ok((mut s, _)) = listener.accept().await {
                let mut buf = [0u8; 512];
                let _ = s.read(&mut buf).await;
                let _ = s.write_all(b"HTTP/1.1 400 Bad Request\r\n\r\n").await;
            }
        });

        let backend = NativeBackend::new(&settings()).unwrap();
        let err = backend
            .connect(&local_target(port), &HandshakeRequest::default())
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
        assert!(err.allows_fallback());
    }
}
