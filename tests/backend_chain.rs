// Backend chain behavior against a local rustls server
// Run with: cargo test --test backend_chain

mod common;

use common::{local_target, self_signed_tls_server};
use std::sync::Arc;
use std::time::Duration;
use tlsprobe::backend::{
    AutoBackend, BackendKind, BackendSettings, HandshakeRequest, NativeBackend, PermissiveBackend,
    ScanMode, TlsBackend, build_backend,
};
use tlsprobe::error::ProbeErrorKind;
use tlsprobe::protocols::Protocol;
use tlsprobe::utils::Dialer;

fn settings(verify: bool) -> BackendSettings {
    BackendSettings {
        dialer: Dialer::new(Duration::from_secs(2), None),
        verify_server_cert: verify,
        ca_cert: None,
        openssl_binary: "openssl".to_string(),
    }
}

fn hello_capture() -> HandshakeRequest {
    HandshakeRequest {
        capture_hellos: true,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_verify_cert_rejection_stops_auto_chain() {
    let (port, _) = self_signed_tls_server("self.local", rustls::ALL_VERSIONS).await;
    let auto = AutoBackend::new(vec![
        Arc::new(NativeBackend::new(&settings(true)).unwrap()),
        Arc::new(PermissiveBackend::new(&settings(true))),
    ]);

    let err = auto
        .connect_with_kind(&local_target(port), &HandshakeRequest::default())
        .await
        .unwrap_err();

    assert_eq!(err.kind, ProbeErrorKind::Untrusted);
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_verify_cert_applies_when_native_cannot_capture_hellos() {
    let (port, _) = self_signed_tls_server("self.local", rustls::ALL_VERSIONS).await;
    let backend = build_backend(ScanMode::Auto, &settings(true)).unwrap();

    let err = backend
        .connect_attributed(&local_target(port), &hello_capture())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ProbeErrorKind::Untrusted);
}

#[tokio::test]
async fn test_untrusted_chain_accepted_without_verify_cert() {
    let (port, der) = self_signed_tls_server("self.local", rustls::ALL_VERSIONS).await;
    let backend = build_backend(ScanMode::Auto, &settings(false)).unwrap();

    let (kind, outcome) = backend
        .connect_attributed(&local_target(port), &HandshakeRequest::default())
        .await
        .unwrap();
    assert_eq!(kind, BackendKind::StrictNative);
    assert_eq!(outcome.version, Protocol::TLS13);
    assert_eq!(outcome.certificates, vec![der]);
}

#[tokio::test]
async fn test_hello_capture_keeps_certificate_on_tls13_server() {
    let (port, der) = self_signed_tls_server("modern.local", rustls::ALL_VERSIONS).await;
    let backend = build_backend(ScanMode::Auto, &settings(false)).unwrap();

    let (kind, outcome) = backend
        .connect_attributed(&local_target(port), &hello_capture())
        .await
        .unwrap();

    assert_eq!(kind, BackendKind::Permissive);
    assert_eq!(outcome.version, Protocol::TLS12);
    assert_eq!(outcome.certificates.first(), Some(&der));
    assert!(outcome.client_hello.is_some());
    assert!(outcome.server_hello.is_some());
}

#[tokio::test]
async fn test_pinned_tls13_on_permissive_backend() {
    let (port, _) = self_signed_tls_server("modern.local", &[&rustls::version::TLS13]).await;
    let backend = PermissiveBackend::new(&settings(false));

    let outcome = backend
        .connect(&local_target(port), &HandshakeRequest::forced_version(Protocol::TLS13))
        .await
        .unwrap();
    assert_eq!(outcome.version, Protocol::TLS13);
    // 1.3 encrypts the certificate
    assert!(outcome.certificates.is_empty());
}
