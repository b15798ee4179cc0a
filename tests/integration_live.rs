// Integration tests against public servers
// Run with: cargo test --test integration_live -- --ignored --test-threads=1

use std::sync::Arc;
use std::time::Duration;
use tlsprobe::backend::{BackendSettings, ScanMode, build_backend};
use tlsprobe::certificates::{CertificateEvaluator, RevocationPolicy};
use tlsprobe::constants::DEFAULT_OPENSSL_BINARY;
use tlsprobe::probe::ProbeExecutor;
use tlsprobe::resolver::{HickoryLookup, HostSpec, ResolverOptions, TargetResolver};
use tlsprobe::scanner::{ResultSink, ScanConfig, Scanner};
use tlsprobe::utils::{Dialer, RateLimiter, Shutdown};
use tokio::sync::mpsc;

fn live_scanner(mode: ScanMode, config: ScanConfig) -> Scanner {
    let _ = rustls::crypto::ring::default_provider().install_default();
    let timeout = Duration::from_secs(10);
    let settings = BackendSettings {
        dialer: Dialer::new(timeout, None),
        verify_server_cert: false,
        ca_cert: None,
        openssl_binary: DEFAULT_OPENSSL_BINARY.to_string(),
    };
    let shutdown = Shutdown::new();
    let backend = build_backend(mode, &settings).expect("backend");
    let executor = ProbeExecutor::new(backend, timeout, shutdown.clone());
    let dns = HickoryLookup::new(&[], timeout).expect("resolver");
    let resolver = Arc::new(TargetResolver::new(Arc::new(dns), ResolverOptions::default()));
    let evaluator = Arc::new(CertificateEvaluator::new(None, RevocationPolicy::SoftFail));
    Scanner::new(resolver, executor, evaluator, config, shutdown)
}

#[tokio::test]
#[ignore] // Run with --ignored flag
async fn test_example_com_handshake() {
    let scanner = live_scanner(ScanMode::Auto, ScanConfig::default());
    let (spec_tx, spec_rx) = mpsc::channel(1);
    let (record_tx, mut record_rx) = mpsc::channel(4);
    spec_tx.send(HostSpec::new("example.com", 443)).await.unwrap();
    drop(spec_tx);

    scanner
        .run(spec_rx, Arc::new(ResultSink::new(record_tx, false)))
        .await;

    let record = record_rx.recv().await.expect("one record");
    println!("{}", serde_json::to_string_pretty(&record).unwrap());
    assert!(record.is_success(), "handshake failed: {:?}", record.error);
    assert!(record.version.is_some());
    assert!(!record.hostnames().is_empty());
}

#[tokio::test]
#[ignore]
async fn test_expired_badssl() {
    let mut config = ScanConfig::default();
    config.certificates.expired = true;
    let scanner = live_scanner(ScanMode::Ztls, config);
    let resolver = TargetResolver::new(
        Arc::new(HickoryLookup::new(&[], Duration::from_secs(10)).unwrap()),
        ResolverOptions::default(),
    );
    let targets = resolver
        .resolve(&HostSpec::new("expired.badssl.com", 443))
        .await
        .expect("resolves");

    let record = scanner
        .scan_target(&targets[0], &RateLimiter::disabled())
        .await
        .expect("not cancelled");
    assert!(record.misconfig.map(|m| m.expired).unwrap_or(false));
}
