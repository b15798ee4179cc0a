// Shared fakes for the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use openssl::asn1::{Asn1Integer, Asn1Time};
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::PKey;
use openssl::x509::extension::SubjectAlternativeName;
use openssl::x509::{X509Builder, X509NameBuilder};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tlsprobe::backend::{
    BackendKind, Capabilities, HandshakeOutcome, HandshakeRequest, TlsBackend,
};
use tlsprobe::certificates::{CertificateEvaluator, RevocationPolicy};
use tlsprobe::error::{ProbeError, TlsError};
use tlsprobe::probe::ProbeExecutor;
use tlsprobe::protocols::Protocol;
use tlsprobe::resolver::{DnsLookup, IpVersion, ResolverOptions, Target, TargetResolver};
use tlsprobe::scanner::{ScanConfig, Scanner};
use tlsprobe::utils::Shutdown;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

/// Self-signed leaf valid between two unix timestamps
pub fn leaf_der(cn: &str, sans: &[&str], not_before: i64, not_after: i64) -> Vec<u8> {
    leaf_with_key(cn, sans, not_before, not_after).0
}

/// Self-signed leaf plus its PKCS#8 private key
pub fn leaf_with_key(cn: &str, sans: &[&str], not_before: i64, not_after: i64) -> (Vec<u8>, Vec<u8>) {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    let key = PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap();

    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_nid(Nid::COMMONNAME, cn).unwrap();
    let name = name.build();

    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(7).unwrap();
    builder
        .set_serial_number(&Asn1Integer::from_bn(&serial).unwrap())
        .unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder
        .set_not_before(&Asn1Time::from_unix(not_before).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::from_unix(not_after).unwrap())
        .unwrap();
    if !sans.is_empty() {
        let mut san = SubjectAlternativeName::new();
        for s in sans {
            san.dns(s);
        }
        let ext = san.build(&builder.x509v3_context(None, None)).unwrap();
        builder.append_extension(ext).unwrap();
    }
    builder.sign(&key, MessageDigest::sha256()).unwrap();
    (
        builder.build().to_der().unwrap(),
        key.private_key_to_pkcs8().unwrap(),
    )
}

/// rustls server on 127.0.0.1 presenting a self-signed certificate for `cn`.
/// Returns the port and the certificate DER.
pub async fn self_signed_tls_server(
    cn: &str,
    versions: &[&'static rustls::SupportedProtocolVersion],
) -> (u16, Vec<u8>) {
    let _ = rustls::crypto::ring::default_provider().install_default();
    let (der, key) = leaf_with_key(cn, &[cn], 1_700_000_000, 1_900_000_000);
    let config = rustls::ServerConfig::builder_with_protocol_versions(versions)
        .with_no_client_auth()
        .with_single_cert(
            vec![CertificateDer::from(der.clone())],
            PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key)),
        )
        .unwrap();
    let acceptor = TlsAcceptor::from(Arc::new(config));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                if let Ok(mut tls) = acceptor.accept(stream).await {
                    let _ = tls.shutdown().await;
                }
            });
        }
    });
    (port, der)
}

pub fn local_target(port: u16) -> Target {
    Target {
        host: "127.0.0.1".to_string(),
        ip: "127.0.0.1".parse().unwrap(),
        port,
        sni: None,
        random_sni: false,
        ip_version: IpVersion::V4,
    }
}

/// Name -> addresses; unknown names fail to resolve
#[derive(Default)]
pub struct StaticDns {
    pub records: HashMap<String, Vec<IpAddr>>,
}

impl StaticDns {
    pub fn with(mut self, host: &str, ips: &[&str]) -> Self {
        self.records.insert(
            host.to_string(),
            ips.iter().map(|ip| ip.parse().unwrap()).collect(),
        );
        self
    }
}

#[async_trait]
impl DnsLookup for StaticDns {
    async fn lookup_ip(&self, host: &str) -> tlsprobe::Result<Vec<IpAddr>> {
        self.records
            .get(host)
            .cloned()
            .ok_or_else(|| TlsError::DnsResolutionFailed {
                hostname: host.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "NXDOMAIN"),
            })
    }

    async fn reverse_ptr(&self, _ip: IpAddr) -> tlsprobe::Result<Option<String>> {
        Ok(None)
    }
}

/// Fake server: refuses the first `failures` dials, then negotiates the
/// highest offered version up to `max_version` with a fixed chain
pub struct FakeServer {
    pub failures: usize,
    pub max_version: Protocol,
    pub chain: Vec<Vec<u8>>,
    pub dials: AtomicUsize,
}

impl FakeServer {
    pub fn new(chain: Vec<Vec<u8>>) -> Self {
        Self {
            failures: 0,
            max_version: Protocol::TLS13,
            chain,
            dials: AtomicUsize::new(0),
        }
    }

    pub fn dials(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TlsBackend for FakeServer {
    fn kind(&self) -> BackendKind {
        BackendKind::Permissive
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    async fn connect(
        &self,
        target: &Target,
        request: &HandshakeRequest,
    ) -> Result<HandshakeOutcome, ProbeError> {
        let n = self.dials.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            return Err(ProbeError::dial_timeout(
                &target.socket_addr().to_string(),
                Duration::from_secs(5),
            ));
        }
        let offered_max = request.max_version.unwrap_or(Protocol::TLS13);
        let version = offered_max.min(self.max_version);
        if request.min_version.is_some_and(|min| min > version) {
            return Err(ProbeError::handshake("protocol_version alert"));
        }
        let cipher = if version == Protocol::TLS13 { 0x1301 } else { 0xc02f };
        Ok(HandshakeOutcome {
            version,
            cipher,
            certificates: self.chain.clone(),
            client_hello: None,
            server_hello: None,
            alpn: None,
        })
    }
}

pub fn scanner(
    backend: Arc<dyn TlsBackend>,
    dns: StaticDns,
    options: ResolverOptions,
    policy: RevocationPolicy,
    config: ScanConfig,
    shutdown: Shutdown,
) -> Scanner {
    let resolver = Arc::new(TargetResolver::new(Arc::new(dns), options));
    let executor = ProbeExecutor::new(backend, Duration::from_secs(2), shutdown.clone());
    let evaluator = Arc::new(CertificateEvaluator::new(None, policy));
    Scanner::new(resolver, executor, evaluator, config, shutdown)
}
