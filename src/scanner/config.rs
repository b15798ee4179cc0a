//! Domain-specific configuration objects extracted from the CLI Options.
//!
//! Each struct carries only what one part of the scanner reads, so the
//! scheduler and its tests never need a full `Options`.

use std::time::Duration;

use crate::Result;
use crate::backend::HandshakeRequest;
use crate::certificates::RevocationPolicy;
use crate::ciphers::CipherLevelFilter;
use crate::cli::Options;
use crate::constants::{DEFAULT_CIPHER_CONCURRENCY, DEFAULT_CONCURRENCY};
use crate::fingerprint::HashAlgorithm;
use crate::protocols::Protocol;
use crate::utils::RetryPolicy;

/// Outer worker pool settings
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub concurrency: usize,
    /// `max_attempts` is the `--retries` budget
    pub retry: RetryPolicy,
    /// Per-worker pause between attempts
    pub delay: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            retry: RetryPolicy::default(),
            delay: Duration::ZERO,
        }
    }
}

impl PoolConfig {
    pub fn from_options(opts: &Options) -> Result<Self> {
        Ok(Self {
            concurrency: opts.network.concurrency.max(1),
            retry: RetryPolicy::new(
                opts.network.retries,
                Duration::from_millis(100),
                Duration::from_secs(5),
            ),
            delay: opts.delay()?,
        })
    }
}

/// Version and cipher enumeration, nested under one target
#[derive(Debug, Clone)]
pub struct EnumerationConfig {
    pub versions: bool,
    pub ciphers: bool,
    pub cipher_filters: Vec<CipherLevelFilter>,
    /// Inner fan-out per target, independent of the pool size
    pub concurrency: usize,
    pub min_version: Option<Protocol>,
    pub max_version: Option<Protocol>,
}

impl Default for EnumerationConfig {
    fn default() -> Self {
        Self {
            versions: false,
            ciphers: false,
            cipher_filters: vec![CipherLevelFilter::All],
            concurrency: DEFAULT_CIPHER_CONCURRENCY,
            min_version: None,
            max_version: None,
        }
    }
}

impl EnumerationConfig {
    pub fn from_options(opts: &Options) -> Self {
        Self {
            versions: opts.enumeration.versions,
            ciphers: opts.enumeration.ciphers,
            cipher_filters: opts.enumeration.cipher_type.clone(),
            concurrency: opts.enumeration.cipher_concurrency.max(1),
            min_version: opts.network.min_version,
            max_version: opts.network.max_version,
        }
    }

    pub fn enabled(&self) -> bool {
        self.versions || self.ciphers
    }
}

/// Certificate checks and certificate-derived fields
#[derive(Debug, Clone, Default)]
pub struct CertificateConfig {
    pub expired: bool,
    pub self_signed: bool,
    pub mismatched: bool,
    pub revoked: bool,
    pub untrusted: bool,
    pub wildcard: bool,
    pub revocation_policy: RevocationPolicy,
    pub hashes: Vec<HashAlgorithm>,
    pub include_chain: bool,
    pub include_pem: bool,
}

impl CertificateConfig {
    pub fn from_options(opts: &Options) -> Self {
        Self {
            expired: opts.misconfig.expired,
            self_signed: opts.misconfig.self_signed,
            mismatched: opts.misconfig.mismatched,
            revoked: opts.misconfig.revoked,
            untrusted: opts.misconfig.untrusted,
            wildcard: opts.probes.wildcard_cert,
            revocation_policy: opts.revocation_policy(),
            hashes: opts.probes.hash.clone(),
            include_chain: opts.probes.tls_chain,
            include_pem: opts.probes.cert,
        }
    }

    /// Whether the evaluator runs at all
    pub fn evaluates(&self) -> bool {
        self.expired
            || self.self_signed
            || self.mismatched
            || self.revoked
            || self.untrusted
            || self.wildcard
    }
}

/// Hello captures and the fingerprints derived from them
#[derive(Debug, Clone, Default)]
pub struct FingerprintConfig {
    pub ja3: bool,
    pub ja3s: bool,
    pub jarm: bool,
    pub client_hello: bool,
    pub server_hello: bool,
}

impl FingerprintConfig {
    pub fn from_options(opts: &Options) -> Self {
        Self {
            ja3: opts.probes.ja3,
            ja3s: opts.probes.ja3s,
            jarm: opts.probes.jarm,
            client_hello: opts.probes.client_hello,
            server_hello: opts.probes.server_hello,
        }
    }

    pub fn needs_hellos(&self) -> bool {
        self.ja3 || self.ja3s || self.client_hello || self.server_hello
    }
}

/// Everything the scheduler needs for one run
#[derive(Debug, Clone, Default)]
pub struct ScanConfig {
    pub pool: PoolConfig,
    /// Primary probe offered to every target
    pub request: HandshakeRequest,
    pub enumeration: EnumerationConfig,
    pub certificates: CertificateConfig,
    pub fingerprints: FingerprintConfig,
}

impl ScanConfig {
    pub fn from_options(opts: &Options) -> Result<Self> {
        let fingerprints = FingerprintConfig::from_options(opts);
        let request = HandshakeRequest {
            min_version: opts.network.min_version,
            max_version: opts.network.max_version,
            ciphers: opts.cipher_codes()?,
            pre_handshake: opts.probes.pre_handshake,
            capture_hellos: fingerprints.needs_hellos(),
        };

        Ok(Self {
            pool: PoolConfig::from_options(opts)?,
            request,
            enumeration: EnumerationConfig::from_options(opts),
            certificates: CertificateConfig::from_options(opts),
            fingerprints,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_from_options() {
        let opts = Options::try_parse_from([
            "tlsprobe",
            "-u",
            "a.example",
            "--retries",
            "5",
            "--delay",
            "250ms",
            "--ja3",
            "--pre-handshake",
            "--cipher-input",
            "0x1301",
            "--ve",
            "--cipher-concurrency",
            "4",
            "--expired",
            "--revoked",
            "--hardfail",
        ])
        .unwrap();

        let config = ScanConfig::from_options(&opts).unwrap();
        assert_eq!(config.pool.retry.max_attempts, 5);
        assert_eq!(config.pool.delay, Duration::from_millis(250));
        assert!(config.request.capture_hellos);
        assert!(config.request.pre_handshake);
        assert_eq!(config.request.ciphers, vec![0x1301]);
        assert!(config.enumeration.enabled());
        assert_eq!(config.enumeration.concurrency, 4);
        assert!(config.certificates.evaluates());
        assert_eq!(config.certificates.revocation_policy, RevocationPolicy::HardFail);
    }

    #[test]
    fn test_nothing_requested() {
        let opts = Options::try_parse_from(["tlsprobe", "-u", "a.example"]).unwrap();
        let config = ScanConfig::from_options(&opts).unwrap();
        assert!(!config.request.capture_hellos);
        assert!(!config.enumeration.enabled());
        assert!(!config.certificates.evaluates());
        assert_eq!(config.pool.concurrency, 300);
    }
}
