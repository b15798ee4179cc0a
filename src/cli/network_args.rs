// Network and connection arguments
// Copyright (C) 2025 tlsprobe contributors
// Licensed under GPL-3.0

use crate::backend::ScanMode;
use crate::constants::{DEFAULT_CONCURRENCY, DEFAULT_OPENSSL_BINARY, DEFAULT_RETRIES};
use crate::protocols::Protocol;
use crate::resolver::IpVersion;
use clap::Args;
use std::path::PathBuf;

/// Connection, resolution and backend options
///
/// Timeouts are per connection attempt; a target that is retried can take
/// up to `retries × timeout`.
#[derive(Args, Debug, Clone)]
pub struct NetworkArgs {
    /// TLS backend (ctls, ztls, openssl, auto)
    #[arg(long = "scan-mode", alias = "sm", value_name = "MODE", default_value = "auto")]
    pub scan_mode: ScanMode,

    /// IP versions to probe (4, 6)
    #[arg(long = "ip-version", alias = "iv", value_delimiter = ',', default_value = "4")]
    pub ip_version: Vec<IpVersion>,

    /// Probe every resolved address instead of the first per IP version
    #[arg(long = "scan-all-ips", alias = "sa")]
    pub scan_all_ips: bool,

    /// Server name sent in the SNI extension
    #[arg(long = "sni", value_name = "NAME")]
    pub sni: Option<String>,

    /// Use a random SNI when the target has no hostname
    #[arg(long = "random-sni", alias = "rs")]
    pub random_sni: bool,

    /// Derive the SNI from the reverse PTR record of the address
    #[arg(long = "rev-ptr-sni", alias = "rps")]
    pub rev_ptr_sni: bool,

    /// Lowest TLS version to offer (ssl30, tls10, tls11, tls12, tls13)
    #[arg(long = "min-version", value_name = "VERSION")]
    pub min_version: Option<Protocol>,

    /// Highest TLS version to offer
    #[arg(long = "max-version", value_name = "VERSION")]
    pub max_version: Option<Protocol>,

    /// Cipher suites to offer on the primary probe (names or hex codes, comma separated)
    #[arg(long = "cipher-input", alias = "ci", value_name = "CIPHERS", value_delimiter = ',')]
    pub cipher_input: Vec<String>,

    /// Custom DNS resolvers (ip or ip:port, comma separated)
    #[arg(long = "resolvers", short = 'r', value_delimiter = ',')]
    pub resolvers: Vec<String>,

    /// PEM file with additional trusted CA certificates
    #[arg(long = "cacert", value_name = "FILE")]
    pub cacert: Option<PathBuf>,

    /// Fail handshakes whose chain does not verify
    #[arg(long = "verify-cert", alias = "vc")]
    pub verify_cert: bool,

    /// OpenSSL binary used by the external backend
    #[arg(long = "openssl-binary", alias = "ob", default_value = DEFAULT_OPENSSL_BINARY)]
    pub openssl_binary: String,

    /// SOCKS5 proxy (socks5://[user:pass@]host:port)
    #[arg(long = "proxy", value_name = "URL")]
    pub proxy: Option<String>,

    /// Number of targets probed in parallel
    #[arg(short = 'c', long = "concurrency", default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Connection attempt timeout in seconds
    #[arg(long = "timeout", value_name = "SECONDS", default_value = "5")]
    pub timeout: u64,

    /// Attempts per target for transient failures
    #[arg(long = "retries", default_value_t = DEFAULT_RETRIES)]
    pub retries: usize,

    /// Pause between attempts of one worker (e.g. 200ms, 1s)
    #[arg(long = "delay", value_name = "DURATION")]
    pub delay: Option<String>,
}

impl Default for NetworkArgs {
    fn default() -> Self {
        Self {
            scan_mode: ScanMode::Auto,
            ip_version: vec![IpVersion::V4],
            scan_all_ips: false,
            sni: None,
            random_sni: false,
            rev_ptr_sni: false,
            min_version: None,
            max_version: None,
            cipher_input: Vec::new(),
            resolvers: Vec::new(),
            cacert: None,
            verify_cert: false,
            openssl_binary: DEFAULT_OPENSSL_BINARY.to_string(),
            proxy: None,
            concurrency: DEFAULT_CONCURRENCY,
            timeout: crate::constants::DEFAULT_TIMEOUT.as_secs(),
            retries: DEFAULT_RETRIES,
            delay: None,
        }
    }
}
