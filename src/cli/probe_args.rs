// Probe field selection arguments
// Copyright (C) 2025 tlsprobe contributors
// Licensed under GPL-3.0

use crate::fingerprint::HashAlgorithm;
use clap::Args;

/// Which fields each record carries
#[derive(Args, Debug, Clone, Default)]
pub struct ProbeArgs {
    /// Display subject alternative names
    #[arg(long = "san")]
    pub san: bool,

    /// Display subject common name
    #[arg(long = "cn")]
    pub cn: bool,

    /// Display subject organization
    #[arg(long = "so")]
    pub so: bool,

    /// Display negotiated TLS version
    #[arg(long = "tls-version", alias = "tv")]
    pub tls_version: bool,

    /// Display negotiated cipher
    #[arg(long = "cipher")]
    pub cipher: bool,

    /// Certificate hashes to display (md5,sha1,sha256)
    #[arg(long = "hash", value_name = "ALGOS", value_delimiter = ',')]
    pub hash: Vec<HashAlgorithm>,

    /// Display JARM fingerprint
    #[arg(long = "jarm")]
    pub jarm: bool,

    /// Display JA3 fingerprint of the ClientHello
    #[arg(long = "ja3")]
    pub ja3: bool,

    /// Display JA3S fingerprint of the ServerHello
    #[arg(long = "ja3s")]
    pub ja3s: bool,

    /// Display certificate serial number
    #[arg(long = "serial")]
    pub serial: bool,

    /// Flag wildcard certificates
    #[arg(long = "wildcard-cert", alias = "wc")]
    pub wildcard_cert: bool,

    /// Display probe status (success/error) for every target
    #[arg(long = "probe-status", alias = "tps")]
    pub probe_status: bool,

    /// Include the leaf certificate in PEM
    #[arg(long = "cert")]
    pub cert: bool,

    /// Include the full certificate chain
    #[arg(long = "tls-chain")]
    pub tls_chain: bool,

    /// Include the raw ClientHello (hex)
    #[arg(long = "client-hello")]
    pub client_hello: bool,

    /// Include the raw ServerHello (hex)
    #[arg(long = "server-hello")]
    pub server_hello: bool,

    /// Stop after the hello exchange (certificate metadata only)
    #[arg(long = "pre-handshake", alias = "ps")]
    pub pre_handshake: bool,
}
