// Version and cipher enumeration arguments
// Copyright (C) 2025 tlsprobe contributors
// Licensed under GPL-3.0

use crate::ciphers::CipherLevelFilter;
use crate::constants::DEFAULT_CIPHER_CONCURRENCY;
use clap::Args;

#[derive(Args, Debug, Clone)]
pub struct EnumerationArgs {
    /// Enumerate every supported TLS version
    #[arg(long = "version-enum", alias = "ve")]
    pub versions: bool,

    /// Enumerate every supported cipher suite
    #[arg(long = "cipher-enum", alias = "ce")]
    pub ciphers: bool,

    /// Cipher groups to enumerate, comma separated (all, secure, weak, insecure)
    #[arg(
        long = "cipher-type",
        alias = "ct",
        value_name = "TYPES",
        value_delimiter = ',',
        default_value = "all"
    )]
    pub cipher_type: Vec<CipherLevelFilter>,

    /// Concurrent handshakes per target while enumerating
    #[arg(long = "cipher-concurrency", alias = "cic", default_value_t = DEFAULT_CIPHER_CONCURRENCY)]
    pub cipher_concurrency: usize,
}

impl Default for EnumerationArgs {
    fn default() -> Self {
        Self {
            versions: false,
            ciphers: false,
            cipher_type: vec![CipherLevelFilter::default()],
            cipher_concurrency: DEFAULT_CIPHER_CONCURRENCY,
        }
    }
}
