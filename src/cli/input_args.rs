// Target input arguments
// Copyright (C) 2025 tlsprobe contributors
// Licensed under GPL-3.0

use clap::Args;
use std::path::PathBuf;

/// Where targets come from
///
/// Hosts may be given inline, from a list file, or piped on stdin. With none
/// of these the run falls back to CT log streaming.
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Target host(s) to probe (host, host:port, IP, or URL; comma separated)
    #[arg(short = 'u', long = "host", value_name = "HOST", value_delimiter = ',')]
    pub hosts: Vec<String>,

    /// File with one target per line (# starts a comment)
    #[arg(short = 'l', long = "list", value_name = "FILE")]
    pub list: Option<PathBuf>,

    /// Ports to probe when the target carries none
    #[arg(
        short = 'p',
        long = "port",
        value_name = "PORT",
        value_delimiter = ',',
        default_value = "443"
    )]
    pub ports: Vec<u16>,
}

impl Default for InputArgs {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            list: None,
            ports: vec![crate::constants::DEFAULT_PORT],
        }
    }
}

impl InputArgs {
    pub fn has_explicit_input(&self) -> bool {
        !self.hosts.is_empty() || self.list.is_some()
    }
}
