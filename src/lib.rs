// tlsprobe - TLS reconnaissance and certificate hygiene toolkit
// Copyright (C) 2025 tlsprobe contributors
// Licensed under GPL-3.0

//! tlsprobe probes large host lists (or hostnames streamed from Certificate
//! Transparency logs) over TLS and reports one record per target: negotiated
//! version and cipher, certificate fields, misconfiguration flags,
//! fingerprints and, on request, the full set of supported versions and
//! ciphers.

pub mod backend;
pub mod certificates;
pub mod ciphers;
pub mod cli;
pub mod constants;
pub mod ct_logs;
pub mod data;
pub mod enumeration;
pub mod error;
pub mod fingerprint;
pub mod output;
pub mod probe;
pub mod protocols;
pub mod resolver;
pub mod scanner;
pub mod security;
pub mod utils;

// Re-export commonly used types
pub use crate::cli::{InputMode, Options};
pub use crate::error::{ProbeError, TlsError};
pub use crate::scanner::{Record, Scanner};

/// Result type for tlsprobe operations
pub type Result<T> = std::result::Result<T, TlsError>;
