// Certificate misconfiguration arguments
// Copyright (C) 2025 tlsprobe contributors
// Licensed under GPL-3.0

use clap::Args;

/// Certificate misconfiguration checks
///
/// Each flag adds its field to the record. The checks themselves are cheap
/// except `revoked`, which goes out to OCSP/CRL endpoints.
#[derive(Args, Debug, Clone, Default)]
pub struct MisconfigArgs {
    /// Flag expired certificates
    #[arg(long = "expired")]
    pub expired: bool,

    /// Flag self-signed certificates
    #[arg(long = "self-signed")]
    pub self_signed: bool,

    /// Flag certificates whose names do not cover the host
    #[arg(long = "mismatched")]
    pub mismatched: bool,

    /// Flag revoked certificates (OCSP, then CRL)
    #[arg(long = "revoked")]
    pub revoked: bool,

    /// Flag chains that do not verify against the trust store
    #[arg(long = "untrusted")]
    pub untrusted: bool,

    /// Treat revocation lookup errors as revoked
    #[arg(long = "hardfail", requires = "revoked")]
    pub hardfail: bool,
}

impl MisconfigArgs {
    pub fn any(&self) -> bool {
        self.expired || self.self_signed || self.mismatched || self.revoked || self.untrusted
    }
}
