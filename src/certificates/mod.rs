// Certificates module - Parsing, trust and misconfiguration checks

pub mod evaluator;
pub mod parser;
pub mod revocation;
pub mod trust;

pub use evaluator::{CertificateEvaluator, MisconfigFlags, matches_hostname};
pub use parser::Certificate;
pub use revocation::{
    HttpRevocationChecker, RevocationChecker, RevocationOutcome, RevocationPolicy,
};
pub use trust::{ChainVerifier, TrustStore};
