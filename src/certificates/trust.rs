// Chain trust - verification against the system roots plus an optional custom CA

use super::parser::Certificate;
use crate::Result;
use crate::error::TlsError;
use openssl::stack::Stack;
use openssl::x509::store::{X509Store, X509StoreBuilder};
use openssl::x509::verify::X509VerifyFlags;
use openssl::x509::{X509, X509StoreContext};
use std::path::Path;
use tracing::debug;

/// Decides whether an observed chain leads to a trusted root
pub trait ChainVerifier: Send + Sync {
    fn is_trusted(&self, chain: &[Certificate]) -> bool;
}

/// X509 store built once per run
pub struct TrustStore {
    store: X509Store,
}

impl TrustStore {
    /// System default roots, plus every certificate in `ca_file` when given.
    /// Validity dates are not checked here; expiry is its own flag.
    pub fn new(ca_file: Option<&Path>) -> Result<Self> {
        let mut builder = X509StoreBuilder::new()?;
        builder.set_default_paths()?;
        builder.set_flags(X509VerifyFlags::NO_CHECK_TIME)?;

        if let Some(path) = ca_file {
            let data = std::fs::read(path)?;
            let certs = X509::stack_from_pem(&data)?;
            if certs.is_empty() {
                return Err(TlsError::ConfigError {
                    message: format!("no certificates in {}", path.display()),
                });
            }
            for cert in certs {
                builder.add_cert(cert)?;
            }
        }

        Ok(Self {
            store: builder.build(),
        })
    }

    fn verify(&self, chain: &[Certificate]) -> Result<bool> {
        let Some(leaf) = chain.first() else {
            return Ok(false);
        };
        let leaf = X509::from_der(&leaf.der)?;
        let mut intermediates = Stack::new()?;
        for cert in &chain[1..] {
            intermediates.push(X509::from_der(&cert.der)?)?;
        }

        let mut ctx = X509StoreContext::new()?;
        let trusted = ctx.init(&self.store, &leaf, &intermediates, |c| {
            let ok = c.verify_cert()?;
            if !ok {
                debug!("chain rejected: {}", c.error());
            }
            Ok(ok)
        })?;
        Ok(trusted)
    }
}

impl ChainVerifier for TrustStore {
    fn is_trusted(&self, chain: &[Certificate]) -> bool {
        self.verify(chain).unwrap_or_else(|e| {
            debug!("chain verification error: {}", e);
            false
        })
    }
}

/// Leaf signature verifies against the leaf's own public key
pub fn verifies_own_signature(cert: &Certificate) -> bool {
    let Ok(x509) = X509::from_der(&cert.der) else {
        return false;
    };
    x509.public_key()
        .and_then(|key| x509.verify(&key))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::super::parser::testutil::*;
    use super::*;
    use std::io::Write;

    fn parsed(x509: &X509) -> Certificate {
        Certificate::from_der(&x509.to_der().unwrap()).unwrap()
    }

    #[test]
    fn test_custom_ca_makes_chain_trusted() {
        let ca_key = key();
        let ca = build(
            &TestCert {
                ca: true,
                ..TestCert::leaf("Probe Test Root", vec![])
            },
            &ca_key,
            None,
        );
        let leaf = build(&TestCert::leaf("svc.example.test", vec!["svc.example.test"]), &key(), Some((&ca, &ca_key)));
        let chain = vec![parsed(&leaf)];

        let mut pem_file = std::env::temp_dir();
        pem_file.push(format!("tlsprobe-ca-{}.pem", std::process::id()));
        std::fs::File::create(&pem_file)
            .unwrap()
            .write_all(&ca.to_pem().unwrap())
            .unwrap();

        let without = TrustStore::new(None).unwrap();
        assert!(!without.is_trusted(&chain));

        let with = TrustStore::new(Some(&pem_file)).unwrap();
        assert!(with.is_trusted(&chain));

        std::fs::remove_file(&pem_file).ok();
    }

    #[test]
    fn test_self_signature() {
        let own = self_signed(&TestCert::leaf("self.example.test", vec![]));
        assert!(verifies_own_signature(&parsed(&own)));

        let ca_key = key();
        let ca = build(&TestCert::leaf("Issuer", vec![]), &ca_key, None);
        let issued = build(&TestCert::leaf("issued.example.test", vec![]), &key(), Some((&ca, &ca_key)));
        assert!(!verifies_own_signature(&parsed(&issued)));
    }

    #[test]
    fn test_empty_chain_is_untrusted() {
        let store = TrustStore::new(None).unwrap();
        assert!(!store.is_trusted(&[]));
    }

    #[test]
    fn test_empty_ca_file_rejected() {
        let mut path = std::env::temp_dir();
        path.push(format!("tlsprobe-empty-ca-{}.pem", std::process::id()));
        std::fs::write(&path, b"").unwrap();
        assert!(TrustStore::new(Some(&path)).is_err());
        std::fs::remove_file(&path).ok();
    }
}
