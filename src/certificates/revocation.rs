// Certificate Revocation Checker - OCSP first, CRL as fallback

use super::parser::Certificate;
use crate::Result;
use crate::error::TlsError;
use async_trait::async_trait;
use openssl::hash::MessageDigest;
use openssl::ocsp::{OcspCertId, OcspCertStatus, OcspRequest, OcspResponse, OcspResponseStatus};
use openssl::x509::X509;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;
use x509_parser::prelude::*;

/// What to report when the revocation lookup itself fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevocationPolicy {
    /// Checker error reported as revoked
    HardFail,
    /// Checker error reported as not revoked
    #[default]
    SoftFail,
}

/// Raw outcome of a lookup, before the policy is applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevocationOutcome {
    Good,
    Revoked,
    Error(String),
}

impl<E: std::fmt::Display> From<std::result::Result<bool, E>> for RevocationOutcome {
    fn from(result: std::result::Result<bool, E>) -> Self {
        match result {
            Ok(true) => RevocationOutcome::Revoked,
            Ok(false) => RevocationOutcome::Good,
            Err(e) => RevocationOutcome::Error(e.to_string()),
        }
    }
}

#[async_trait]
pub trait RevocationChecker: Send + Sync {
    /// Whether `leaf` is revoked; `issuer` is needed for OCSP
    async fn is_revoked(&self, leaf: &Certificate, issuer: Option<&Certificate>) -> Result<bool>;
}

/// OCSP and CRL lookups over HTTP
pub struct HttpRevocationChecker {
    client: reqwest::Client,
    /// Revoked serials per CRL URL, fetched once per run
    crl_cache: Mutex<HashMap<String, Arc<HashSet<Vec<u8>>>>>,
}

impl HttpRevocationChecker {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            crl_cache: Mutex::new(HashMap::new()),
        })
    }

    async fn check_ocsp(&self, url: &str, leaf: &Certificate, issuer: &Certificate) -> Result<bool> {
        let subject = X509::from_der(&leaf.der)?;
        let issuer = X509::from_der(&issuer.der)?;

        let mut request = OcspRequest::new()?;
        request.add_id(OcspCertId::from_cert(MessageDigest::sha1(), &subject, &issuer)?)?;
        let body = request.to_der()?;

        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/ocsp-request")
            .body(body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(TlsError::RevocationCheck {
                message: format!("OCSP responder {} returned {}", url, response.status()),
            });
        }
        let bytes = response.bytes().await?;

        let response = OcspResponse::from_der(&bytes)?;
        if response.status() != OcspResponseStatus::SUCCESSFUL {
            return Err(TlsError::RevocationCheck {
                message: format!(
                    "OCSP responder {} answered status {}",
                    url,
                    response.status().as_raw()
                ),
            });
        }
        let basic = response.basic()?;
        let id = OcspCertId::from_cert(MessageDigest::sha1(), &subject, &issuer)?;
        let status = basic.find_status(&id).ok_or_else(|| TlsError::RevocationCheck {
            message: format!("OCSP responder {} has no status for serial {}", url, leaf.serial),
        })?;

        if status.status == OcspCertStatus::REVOKED {
            Ok(true)
        } else if status.status == OcspCertStatus::GOOD {
            Ok(false)
        } else {
            Err(TlsError::RevocationCheck {
                message: format!("OCSP status unknown for serial {}", leaf.serial),
            })
        }
    }

    async fn revoked_serials(&self, url: &str) -> Result<Arc<HashSet<Vec<u8>>>> {
        if let Some(serials) = self.crl_cache.lock().await.get(url) {
            return Ok(serials.clone());
        }

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(TlsError::RevocationCheck {
                message: format!("CRL download from {} failed: {}", url, response.status()),
            });
        }
        let bytes = response.bytes().await?;
        let serials = Arc::new(parse_crl_serials(&bytes)?);

        self.crl_cache
            .lock()
            .await
            .insert(url.to_string(), serials.clone());
        Ok(serials)
    }

    async fn check_crl(&self, url: &str, leaf: &Certificate) -> Result<bool> {
        let serials = self.revoked_serials(url).await?;
        let (_, cert) = X509Certificate::from_der(&leaf.der).map_err(|e| TlsError::ParseError {
            message: format!("invalid certificate: {}", e),
        })?;
        Ok(serials.contains(cert.raw_serial()))
    }
}

/// Serial numbers listed in a DER CRL
pub fn parse_crl_serials(der: &[u8]) -> Result<HashSet<Vec<u8>>> {
    let (_, crl) = x509_parser::revocation_list::CertificateRevocationList::from_der(der).map_err(|e| TlsError::ParseError {
        message: format!("invalid CRL: {}", e),
    })?;
    Ok(crl
        .iter_revoked_certificates()
        .map(|revoked| revoked.raw_serial().to_vec())
        .collect())
}

#[async_trait]
impl RevocationChecker for HttpRevocationChecker {
    async fn is_revoked(&self, leaf: &Certificate, issuer: Option<&Certificate>) -> Result<bool> {
        let mut last_error = None;

        if let Some(issuer) = issuer {
            for url in &leaf.ocsp_urls {
                match self.check_ocsp(url, leaf, issuer).await {
                    Ok(revoked) => return Ok(revoked),
                    Err(e) => {
                        debug!("OCSP {} failed, trying next source: {}", url, e);
                        last_error = Some(e);
                    }
                }
            }
        }

        for url in &leaf.crl_urls {
            match self.check_crl(url, leaf).await {
                Ok(revoked) => return Ok(revoked),
                Err(e) => {
                    debug!("CRL {} failed: {}", url, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => Err(e),
            // Nothing to ask
            None => Ok(false),
        }
    }
}
