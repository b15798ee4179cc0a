// Certificate Parser - DER chain to the certificate model carried in records

use crate::Result;
use crate::error::TlsError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use tracing::warn;
use x509_parser::extensions::DistributionPointName;
use x509_parser::prelude::*;

const OCSP_ACCESS_METHOD: &str = "1.3.6.1.5.5.7.48.1";

/// One parsed certificate of an observed chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub subject_dn: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_cn: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subject_org: Vec<String>,
    /// DNS names and IP addresses from the SAN extension
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subject_an: Vec<String>,
    pub issuer_dn: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer_cn: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issuer_org: Vec<String>,
    /// Colon-separated uppercase hex
    pub serial: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub signature_algorithm: String,
    pub is_ca: bool,
    #[serde(skip)]
    pub ocsp_urls: Vec<String>,
    #[serde(skip)]
    pub crl_urls: Vec<String>,
    #[serde(skip)]
    pub der: Vec<u8>,
}

impl Certificate {
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let (_, cert) = X509Certificate::from_der(der).map_err(|e| TlsError::ParseError {
            message: format!("invalid certificate: {}", e),
        })?;

        let validity = cert.validity();
        let not_before = timestamp(validity.not_before.timestamp())?;
        let not_after = timestamp(validity.not_after.timestamp())?;

        Ok(Self {
            subject_dn: cert.subject().to_string(),
            subject_cn: first_attr(cert.subject().iter_common_name()),
            subject_org: all_attrs(cert.subject().iter_organization()),
            subject_an: subject_alt_names(&cert),
            issuer_dn: cert.issuer().to_string(),
            issuer_cn: first_attr(cert.issuer().iter_common_name()),
            issuer_org: all_attrs(cert.issuer().iter_organization()),
            serial: format_serial(cert.raw_serial()),
            not_before,
            not_after,
            signature_algorithm: signature_name(&cert),
            is_ca: cert
                .basic_constraints()
                .map(|bc| bc.map(|ext| ext.value.ca).unwrap_or(false))
                .unwrap_or(false),
            ocsp_urls: ocsp_urls(&cert),
            crl_urls: crl_urls(&cert),
            der: der.to_vec(),
        })
    }

    /// Parse a chain, leaf first; unparseable entries are skipped
    pub fn parse_chain(ders: &[Vec<u8>]) -> Vec<Certificate> {
        ders.iter()
            .enumerate()
            .filter_map(|(i, der)| match Self::from_der(der) {
                Ok(cert) => Some(cert),
                Err(e) => {
                    warn!("chain entry {} skipped: {}", i, e);
                    None
                }
            })
            .collect()
    }

    pub fn to_pem(&self) -> String {
        ::pem::encode(&::pem::Pem::new("CERTIFICATE", self.der.clone()))
    }

    /// Issuer and subject names are identical
    pub fn is_self_issued(&self) -> bool {
        self.subject_dn == self.issuer_dn
    }

    /// SAN DNS entries plus CN, deduplicated, in order of appearance
    pub fn hostnames(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let candidates = self
            .subject_an
            .iter()
            .filter(|n| n.parse::<IpAddr>().is_err())
            .chain(self.subject_cn.iter());
        for name in candidates {
            let name = name.to_ascii_lowercase();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// SAN or CN carries a `*.` label
    pub fn is_wildcard(&self) -> bool {
        self.subject_an
            .iter()
            .chain(self.subject_cn.iter())
            .any(|n| n.starts_with("*."))
    }
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(secs, 0).ok_or_else(|| TlsError::ParseError {
        message: format!("validity timestamp {} out of range", secs),
    })
}

fn first_attr<'a, 'b: 'a>(
    mut iter: impl Iterator<Item = &'a AttributeTypeAndValue<'b>>,
) -> Option<String> {
    iter.find_map(|attr| attr.as_str().ok().map(str::to_string))
}

fn all_attrs<'a, 'b: 'a>(iter: impl Iterator<Item = &'a AttributeTypeAndValue<'b>>) -> Vec<String> {
    iter.filter_map(|attr| attr.as_str().ok().map(str::to_string))
        .collect()
}

fn format_serial(raw: &[u8]) -> String {
    raw.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}

fn signature_name(cert: &X509Certificate) -> String {
    let oid = &cert.signature_algorithm.algorithm;
    x509_parser::objects::oid2sn(oid, x509_parser::objects::oid_registry())
        .map(str::to_string)
        .unwrap_or_else(|_| oid.to_id_string())
}

fn subject_alt_names(cert: &X509Certificate) -> Vec<String> {
    let mut names = Vec::new();
    if let Ok(Some(ext)) = cert.get_extension_unique(&oid_registry::OID_X509_EXT_SUBJECT_ALT_NAME)
        && let ParsedExtension::SubjectAlternativeName(san) = ext.parsed_extension()
    {
        for name in &san.general_names {
            match name {
                GeneralName::DNSName(dns) => names.push(dns.to_string()),
                GeneralName::IPAddress(bytes) => {
                    if let Some(ip) = ip_from_bytes(bytes) {
                        names.push(ip.to_string());
                    }
                }
                _ => {}
            }
        }
    }
    names
}

fn ip_from_bytes(bytes: &[u8]) -> Option<IpAddr> {
    match bytes.len() {
        4 => <[u8; 4]>::try_from(bytes).ok().map(IpAddr::from),
        16 => <[u8; 16]>::try_from(bytes).ok().map(IpAddr::from),
        _ => None,
    }
}

fn ocsp_urls(cert: &X509Certificate) -> Vec<String> {
    let mut urls = Vec::new();
    if let Ok(Some(ext)) = cert.get_extension_unique(&oid_registry::OID_PKIX_AUTHORITY_INFO_ACCESS)
        && let ParsedExtension::AuthorityInfoAccess(aia) = ext.parsed_extension()
    {
        for desc in &aia.accessdescs {
            if desc.access_method.to_id_string() == OCSP_ACCESS_METHOD
                && let GeneralName::URI(uri) = &desc.access_location
            {
                urls.push(uri.to_string());
            }
        }
    }
    urls
}

fn crl_urls(cert: &X509Certificate) -> Vec<String> {
    let mut urls = Vec::new();
    if let Ok(Some(ext)) =
        cert.get_extension_unique(&oid_registry::OID_X509_EXT_CRL_DISTRIBUTION_POINTS)
        && let ParsedExtension::CRLDistributionPoints(points) = ext.parsed_extension()
    {
        for point in &points.points {
            if let Some(DistributionPointName::FullName(names)) = &point.distribution_point {
                for name in names {
                    if let GeneralName::URI(uri) = name
                        && uri.starts_with("http")
                    {
                        urls.push(uri.to_string());
                    }
                }
            }
        }
    }
    urls
}
