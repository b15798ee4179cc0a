// Target Resolver - Expands host specs into concrete dial targets
//
// Resolution happens inside the worker that owns the host, so a failure is
// reported against that host only.

pub mod dns;
pub mod sni;

use crate::Result;
use crate::constants::DEFAULT_PORT;
use crate::error::{ProbeError, TlsError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

pub use dns::HickoryLookup;

/// IP address family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IpVersion {
    #[serde(rename = "4")]
    V4,
    #[serde(rename = "6")]
    V6,
}

impl IpVersion {
    pub fn of(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => IpVersion::V4,
            IpAddr::V6(_) => IpVersion::V6,
        }
    }
}

impl fmt::Display for IpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpVersion::V4 => write!(f, "4"),
            IpVersion::V6 => write!(f, "6"),
        }
    }
}

impl FromStr for IpVersion {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "4" | "v4" | "ipv4" => Ok(IpVersion::V4),
            "6" | "v6" | "ipv6" => Ok(IpVersion::V6),
            other => Err(format!("invalid ip version '{}', expected 4 or 6", other)),
        }
    }
}

/// Host and port as read from the input list
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostSpec {
    pub host: String,
    pub port: u16,
}

impl HostSpec {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse one input line into host specs
    ///
    /// Accepted forms: `https://host:port/path`, `[v6]:port`, `host:port`,
    /// bare IPv6 literal, bare host. Inputs without a port expand to one
    /// spec per entry of `default_ports`.
    pub fn parse(input: &str, default_ports: &[u16]) -> Result<Vec<HostSpec>> {
        let input = input.trim();
        if input.is_empty() {
            return Err(TlsError::InvalidInput {
                message: "empty host".to_string(),
            });
        }

        let ports: Vec<u16> = if default_ports.is_empty() {
            vec![DEFAULT_PORT]
        } else {
            default_ports.to_vec()
        };

        let (host, port) = if input.contains("://") {
            let url = url::Url::parse(input)?;
            let host = url
                .host_str()
                .ok_or_else(|| TlsError::InvalidInput {
                    message: format!("no hostname in URL '{}'", input),
                })?
                .trim_start_matches('[')
                .trim_end_matches(']')
                .to_string();
            (host, url.port())
        } else if let Some(rest) = input.strip_prefix('[') {
            let (host, tail) = rest.split_once(']').ok_or_else(|| TlsError::InvalidInput {
                message: format!("unterminated IPv6 literal '{}'", input),
            })?;
            let port = match tail.strip_prefix(':') {
                Some(p) => Some(parse_port(p)?),
                None => None,
            };
            (host.to_string(), port)
        } else if input.parse::<IpAddr>().is_ok() {
            (input.to_string(), None)
        } else if let Some((host, port)) = input.rsplit_once(':') {
            (host.to_string(), Some(parse_port(port)?))
        } else {
            (input.to_string(), None)
        };

        Ok(match port {
            Some(port) => vec![HostSpec::new(host, port)],
            None => ports.into_iter().map(|p| HostSpec::new(&host, p)).collect(),
        })
    }

    pub fn is_ip(&self) -> bool {
        self.host.parse::<IpAddr>().is_ok()
    }
}

impl fmt::Display for HostSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

fn parse_port(s: &str) -> Result<u16> {
    match s.trim().parse::<u16>() {
        Ok(p) if p != 0 => Ok(p),
        _ => Err(TlsError::InvalidInput {
            message: format!("invalid port '{}'", s),
        }),
    }
}

/// A concrete dial target. Immutable once handed to a worker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Target {
    pub host: String,
    pub ip: IpAddr,
    pub port: u16,
    /// Value advertised in the server_name extension, if any
    pub sni: Option<String>,
    /// The SNI was generated and says nothing about the expected identity
    #[serde(skip)]
    pub random_sni: bool,
    pub ip_version: IpVersion,
}

impl Target {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }

    /// Hostname used for certificate matching: explicit or PTR-derived SNI,
    /// else the host itself. A random SNI never counts.
    pub fn expected_hostname(&self) -> &str {
        match &self.sni {
            Some(sni) if !self.random_sni => sni,
            _ => &self.host,
        }
    }

    /// Name sent in the server_name extension, falling back to the host
    pub fn server_name(&self) -> &str {
        self.sni.as_deref().unwrap_or(&self.host)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.host, self.socket_addr())
    }
}

/// DNS primitives the resolver consumes
#[async_trait]
pub trait DnsLookup: Send + Sync {
    /// All A/AAAA addresses for `host`
    async fn lookup_ip(&self, host: &str) -> Result<Vec<IpAddr>>;

    /// First PTR name for `ip`, without the trailing dot
    async fn reverse_ptr(&self, ip: IpAddr) -> Result<Option<String>>;
}

/// Expansion and SNI policy
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    pub ip_versions: Vec<IpVersion>,
    pub scan_all_ips: bool,
    /// Explicit server name, highest SNI precedence
    pub sni: Option<String>,
    pub reverse_ptr_sni: bool,
    pub random_sni: bool,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            ip_versions: vec![IpVersion::V4],
            scan_all_ips: false,
            sni: None,
            reverse_ptr_sni: false,
            random_sni: false,
        }
    }
}

/// Expands a [`HostSpec`] into dial targets
pub struct TargetResolver {
    dns: Arc<dyn DnsLookup>,
    options: ResolverOptions,
}

impl TargetResolver {
    pub fn new(dns: Arc<dyn DnsLookup>, options: ResolverOptions) -> Self {
        Self { dns, options }
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// Resolve `spec` into one target per requested IP version, or one per
    /// address when scanning all IPs.
    pub async fn resolve(&self, spec: &HostSpec) -> std::result::Result<Vec<Target>, ProbeError> {
        let addresses = match spec.host.parse::<IpAddr>() {
            Ok(ip) => vec![ip],
            Err(_) => self
                .dns
                .lookup_ip(&spec.host)
                .await
                .map_err(|e| ProbeError::resolution(&spec.host, e))?,
        };

        let mut targets = Vec::new();
        for version in &self.options.ip_versions {
            let mut matching = addresses
                .iter()
                .filter(|ip| IpVersion::of(ip) == *version)
                .copied();

            let selected: Vec<IpAddr> = if self.options.scan_all_ips {
                matching.collect()
            } else {
                matching.next().into_iter().collect()
            };

            for ip in selected {
                let (sni, random_sni) = match self.select_sni(spec, ip).await {
                    Some(SniChoice::Random(name)) => (Some(name), true),
                    Some(SniChoice::Named(name)) => (Some(name), false),
                    None => (None, false),
                };
                targets.push(Target {
                    host: spec.host.clone(),
                    ip,
                    port: spec.port,
                    sni,
                    random_sni,
                    ip_version: *version,
                });
            }
        }

        if targets.is_empty() {
            return Err(ProbeError::resolution(
                &spec.host,
                format!(
                    "no address for IP version(s) {:?}",
                    self.options.ip_versions
                ),
            ));
        }

        debug!("{} expanded to {} target(s)", spec, targets.len());
        Ok(targets)
    }

    /// explicit > reverse PTR > host literal > random (IP-only hosts) > none
    async fn select_sni(&self, spec: &HostSpec, ip: IpAddr) -> Option<SniChoice> {
        if let Some(sni) = &self.options.sni
            && !sni.is_empty()
        {
            return Some(SniChoice::Named(sni.clone()));
        }

        if self.options.reverse_ptr_sni {
            match self.dns.reverse_ptr(ip).await {
                Ok(Some(name)) if sni::is_valid_sni(&name) => return Some(SniChoice::Named(name)),
                Ok(_) => debug!("no usable PTR record for {}", ip),
                Err(e) => debug!("PTR lookup for {} failed: {}", ip, e),
            }
        }

        if !spec.is_ip() {
            return Some(SniChoice::Named(spec.host.clone()));
        }

        if self.options.random_sni {
            return Some(SniChoice::Random(sni::random_sni()));
        }

        None
    }
}

enum SniChoice {
    Named(String),
    Random(String),
}
