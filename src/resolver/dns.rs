// DNS lookups backed by hickory-resolver, with optional custom name servers

use super::DnsLookup;
use crate::Result;
use crate::constants::DEFAULT_DNS_PORT;
use crate::error::TlsError;
use crate::security::validate_hostname;
use async_trait::async_trait;
use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{
    LookupIpStrategy, NameServerConfig, NameServerConfigGroup, Protocol, ResolverConfig,
    ResolverOpts,
};
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// hickory-backed implementation of [`DnsLookup`]
pub struct HickoryLookup {
    resolver: TokioAsyncResolver,
}

impl HickoryLookup {
    /// System configuration when `servers` is empty, otherwise the given name
    /// servers (`ip` or `ip:port`, default port 53) over UDP.
    pub fn new(servers: &[String], query_timeout: Duration) -> Result<Self> {
        let mut opts = ResolverOpts::default();
        opts.ip_strategy = LookupIpStrategy::Ipv4AndIpv6;
        opts.timeout = query_timeout;

        let config = if servers.is_empty() {
            ResolverConfig::default()
        } else {
            let name_servers: Vec<NameServerConfig> = parse_resolvers(servers)?
                .into_iter()
                .map(|addr| NameServerConfig::new(addr, Protocol::Udp))
                .collect();
            ResolverConfig::from_parts(None, vec![], NameServerConfigGroup::from(name_servers))
        };

        Ok(Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
        })
    }
}

/// Parse resolver addresses; bare IPs get port 53
pub fn parse_resolvers(servers: &[String]) -> Result<Vec<SocketAddr>> {
    let mut parsed = Vec::new();

    for server in servers {
        let server = server.trim();
        if server.is_empty() {
            continue;
        }

        let addr = match IpAddr::from_str(server) {
            Ok(ip) => SocketAddr::new(ip, DEFAULT_DNS_PORT),
            Err(_) => SocketAddr::from_str(server).map_err(|e| TlsError::ConfigError {
                message: format!("invalid resolver address '{}': {}", server, e),
            })?,
        };
        parsed.push(addr);
    }

    if parsed.is_empty() {
        return Err(TlsError::ConfigError {
            message: "no valid resolvers provided".to_string(),
        });
    }

    Ok(parsed)
}

#[async_trait]
impl DnsLookup for HickoryLookup {
    async fn lookup_ip(&self, host: &str) -> Result<Vec<IpAddr>> {
        let response =
            self.resolver
                .lookup_ip(host)
                .await
                .map_err(|e| TlsError::DnsResolutionFailed {
                    hostname: host.to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, e.to_string()),
                })?;

        let ips: Vec<IpAddr> = response.iter().collect();
        debug!("{} resolved to {:?}", host, ips);
        Ok(ips)
    }

    async fn reverse_ptr(&self, ip: IpAddr) -> Result<Option<String>> {
        let lookup =
            self.resolver
                .reverse_lookup(ip)
                .await
                .map_err(|e| TlsError::DnsResolutionFailed {
                    hostname: ip.to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, e.to_string()),
                })?;

        let name = lookup.iter().next().map(|ptr| {
            let name = ptr.to_string();
            name.trim_end_matches('.').to_string()
        });

        Ok(name.filter(|n| validate_hostname(n).is_ok()))
    }
}
