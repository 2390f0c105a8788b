//! Resolution of operator-supplied host strings to registered datanodes.

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::error::{AdminError, Result};
use crate::node::Datanode;
use crate::registry::NodeRegistry;

/// Parsed form of an operator-supplied `host[:port]` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostDefinition {
    raw: String,
    hostname: String,
    port: Option<u16>,
}

impl HostDefinition {
    /// Parses `host[:port]` under URL authority rules, so bracketed IPv6
    /// literals and port separators behave as they do in a URL.
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = |reason: String| AdminError::InvalidHostString {
            input: input.to_string(),
            reason,
        };

        // A URL must have a scheme, so fabricate one.
        let url = Url::parse(&format!("empty://{}", input.trim())).map_err(|e| {
            invalid(format!(
                "not a valid hostname or hostname:port definition: {}",
                e
            ))
        })?;

        let hostname = match url.host() {
            Some(url::Host::Domain(d)) if !d.is_empty() => d.to_string(),
            Some(url::Host::Ipv4(a)) => a.to_string(),
            Some(url::Host::Ipv6(a)) => a.to_string(),
            _ => return Err(invalid("does not contain a valid hostname".to_string())),
        };

        Ok(Self {
            raw: input.to_string(),
            hostname,
            port: url.port(),
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }
}

/// Resolved address of a host string.
#[derive(Debug, Clone)]
pub struct ResolvedHost {
    pub hostname: String,
    pub address: IpAddr,
}

/// Forward DNS seam.
#[async_trait]
pub trait DnsResolver: Send + Sync {
    async fn lookup(&self, hostname: &str) -> std::io::Result<ResolvedHost>;
}

/// DNS resolution through the operating-system resolver.
#[derive(Debug, Default)]
pub struct SystemDnsResolver;

#[async_trait]
impl DnsResolver for SystemDnsResolver {
    async fn lookup(&self, hostname: &str) -> std::io::Result<ResolvedHost> {
        let mut addrs = tokio::net::lookup_host((hostname, 0u16)).await?;
        let addr = addrs.next().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no addresses found for {}", hostname),
            )
        })?;
        Ok(ResolvedHost {
            hostname: hostname.to_string(),
            address: addr.ip(),
        })
    }
}

/// Maps operator host strings to registered datanodes.
pub struct HostResolver {
    registry: Arc<dyn NodeRegistry>,
    dns: Arc<dyn DnsResolver>,
    use_hostnames: bool,
}

impl HostResolver {
    pub fn new(
        registry: Arc<dyn NodeRegistry>,
        dns: Arc<dyn DnsResolver>,
        use_hostnames: bool,
    ) -> Self {
        Self {
            registry,
            dns,
            use_hostnames,
        }
    }

    /// Resolves every host string to exactly one datanode, or fails the
    /// whole batch on the first input that cannot be resolved.
    pub async fn resolve(&self, hosts: &[String]) -> Result<Vec<Datanode>> {
        let mut results = Vec::with_capacity(hosts.len());
        for raw in hosts {
            results.push(self.resolve_one(raw).await?);
        }
        Ok(results)
    }

    async fn resolve_one(&self, raw: &str) -> Result<Datanode> {
        let invalid = |reason: String| AdminError::InvalidHostString {
            input: raw.to_string(),
            reason,
        };

        let host = HostDefinition::parse(raw)?;
        let resolved = self
            .dns
            .lookup(host.hostname())
            .await
            .map_err(|e| invalid(format!("unable to resolve the host: {}", e)))?;

        let key = if self.use_hostnames {
            resolved.hostname
        } else {
            resolved.address.to_string()
        };

        let mut found = self.registry.nodes_by_address(&key).await;
        if found.is_empty() {
            return Err(invalid(format!(
                "resolved to {} which is not registered with the cluster",
                key
            )));
        }

        if found.len() == 1 {
            let dn = found.remove(0);
            return match host.port() {
                Some(port) if !dn.uses_port(port) => Err(invalid(
                    "matched a single datanode, but the given port is not used by that datanode"
                        .to_string(),
                )),
                _ => Ok(dn),
            };
        }

        // Several datanodes share the address; the port decides, in
        // registry order.
        match host
            .port()
            .and_then(|port| found.iter().position(|dn| dn.uses_port(port)))
        {
            Some(idx) => Ok(found.remove(idx)),
            None => Err(invalid(
                "matched multiple datanodes, but no datanode port matched the given port"
                    .to_string(),
            )),
        }
    }
}
