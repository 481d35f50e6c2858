use crate::error::ResolveError;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

/// A host as typed by the user together with the address it resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub input: String,
    pub address: Ipv4Addr,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.input, self.address)
    }
}

/// Resolves a host name or dotted-decimal address to its first IPv4 address.
///
/// Nothing is cached, every call may hit DNS again.
pub fn resolve(input: &str) -> Result<Target, ResolveError> {
    let host = input.trim();
    if host.is_empty() {
        return Err(ResolveError::Empty);
    }

    match host.parse::<IpAddr>() {
        Ok(IpAddr::V4(address)) => return Ok(Target { input: host.to_string(), address }),
        Ok(IpAddr::V6(_)) => return Err(ResolveError::NoIpv4Address { host: host.to_string() }),
        Err(_) => {}
    }

    let addresses = dns_lookup::lookup_host(host)
        .map_err(|source| ResolveError::Lookup { host: host.to_string(), source })?;

    addresses.into_iter()
        .find_map(|ip| match ip {
            IpAddr::V4(v4) => Some(v4),
            IpAddr::V6(_) => None,
        })
        .map(|address| Target { input: host.to_string(), address })
        .ok_or_else(|| ResolveError::NoIpv4Address { host: host.to_string() })
}
