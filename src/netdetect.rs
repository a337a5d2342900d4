use crate::config::ConfigError;
use anyhow::Result;
use if_addrs::{get_if_addrs, IfAddr};
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

/// Inclusive interval of host indices within a network, e.g. `1-254`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostRange {
    pub lo: u32,
    pub hi: u32,
}

impl HostRange {
    pub fn new(lo: u32, hi: u32) -> Result<Self, ConfigError> {
        if lo > hi {
            return Err(ConfigError::InvalidHostRange(format!("{lo}-{hi}")));
        }
        Ok(Self { lo, hi })
    }

    pub fn len(&self) -> u64 {
        u64::from(self.hi - self.lo) + 1
    }
}

impl Default for HostRange {
    fn default() -> Self {
        Self { lo: 1, hi: 254 }
    }
}

impl FromStr for HostRange {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ConfigError::InvalidHostRange(s.to_string());
        let (a, b) = s.split_once('-').unwrap_or((s, s));
        let lo = a.trim().parse::<u32>().map_err(|_| bad())?;
        let hi = b.trim().parse::<u32>().map_err(|_| bad())?;
        Self::new(lo, hi)
    }
}

impl fmt::Display for HostRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.lo, self.hi)
    }
}

/// A base network plus the host indices to probe inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkRange {
    pub network: Ipv4Net,
    pub hosts: HostRange,
}

impl NetworkRange {
    pub fn new(network: Ipv4Net, hosts: HostRange) -> Self {
        Self { network, hosts }
    }

    /// Parse a prefix in any of the forms `10.96.0`, `10.96.0.7` or `10.96.0.0/24`.
    ///
    /// The first two forms denote the /24 containing the address.
    pub fn parse(prefix: &str, hosts: HostRange) -> Result<Self, ConfigError> {
        Ok(Self::new(parse_prefix(prefix)?, hosts))
    }

    /// Host addresses in order. Indices that fall outside the network are skipped.
    pub fn addresses(&self) -> impl Iterator<Item = IpAddr> + Clone {
        let base = u32::from(self.network.network());
        (u64::from(self.hosts.lo)..=self.last_index())
            .map(move |idx| IpAddr::V4(Ipv4Addr::from(base + idx as u32)))
    }

    /// Number of addresses [`addresses`](Self::addresses) yields.
    pub fn host_count(&self) -> u64 {
        (self.last_index() + 1).saturating_sub(u64::from(self.hosts.lo))
    }

    // Highest host index that still lies inside the network.
    fn last_index(&self) -> u64 {
        let size: u64 = 1u64 << (32 - u32::from(self.network.prefix_len()));
        u64::from(self.hosts.hi).min(size - 1)
    }
}

fn parse_prefix(prefix: &str) -> Result<Ipv4Net, ConfigError> {
    let p = prefix.trim();
    let bad = || ConfigError::InvalidPrefix(p.to_string());
    if p.contains('/') {
        return p.parse::<Ipv4Net>().map(|n| n.trunc()).map_err(|_| bad());
    }
    let octets = p.split('.').count();
    let full = match octets {
        3 => format!("{p}.0"),
        4 => p.to_string(),
        _ => return Err(bad()),
    };
    let ip = full.parse::<Ipv4Addr>().map_err(|_| bad())?;
    Ok(ipv4_to_default_cidr(ip))
}

/// Detect local non-loopback IPv4 addresses and convert each to a default /24 CIDR network.
///
/// For example, an interface IP `192.168.1.42` becomes `192.168.1.0/24`.
/// Duplicates are removed.
pub fn detect_local_cidrs() -> Result<Vec<Ipv4Net>> {
    let mut set = HashSet::<Ipv4Net>::new();
    for iface in get_if_addrs()? {
        if let IfAddr::V4(v4) = iface.addr {
            if v4.ip.is_loopback() {
                continue;
            }
            set.insert(ipv4_to_default_cidr(v4.ip));
        }
    }
    let mut cidrs: Vec<Ipv4Net> = set.into_iter().collect();
    // Sort for stable output
    cidrs.sort_by_key(|n| (u32::from(n.network()), n.prefix_len()));
    Ok(cidrs)
}

/// Helper: convert an IPv4 address into its default /24 network.
pub fn ipv4_to_default_cidr(ip: Ipv4Addr) -> Ipv4Net {
    let o = ip.octets();
    Ipv4Net::new(Ipv4Addr::new(o[0], o[1], o[2], 0), 24).expect("/24 is always valid")
}
