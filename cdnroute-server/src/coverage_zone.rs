//! Client IP to geographic position lookup.
//!
//! Coverage zones map CIDR blocks to coordinates. IPv4 and IPv6 blocks are kept in
//! separate lists, each in file order, and a lookup returns the first block that
//! contains the address. There is no longest-prefix preference.

use std::net::IpAddr;
use std::path::Path;
use std::str::FromStr;

use cdnroute_core::GeoPoint;
use serde::Deserialize;
use tracing::info;

use crate::error::CoverageZoneError;

/// Resolves a client address to a position.
pub trait Geolocator: Send + Sync {
    /// Position of `ip`, if known.
    fn locate(&self, ip: IpAddr) -> Option<GeoPoint>;
}

/// An IP network in CIDR notation. A bare address is a single-host network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cidr {
    network: IpAddr,
    prefix_len: u8,
}

impl Cidr {
    /// True if `ip` is inside the network. Addresses of the other family never are.
    pub fn contains(&self, ip: &IpAddr) -> bool {
        match (self.network, ip) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = u32::MAX.checked_shl(32 - self.prefix_len as u32).unwrap_or(0);
                u32::from(net) & mask == u32::from(*ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = u128::MAX.checked_shl(128 - self.prefix_len as u32).unwrap_or(0);
                u128::from(net) & mask == u128::from(*ip) & mask
            }
            _ => false,
        }
    }
}

impl FromStr for Cidr {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, prefix) = match s.trim().split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (s.trim(), None),
        };
        let network: IpAddr = addr.parse().map_err(|_| ())?;
        let max = if network.is_ipv4() { 32 } else { 128 };
        let prefix_len = match prefix {
            Some(p) => p.parse::<u8>().map_err(|_| ())?,
            None => max,
        };
        if prefix_len > max {
            return Err(());
        }
        Ok(Self {
            network,
            prefix_len,
        })
    }
}

#[derive(Debug, Deserialize)]
struct CoverageZoneFile {
    #[serde(rename = "coverageZones", default)]
    coverage_zones: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Zone {
    #[serde(default)]
    network: Vec<String>,
    #[serde(default)]
    network6: Vec<String>,
    coordinates: GeoPoint,
}

/// Coverage zone table loaded from a JSON file.
#[derive(Debug, Default)]
pub struct CoverageZones {
    v4: Vec<(Cidr, GeoPoint)>,
    v6: Vec<(Cidr, GeoPoint)>,
}

impl CoverageZones {
    /// Decode a coverage zone file.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CoverageZoneError> {
        let file: CoverageZoneFile = serde_json::from_slice(bytes)?;
        let mut zones = Self::default();

        for (name, value) in file.coverage_zones {
            let zone: Zone = serde_json::from_value(value)?;
            for (networks, table) in [(&zone.network, &mut zones.v4), (&zone.network6, &mut zones.v6)] {
                for network in networks {
                    let cidr = network.parse::<Cidr>().map_err(|_| CoverageZoneError::InvalidNetwork {
                        zone: name.clone(),
                        network: network.clone(),
                    })?;
                    table.push((cidr, zone.coordinates));
                }
            }
        }

        Ok(zones)
    }

    /// Read and decode a coverage zone file.
    pub async fn load(path: &Path) -> Result<Self, CoverageZoneError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| CoverageZoneError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let zones = Self::from_slice(&bytes)?;
        info!(
            path = %path.display(),
            ipv4_networks = zones.v4.len(),
            ipv6_networks = zones.v6.len(),
            "Loaded coverage zones"
        );
        Ok(zones)
    }
}

/// IPv4-mapped IPv6 addresses are looked up as IPv4.
fn normalize(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(IpAddr::V6(v6), IpAddr::V4),
        v4 => v4,
    }
}

impl Geolocator for CoverageZones {
    fn locate(&self, ip: IpAddr) -> Option<GeoPoint> {
        let ip = normalize(ip);
        let table = match ip {
            IpAddr::V4(_) => &self.v4,
            IpAddr::V6(_) => &self.v6,
        };
        table
            .iter()
            .find(|(cidr, _)| cidr.contains(&ip))
            .map(|(_, point)| *point)
    }
}
