//! Upstream topology and health documents.
//!
//! Both arrive as JSON from the control plane. Only the fields the router needs are
//! modelled; everything else is ignored during deserialization.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ConstructionError, ParseError};
use crate::geo::{CacheGroupLocation, GeoPoint};

/// Match type of the host patterns used for HTTP routing.
const HOST_MATCH_TYPE: &str = "HOST";

/// Match set protocol of delivery services answered over DNS rather than HTTP.
const DNS_PROTOCOL: &str = "DNS";

/// A document polled from the control plane.
pub trait Document: DeserializeOwned + Send + Sync + 'static {
    /// Short name used in logs and errors.
    const KIND: &'static str;

    /// Decode a document from raw bytes.
    fn from_slice(bytes: &[u8]) -> Result<Self, ParseError> {
        serde_json::from_slice(bytes).map_err(|source| ParseError {
            kind: Self::KIND,
            source,
        })
    }

    /// CDN this document describes, if it says.
    fn cdn_name(&self) -> Option<&str>;

    /// Generation timestamp, if the document carries one.
    fn generation(&self) -> Option<i64>;
}

/// CDN topology: delivery services, cache servers and cache group locations.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopologyDocument {
    /// Document identity and generation.
    #[serde(default)]
    pub stats: Stats,
    /// Cache group name to location.
    #[serde(default)]
    pub edge_locations: BTreeMap<String, EdgeLocation>,
    /// Cache server name to its assignments.
    #[serde(default)]
    pub content_servers: BTreeMap<String, ContentServer>,
    /// Delivery service name to its match rules.
    #[serde(default)]
    pub delivery_services: BTreeMap<String, DeliveryService>,
}

/// Identity block of a topology document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Stats {
    /// Name of the CDN.
    #[serde(rename = "CDN_name", default)]
    pub cdn_name: Option<String>,
    /// Generation timestamp, seconds since the epoch.
    #[serde(default)]
    pub date: Option<i64>,
}

/// Coordinates of a cache group. Either may be absent upstream.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EdgeLocation {
    /// Degrees north.
    #[serde(default)]
    pub latitude: Option<f64>,
    /// Degrees east.
    #[serde(default)]
    pub longitude: Option<f64>,
}

/// A cache server's placement.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentServer {
    /// Cache group the server belongs to.
    #[serde(default)]
    pub cache_group: Option<String>,
    /// Delivery services the server is assigned to. Values are not used for routing.
    #[serde(default)]
    pub delivery_services: BTreeMap<String, serde_json::Value>,
}

/// A delivery service's match rules.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryService {
    /// Groups of match entries.
    #[serde(default)]
    pub matchsets: Vec<MatchSet>,
    /// Where to place clients of this service that cannot be geolocated.
    #[serde(default)]
    pub miss_location: Option<MissLocation>,
}

impl DeliveryService {
    /// True if any match set routes this service over DNS.
    pub fn is_dns(&self) -> bool {
        self.matchsets.iter().any(|set| {
            set.protocol
                .as_deref()
                .is_some_and(|p| p.eq_ignore_ascii_case(DNS_PROTOCOL))
        })
    }
}

/// Fallback position of a delivery service, as `{ "lat": .., "long": .. }`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct MissLocation {
    /// Degrees north.
    #[serde(rename = "lat")]
    pub latitude: f64,
    /// Degrees east.
    #[serde(rename = "long")]
    pub longitude: f64,
}

impl From<MissLocation> for GeoPoint {
    fn from(miss: MissLocation) -> Self {
        GeoPoint::new(miss.latitude, miss.longitude)
    }
}

/// One group of match entries.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchSet {
    /// Protocol the set applies to, e.g. `HTTP`.
    #[serde(default)]
    pub protocol: Option<String>,
    /// Entries of the set.
    #[serde(default)]
    pub matchlist: Vec<MatchEntry>,
}

/// A single match pattern.
#[derive(Debug, Clone, Deserialize)]
pub struct MatchEntry {
    /// Kind of match, only `HOST` entries are routed on.
    #[serde(rename = "match-type")]
    pub match_type: String,
    /// The pattern.
    pub regex: String,
}

impl Document for TopologyDocument {
    const KIND: &'static str = "topology";

    fn cdn_name(&self) -> Option<&str> {
        self.stats.cdn_name.as_deref()
    }

    fn generation(&self) -> Option<i64> {
        self.stats.date
    }
}

impl TopologyDocument {
    /// Host patterns per HTTP delivery service, in document order.
    ///
    /// Every HTTP delivery service is present, possibly with an empty list. DNS
    /// delivery services are left out.
    pub fn host_patterns(&self) -> BTreeMap<String, Vec<String>> {
        self.delivery_services
            .iter()
            .filter(|(_, ds)| !ds.is_dns())
            .map(|(name, ds)| {
                let patterns = ds
                    .matchsets
                    .iter()
                    .flat_map(|set| set.matchlist.iter())
                    .filter(|entry| entry.match_type.eq_ignore_ascii_case(HOST_MATCH_TYPE))
                    .map(|entry| entry.regex.clone())
                    .collect();
                (name.clone(), patterns)
            })
            .collect()
    }

    /// Fallback positions of the delivery services that declare one.
    pub fn miss_locations(&self) -> BTreeMap<String, GeoPoint> {
        self.delivery_services
            .iter()
            .filter_map(|(name, ds)| Some((name.clone(), ds.miss_location?.into())))
            .collect()
    }

    /// Location of every cache group.
    pub fn cache_group_locations(&self) -> Result<Vec<CacheGroupLocation>, ConstructionError> {
        self.edge_locations
            .iter()
            .map(|(name, edge)| match (edge.latitude, edge.longitude) {
                (Some(latitude), Some(longitude)) => Ok(CacheGroupLocation::new(
                    name.clone(),
                    GeoPoint::new(latitude, longitude),
                )),
                _ => Err(ConstructionError::MissingCoordinates(name.clone())),
            })
            .collect()
    }
}

/// Per-server availability published by the health monitor.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HealthDocument {
    /// Cache server name to its state.
    #[serde(default)]
    pub caches: BTreeMap<String, CacheHealth>,
}

/// Health of one cache server.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct CacheHealth {
    /// Whether the server may receive traffic.
    #[serde(rename = "isAvailable", default)]
    pub is_available: bool,
}

impl Document for HealthDocument {
    const KIND: &'static str = "health";

    fn cdn_name(&self) -> Option<&str> {
        None
    }

    fn generation(&self) -> Option<i64> {
        None
    }
}

impl HealthDocument {
    /// True if `server` is listed and marked available. Unlisted servers are unavailable.
    pub fn is_available(&self, server: &str) -> bool {
        self.caches.get(server).is_some_and(|h| h.is_available)
    }
}
