//! Routing module holding the live routing snapshots.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use crate::domain::available::AvailableServers;
use crate::domain::document::{HealthDocument, TopologyDocument};
use crate::domain::pattern::PatternMatcher;
use crate::error::ConstructionError;
use crate::geo::{GeoIndex, GeoPoint};
use crate::load_balancer::selector::NextCacheSelector;
use crate::snapshot::SnapshotSlot;

/// A lock-free routing table of independently published snapshots.
///
/// Each snapshot lives in its own [`SnapshotSlot`], so request handlers read without
/// locks while pollers build replacements off to the side and swap them in. Until the
/// first documents arrive every slot holds an empty value.
///
/// Topology and health are polled independently, so the available-servers index may
/// briefly combine a new topology with the previous health document or vice versa.
#[derive(Debug, Default)]
pub struct RoutingTable {
    topology: SnapshotSlot<TopologyDocument>,
    health: SnapshotSlot<HealthDocument>,
    geo: SnapshotSlot<GeoIndex>,
    matcher: SnapshotSlot<PatternMatcher>,
    selector: SnapshotSlot<NextCacheSelector>,
    miss_locations: SnapshotSlot<BTreeMap<String, GeoPoint>>,
    available: SnapshotSlot<AvailableServers>,
    // Serializes writers rebuilding the available-servers index; readers never take it.
    rebuild: Mutex<()>,
}

/// The derived snapshots one request routes against.
#[derive(Debug, Clone)]
pub struct RouteSnapshot {
    /// Hostname matcher.
    pub matcher: Arc<PatternMatcher>,
    /// Cache group locations.
    pub geo: Arc<GeoIndex>,
    /// Round-robin counters.
    pub selector: Arc<NextCacheSelector>,
    /// Fallback client positions per delivery service.
    pub miss_locations: Arc<BTreeMap<String, GeoPoint>>,
    /// Available servers per delivery service and cache group.
    pub available: Arc<AvailableServers>,
}

impl RoutingTable {
    /// Create a routing table with every snapshot empty.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every topology-derived snapshot and publish them.
    ///
    /// Nothing is published if any snapshot fails to build.
    pub fn apply_topology(&self, topology: Arc<TopologyDocument>) -> Result<(), ConstructionError> {
        let geo = GeoIndex::from_locations(topology.cache_group_locations()?)?;
        let matcher = PatternMatcher::build(&topology.host_patterns())?;
        let selector =
            NextCacheSelector::rebuild_from(&self.selector.get(), topology.delivery_services.keys().cloned());
        let miss_locations = topology.miss_locations();

        let (wildcard, exact, regex) = matcher.bucket_sizes();
        info!(
            cache_groups = geo.len(),
            delivery_services = selector.len(),
            wildcard_patterns = wildcard,
            exact_patterns = exact,
            regex_patterns = regex,
            miss_locations = miss_locations.len(),
            "Publishing topology snapshots"
        );

        self.geo.set(geo);
        self.matcher.set(matcher);
        self.selector.set(selector);
        self.miss_locations.set(miss_locations);

        let _guard = self.rebuild.lock();
        self.topology.set_arc(topology);
        self.rebuild_available();
        Ok(())
    }

    /// Publish a health document and rebuild the available-servers index.
    pub fn apply_health(&self, health: Arc<HealthDocument>) {
        let _guard = self.rebuild.lock();
        self.health.set_arc(health);
        self.rebuild_available();
    }

    fn rebuild_available(&self) {
        let available = AvailableServers::rebuild(&self.topology.get(), &self.health.get());
        info!(available = available.available_count(), "Publishing available servers");
        self.available.set(available);
    }

    /// Read the current derived snapshots for one request.
    pub fn snapshot(&self) -> RouteSnapshot {
        RouteSnapshot {
            matcher: self.matcher.get(),
            geo: self.geo.get(),
            selector: self.selector.get(),
            miss_locations: self.miss_locations.get(),
            available: self.available.get(),
        }
    }

    /// The most recently applied topology document.
    pub fn topology(&self) -> Arc<TopologyDocument> {
        self.topology.get()
    }

    /// The most recently applied health document.
    pub fn health(&self) -> Arc<HealthDocument> {
        self.health.get()
    }
}

/// A shared reference to the lock-free routing table.
pub type SharedRoutingTable = Arc<RoutingTable>;
