//! cdnroute core functionality.
//!
//! This crate contains the routing data structures that the cdnroute traffic router
//! rebuilds on every configuration update, and the lock-free snapshot slots through
//! which request handlers read them.

pub mod domain;
pub mod error;
pub mod geo;
pub mod load_balancer;
pub mod snapshot;

pub use domain::available::{AvailableServers, LookupMiss};
pub use domain::document::{Document, HealthDocument, TopologyDocument};
pub use domain::pattern::PatternMatcher;
pub use domain::routing::{RouteSnapshot, RoutingTable, SharedRoutingTable};
pub use error::{ConstructionError, ParseError};
pub use geo::{CacheGroupLocation, GeoIndex, GeoPoint, Rect};
pub use load_balancer::selector::NextCacheSelector;
pub use snapshot::SnapshotSlot;
