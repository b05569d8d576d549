//! cdnroute engine
//!
//! Polls topology and health documents in the background, keeps the routing snapshots
//! in a [`RoutingTable`](cdnroute_core::RoutingTable) current, and answers HTTP
//! requests with redirects to the chosen cache.

pub mod config;
pub mod coverage_zone;
pub mod error;
pub mod fetcher;
pub mod poller;
pub mod router;
pub mod server;
