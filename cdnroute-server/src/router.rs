//! Per-request routing decision.
//!
//! A request host `subsubdomain.subdomain.domain` is matched to a delivery service,
//! the client is placed on the map, the nearest cache group is chosen, and the next
//! available cache of that group takes over the first label of the host in a 302.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use cdnroute_core::{GeoPoint, LookupMiss, RouteSnapshot, SharedRoutingTable};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderMap, HeaderValue, HOST, LOCATION};
use hyper::{Request, Response, StatusCode};
use tracing::{debug, error, warn};

use crate::coverage_zone::Geolocator;

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Outcome of routing one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Redirect to this absolute URL.
    Redirect(String),
    /// The request cannot be routed until configuration changes.
    NotFound,
    /// A routable request has nowhere to go right now.
    ServerError,
}

/// Routes requests against the live routing snapshots.
pub struct RequestRouter {
    table: SharedRoutingTable,
    geolocator: Arc<dyn Geolocator>,
    default_position: GeoPoint,
}

impl RequestRouter {
    /// Create a router.
    ///
    /// `default_position` stands in for clients the geolocator cannot place when their
    /// delivery service has no miss location of its own.
    pub fn new(table: SharedRoutingTable, geolocator: Arc<dyn Geolocator>, default_position: GeoPoint) -> Self {
        Self {
            table,
            geolocator,
            default_position,
        }
    }

    /// Decide where a request for `host` and `path_and_query` from `client` goes.
    pub fn route(&self, host: &str, path_and_query: &str, client: Option<IpAddr>) -> RouteDecision {
        self.route_on(&self.table.snapshot(), host, path_and_query, client)
    }

    fn route_on(
        &self,
        snapshot: &RouteSnapshot,
        host: &str,
        path_and_query: &str,
        client: Option<IpAddr>,
    ) -> RouteDecision {
        let name = host.split(':').next().unwrap_or(host);
        let name = name.strip_suffix('.').unwrap_or(name).to_ascii_lowercase();
        let labels: Vec<&str> = name.split('.').collect();
        if labels.len() < 3 {
            debug!(event = "host_too_short", host, "Host has fewer than three labels");
            return RouteDecision::NotFound;
        }
        let (subsubdomain, subdomain) = (labels[0], labels[1]);
        let domain = labels[2..].join(".");

        let Some(ds) = snapshot.matcher.lookup(&domain, subdomain, subsubdomain) else {
            debug!(event = "no_ds", host, "No delivery service matches host");
            return RouteDecision::NotFound;
        };

        let position = match client.and_then(|ip| self.geolocator.locate(ip)) {
            Some(position) => position,
            None => match snapshot.miss_locations.get(ds) {
                Some(miss) => {
                    debug!(event = "geo_miss", ds, client = ?client, "Client not in coverage zones, using miss location");
                    *miss
                }
                None => {
                    warn!(event = "geo_miss_default", ds, client = ?client, "Client not in coverage zones, using default position");
                    self.default_position
                }
            },
        };

        let Some(cache_group) = snapshot.geo.nearest(&position) else {
            error!(event = "empty_geo_index", ds, "No cache groups loaded");
            return RouteDecision::ServerError;
        };

        let servers = match snapshot.available.lookup(ds, &cache_group.name) {
            Ok(servers) => servers,
            Err(LookupMiss::UnknownDeliveryService) => {
                warn!(event = "unknown_ds", ds, "Delivery service has no servers");
                return RouteDecision::NotFound;
            }
            Err(LookupMiss::UnknownCacheGroup) => {
                warn!(event = "unknown_cache_group", ds, cache_group = %cache_group.name, "Nearest cache group does not serve delivery service");
                return RouteDecision::NotFound;
            }
            Err(LookupMiss::NoAvailableServers) => {
                error!(event = "no_available_caches", ds, cache_group = %cache_group.name, "No available caches");
                return RouteDecision::ServerError;
            }
        };

        let Some(server) = snapshot.selector.select(ds, servers) else {
            warn!(event = "no_counter", ds, "Delivery service has no round-robin counter");
            return RouteDecision::NotFound;
        };

        // Everything after the first label, including any port, is kept as sent.
        let rest = host.split_once('.').map_or("", |(_, rest)| rest);
        let location = format!("http://{server}.{rest}{path_and_query}");
        debug!(event = "redirect", ds, cache_group = %cache_group.name, server = %server, location = %location, "Redirecting");
        RouteDecision::Redirect(location)
    }

    /// Answer an HTTP request received from `remote`.
    pub fn handle<B>(&self, request: &Request<B>, remote: SocketAddr) -> Response<Full<Bytes>> {
        let host = request
            .headers()
            .get(HOST)
            .and_then(|h| h.to_str().ok())
            .or_else(|| request.uri().authority().map(|a| a.as_str()))
            .unwrap_or("");
        let path_and_query = request.uri().path_and_query().map_or("/", |p| p.as_str());
        let client = client_ip(request.headers(), remote);

        match self.route(host, path_and_query, client) {
            RouteDecision::Redirect(location) => match HeaderValue::from_str(&location) {
                Ok(value) => {
                    let mut response = empty(StatusCode::FOUND);
                    response.headers_mut().insert(LOCATION, value);
                    response
                }
                Err(_) => {
                    error!(event = "bad_location", location = %location, "Redirect target is not a valid header");
                    empty(StatusCode::INTERNAL_SERVER_ERROR)
                }
            },
            RouteDecision::NotFound => empty(StatusCode::NOT_FOUND),
            RouteDecision::ServerError => empty(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }
}

/// The client address: `X-Forwarded-For` taken as a single address if present,
/// otherwise the connection's peer.
///
/// A header that is not exactly one address yields `None`, which routes as a
/// geolocation miss.
pub fn client_ip(headers: &HeaderMap, remote: SocketAddr) -> Option<IpAddr> {
    match headers.get(X_FORWARDED_FOR) {
        Some(value) => value.to_str().ok()?.trim().parse().ok(),
        None => Some(remote.ip()),
    }
}

fn empty(status: StatusCode) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}
