//! Index of currently available cache servers per delivery service and cache group.

use std::collections::HashMap;

use thiserror::Error;

use super::document::{HealthDocument, TopologyDocument};

/// Why a lookup produced no usable server list.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum LookupMiss {
    /// The delivery service is not in the topology.
    #[error("unknown delivery service")]
    UnknownDeliveryService,
    /// No server of the delivery service lives in the cache group.
    #[error("cache group not assigned to delivery service")]
    UnknownCacheGroup,
    /// Servers are assigned but none is currently available.
    #[error("no available cache servers")]
    NoAvailableServers,
}

/// Delivery service to cache group to available server names.
///
/// Rebuilt whole from a topology and a health document; never patched.
#[derive(Debug, Default)]
pub struct AvailableServers {
    by_ds: HashMap<String, HashMap<String, Vec<String>>>,
}

impl AvailableServers {
    /// Build the index from the latest topology and health documents.
    ///
    /// Every (delivery service, cache group) pair with an assigned server is
    /// recorded, even when all of its servers are down, so that an outage can be
    /// told apart from a pair that was never configured. Servers appear in name order.
    pub fn rebuild(topology: &TopologyDocument, health: &HealthDocument) -> Self {
        let mut by_ds: HashMap<String, HashMap<String, Vec<String>>> = topology
            .delivery_services
            .keys()
            .map(|ds| (ds.clone(), HashMap::new()))
            .collect();

        for (name, server) in &topology.content_servers {
            let Some(cache_group) = server.cache_group.as_deref().filter(|cg| !cg.is_empty()) else {
                continue;
            };
            let available = health.is_available(name);

            for ds in server.delivery_services.keys() {
                let Some(groups) = by_ds.get_mut(ds) else {
                    continue;
                };
                let servers = groups.entry(cache_group.to_string()).or_default();
                if available {
                    servers.push(name.clone());
                }
            }
        }

        Self { by_ds }
    }

    /// Available servers of `ds` in `cache_group`.
    pub fn lookup(&self, ds: &str, cache_group: &str) -> Result<&[String], LookupMiss> {
        let groups = self.by_ds.get(ds).ok_or(LookupMiss::UnknownDeliveryService)?;
        let servers = groups.get(cache_group).ok_or(LookupMiss::UnknownCacheGroup)?;
        if servers.is_empty() {
            return Err(LookupMiss::NoAvailableServers);
        }
        Ok(servers)
    }

    /// Total number of available (delivery service, server) assignments.
    pub fn available_count(&self) -> usize {
        self.by_ds
            .values()
            .flat_map(|groups| groups.values())
            .map(Vec::len)
            .sum()
    }
}
