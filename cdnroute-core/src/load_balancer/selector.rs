//! Round-robin selector logic

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// One round-robin counter per delivery service.
///
/// The set of delivery services is fixed when the selector is built; callers must
/// re-read the current selector snapshot for every request rather than holding on
/// to one across configuration changes.
#[derive(Debug, Default)]
pub struct NextCacheSelector {
    counters: HashMap<String, AtomicU64>,
}

impl NextCacheSelector {
    /// Create a selector with every counter at zero.
    pub fn build<I, S>(delivery_services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            counters: delivery_services
                .into_iter()
                .map(|ds| (ds.into(), AtomicU64::new(0)))
                .collect(),
        }
    }

    /// Create a selector for a new set of delivery services.
    ///
    /// Services already in `previous` keep their position so a reload does not send
    /// every service back to its first cache; new services start at zero and services
    /// missing from the new set are dropped.
    pub fn rebuild_from<I, S>(previous: &NextCacheSelector, delivery_services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            counters: delivery_services
                .into_iter()
                .map(|ds| {
                    let ds = ds.into();
                    let start = previous
                        .counters
                        .get(&ds)
                        .map_or(0, |c| c.load(Ordering::Relaxed));
                    (ds, AtomicU64::new(start))
                })
                .collect(),
        }
    }

    /// Advance the counter of `ds` and return its value before the increment.
    ///
    /// The counter wraps on overflow; callers reduce it modulo their candidate count.
    pub fn next_index(&self, ds: &str) -> Option<u64> {
        self.counters
            .get(ds)
            .map(|counter| counter.fetch_add(1, Ordering::Relaxed))
    }

    /// Pick the next entry of `candidates` for `ds`.
    ///
    /// Returns `None` if `ds` is unknown or `candidates` is empty.
    pub fn select<'a, T>(&self, ds: &str, candidates: &'a [T]) -> Option<&'a T> {
        if candidates.is_empty() {
            return None;
        }
        let n = self.next_index(ds)?;
        candidates.get((n % candidates.len() as u64) as usize)
    }

    /// Number of delivery services with a counter.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// True if no delivery service has a counter.
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}
