//! Background polling of upstream documents.
//!
//! Each document type gets its own [`Poller`] on its own interval. A cycle fetches the
//! raw bytes, skips them if they match the last accepted bytes, then parses, validates
//! against the last accepted document, and hands the result to a [`DocumentSink`] that
//! builds and publishes the derived snapshots. Any failure ends the cycle and leaves
//! the published snapshots untouched.

mod validate;

pub use validate::validate;

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use cdnroute_core::{ConstructionError, Document, HealthDocument, RoutingTable, TopologyDocument};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::PollError;
use crate::fetcher::Fetcher;

/// Receives accepted documents and publishes what is derived from them.
pub trait DocumentSink<D>: Send + Sync {
    /// Build and publish every snapshot derived from `document`.
    ///
    /// On error nothing may have been published.
    fn publish(&self, document: Arc<D>) -> Result<(), ConstructionError>;
}

impl DocumentSink<TopologyDocument> for RoutingTable {
    fn publish(&self, document: Arc<TopologyDocument>) -> Result<(), ConstructionError> {
        self.apply_topology(document)
    }
}

impl DocumentSink<HealthDocument> for RoutingTable {
    fn publish(&self, document: Arc<HealthDocument>) -> Result<(), ConstructionError> {
        self.apply_health(document);
        Ok(())
    }
}

/// What a single poll cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The fetch failed.
    FetchFailed,
    /// The bytes matched the last accepted bytes.
    Unchanged,
    /// The bytes did not decode.
    ParseFailed,
    /// The document failed validation or its snapshots failed to build.
    Rejected,
    /// New snapshots were published.
    Applied,
}

/// Polls one document type and publishes accepted versions.
pub struct Poller<D: Document> {
    fetcher: Box<dyn Fetcher>,
    sink: Arc<dyn DocumentSink<D>>,
    interval: Duration,
    last_bytes: Option<Bytes>,
    active: Option<Arc<D>>,
}

impl<D: Document> Poller<D> {
    /// Create a poller that fetches with `fetcher` every `interval`.
    pub fn new(fetcher: Box<dyn Fetcher>, sink: Arc<dyn DocumentSink<D>>, interval: Duration) -> Self {
        Self {
            fetcher,
            sink,
            interval,
            last_bytes: None,
            active: None,
        }
    }

    /// The last document this poller published.
    pub fn active(&self) -> Option<&Arc<D>> {
        self.active.as_ref()
    }

    /// Run one cycle.
    pub async fn poll_once(&mut self) -> CycleOutcome {
        match self.cycle().await {
            Ok(true) => {
                info!(document = D::KIND, generation = ?self.active.as_ref().and_then(|d| d.generation()), "Applied new document");
                CycleOutcome::Applied
            }
            Ok(false) => {
                debug!(document = D::KIND, "Document unchanged");
                CycleOutcome::Unchanged
            }
            Err(PollError::Fetch(e)) => {
                warn!(document = D::KIND, error = %e, "Fetch failed, keeping current snapshot");
                CycleOutcome::FetchFailed
            }
            Err(PollError::Parse(e)) => {
                error!(document = D::KIND, error = %e, "Parse failed, keeping current snapshot");
                CycleOutcome::ParseFailed
            }
            Err(e) => {
                error!(document = D::KIND, error = %e, "Document rejected, keeping current snapshot");
                CycleOutcome::Rejected
            }
        }
    }

    /// Returns `Ok(false)` when there was nothing new to apply.
    async fn cycle(&mut self) -> Result<bool, PollError> {
        let bytes = self.fetcher.fetch().await?;
        if self.last_bytes.as_ref() == Some(&bytes) {
            return Ok(false);
        }

        let document = D::from_slice(&bytes)?;
        validate(self.active.as_deref(), &document)?;

        let document = Arc::new(document);
        self.sink.publish(Arc::clone(&document))?;

        self.last_bytes = Some(bytes);
        self.active = Some(document);
        Ok(true)
    }

    /// Poll immediately, then once per interval until `shutdown` is cancelled.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(
            document = D::KIND,
            interval_ms = self.interval.as_millis() as u64,
            "Poller starting"
        );

        let mut interval = time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!(document = D::KIND, "Poller shutting down");
                    break;
                }

                _ = interval.tick() => {
                    self.poll_once().await;
                }
            }
        }
    }

    /// Spawn [`run`](Self::run) onto the Tokio runtime.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use async_trait::async_trait;
    use cdnroute_core::LookupMiss;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays a script of responses; `None` is a fetch failure. The last entry repeats.
    #[derive(Debug)]
    struct Scripted {
        script: Mutex<VecDeque<Option<String>>>,
        calls: Arc<AtomicUsize>,
    }

    impl Scripted {
        fn new(script: &[Option<&str>]) -> (Box<dyn Fetcher>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let fetcher = Scripted {
                script: Mutex::new(script.iter().map(|s| s.map(str::to_string)).collect()),
                calls: Arc::clone(&calls),
            };
            (Box::new(fetcher), calls)
        }
    }

    #[async_trait]
    impl Fetcher for Scripted {
        async fn fetch(&self) -> Result<Bytes, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            let next = if script.len() > 1 {
                script.pop_front().unwrap()
            } else {
                script.front().cloned().unwrap()
            };
            next.map(Bytes::from).ok_or(FetchError::NoSources)
        }
    }

    fn topology(cdn: &str, date: i64, pattern: &str) -> String {
        format!(
            r#"{{
                "stats": {{ "CDN_name": "{cdn}", "date": {date} }},
                "edgeLocations": {{ "denver": {{ "latitude": 39.7, "longitude": -104.9 }} }},
                "contentServers": {{ "cache1": {{ "cacheGroup": "denver", "deliveryServices": {{ "videos": [] }} }} }},
                "deliveryServices": {{ "videos": {{ "matchsets": [ {{ "protocol": "HTTP", "matchlist": [
                    {{ "match-type": "HOST", "regex": "{pattern}" }}
                ] }} ] }} }}
            }}"#
        )
    }

    fn topology_poller(script: &[Option<&str>]) -> (Poller<TopologyDocument>, Arc<RoutingTable>) {
        let table = Arc::new(RoutingTable::new());
        let (fetcher, _) = Scripted::new(script);
        let poller: Poller<TopologyDocument> =
            Poller::new(fetcher, table.clone(), Duration::from_secs(60));
        (poller, table)
    }

    #[tokio::test]
    async fn test_apply_then_unchanged() {
        let doc = topology("cdn1", 10, "a.b.example.com");
        let (mut poller, table) = topology_poller(&[Some(doc.as_str())]);

        assert_eq!(poller.poll_once().await, CycleOutcome::Applied);
        assert_eq!(table.snapshot().matcher.lookup("example.com", "b", "a"), Some("videos"));
        assert_eq!(poller.poll_once().await, CycleOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_failures_keep_last_good_snapshot() {
        let good = topology("cdn1", 10, "a.b.example.com");
        let (mut poller, table) = topology_poller(&[Some(good.as_str()), None, Some("{ not json")]);

        assert_eq!(poller.poll_once().await, CycleOutcome::Applied);
        let before = table.snapshot();

        assert_eq!(poller.poll_once().await, CycleOutcome::FetchFailed);
        assert_eq!(poller.poll_once().await, CycleOutcome::ParseFailed);

        let after = table.snapshot();
        assert!(Arc::ptr_eq(&before.matcher, &after.matcher));
        assert_eq!(after.matcher.lookup("example.com", "b", "a"), Some("videos"));
    }

    #[tokio::test]
    async fn test_older_generation_leaves_snapshots_untouched() {
        let newer = topology("cdn1", 20, "a.b.example.com");
        let older = topology("cdn1", 10, "x.y.example.com");
        let (mut poller, table) = topology_poller(&[Some(newer.as_str()), Some(older.as_str())]);

        assert_eq!(poller.poll_once().await, CycleOutcome::Applied);
        let before = table.snapshot();
        let topology_before = table.topology();

        assert_eq!(poller.poll_once().await, CycleOutcome::Rejected);

        let after = table.snapshot();
        assert!(Arc::ptr_eq(&before.matcher, &after.matcher));
        assert!(Arc::ptr_eq(&before.geo, &after.geo));
        assert!(Arc::ptr_eq(&before.selector, &after.selector));
        assert!(Arc::ptr_eq(&before.available, &after.available));
        assert!(Arc::ptr_eq(&topology_before, &table.topology()));
        assert_eq!(after.matcher.lookup("example.com", "y", "x"), None);
        assert_eq!(poller.active().unwrap().generation(), Some(20));
    }

    #[tokio::test]
    async fn test_other_cdn_rejected() {
        let first = topology("cdn1", 10, "a.b.example.com");
        let other = topology("cdn2", 11, "a.b.example.com");
        let (mut poller, table) = topology_poller(&[Some(first.as_str()), Some(other.as_str())]);

        poller.poll_once().await;
        assert_eq!(poller.poll_once().await, CycleOutcome::Rejected);
        assert_eq!(table.topology().cdn_name(), Some("cdn1"));
    }

    #[tokio::test]
    async fn test_construction_error_rejects_and_later_document_applies() {
        let first = topology("cdn1", 10, "a.b.example.com");
        let broken = topology("cdn1", 11, "(unclosed");
        let fixed = topology("cdn1", 12, "c.d.example.com");
        let (mut poller, table) = topology_poller(&[Some(first.as_str()), Some(broken.as_str()), Some(fixed.as_str())]);

        assert_eq!(poller.poll_once().await, CycleOutcome::Applied);
        assert_eq!(poller.poll_once().await, CycleOutcome::Rejected);
        assert_eq!(poller.active().unwrap().generation(), Some(10));
        assert_eq!(poller.poll_once().await, CycleOutcome::Applied);
        assert_eq!(table.snapshot().matcher.lookup("example.com", "d", "c"), Some("videos"));
    }

    #[tokio::test]
    async fn test_health_poller_rebuilds_available_servers() {
        let table = Arc::new(RoutingTable::new());
        let doc = topology("cdn1", 10, "a.b.example.com");
        let (topology_fetcher, _) = Scripted::new(&[Some(doc.as_str())]);
        let (health_fetcher, _) = Scripted::new(&[
            Some(r#"{ "caches": { "cache1": { "isAvailable": true } } }"#),
            Some(r#"{ "caches": { "cache1": { "isAvailable": false } } }"#),
        ]);
        let mut topology_poller: Poller<TopologyDocument> =
            Poller::new(topology_fetcher, table.clone(), Duration::from_secs(60));
        let mut health_poller: Poller<HealthDocument> =
            Poller::new(health_fetcher, table.clone(), Duration::from_secs(1));

        assert_eq!(health_poller.poll_once().await, CycleOutcome::Applied);
        assert_eq!(topology_poller.poll_once().await, CycleOutcome::Applied);
        assert_eq!(table.snapshot().available.lookup("videos", "denver").unwrap(), ["cache1"]);

        assert_eq!(health_poller.poll_once().await, CycleOutcome::Applied);
        assert_eq!(
            table.snapshot().available.lookup("videos", "denver"),
            Err(LookupMiss::NoAvailableServers)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_polls_immediately_and_stops_on_shutdown() {
        let table = Arc::new(RoutingTable::new());
        let (fetcher, calls) = Scripted::new(&[Some(r#"{ "caches": {} }"#)]);
        let poller: Poller<HealthDocument> = Poller::new(fetcher, table, Duration::from_millis(100));

        let shutdown = CancellationToken::new();
        let handle = poller.spawn(shutdown.clone());

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(calls.load(Ordering::SeqCst) >= 3);

        shutdown.cancel();
        handle.await.unwrap();
        let stopped_at = calls.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), stopped_at);
    }
}
