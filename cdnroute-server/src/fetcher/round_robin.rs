//! Rotation over several fetchers.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;

use super::Fetcher;
use crate::error::FetchError;

/// Cycles through its fetchers, one per call.
///
/// There is no failover: if the chosen fetcher fails, the call fails and the next
/// call moves on to the next fetcher.
#[derive(Debug)]
pub struct RoundRobinFetcher {
    fetchers: Vec<Box<dyn Fetcher>>,
    next: AtomicUsize,
}

impl RoundRobinFetcher {
    /// Create a rotation over `fetchers`. At least one is required.
    pub fn new(fetchers: Vec<Box<dyn Fetcher>>) -> Result<Self, FetchError> {
        if fetchers.is_empty() {
            return Err(FetchError::NoSources);
        }
        Ok(Self {
            fetchers,
            next: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Fetcher for RoundRobinFetcher {
    async fn fetch(&self) -> Result<Bytes, FetchError> {
        let i = self.next.fetch_add(1, Ordering::Relaxed) % self.fetchers.len();
        self.fetchers[i].fetch().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Fixed(Option<&'static str>);

    #[async_trait]
    impl Fetcher for Fixed {
        async fn fetch(&self) -> Result<Bytes, FetchError> {
            self.0
                .map(|s| Bytes::from_static(s.as_bytes()))
                .ok_or(FetchError::NoSources)
        }
    }

    #[tokio::test]
    async fn test_cycles_through_fetchers() {
        let fetcher = RoundRobinFetcher::new(vec![Box::new(Fixed(Some("a"))), Box::new(Fixed(Some("b")))])
            .unwrap();

        let mut seen = vec![];
        for _ in 0..4 {
            seen.push(fetcher.fetch().await.unwrap());
        }
        assert_eq!(seen, ["a", "b", "a", "b"]);
    }

    #[tokio::test]
    async fn test_failure_is_not_retried_elsewhere() {
        let fetcher = RoundRobinFetcher::new(vec![Box::new(Fixed(None)), Box::new(Fixed(Some("b")))])
            .unwrap();

        assert!(fetcher.fetch().await.is_err());
        assert_eq!(fetcher.fetch().await.unwrap(), "b");
    }

    #[test]
    fn test_requires_a_fetcher() {
        assert!(matches!(RoundRobinFetcher::new(vec![]), Err(FetchError::NoSources)));
    }
}
