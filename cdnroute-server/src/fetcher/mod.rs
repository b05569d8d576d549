//! Retrieval of raw document bytes.
//!
//! A [`Fetcher`] knows one way of getting a document: a local file, an HTTP URL, or a
//! rotation over several of those. Fetchers never retry; a failure is reported to the
//! poller, which keeps serving the last good snapshot and tries again next cycle.

mod file;
mod http;
mod round_robin;

pub use file::FileFetcher;
pub use http::HttpFetcher;
pub use round_robin::RoundRobinFetcher;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::FetchError;

/// A source of raw document bytes.
#[async_trait]
pub trait Fetcher: Send + Sync + fmt::Debug {
    /// Retrieve the current bytes of the document.
    async fn fetch(&self) -> Result<Bytes, FetchError>;
}

/// Build a fetcher for a list of sources.
///
/// `http://` and `https://` sources are fetched over HTTP with the given timeout and
/// User-Agent; anything else is read as a file path. Several sources are rotated
/// round robin.
pub fn from_sources(
    sources: &[String],
    timeout: Duration,
    user_agent: &str,
) -> Result<Box<dyn Fetcher>, FetchError> {
    let mut fetchers = sources
        .iter()
        .map(|source| single(source, timeout, user_agent))
        .collect::<Result<Vec<_>, _>>()?;

    match fetchers.len() {
        0 => Err(FetchError::NoSources),
        1 => Ok(fetchers.remove(0)),
        _ => Ok(Box::new(RoundRobinFetcher::new(fetchers)?)),
    }
}

fn single(source: &str, timeout: Duration, user_agent: &str) -> Result<Box<dyn Fetcher>, FetchError> {
    if source.starts_with("http://") || source.starts_with("https://") {
        Ok(Box::new(HttpFetcher::new(source, timeout, user_agent)?))
    } else {
        Ok(Box::new(FileFetcher::new(source)))
    }
}
