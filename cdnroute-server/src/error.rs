//! Error types for polling, configuration and startup.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use cdnroute_core::{ConstructionError, ParseError};
use thiserror::Error;

/// Raw document bytes could not be retrieved.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Reading a local file failed.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        /// File that was read.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The request did not complete within the fetch timeout.
    #[error("request to {url} timed out after {timeout:?}")]
    Timeout {
        /// Requested URL.
        url: String,
        /// Configured timeout.
        timeout: Duration,
    },

    /// The request failed at the transport level.
    #[error("request to {url} failed: {source}")]
    Http {
        /// Requested URL.
        url: String,
        /// Underlying client error.
        source: reqwest::Error,
    },

    /// The server answered with a non-success status.
    #[error("request to {url} returned HTTP {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// Status returned.
        status: reqwest::StatusCode,
    },

    /// A composite fetcher was built with nothing to fetch from.
    #[error("no fetch sources configured")]
    NoSources,
}

/// A well-formed document was refused because it does not follow the active one.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The document belongs to another CDN, or does not say which.
    #[error("document names CDN {found:?}, expected {expected:?}")]
    CdnMismatch {
        /// CDN of the active document.
        expected: String,
        /// CDN named by the new document.
        found: Option<String>,
    },

    /// The document is older than the active one.
    #[error("document generation {found} is older than active generation {active}")]
    StaleGeneration {
        /// Generation of the active document.
        active: i64,
        /// Generation of the new document.
        found: i64,
    },

    /// The active document has a generation but the new one does not.
    #[error("document has no generation, active generation is {active}")]
    MissingGeneration {
        /// Generation of the active document.
        active: i64,
    },
}

/// Anything that ends a poll cycle without publishing.
#[derive(Debug, Error)]
pub enum PollError {
    /// See [`FetchError`].
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// See [`ParseError`].
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// See [`ValidationError`].
    #[error("rejected: {0}")]
    Validation(#[from] ValidationError),
    /// See [`ConstructionError`].
    #[error("rejected: {0}")]
    Construction(#[from] ConstructionError),
}

/// The configuration file is unusable.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        /// Config file path.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The file is not valid configuration JSON.
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A source list is empty.
    #[error("{0} must list at least one source")]
    NoSources(&'static str),

    /// A poll interval or timeout is zero.
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// The coverage zone file is unusable.
#[derive(Debug, Error)]
pub enum CoverageZoneError {
    /// The file could not be read.
    #[error("failed to read coverage zone file {}: {source}", .path.display())]
    Io {
        /// Coverage zone file path.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The file is not valid coverage zone JSON.
    #[error("invalid coverage zone file: {0}")]
    Parse(#[from] serde_json::Error),

    /// A network entry is not a valid CIDR.
    #[error("zone {zone:?} has invalid network {network:?}")]
    InvalidNetwork {
        /// Zone name.
        zone: String,
        /// Offending network string.
        network: String,
    },
}
