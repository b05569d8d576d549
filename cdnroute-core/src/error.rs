//! Error types raised while parsing upstream documents and building snapshots.

use thiserror::Error;

/// A document could not be decoded.
#[derive(Debug, Error)]
#[error("failed to parse {kind} document: {source}")]
pub struct ParseError {
    /// Which document type was being parsed.
    pub kind: &'static str,
    /// The underlying decode error.
    #[source]
    pub source: serde_json::Error,
}

/// A derived snapshot could not be built from an otherwise well-formed document.
///
/// Any of these rejects the whole update; the previously published snapshots stay live.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConstructionError {
    /// Two delivery services claim the same exact hostname or wildcard label.
    #[error("pattern key {key:?} claimed by both {first:?} and {second:?}")]
    DuplicatePattern {
        /// The colliding literal.
        key: String,
        /// Delivery service that registered the key first.
        first: String,
        /// Delivery service that tried to register it again.
        second: String,
    },

    /// A delivery service has no usable host patterns.
    #[error("delivery service {0:?} has no host patterns")]
    EmptyPatternList(String),

    /// A pattern that should be a regular expression failed to compile.
    #[error("delivery service {ds:?} has invalid pattern {pattern:?}: {reason}")]
    InvalidPattern {
        /// Owning delivery service.
        ds: String,
        /// Pattern as written upstream.
        pattern: String,
        /// Compiler message.
        reason: String,
    },

    /// A cache group's coordinates are not a finite position on the globe.
    #[error("cache group {0:?} has coordinates outside the globe")]
    InvalidCoordinates(String),

    /// A cache group has no latitude or longitude.
    #[error("cache group {0:?} is missing coordinates")]
    MissingCoordinates(String),
}
