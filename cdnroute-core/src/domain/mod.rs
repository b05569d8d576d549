//! Routing domain: upstream documents and the snapshots derived from them.

pub mod available;
pub mod document;
pub mod pattern;
pub mod routing;
