//! Cache selection among a cache group's available servers.

pub mod selector;
