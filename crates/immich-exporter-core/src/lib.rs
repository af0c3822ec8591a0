//! immich-exporter-core: polling, metric registry and exposition for the
//! Immich Prometheus exporter.
//!
//! Provides:
//! - `config`: validated startup settings
//! - `client`: Immich API client, response records, in-memory mock source
//! - `collector`: per-domain transforms from API records to registry batches
//! - `registry`: metric series, atomic write batches, snapshots, text encoding
//! - `scheduler`: the poll loop driving the collectors

pub mod client;
pub mod collector;
pub mod config;
pub mod registry;
pub mod scheduler;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
