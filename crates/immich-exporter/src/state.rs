//! Shared application state and the global allocator.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::sync::Arc;

use immich_exporter_core::registry::MetricRegistry;

/// State handed to every HTTP handler. Handlers only read the registry.
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) registry: Arc<MetricRegistry>,
}
