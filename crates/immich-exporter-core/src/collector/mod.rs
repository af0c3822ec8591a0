//! Per-domain transforms from Immich API records to registry batches.
//!
//! Every domain module exposes the series it owns (`series()`) and a pure
//! `collect()` that turns one fetched record into a
//! [`Batch`](crate::registry::Batch):
//!
//! - `storage`: disk figures, set in place
//! - `statistics`: global counts set in place, per-user series rebuilt
//! - `jobs`: all job series reset and rebuilt from the fetched queues
//! - `exporter`: the exporter's own cycle and error bookkeeping

pub mod exporter;
pub mod jobs;
mod normalize;
pub mod statistics;
pub mod storage;

use std::fmt;

use crate::registry::{MetricRegistry, RegistryError};

pub use normalize::normalize_queue_name;

/// One independently fetched data domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Storage,
    Statistics,
    Jobs,
}

impl Domain {
    /// Collection order within a cycle.
    pub const ALL: [Domain; 3] = [Domain::Storage, Domain::Statistics, Domain::Jobs];

    pub fn as_str(self) -> &'static str {
        match self {
            Domain::Storage => "storage",
            Domain::Statistics => "statistics",
            Domain::Jobs => "jobs",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declares every series the exporter exposes.
pub fn declare_all(registry: &MetricRegistry) -> Result<(), RegistryError> {
    let all = storage::series()
        .into_iter()
        .chain(statistics::series())
        .chain(jobs::series())
        .chain(exporter::series());
    for series in all {
        registry.declare(series)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declare_all_twice_is_a_duplicate() {
        let registry = MetricRegistry::new();
        declare_all(&registry).unwrap();
        assert!(matches!(
            declare_all(&registry),
            Err(RegistryError::DuplicateSeries(_))
        ));
    }

    #[tokio::test]
    async fn every_collected_op_targets_a_declared_series() {
        use crate::client::ImmichSource;
        use crate::client::mock::MockSource;

        let registry = MetricRegistry::new();
        declare_all(&registry).unwrap();

        let source = MockSource::typical();
        let storage = source.server_storage().await.unwrap();
        let stats = source.server_statistics().await.unwrap();
        let jobs = source.jobs().await.unwrap();

        registry.apply(storage::collect(&storage)).unwrap();
        registry.apply(statistics::collect(&stats)).unwrap();
        registry.apply(jobs::collect(&jobs)).unwrap();
    }
}
