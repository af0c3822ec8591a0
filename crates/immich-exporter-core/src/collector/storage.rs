//! Server disk figures from `/api/server/storage`.

use crate::client::ServerStorage;
use crate::registry::{Batch, MetricSeries};

pub const DISK_AVAILABLE: &str = "immich_storage_disk_available";
pub const DISK_SIZE: &str = "immich_storage_disk_size";
pub const DISK_USE: &str = "immich_storage_disk_use";
pub const DISK_USAGE_PERCENTAGE: &str = "immich_storage_disk_usage_percentage";

pub fn series() -> Vec<MetricSeries> {
    vec![
        MetricSeries::gauge(
            DISK_AVAILABLE,
            "Immich Disk Available (/api/server/storage -> diskAvailableRaw)",
        ),
        MetricSeries::gauge(DISK_SIZE, "Immich Disk Size (/api/server/storage -> diskSizeRaw)"),
        MetricSeries::gauge(DISK_USE, "Immich Disk Use (/api/server/storage -> diskUseRaw)"),
        MetricSeries::gauge(
            DISK_USAGE_PERCENTAGE,
            "Immich Disk Usage Percentage (/api/server/storage -> diskUsagePercentage)",
        ),
    ]
}

/// Overwrites the four unlabeled disk gauges.
pub fn collect(storage: &ServerStorage) -> Batch {
    let mut batch = Batch::new();
    batch
        .set(DISK_AVAILABLE, &[], storage.disk_available_raw)
        .set(DISK_SIZE, &[], storage.disk_size_raw)
        .set(DISK_USE, &[], storage.disk_use_raw)
        .set(DISK_USAGE_PERCENTAGE, &[], storage.disk_usage_percentage);
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Op;

    #[test]
    fn sets_every_field_without_reset() {
        let batch = collect(&ServerStorage {
            disk_available_raw: 10.0,
            disk_size_raw: 40.0,
            disk_use_raw: 30.0,
            disk_usage_percentage: 75.0,
        });
        assert_eq!(batch.len(), 4);
        assert!(
            batch
                .ops()
                .iter()
                .all(|op| matches!(op, Op::Set { labels, .. } if labels.is_empty()))
        );
        assert_eq!(
            batch.ops()[0],
            Op::Set {
                series: DISK_AVAILABLE.into(),
                labels: vec![],
                value: 10.0
            }
        );
    }
}
