//! Job queue state from `/api/jobs`.
//!
//! Queue names and job statuses are chosen by the server and may disappear
//! between polls, so every cycle resets all three job series and rebuilds
//! them from the fetched queues.

use std::collections::BTreeMap;

use crate::client::{JobQueue, ServerJobs};
use crate::registry::{Batch, MetricSeries};

use super::normalize_queue_name;

pub const COUNT: &str = "immich_jobs_count";
pub const QUEUE_ACTIVE: &str = "immich_jobs_queue_active";
pub const QUEUE_PAUSED: &str = "immich_jobs_queue_paused";

pub fn series() -> Vec<MetricSeries> {
    vec![
        MetricSeries::gauge(COUNT, "Immich Job Count per queue and status (/api/jobs -> jobCounts)")
            .with_labels(&["queue", "status"]),
        MetricSeries::gauge(
            QUEUE_ACTIVE,
            "Immich Job Queue Active, 1 or 0 (/api/jobs -> queueStatus.isActive)",
        )
        .with_labels(&["queue"]),
        MetricSeries::gauge(
            QUEUE_PAUSED,
            "Immich Job Queue Paused, 1 or 0 (/api/jobs -> queueStatus.isPaused)",
        )
        .with_labels(&["queue"]),
    ]
}

/// Keys queues by their label value.
fn by_label(jobs: &ServerJobs) -> BTreeMap<String, &JobQueue> {
    jobs.queues
        .iter()
        .map(|(name, queue)| (normalize_queue_name(name), queue))
        .collect()
}

pub fn collect(jobs: &ServerJobs) -> Batch {
    let mut batch = Batch::new();
    batch
        .reset_all(COUNT)
        .reset_all(QUEUE_ACTIVE)
        .reset_all(QUEUE_PAUSED);

    for (queue, state) in by_label(jobs) {
        for (status, count) in &state.job_counts {
            batch.set(COUNT, &[queue.as_str(), status.as_str()], *count);
        }
        batch
            .set(QUEUE_ACTIVE, &[queue.as_str()], flag(state.queue_status.is_active))
            .set(QUEUE_PAUSED, &[queue.as_str()], flag(state.queue_status.is_paused));
    }
    batch
}

fn flag(value: bool) -> f64 {
    if value { 1.0 } else { 0.0 }
}
