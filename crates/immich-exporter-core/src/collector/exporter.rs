//! The exporter's own bookkeeping: poll cycles, fetch failures and the
//! freshness of each domain.

use std::time::Duration;

use crate::registry::{Batch, MetricSeries};

use super::Domain;

pub const CYCLES_TOTAL: &str = "immich_exporter_cycles_total";
pub const FETCH_ERRORS_TOTAL: &str = "immich_exporter_fetch_errors_total";
pub const DOMAIN_UP: &str = "immich_exporter_domain_up";
pub const LAST_SUCCESS_TIMESTAMP: &str = "immich_exporter_last_success_timestamp_seconds";
pub const CYCLE_DURATION: &str = "immich_exporter_cycle_duration_seconds";

pub fn series() -> Vec<MetricSeries> {
    vec![
        MetricSeries::counter(CYCLES_TOTAL, "Completed poll cycles"),
        MetricSeries::counter(FETCH_ERRORS_TOTAL, "Failed collections per domain")
            .with_labels(&["domain"]),
        MetricSeries::gauge(
            DOMAIN_UP,
            "Whether the last collection of the domain succeeded (1) or failed (0)",
        )
        .with_labels(&["domain"]),
        MetricSeries::gauge(
            LAST_SUCCESS_TIMESTAMP,
            "Unix time of the last successful collection of the domain",
        )
        .with_labels(&["domain"]),
        MetricSeries::gauge(CYCLE_DURATION, "Wall time of the last poll cycle in seconds"),
    ]
}

/// Zeroes the counters so they are exposed before the first failure.
pub fn initial() -> Batch {
    let mut batch = Batch::new();
    batch.set(CYCLES_TOTAL, &[], 0.0);
    for domain in Domain::ALL {
        batch.set(FETCH_ERRORS_TOTAL, &[domain.as_str()], 0.0);
    }
    batch
}

pub fn domain_succeeded(domain: Domain, unix_seconds: i64) -> Batch {
    let mut batch = Batch::new();
    batch
        .set(DOMAIN_UP, &[domain.as_str()], 1.0)
        .set(LAST_SUCCESS_TIMESTAMP, &[domain.as_str()], unix_seconds as f64);
    batch
}

pub fn domain_failed(domain: Domain) -> Batch {
    let mut batch = Batch::new();
    batch
        .add(FETCH_ERRORS_TOTAL, &[domain.as_str()], 1.0)
        .set(DOMAIN_UP, &[domain.as_str()], 0.0);
    batch
}

pub fn cycle_finished(duration: Duration) -> Batch {
    let mut batch = Batch::new();
    batch
        .add(CYCLES_TOTAL, &[], 1.0)
        .set(CYCLE_DURATION, &[], duration.as_secs_f64());
    batch
}
