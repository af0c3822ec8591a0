//! Rendering of a [`Snapshot`] into the Prometheus text exposition format.

use prometheus::proto::{Counter, Gauge, LabelPair, Metric, MetricFamily, MetricType};
use prometheus::{Encoder, TextEncoder};
use thiserror::Error;

use super::{MetricKind, SeriesValues, Snapshot};

/// Content type of the text exposition format.
pub const CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("text encoding failed: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("encoded exposition is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Encodes every non-empty series of `snapshot`, in name order.
pub fn encode_text(snapshot: &Snapshot) -> Result<String, EncodeError> {
    let families: Vec<MetricFamily> = snapshot
        .iter()
        .filter(|s| !s.is_empty())
        .map(to_family)
        .collect();

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

fn to_family(entry: &SeriesValues) -> MetricFamily {
    let series = entry.series();

    let metrics: Vec<Metric> = entry
        .values()
        .iter()
        .map(|(labels, value)| {
            let pairs: Vec<LabelPair> = series
                .label_names()
                .iter()
                .zip(labels)
                .map(|(name, value)| {
                    let mut pair = LabelPair::default();
                    pair.set_name(name.clone());
                    pair.set_value(value.clone());
                    pair
                })
                .collect();

            let mut metric = Metric::default();
            metric.set_label(pairs.into());
            match series.kind() {
                MetricKind::Gauge => {
                    let mut gauge = Gauge::default();
                    gauge.set_value(*value);
                    metric.set_gauge(gauge);
                }
                MetricKind::Counter => {
                    let mut counter = Counter::default();
                    counter.set_value(*value);
                    metric.set_counter(counter);
                }
            }
            metric
        })
        .collect();

    let mut family = MetricFamily::default();
    family.set_name(series.name().to_owned());
    family.set_help(series.help().to_owned());
    family.set_field_type(match series.kind() {
        MetricKind::Gauge => MetricType::GAUGE,
        MetricKind::Counter => MetricType::COUNTER,
    });
    family.set_metric(metrics.into());
    family
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{MetricRegistry, MetricSeries};

    #[test]
    fn encodes_labeled_gauge() {
        let registry = MetricRegistry::new();
        registry
            .declare(
                MetricSeries::gauge("immich_jobs_count", "Job count per queue and status")
                    .with_labels(&["queue", "status"]),
            )
            .unwrap();
        registry
            .set("immich_jobs_count", &["thumbnail_generation", "active"], 2.0)
            .unwrap();

        let text = encode_text(&registry.snapshot()).unwrap();
        assert!(text.contains("# HELP immich_jobs_count Job count per queue and status\n"));
        assert!(text.contains("# TYPE immich_jobs_count gauge\n"));
        assert!(
            text.contains("immich_jobs_count{queue=\"thumbnail_generation\",status=\"active\"} 2\n")
        );
    }

    #[test]
    fn encodes_counter_type() {
        let registry = MetricRegistry::new();
        registry
            .declare(MetricSeries::counter("cycles_total", "Poll cycles"))
            .unwrap();
        registry.set("cycles_total", &[], 7.0).unwrap();

        let text = encode_text(&registry.snapshot()).unwrap();
        assert!(text.contains("# TYPE cycles_total counter\n"));
        assert!(text.contains("cycles_total 7\n"));
    }

    #[test]
    fn omits_series_without_samples() {
        let registry = MetricRegistry::new();
        registry.declare(MetricSeries::gauge("empty", "none")).unwrap();
        registry.declare(MetricSeries::gauge("full", "one")).unwrap();
        registry.set("full", &[], 1.5).unwrap();

        let text = encode_text(&registry.snapshot()).unwrap();
        assert!(!text.contains("empty"));
        assert!(text.contains("full 1.5\n"));
    }

    #[test]
    fn empty_registry_encodes_to_empty_body() {
        let registry = MetricRegistry::new();
        assert_eq!(encode_text(&registry.snapshot()).unwrap(), "");
    }
}
