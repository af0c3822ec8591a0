//! Metric registry: declared series, their labeled values and read-consistent
//! snapshots.
//!
//! The registry keeps its state as an immutable [`Snapshot`] behind a lock.
//! Writers validate a whole [`Batch`] first and then publish it in one step,
//! so a reader calling [`MetricRegistry::snapshot`] sees either all of a
//! batch or none of it. Snapshots already handed out are never mutated.

mod batch;
mod encode;

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;

pub use batch::{Batch, Op};
pub use encode::{CONTENT_TYPE, EncodeError, encode_text};

/// Label values identifying one sample within a series, in declared label order.
pub type LabelValues = Vec<String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Gauge,
    Counter,
}

/// A named, help-documented metric with a fixed label shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSeries {
    name: String,
    help: String,
    kind: MetricKind,
    label_names: Vec<String>,
}

impl MetricSeries {
    pub fn gauge(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self::new(name, help, MetricKind::Gauge)
    }

    pub fn counter(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self::new(name, help, MetricKind::Counter)
    }

    fn new(name: impl Into<String>, help: impl Into<String>, kind: MetricKind) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            kind,
            label_names: Vec::new(),
        }
    }

    /// Sets the label dimensions of this series.
    pub fn with_labels(mut self, label_names: &[&str]) -> Self {
        self.label_names = label_names.iter().map(|l| (*l).to_owned()).collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }
}

/// Registry contract violations.
#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("metric series '{0}' is already declared")]
    DuplicateSeries(String),

    #[error("metric series '{0}' was never declared")]
    UnknownSeries(String),

    #[error("metric series '{series}' expects {expected} label values, got {got}")]
    LabelArity {
        series: String,
        expected: usize,
        got: usize,
    },
}

/// One declared series and its current samples.
#[derive(Debug, Clone)]
pub struct SeriesValues {
    series: Arc<MetricSeries>,
    values: BTreeMap<LabelValues, f64>,
}

impl SeriesValues {
    pub fn series(&self) -> &MetricSeries {
        &self.series
    }

    pub fn values(&self) -> &BTreeMap<LabelValues, f64> {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Point-in-time copy of every series and its samples.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    series: BTreeMap<String, SeriesValues>,
}

impl Snapshot {
    /// Iterates series in name order.
    pub fn iter(&self) -> impl Iterator<Item = &SeriesValues> {
        self.series.values()
    }

    pub fn series(&self, name: &str) -> Option<&SeriesValues> {
        self.series.get(name)
    }

    /// Looks up a single sample by series name and label values.
    pub fn get(&self, name: &str, labels: &[&str]) -> Option<f64> {
        let entry = self.series.get(name)?;
        let key: LabelValues = labels.iter().map(|l| (*l).to_owned()).collect();
        entry.values.get(&key).copied()
    }

    fn check(&self, op: &Op) -> Result<(), RegistryError> {
        let name = op.series_name();
        let entry = self
            .series
            .get(name)
            .ok_or_else(|| RegistryError::UnknownSeries(name.to_owned()))?;
        if let Some(labels) = op.labels() {
            let expected = entry.series.label_names.len();
            if labels.len() != expected {
                return Err(RegistryError::LabelArity {
                    series: name.to_owned(),
                    expected,
                    got: labels.len(),
                });
            }
        }
        Ok(())
    }

    // Only called after `check` accepted the op.
    fn apply_checked(&mut self, op: Op) {
        match op {
            Op::ResetAll { series } => {
                if let Some(entry) = self.series.get_mut(&series) {
                    entry.values.clear();
                }
            }
            Op::Set {
                series,
                labels,
                value,
            } => {
                if let Some(entry) = self.series.get_mut(&series) {
                    entry.values.insert(labels, value);
                }
            }
            Op::Add {
                series,
                labels,
                delta,
            } => {
                if let Some(entry) = self.series.get_mut(&series) {
                    *entry.values.entry(labels).or_insert(0.0) += delta;
                }
            }
        }
    }
}

/// The single shared store of metric series.
///
/// Mutated only by the poll scheduler, read by the exposition handler.
#[derive(Debug, Default)]
pub struct MetricRegistry {
    current: RwLock<Arc<Snapshot>>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a series. Names are unique for the lifetime of the registry.
    pub fn declare(&self, series: MetricSeries) -> Result<(), RegistryError> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if guard.series.contains_key(series.name()) {
            return Err(RegistryError::DuplicateSeries(series.name.clone()));
        }
        let next = Arc::make_mut(&mut *guard);
        next.series.insert(
            series.name.clone(),
            SeriesValues {
                series: Arc::new(series),
                values: BTreeMap::new(),
            },
        );
        Ok(())
    }

    /// Upserts one sample.
    pub fn set(&self, series: &str, labels: &[&str], value: f64) -> Result<(), RegistryError> {
        let mut batch = Batch::new();
        batch.set(series, labels, value);
        self.apply(batch)
    }

    /// Clears every sample of a series.
    pub fn reset_all(&self, series: &str) -> Result<(), RegistryError> {
        let mut batch = Batch::new();
        batch.reset_all(series);
        self.apply(batch)
    }

    /// Applies every operation of `batch` as one atomic update.
    ///
    /// All operations are validated against the declared series before any is
    /// applied; on error the registry is left untouched.
    pub fn apply(&self, batch: Batch) -> Result<(), RegistryError> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        for op in batch.ops() {
            guard.check(op)?;
        }
        if batch.is_empty() {
            return Ok(());
        }
        let next = Arc::make_mut(&mut *guard);
        for op in batch.into_ops() {
            next.apply_checked(op);
        }
        Ok(())
    }

    /// Returns the current snapshot. Later writes never affect it.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn registry_with_jobs() -> MetricRegistry {
        let registry = MetricRegistry::new();
        registry
            .declare(MetricSeries::gauge("jobs_count", "count").with_labels(&["queue", "status"]))
            .unwrap();
        registry
            .declare(MetricSeries::gauge("jobs_active", "active").with_labels(&["queue"]))
            .unwrap();
        registry
    }

    #[test]
    fn declare_rejects_duplicate_names() {
        let registry = MetricRegistry::new();
        registry.declare(MetricSeries::gauge("a", "first")).unwrap();
        let err = registry
            .declare(MetricSeries::gauge("a", "second"))
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateSeries("a".into()));
        assert_eq!(registry.snapshot().series("a").unwrap().series().help(), "first");
    }

    #[test]
    fn set_upserts_and_reads_back() {
        let registry = registry_with_jobs();
        registry.set("jobs_active", &["thumbs"], 1.0).unwrap();
        registry.set("jobs_active", &["thumbs"], 0.0).unwrap();
        let snap = registry.snapshot();
        assert_eq!(snap.get("jobs_active", &["thumbs"]), Some(0.0));
        assert_eq!(snap.series("jobs_active").unwrap().values().len(), 1);
    }

    #[test]
    fn set_unknown_series_fails() {
        let registry = MetricRegistry::new();
        assert_eq!(
            registry.set("missing", &[], 1.0),
            Err(RegistryError::UnknownSeries("missing".into()))
        );
        assert_eq!(
            registry.reset_all("missing"),
            Err(RegistryError::UnknownSeries("missing".into()))
        );
    }

    #[test]
    fn set_with_wrong_arity_fails() {
        let registry = registry_with_jobs();
        let err = registry.set("jobs_count", &["thumbs"], 1.0).unwrap_err();
        assert_eq!(
            err,
            RegistryError::LabelArity {
                series: "jobs_count".into(),
                expected: 2,
                got: 1,
            }
        );
    }

    #[test]
    fn invalid_batch_leaves_registry_untouched() {
        let registry = registry_with_jobs();
        registry.set("jobs_active", &["thumbs"], 1.0).unwrap();

        let mut batch = Batch::new();
        batch.reset_all("jobs_active");
        batch.set("jobs_active", &["faces"], 1.0);
        batch.set("nope", &[], 1.0);
        assert!(registry.apply(batch).is_err());

        let snap = registry.snapshot();
        assert_eq!(snap.get("jobs_active", &["thumbs"]), Some(1.0));
        assert_eq!(snap.get("jobs_active", &["faces"]), None);
    }

    #[test]
    fn reset_all_clears_only_that_series() {
        let registry = registry_with_jobs();
        registry.set("jobs_active", &["thumbs"], 1.0).unwrap();
        registry.set("jobs_count", &["thumbs", "active"], 3.0).unwrap();
        registry.reset_all("jobs_active").unwrap();
        let snap = registry.snapshot();
        assert!(snap.series("jobs_active").unwrap().is_empty());
        assert_eq!(snap.get("jobs_count", &["thumbs", "active"]), Some(3.0));
    }

    #[test]
    fn add_accumulates_from_zero() {
        let registry = MetricRegistry::new();
        registry
            .declare(MetricSeries::counter("errors_total", "errors").with_labels(&["domain"]))
            .unwrap();
        let mut batch = Batch::new();
        batch.add("errors_total", &["jobs"], 1.0);
        batch.add("errors_total", &["jobs"], 1.0);
        registry.apply(batch).unwrap();
        assert_eq!(registry.snapshot().get("errors_total", &["jobs"]), Some(2.0));
    }

    #[test]
    fn handed_out_snapshot_is_not_mutated_by_later_writes() {
        let registry = registry_with_jobs();
        registry.set("jobs_active", &["thumbs"], 1.0).unwrap();
        let before = registry.snapshot();
        registry.reset_all("jobs_active").unwrap();
        assert_eq!(before.get("jobs_active", &["thumbs"]), Some(1.0));
        assert_eq!(registry.snapshot().get("jobs_active", &["thumbs"]), None);
    }

    #[test]
    fn concurrent_snapshots_never_observe_torn_batches() {
        let registry = Arc::new(registry_with_jobs());

        let writer = {
            let registry = registry.clone();
            thread::spawn(move || {
                for i in 0..2000u32 {
                    let queue = format!("q{}", i % 3);
                    let mut batch = Batch::new();
                    batch.reset_all("jobs_count");
                    batch.reset_all("jobs_active");
                    batch.set("jobs_count", &[queue.as_str(), "active"], f64::from(i));
                    batch.set("jobs_active", &[queue.as_str()], f64::from(i));
                    registry.apply(batch).unwrap();
                }
            })
        };

        for _ in 0..2000 {
            let snap = registry.snapshot();
            let counts = snap.series("jobs_count").unwrap().values();
            let active = snap.series("jobs_active").unwrap().values();
            assert_eq!(counts.len(), active.len());
            for (labels, value) in counts {
                assert_eq!(active.get(&vec![labels[0].clone()]), Some(value));
            }
        }

        writer.join().unwrap();
    }
}
