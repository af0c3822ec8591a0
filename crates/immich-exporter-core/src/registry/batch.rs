use super::LabelValues;

/// A single registry write.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Drop every sample of a series.
    ResetAll { series: String },
    /// Upsert one sample.
    Set {
        series: String,
        labels: LabelValues,
        value: f64,
    },
    /// Increment one sample, starting from zero when absent.
    Add {
        series: String,
        labels: LabelValues,
        delta: f64,
    },
}

impl Op {
    pub fn series_name(&self) -> &str {
        match self {
            Op::ResetAll { series } | Op::Set { series, .. } | Op::Add { series, .. } => series,
        }
    }

    /// Label values carried by the op, `None` for resets.
    pub fn labels(&self) -> Option<&[String]> {
        match self {
            Op::ResetAll { .. } => None,
            Op::Set { labels, .. } | Op::Add { labels, .. } => Some(labels),
        }
    }
}

/// Ordered list of writes applied to the registry as one unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    ops: Vec<Op>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset_all(&mut self, series: &str) -> &mut Self {
        self.ops.push(Op::ResetAll {
            series: series.to_owned(),
        });
        self
    }

    pub fn set(&mut self, series: &str, labels: &[&str], value: f64) -> &mut Self {
        self.ops.push(Op::Set {
            series: series.to_owned(),
            labels: to_owned_labels(labels),
            value,
        });
        self
    }

    pub fn add(&mut self, series: &str, labels: &[&str], delta: f64) -> &mut Self {
        self.ops.push(Op::Add {
            series: series.to_owned(),
            labels: to_owned_labels(labels),
            delta,
        });
        self
    }

    /// Appends all ops of `other` after the ops of `self`.
    pub fn extend(&mut self, other: Batch) -> &mut Self {
        self.ops.extend(other.ops);
        self
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<Op> {
        self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

fn to_owned_labels(labels: &[&str]) -> LabelValues {
    labels.iter().map(|l| (*l).to_owned()).collect()
}
