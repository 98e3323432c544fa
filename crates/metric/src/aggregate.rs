//! Cumulative series: fold several per-resource series sharing a metric name
//! into one, timestamp by timestamp.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{metric_promises, DataPoint, Label, Metric, MetricPromises};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationMode {
    #[default]
    Sum,
    Max,
    Min,
}

pub const ONLY_DEFAULT_AGGREGATION: [AggregationMode; 1] = [AggregationMode::Sum];

impl AggregationMode {
    /// Lenient parse: unknown names fall back to `Sum`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "max" => AggregationMode::Max,
            "min" => AggregationMode::Min,
            _ => AggregationMode::Sum,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationMode::Sum => "sum",
            AggregationMode::Max => "max",
            AggregationMode::Min => "min",
        }
    }

    /// Combine the values of one timestamp bucket. Buckets are never empty.
    pub fn combine(&self, values: &[i64]) -> i64 {
        match self {
            AggregationMode::Sum => values.iter().fold(0i64, |acc, v| acc.saturating_add(*v)),
            AggregationMode::Max => values.iter().copied().max().unwrap_or(0),
            AggregationMode::Min => values.iter().copied().min().unwrap_or(0),
        }
    }
}

/// Combine every series named `metric_name` into one series.
///
/// Output timestamps are the union of input timestamps, ascending; there is
/// no interpolation. Labels of all input series are unioned.
pub fn aggregate_data(series: &[Metric], metric_name: &str, mode: AggregationMode) -> Metric {
    let mut buckets: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
    let mut label = Label::new();
    for m in series {
        label.merge(&m.label);
        if m.metric_name != metric_name {
            continue;
        }
        for dp in &m.data_points {
            buckets.entry(dp.x).or_default().push(dp.y);
        }
    }
    let data_points = buckets.iter().map(|(x, ys)| DataPoint { x: *x, y: mode.combine(ys) }).collect();
    Metric { metric_name: metric_name.to_string(), data_points, label, aggregation: Some(mode) }
}

/// Aggregate `promises` once per mode without blocking the caller.
///
/// Returns `aggregations.len()` promises right away (one when `aggregations`
/// is empty, for `Sum`); a spawned task waits for the inputs and fulfils
/// them. `force_label` replaces the label of every result. Must be called
/// from within a tokio runtime.
pub fn aggregate_metric_promises(
    promises: MetricPromises,
    metric_name: &str,
    aggregations: &[AggregationMode],
    force_label: Option<Label>,
) -> MetricPromises {
    let modes: Vec<AggregationMode> =
        if aggregations.is_empty() { ONLY_DEFAULT_AGGREGATION.to_vec() } else { aggregations.to_vec() };
    let (senders, result) = metric_promises(modes.len());
    let metric_name = metric_name.to_string();
    tokio::spawn(async move {
        let inputs = promises.len();
        let series = promises.get_metrics().await;
        debug!(metric = %metric_name, inputs, resolved = series.len(), modes = modes.len(), "aggregating metric series");
        let out = modes
            .iter()
            .map(|mode| {
                let mut m = aggregate_data(&series, &metric_name, *mode);
                if let Some(label) = &force_label {
                    m.label = label.clone();
                }
                m
            })
            .collect();
        senders.put_metrics(Ok(out));
    });
    result
}
