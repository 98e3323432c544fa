//! Metric backend seam.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    aggregate_metric_promises, AggregationMode, DataPoint, Label, Metric, MetricError, MetricPromise,
    MetricPromises,
};

/// Identifies one resource to a metric backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSelector {
    pub namespace: Option<String>,
    pub resource_kind: String,
    pub resource_name: String,
    pub uid: Option<String>,
}

/// Pluggable metric backend.
///
/// `download_metric` answers with one promise per selector and must not
/// block; network I/O belongs in tasks the backend spawns itself.
pub trait MetricClient: Send + Sync {
    fn download_metric(&self, selectors: &[ResourceSelector], metric_name: &str) -> MetricPromises;

    fn download_metrics(&self, selectors: &[ResourceSelector], metric_names: &[String]) -> MetricPromises {
        let mut out = MetricPromises::empty();
        for name in metric_names {
            out.extend(self.download_metric(selectors, name));
        }
        out
    }

    fn aggregate_metrics(
        &self,
        metrics: MetricPromises,
        metric_name: &str,
        aggregations: &[AggregationMode],
    ) -> MetricPromises {
        aggregate_metric_promises(metrics, metric_name, aggregations, None)
    }
}

/// In-memory backend keyed by `(uid, metric name)`.
///
/// Selectors without a UID, or without data, resolve to nothing.
#[derive(Debug, Clone, Default)]
pub struct StaticMetricClient {
    series: HashMap<(String, String), Vec<DataPoint>>,
    failure: Option<MetricError>,
}

impl StaticMetricClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, uid: &str, metric_name: &str, points: &[(i64, i64)]) -> Self {
        let points = points.iter().map(|(x, y)| DataPoint { x: *x, y: *y }).collect();
        self.series.insert((uid.to_string(), metric_name.to_string()), points);
        self
    }

    /// Every promise resolves with `err`.
    pub fn failing(mut self, err: MetricError) -> Self {
        self.failure = Some(err);
        self
    }
}

impl MetricClient for StaticMetricClient {
    fn download_metric(&self, selectors: &[ResourceSelector], metric_name: &str) -> MetricPromises {
        selectors
            .iter()
            .map(|sel| {
                if let Some(err) = &self.failure {
                    return MetricPromise::resolved(Err(err.clone()));
                }
                let found = sel.uid.as_ref().and_then(|uid| {
                    self.series.get(&(uid.clone(), metric_name.to_string())).map(|points| {
                        Metric::new(metric_name, points.clone(), Label::single(&sel.resource_kind, uid))
                    })
                });
                MetricPromise::resolved(Ok(found))
            })
            .collect()
    }
}
