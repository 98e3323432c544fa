use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::AggregationMode;

/// One sample: `x` is a unix timestamp in seconds, `y` the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPoint {
    pub x: i64,
    pub y: i64,
}

/// Resource kind -> UIDs of the resources that contributed to a series.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Label(BTreeMap<String, Vec<String>>);

impl Label {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(kind: &str, uid: &str) -> Self {
        let mut l = Self::new();
        l.add(kind, uid);
        l
    }

    /// Record `uid` under `kind` unless already present.
    pub fn add(&mut self, kind: &str, uid: &str) {
        let uids = self.0.entry(kind.to_string()).or_default();
        if !uids.iter().any(|u| u == uid) {
            uids.push(uid.to_string());
        }
    }

    pub fn merge(&mut self, other: &Label) {
        for (kind, uids) in &other.0 {
            for uid in uids {
                self.add(kind, uid);
            }
        }
    }

    pub fn uids(&self, kind: &str) -> &[String] {
        self.0.get(kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A named time series.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metric {
    pub metric_name: String,
    pub data_points: Vec<DataPoint>,
    pub label: Label,
    /// Combinator that produced this series; `None` for raw backend series.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub aggregation: Option<AggregationMode>,
}

impl Metric {
    pub fn new(metric_name: &str, data_points: Vec<DataPoint>, label: Label) -> Self {
        Self { metric_name: metric_name.to_string(), data_points, label, aggregation: None }
    }
}
