//! kdash metric: one-shot metric promises and the aggregator that folds
//! per-resource series into cumulative ones.
//!
//! The crate never talks to a metric backend. Backends plug in through
//! [`MetricClient`] and answer with [`MetricPromises`]; callers await them as
//! late as possible, typically right before serializing a response.

#![forbid(unsafe_code)]

pub mod aggregate;
pub mod client;
pub mod promise;
mod series;

pub use aggregate::{aggregate_data, aggregate_metric_promises, AggregationMode, ONLY_DEFAULT_AGGREGATION};
pub use client::{MetricClient, ResourceSelector, StaticMetricClient};
pub use promise::{metric_promise, metric_promises, MetricPromise, MetricPromises, MetricSender, MetricSenders};
pub use series::{DataPoint, Label, Metric};

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum MetricError {
    #[error("metric backend: {0}")]
    Backend(String),
    #[error("metric promise abandoned before resolution")]
    Abandoned,
}
