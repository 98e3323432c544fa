//! Single-resolution metric futures.

use metrics::counter;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::{Metric, MetricError};

type Resolution = Result<Option<Metric>, MetricError>;

/// Producer half of a [`MetricPromise`]. Consumed by the single write.
#[derive(Debug)]
pub struct MetricSender {
    tx: oneshot::Sender<Resolution>,
}

impl MetricSender {
    pub fn resolve(self, value: Resolution) {
        if self.tx.send(value).is_err() {
            counter!("metric_promises_dropped_total", 1u64);
            debug!("metric promise dropped before resolution");
        }
    }
}

/// Future carrying either a metric series or an error.
#[derive(Debug)]
pub struct MetricPromise {
    rx: oneshot::Receiver<Resolution>,
}

pub fn metric_promise() -> (MetricSender, MetricPromise) {
    let (tx, rx) = oneshot::channel();
    (MetricSender { tx }, MetricPromise { rx })
}

impl MetricPromise {
    /// A promise that is already fulfilled.
    pub fn resolved(value: Resolution) -> Self {
        let (tx, promise) = metric_promise();
        tx.resolve(value);
        promise
    }

    /// Wait for the producer. A producer that goes away without writing
    /// yields [`MetricError::Abandoned`].
    pub async fn get_metric(self) -> Resolution {
        self.rx.await.unwrap_or(Err(MetricError::Abandoned))
    }
}

/// Producer halves of a promise batch.
#[derive(Debug, Default)]
pub struct MetricSenders(Vec<MetricSender>);

impl MetricSenders {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fulfil the whole batch at once.
    ///
    /// On error every promise receives the error; otherwise promise `i`
    /// receives `values[i]` (or nothing when `values` is shorter).
    pub fn put_metrics(self, values: Result<Vec<Metric>, MetricError>) {
        match values {
            Err(e) => {
                for s in self.0 {
                    s.resolve(Err(e.clone()));
                }
            }
            Ok(values) => {
                let mut values = values.into_iter();
                for s in self.0 {
                    s.resolve(Ok(values.next()));
                }
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct MetricPromises(Vec<MetricPromise>);

/// A batch of `n` unresolved promises and their producers.
pub fn metric_promises(n: usize) -> (MetricSenders, MetricPromises) {
    let (senders, promises) = (0..n).map(|_| metric_promise()).unzip();
    (MetricSenders(senders), MetricPromises(promises))
}

impl MetricPromises {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, promise: MetricPromise) {
        self.0.push(promise);
    }

    pub fn extend(&mut self, other: MetricPromises) {
        self.0.extend(other.0);
    }

    /// Drain every promise. Errored or empty promises are skipped: a metric
    /// outage must never fail the resource payload it decorates.
    pub async fn get_metrics(self) -> Vec<Metric> {
        let mut out = Vec::with_capacity(self.0.len());
        for p in self.0 {
            match p.get_metric().await {
                Ok(Some(m)) => out.push(m),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "skipping unresolved metric"),
            }
        }
        out
    }
}

impl FromIterator<MetricPromise> for MetricPromises {
    fn from_iter<I: IntoIterator<Item = MetricPromise>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for MetricPromises {
    type Item = MetricPromise;
    type IntoIter = std::vec::IntoIter<MetricPromise>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
