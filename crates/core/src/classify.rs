//! Error classifier: fatal vs. accumulable upstream errors.
//!
//! A composite request (say pods + events + secrets) classifies every
//! sub-fetch on its own. Unauthorized/forbidden responses are collected as
//! warnings and shipped next to an otherwise successful payload; anything
//! else ends the request.

use tracing::{debug, warn};

use crate::UpstreamError;

/// Classify a single optional error.
///
/// `Ok(warnings)` carries the non-critical errors (zero or one), `Err` the
/// critical one.
pub fn handle_error(err: Option<UpstreamError>) -> Result<Vec<UpstreamError>, UpstreamError> {
    append_error(err, Vec::new())
}

/// Classify `err` and fold it into `existing` when it is non-critical.
///
/// An error whose message text is already present is not added again.
pub fn append_error(
    err: Option<UpstreamError>,
    mut existing: Vec<UpstreamError>,
) -> Result<Vec<UpstreamError>, UpstreamError> {
    match err {
        None => Ok(existing),
        Some(e) if e.is_non_critical() => {
            if !existing.iter().any(|x| x.message == e.message) {
                warn!(kind = e.kind.as_str(), code = ?e.code, error = %e, "non-critical upstream error");
                existing.push(e);
            }
            Ok(existing)
        }
        Some(e) => {
            debug!(kind = e.kind.as_str(), code = ?e.code, error = %e, "critical upstream error");
            Err(e)
        }
    }
}

/// Concatenate error lists, dropping errors whose message was already seen.
pub fn merge_errors<I>(lists: I) -> Vec<UpstreamError>
where
    I: IntoIterator<Item = Vec<UpstreamError>>,
{
    let mut out: Vec<UpstreamError> = Vec::new();
    for e in lists.into_iter().flatten() {
        if !out.iter().any(|x| x.message == e.message) {
            out.push(e);
        }
    }
    out
}

/// Accumulates non-critical errors across the sub-fetches of one request.
#[derive(Debug, Clone, Default)]
pub struct Warnings {
    errors: Vec<UpstreamError>,
}

impl Warnings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify a sub-fetch result.
    ///
    /// `Ok(Some(v))` on success, `Ok(None)` when the error was downgraded to a
    /// warning, `Err` when it is critical and the request must stop.
    pub fn absorb<T>(&mut self, res: Result<T, UpstreamError>) -> Result<Option<T>, UpstreamError> {
        match res {
            Ok(v) => Ok(Some(v)),
            Err(e) if e.is_non_critical() => {
                let errors = std::mem::take(&mut self.errors);
                self.errors = append_error(Some(e), errors)?;
                Ok(None)
            }
            Err(e) => {
                debug!(kind = e.kind.as_str(), code = ?e.code, error = %e, "critical upstream error");
                Err(e)
            }
        }
    }

    pub fn extend(&mut self, other: Vec<UpstreamError>) {
        let errors = std::mem::take(&mut self.errors);
        self.errors = merge_errors([errors, other]);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn into_vec(self) -> Vec<UpstreamError> {
        self.errors
    }
}
