//! Typed upstream error taxonomy.
//!
//! Errors coming back from the orchestration API are tagged once, at the
//! client boundary, so everything downstream can pattern-match on
//! [`ErrorKind`] instead of inspecting library-specific error types.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Unauthorized,
    Forbidden,
    NotFound,
    Internal,
    Unknown,
    Cancelled,
}

impl ErrorKind {
    /// Map a structured HTTP status code onto the taxonomy.
    pub fn from_status(code: u16) -> Self {
        match code {
            401 => ErrorKind::Unauthorized,
            403 => ErrorKind::Forbidden,
            404 => ErrorKind::NotFound,
            500..=599 => ErrorKind::Internal,
            _ => ErrorKind::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Internal => "internal",
            ErrorKind::Unknown => "unknown",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

/// An error reported by (or on the way to) the upstream API.
///
/// `code` is present only for structured status errors; unstructured failures
/// (transport, decoding, task panics) carry `None`.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize, PartialEq, Eq)]
#[error("{message}")]
#[serde(rename_all = "camelCase")]
pub struct UpstreamError {
    pub kind: ErrorKind,
    pub code: Option<u16>,
    pub message: String,
}

impl UpstreamError {
    /// Structured status error as returned by the API server.
    pub fn status(code: u16, message: impl Into<String>) -> Self {
        Self { kind: ErrorKind::from_status(code), code: Some(code), message: message.into() }
    }

    /// Unstructured error: no status code, classified as `Unknown`.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Unknown, code: None, message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Internal, code: None, message: message.into() }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self { kind: ErrorKind::NotFound, code: Some(404), message: message.into() }
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Cancelled, code: None, message: message.into() }
    }

    /// Only structured 401/403 responses degrade to warnings.
    pub fn is_non_critical(&self) -> bool {
        self.code.is_some() && matches!(self.kind, ErrorKind::Unauthorized | ErrorKind::Forbidden)
    }

    /// HTTP status the front end should answer with when this error is critical.
    pub fn http_status(&self) -> u16 {
        match (self.kind, self.code) {
            (ErrorKind::Unauthorized, _) => 401,
            (ErrorKind::Forbidden, _) => 403,
            (ErrorKind::NotFound, _) => 404,
            (ErrorKind::Internal, Some(code)) if (500..=599).contains(&code) => code,
            (ErrorKind::Cancelled, _) => 503,
            _ => 500,
        }
    }

    /// Plain-text response body for a critical error.
    pub fn plain_text(&self) -> String {
        format!("{}\n", self.message)
    }
}
