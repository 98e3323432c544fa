//! kdash core types: the upstream error taxonomy, the error classifier that
//! splits fatal errors from degrade-to-warning ones, and aggregate resource
//! status counts.

#![forbid(unsafe_code)]

pub mod classify;
pub mod error;
pub mod status;

pub use classify::{append_error, handle_error, merge_errors, Warnings};
pub use error::{ErrorKind, UpstreamError};
pub use status::ResourceStatus;

pub mod prelude {
    pub use super::{
        append_error, handle_error, merge_errors, ErrorKind, ResourceStatus, UpstreamError, Warnings,
    };
}
