//! kdash kubehub: the upstream listing seam and replicated resource channels.
//!
//! A request handler opens one [`ResourceChannel`] per upstream list it needs.
//! Each channel runs exactly one list call in its own task and hands the same
//! result to every consumer, however many there are.

#![forbid(unsafe_code)]

pub mod channel;
pub mod lister;
pub mod namespace;

pub use channel::{event_list_channel_for, list_channel, spawn_list, ListResult, ResourceChannel};
pub use lister::{upstream_error, KubeLister, Listable, Lister, ScopeExt, StaticLister};
pub use namespace::NamespaceQuery;

pub use kube::api::ListParams;
pub use tokio_util::sync::CancellationToken;
