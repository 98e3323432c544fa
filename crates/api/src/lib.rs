//! kdash public API façade (in-process).
//!
//! Frontends (HTTP handlers, the CLI) depend on [`Dashboard`] and the view
//! types it returns. Each pipeline opens resource channels through a
//! [`Lister`], adapts the listed objects to data cells, runs them through the
//! data selector and merges non-critical upstream errors into the view.

#![forbid(unsafe_code)]

pub mod cell;
pub mod dashboard;
pub mod status;
pub mod view;

pub use cell::{to_cells, ResourceCell, Selectable};
pub use dashboard::{Dashboard, DashboardResult};
pub use status::{job_status, node_ready, pod_status, PodStatus, StatusTally};
pub use view::{
    ConfigMapSummary, ContainerSummary, EventSummary, JobSummary, ListMeta, ListView, NamespaceSummary, NodeSummary,
    ObjectMeta, PodDetail, PodList, PodSummary, SecretSummary,
};

pub use kdash_core::{ErrorKind, ResourceStatus, UpstreamError};
pub use kdash_dataselect::{DataSelectParams, DataSelectQuery};
pub use kdash_kubehub::{CancellationToken, KubeLister, Lister, NamespaceQuery, StaticLister};
pub use kdash_metric::{MetricClient, StaticMetricClient};
