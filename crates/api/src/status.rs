//! Status derivation for pods, nodes and jobs.

use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{Node, Pod};
use kdash_core::ResourceStatus;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PodStatus {
    Running,
    Pending,
    Failed,
    Succeeded,
    Unknown,
    Terminating,
}

impl PodStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PodStatus::Running => "Running",
            PodStatus::Pending => "Pending",
            PodStatus::Failed => "Failed",
            PodStatus::Succeeded => "Succeeded",
            PodStatus::Unknown => "Unknown",
            PodStatus::Terminating => "Terminating",
        }
    }
}

fn condition_true(conditions: Option<&[k8s_openapi::api::core::v1::PodCondition]>, kind: &str) -> bool {
    conditions.unwrap_or_default().iter().any(|c| c.type_ == kind && c.status == "True")
}

/// Derive the display status of a pod.
///
/// A pod being deleted is `Terminating` whatever its phase. A pod that is
/// neither finished nor ready and initialized counts as `Failed` when
/// warning events were reported for it.
pub fn pod_status(pod: &Pod, has_warnings: bool) -> PodStatus {
    if pod.metadata.deletion_timestamp.is_some() {
        return PodStatus::Terminating;
    }
    let status = pod.status.as_ref();
    let phase = status.and_then(|s| s.phase.as_deref()).unwrap_or("Unknown");
    match phase {
        "Failed" => return PodStatus::Failed,
        "Succeeded" => return PodStatus::Succeeded,
        _ => {}
    }
    let conditions = status.and_then(|s| s.conditions.as_deref());
    if phase == "Running" && condition_true(conditions, "Ready") && condition_true(conditions, "Initialized") {
        return PodStatus::Running;
    }
    if has_warnings {
        return PodStatus::Failed;
    }
    match phase {
        "Pending" | "Running" => PodStatus::Pending,
        _ => PodStatus::Unknown,
    }
}

/// Total restarts across the pod's containers.
pub fn restart_count(pod: &Pod) -> i32 {
    pod.status
        .as_ref()
        .and_then(|s| s.container_statuses.as_ref())
        .map(|cs| cs.iter().map(|c| c.restart_count).sum())
        .unwrap_or(0)
}

/// Counting helper for pod status tallies.
pub trait StatusTally {
    fn add(&mut self, status: PodStatus);
}

impl StatusTally for ResourceStatus {
    fn add(&mut self, status: PodStatus) {
        match status {
            PodStatus::Running => self.running += 1,
            PodStatus::Pending => self.pending += 1,
            PodStatus::Failed => self.failed += 1,
            PodStatus::Succeeded => self.succeeded += 1,
            PodStatus::Unknown => self.unknown += 1,
            PodStatus::Terminating => self.terminating += 1,
        }
    }
}

/// `True`, `False` or `Unknown`, from the node's `Ready` condition.
pub fn node_ready(node: &Node) -> &str {
    node.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .and_then(|cs| cs.iter().find(|c| c.type_ == "Ready"))
        .map(|c| c.status.as_str())
        .unwrap_or("Unknown")
}

/// `Complete`, `Failed` or `Running`.
pub fn job_status(job: &Job) -> &'static str {
    let conditions = job.status.as_ref().and_then(|s| s.conditions.as_deref()).unwrap_or_default();
    let holds = |kind: &str| conditions.iter().any(|c| c.type_ == kind && c.status == "True");
    if holds("Complete") {
        "Complete"
    } else if holds("Failed") {
        "Failed"
    } else {
        "Running"
    }
}
