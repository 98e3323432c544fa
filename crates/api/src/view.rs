//! Response shapes handed to the HTTP layer.
//!
//! Summaries are thin: list views carry what a table row needs,
//! the pod detail view adds containers, events and referenced config.

use std::collections::BTreeMap;

use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{ConfigMap, Event, Namespace, Node, Pod, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kdash_core::{ResourceStatus, UpstreamError};
use kdash_metric::Metric;
use kube::Resource;
use serde::Serialize;

use crate::status::{job_status, node_ready, pod_status, restart_count, PodStatus};

fn rfc3339(t: Option<&Time>) -> Option<String> {
    t.map(|t| t.0.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMeta {
    /// Items after filtering, before pagination.
    pub total_items: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<String>,
}

impl ObjectMeta {
    pub fn of<K: Resource>(obj: &K) -> Self {
        let meta = obj.meta();
        Self {
            name: meta.name.clone().unwrap_or_default(),
            namespace: meta.namespace.clone(),
            uid: meta.uid.clone(),
            labels: meta.labels.clone().unwrap_or_default(),
            creation_timestamp: rfc3339(meta.creation_timestamp.as_ref()),
        }
    }
}

/// One page of a resource list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListView<T> {
    pub list_meta: ListMeta,
    pub items: Vec<T>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cumulative_metrics: Vec<Metric>,
    /// Non-critical upstream errors; the list may be partial.
    pub errors: Vec<UpstreamError>,
}

impl<T> ListView<T> {
    pub fn new(items: Vec<T>, total_items: usize, errors: Vec<UpstreamError>) -> Self {
        Self { list_meta: ListMeta { total_items }, items, cumulative_metrics: Vec::new(), errors }
    }

    pub fn with_metrics(mut self, metrics: Vec<Metric>) -> Self {
        self.cumulative_metrics = metrics;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSummary {
    pub object_meta: ObjectMeta,
    #[serde(rename = "type")]
    pub type_: String,
    pub reason: String,
    pub message: String,
    pub source_component: String,
    pub object_kind: String,
    pub object_name: String,
    pub count: i32,
    pub first_seen: Option<String>,
    pub last_seen: Option<String>,
}

impl From<&Event> for EventSummary {
    fn from(e: &Event) -> Self {
        Self {
            object_meta: ObjectMeta::of(e),
            type_: e.type_.clone().unwrap_or_default(),
            reason: e.reason.clone().unwrap_or_default(),
            message: e.message.clone().unwrap_or_default(),
            source_component: e.source.as_ref().and_then(|s| s.component.clone()).unwrap_or_default(),
            object_kind: e.involved_object.kind.clone().unwrap_or_default(),
            object_name: e.involved_object.name.clone().unwrap_or_default(),
            count: e.count.unwrap_or(1),
            first_seen: rfc3339(e.first_timestamp.as_ref()),
            last_seen: rfc3339(e.last_timestamp.as_ref()),
        }
    }
}

pub fn is_warning(e: &Event) -> bool {
    e.type_.as_deref() == Some("Warning")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSummary {
    pub object_meta: ObjectMeta,
    pub status: PodStatus,
    pub restart_count: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
    pub warnings: Vec<EventSummary>,
}

impl PodSummary {
    /// `warnings` are the warning events whose involved object is this pod.
    pub fn new(pod: &Pod, warnings: Vec<EventSummary>) -> Self {
        Self {
            object_meta: ObjectMeta::of(pod),
            status: pod_status(pod, !warnings.is_empty()),
            restart_count: restart_count(pod),
            node_name: pod.spec.as_ref().and_then(|s| s.node_name.clone()),
            warnings,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PodList {
    pub list_meta: ListMeta,
    pub pods: Vec<PodSummary>,
    /// Tally over every pod in scope, not only the returned page.
    pub status: ResourceStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cumulative_metrics: Vec<Metric>,
    pub errors: Vec<UpstreamError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSummary {
    pub object_meta: ObjectMeta,
    pub ready: String,
    pub unschedulable: bool,
}

impl From<&Node> for NodeSummary {
    fn from(n: &Node) -> Self {
        Self {
            object_meta: ObjectMeta::of(n),
            ready: node_ready(n).to_string(),
            unschedulable: n.spec.as_ref().and_then(|s| s.unschedulable).unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMapSummary {
    pub object_meta: ObjectMeta,
    pub keys: usize,
}

impl From<&ConfigMap> for ConfigMapSummary {
    fn from(c: &ConfigMap) -> Self {
        let keys = c.data.as_ref().map_or(0, BTreeMap::len) + c.binary_data.as_ref().map_or(0, BTreeMap::len);
        Self { object_meta: ObjectMeta::of(c), keys }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretSummary {
    pub object_meta: ObjectMeta,
    #[serde(rename = "type")]
    pub type_: String,
}

impl From<&Secret> for SecretSummary {
    fn from(s: &Secret) -> Self {
        Self { object_meta: ObjectMeta::of(s), type_: s.type_.clone().unwrap_or_else(|| "Opaque".to_string()) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub object_meta: ObjectMeta,
    pub status: String,
    pub completions: Option<i32>,
    pub succeeded: i32,
    pub failed: i32,
}

impl From<&Job> for JobSummary {
    fn from(j: &Job) -> Self {
        let status = j.status.as_ref();
        Self {
            object_meta: ObjectMeta::of(j),
            status: job_status(j).to_string(),
            completions: j.spec.as_ref().and_then(|s| s.completions),
            succeeded: status.and_then(|s| s.succeeded).unwrap_or(0),
            failed: status.and_then(|s| s.failed).unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceSummary {
    pub object_meta: ObjectMeta,
    pub phase: String,
}

impl From<&Namespace> for NamespaceSummary {
    fn from(n: &Namespace) -> Self {
        let phase = n.status.as_ref().and_then(|s| s.phase.clone()).unwrap_or_else(|| "Active".to_string());
        Self { object_meta: ObjectMeta::of(n), phase }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSummary {
    pub name: String,
    pub image: String,
    pub ready: bool,
    pub restart_count: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PodDetail {
    #[serde(flatten)]
    pub summary: PodSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod_ip: Option<String>,
    pub containers: Vec<ContainerSummary>,
    pub events: ListView<EventSummary>,
    /// Config maps the pod references that exist in its namespace.
    pub config_maps: Vec<ConfigMapSummary>,
    /// Same, for secrets.
    pub secrets: Vec<SecretSummary>,
    pub errors: Vec<UpstreamError>,
}

pub fn containers(pod: &Pod) -> Vec<ContainerSummary> {
    let statuses = pod.status.as_ref().and_then(|s| s.container_statuses.as_deref()).unwrap_or_default();
    pod.spec
        .iter()
        .flat_map(|s| s.containers.iter())
        .map(|c| {
            let st = statuses.iter().find(|s| s.name == c.name);
            ContainerSummary {
                name: c.name.clone(),
                image: c.image.clone().unwrap_or_default(),
                ready: st.map_or(false, |s| s.ready),
                restart_count: st.map_or(0, |s| s.restart_count),
            }
        })
        .collect()
}
