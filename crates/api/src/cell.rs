//! Resource adapters for the data selector.
//!
//! Every listed kind goes through one generic [`ResourceCell`]; the few
//! properties that differ per kind come from [`Selectable::extra_property`].

use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{ConfigMap, Event, Namespace, Node, Pod, Secret, Service};
use kdash_dataselect::{ComparableValue, DataCell, MetricDataCell, PropertyName};
use kdash_kubehub::Listable;
use kdash_metric::ResourceSelector;

use crate::status::{job_status, node_ready, pod_status};

/// A listable kind the dashboard can select over.
pub trait Selectable: Listable {
    /// Kind name used in metric selectors and labels.
    const RESOURCE_KIND: &'static str;

    /// Kind-specific properties. `name`, `namespace` and
    /// `creationTimestamp` are served from object metadata before this is
    /// consulted.
    fn extra_property(&self, _name: &PropertyName) -> Option<ComparableValue> {
        None
    }
}

/// Borrowing cell over one listed object.
#[derive(Debug)]
pub struct ResourceCell<'a, K>(pub &'a K);

impl<'a, K> Clone for ResourceCell<'a, K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, K> Copy for ResourceCell<'a, K> {}

impl<'a, K> ResourceCell<'a, K> {
    pub fn new(obj: &'a K) -> Self {
        Self(obj)
    }

    pub fn get(&self) -> &'a K {
        self.0
    }
}

impl<'a, K: Selectable> DataCell for ResourceCell<'a, K> {
    fn property(&self, name: &PropertyName) -> Option<ComparableValue> {
        let meta = self.0.meta();
        match name {
            PropertyName::Name => meta.name.clone().map(ComparableValue::Str),
            PropertyName::Namespace => meta.namespace.clone().map(ComparableValue::Str),
            PropertyName::CreationTimestamp => meta.creation_timestamp.as_ref().map(|t| ComparableValue::Time(t.0)),
            other => self.0.extra_property(other),
        }
    }
}

impl<'a, K: Selectable> MetricDataCell for ResourceCell<'a, K> {
    fn resource_selector(&self) -> ResourceSelector {
        let meta = self.0.meta();
        ResourceSelector {
            namespace: meta.namespace.clone(),
            resource_kind: K::RESOURCE_KIND.to_string(),
            resource_name: meta.name.clone().unwrap_or_default(),
            uid: meta.uid.clone(),
        }
    }
}

/// Wrap every object of a listed snapshot.
pub fn to_cells<K>(items: &[K]) -> Vec<ResourceCell<'_, K>> {
    items.iter().map(ResourceCell::new).collect()
}

fn text(v: Option<&String>) -> Option<ComparableValue> {
    v.map(|s| ComparableValue::Str(s.clone()))
}

impl Selectable for Pod {
    const RESOURCE_KIND: &'static str = "pod";

    /// `status` ignores events; listing views add warning events on top.
    fn extra_property(&self, name: &PropertyName) -> Option<ComparableValue> {
        match name {
            PropertyName::Status => Some(ComparableValue::Str(pod_status(self, false).as_str().to_string())),
            _ => None,
        }
    }
}

impl Selectable for Event {
    const RESOURCE_KIND: &'static str = "event";

    fn extra_property(&self, name: &PropertyName) -> Option<ComparableValue> {
        match name {
            PropertyName::Type => text(self.type_.as_ref()),
            PropertyName::Reason => text(self.reason.as_ref()),
            PropertyName::FirstSeen => self.first_timestamp.as_ref().map(|t| ComparableValue::Time(t.0)),
            PropertyName::LastSeen => self.last_timestamp.as_ref().map(|t| ComparableValue::Time(t.0)),
            _ => None,
        }
    }
}

impl Selectable for Node {
    const RESOURCE_KIND: &'static str = "node";

    fn extra_property(&self, name: &PropertyName) -> Option<ComparableValue> {
        match name {
            PropertyName::Status => Some(ComparableValue::Str(node_ready(self).to_string())),
            _ => None,
        }
    }
}

impl Selectable for Job {
    const RESOURCE_KIND: &'static str = "job";

    fn extra_property(&self, name: &PropertyName) -> Option<ComparableValue> {
        match name {
            PropertyName::Status => Some(ComparableValue::Str(job_status(self).to_string())),
            _ => None,
        }
    }
}

impl Selectable for Namespace {
    const RESOURCE_KIND: &'static str = "namespace";

    fn extra_property(&self, name: &PropertyName) -> Option<ComparableValue> {
        match name {
            PropertyName::Status => text(self.status.as_ref().and_then(|s| s.phase.as_ref())),
            _ => None,
        }
    }
}

impl Selectable for Secret {
    const RESOURCE_KIND: &'static str = "secret";

    fn extra_property(&self, name: &PropertyName) -> Option<ComparableValue> {
        match name {
            PropertyName::Type => text(self.type_.as_ref()),
            _ => None,
        }
    }
}

impl Selectable for Service {
    const RESOURCE_KIND: &'static str = "service";

    fn extra_property(&self, name: &PropertyName) -> Option<ComparableValue> {
        match name {
            PropertyName::Type => text(self.spec.as_ref().and_then(|s| s.type_.as_ref())),
            _ => None,
        }
    }
}

impl Selectable for ConfigMap {
    const RESOURCE_KIND: &'static str = "configmap";
}

impl Selectable for Deployment {
    const RESOURCE_KIND: &'static str = "deployment";
}

impl Selectable for ReplicaSet {
    const RESOURCE_KIND: &'static str = "replicaset";
}
