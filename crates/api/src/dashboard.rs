//! Composed list and detail pipelines.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;

use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{ConfigMap, Event, Namespace, Node, Pod, Secret};
use kdash_core::{UpstreamError, Warnings};
use kdash_dataselect::{
    generic_data_select_with_filter, generic_data_select_with_filter_and_metrics, DataSelectQuery,
};
use kdash_kubehub::{event_list_channel_for, list_channel, CancellationToken, ListParams, Lister, NamespaceQuery};
use kdash_metric::MetricClient;
use tracing::{debug, info};

use crate::cell::{to_cells, Selectable};
use crate::status::StatusTally;
use crate::view::{
    containers, is_warning, ConfigMapSummary, EventSummary, JobSummary, ListMeta, ListView, NamespaceSummary,
    NodeSummary, PodDetail, PodList, PodSummary, SecretSummary,
};

pub type DashboardResult<T> = Result<T, UpstreamError>;

/// The dashboard's read pipelines over one upstream lister.
///
/// Every call opens its own resource channels; nothing is cached between
/// calls. A critical upstream error ends the call and drops the channels
/// still open, which cancels their upstream requests.
pub struct Dashboard<L> {
    lister: L,
    metrics: Option<Arc<dyn MetricClient>>,
}

impl<L: Lister> Dashboard<L> {
    pub fn new(lister: L) -> Self {
        Self { lister, metrics: None }
    }

    /// Attach cumulative metrics to the list views that support them.
    pub fn with_metric_client(mut self, client: Arc<dyn MetricClient>) -> Self {
        self.metrics = Some(client);
        self
    }

    pub fn lister(&self) -> &L {
        &self.lister
    }

    /// Pods in scope with per-pod warning events and a status tally. With a
    /// metric client attached, a query naming no metrics gets CPU and memory.
    pub async fn pod_list(
        &self,
        nsq: &NamespaceQuery,
        query: &DataSelectQuery,
        cancel: &CancellationToken,
    ) -> DashboardResult<PodList> {
        let t0 = Instant::now();
        info!(ns = ?nsq.namespaces(), "dashboard: pod_list start");
        let pods = list_channel::<Pod, _>(&self.lister, nsq, ListParams::default(), cancel);
        let events = list_channel::<Event, _>(&self.lister, nsq, ListParams::default(), cancel);

        let mut warnings = Warnings::new();
        let pods = warnings.absorb(pods.get().await)?.unwrap_or_default();
        let events = warnings.absorb(events.get().await)?.unwrap_or_default();

        let mut by_pod: HashMap<&str, Vec<EventSummary>> = HashMap::new();
        for e in events.iter().filter(|e| is_warning(e)) {
            if let Some(uid) = e.involved_object.uid.as_deref() {
                by_pod.entry(uid).or_default().push(EventSummary::from(e));
            }
        }
        let warnings_for = |pod: &Pod| {
            pod.metadata.uid.as_deref().and_then(|uid| by_pod.get(uid)).cloned().unwrap_or_default()
        };

        let mut status = kdash_core::ResourceStatus::default();
        for pod in pods.iter() {
            status.add(PodSummary::new(pod, warnings_for(pod)).status);
        }

        let query = if self.metrics.is_some() { query.with_default_metrics() } else { query.clone() };
        let (page, promises, total) =
            generic_data_select_with_filter_and_metrics(to_cells(pods.as_slice()), &query, self.metrics.as_deref());
        let summaries: Vec<PodSummary> = page.iter().map(|c| PodSummary::new(c.get(), warnings_for(c.get()))).collect();
        let cumulative_metrics = promises.get_metrics().await;
        info!(
            pods = summaries.len(),
            total,
            errors = warnings.len(),
            took_ms = %t0.elapsed().as_millis(),
            "dashboard: pod_list ok"
        );
        Ok(PodList {
            list_meta: ListMeta { total_items: total },
            pods: summaries,
            status,
            cumulative_metrics,
            errors: warnings.into_vec(),
        })
    }

    pub async fn node_list(&self, query: &DataSelectQuery, cancel: &CancellationToken) -> DashboardResult<ListView<NodeSummary>> {
        let t0 = Instant::now();
        let nodes = list_channel::<Node, _>(&self.lister, &NamespaceQuery::all(), ListParams::default(), cancel);
        let mut warnings = Warnings::new();
        let nodes = warnings.absorb(nodes.get().await)?.unwrap_or_default();
        let (page, promises, total) =
            generic_data_select_with_filter_and_metrics(to_cells(nodes.as_slice()), query, self.metrics.as_deref());
        let items = page.iter().map(|c| NodeSummary::from(c.get())).collect();
        let metrics = promises.get_metrics().await;
        info!(total, took_ms = %t0.elapsed().as_millis(), "dashboard: node_list ok");
        Ok(ListView::new(items, total, warnings.into_vec()).with_metrics(metrics))
    }

    pub async fn event_list(
        &self,
        nsq: &NamespaceQuery,
        query: &DataSelectQuery,
        cancel: &CancellationToken,
    ) -> DashboardResult<ListView<EventSummary>> {
        self.simple_list::<Event, EventSummary>(nsq, query, cancel).await
    }

    pub async fn config_map_list(
        &self,
        nsq: &NamespaceQuery,
        query: &DataSelectQuery,
        cancel: &CancellationToken,
    ) -> DashboardResult<ListView<ConfigMapSummary>> {
        self.simple_list::<ConfigMap, ConfigMapSummary>(nsq, query, cancel).await
    }

    pub async fn secret_list(
        &self,
        nsq: &NamespaceQuery,
        query: &DataSelectQuery,
        cancel: &CancellationToken,
    ) -> DashboardResult<ListView<SecretSummary>> {
        self.simple_list::<Secret, SecretSummary>(nsq, query, cancel).await
    }

    pub async fn job_list(
        &self,
        nsq: &NamespaceQuery,
        query: &DataSelectQuery,
        cancel: &CancellationToken,
    ) -> DashboardResult<ListView<JobSummary>> {
        self.simple_list::<Job, JobSummary>(nsq, query, cancel).await
    }

    pub async fn namespace_list(
        &self,
        query: &DataSelectQuery,
        cancel: &CancellationToken,
    ) -> DashboardResult<ListView<NamespaceSummary>> {
        self.simple_list::<Namespace, NamespaceSummary>(&NamespaceQuery::all(), query, cancel).await
    }

    /// One channel, one select, one summary per returned item.
    async fn simple_list<K, S>(
        &self,
        nsq: &NamespaceQuery,
        query: &DataSelectQuery,
        cancel: &CancellationToken,
    ) -> DashboardResult<ListView<S>>
    where
        K: Selectable,
        S: for<'a> From<&'a K>,
    {
        let t0 = Instant::now();
        let channel = list_channel::<K, _>(&self.lister, nsq, ListParams::default(), cancel);
        let mut warnings = Warnings::new();
        let items = warnings.absorb(channel.get().await)?.unwrap_or_default();
        let (page, total) = generic_data_select_with_filter(to_cells(items.as_slice()), query);
        let out: Vec<S> = page.iter().map(|c| S::from(c.get())).collect();
        info!(
            kind = K::RESOURCE_KIND,
            ns = ?nsq.namespaces(),
            items = out.len(),
            total,
            took_ms = %t0.elapsed().as_millis(),
            "dashboard: list ok"
        );
        Ok(ListView::new(out, total, warnings.into_vec()))
    }

    /// A single pod with its events and the config maps and secrets it
    /// references. `NotFound` when no such pod is visible.
    pub async fn pod_detail(
        &self,
        namespace: &str,
        name: &str,
        cancel: &CancellationToken,
    ) -> DashboardResult<PodDetail> {
        let t0 = Instant::now();
        info!(ns = %namespace, name = %name, "dashboard: pod_detail start");
        let nsq = NamespaceQuery::single(namespace);
        let by_name = ListParams { field_selector: Some(format!("metadata.name={}", name)), ..Default::default() };
        let pods = list_channel::<Pod, _>(&self.lister, &nsq, by_name, cancel);
        let config_maps = list_channel::<ConfigMap, _>(&self.lister, &nsq, ListParams::default(), cancel);
        let secrets = list_channel::<Secret, _>(&self.lister, &nsq, ListParams::default(), cancel);

        let mut warnings = Warnings::new();
        let pods = warnings.absorb(pods.get().await)?.unwrap_or_default();
        let pod = pods
            .iter()
            .find(|p| p.metadata.name.as_deref() == Some(name))
            .ok_or_else(|| UpstreamError::not_found(format!("pods \"{}\" not found", name)))?;

        let events = match pod.metadata.uid.as_deref() {
            Some(uid) => self.pod_events(&nsq, uid, cancel).await?,
            None => ListView::new(Vec::new(), 0, Vec::new()),
        };
        warnings.extend(events.errors.clone());
        let config_maps = warnings.absorb(config_maps.get().await)?.unwrap_or_default();
        let secrets = warnings.absorb(secrets.get().await)?.unwrap_or_default();

        let (cm_refs, secret_refs) = references(pod);
        let config_maps: Vec<ConfigMapSummary> = config_maps
            .iter()
            .filter(|c| c.metadata.name.as_ref().map_or(false, |n| cm_refs.contains(n)))
            .map(ConfigMapSummary::from)
            .collect();
        let secrets: Vec<SecretSummary> = secrets
            .iter()
            .filter(|s| s.metadata.name.as_ref().map_or(false, |n| secret_refs.contains(n)))
            .map(SecretSummary::from)
            .collect();
        debug!(events = events.items.len(), config_maps = config_maps.len(), secrets = secrets.len(), "dashboard: pod_detail related");

        let pod_warnings: Vec<EventSummary> = events.items.iter().filter(|e| e.type_ == "Warning").cloned().collect();

        info!(took_ms = %t0.elapsed().as_millis(), errors = warnings.len(), "dashboard: pod_detail ok");
        Ok(PodDetail {
            summary: PodSummary::new(pod, pod_warnings),
            pod_ip: pod.status.as_ref().and_then(|s| s.pod_ip.clone()),
            containers: containers(pod),
            events,
            config_maps,
            secrets,
            errors: warnings.into_vec(),
        })
    }

    /// Events whose involved object is the pod with `uid`. A non-critical
    /// error leaves the list empty and is reported on the view.
    async fn pod_events(
        &self,
        nsq: &NamespaceQuery,
        uid: &str,
        cancel: &CancellationToken,
    ) -> DashboardResult<ListView<EventSummary>> {
        let mut warnings = Warnings::new();
        let channel = event_list_channel_for(&self.lister, nsq, uid, cancel);
        let events = warnings.absorb(channel.get().await)?.unwrap_or_default();
        let items: Vec<EventSummary> = events.iter().map(EventSummary::from).collect();
        let total = items.len();
        Ok(ListView::new(items, total, warnings.into_vec()))
    }
}

/// Names of the config maps and secrets a pod mounts or reads env from.
fn references(pod: &Pod) -> (BTreeSet<String>, BTreeSet<String>) {
    let mut cms = BTreeSet::new();
    let mut secrets = BTreeSet::new();
    let Some(spec) = pod.spec.as_ref() else {
        return (cms, secrets);
    };
    for v in spec.volumes.iter().flatten() {
        if let Some(name) = v.config_map.as_ref().and_then(|c| c.name.clone()) {
            cms.insert(name);
        }
        if let Some(name) = v.secret.as_ref().and_then(|s| s.secret_name.clone()) {
            secrets.insert(name);
        }
    }
    for r in spec.image_pull_secrets.iter().flatten() {
        if let Some(name) = r.name.clone() {
            secrets.insert(name);
        }
    }
    let all = spec.containers.iter().chain(spec.init_containers.iter().flatten());
    for c in all {
        for from in c.env_from.iter().flatten() {
            if let Some(name) = from.config_map_ref.as_ref().and_then(|r| r.name.clone()) {
                cms.insert(name);
            }
            if let Some(name) = from.secret_ref.as_ref().and_then(|r| r.name.clone()) {
                secrets.insert(name);
            }
        }
        for env in c.env.iter().flatten() {
            let Some(src) = env.value_from.as_ref() else { continue };
            if let Some(name) = src.config_map_key_ref.as_ref().and_then(|r| r.name.clone()) {
                cms.insert(name);
            }
            if let Some(name) = src.secret_key_ref.as_ref().and_then(|r| r.name.clone()) {
                secrets.insert(name);
            }
        }
    }
    (cms, secrets)
}
