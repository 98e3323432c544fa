//! The upstream listing seam.
//!
//! Everything above this module sees upstream failures as
//! [`UpstreamError`]; `kube::Error` never leaks past [`upstream_error`].

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use k8s_openapi::{ClusterResourceScope, NamespaceResourceScope};
use kdash_core::UpstreamError;
use kube::{
    api::{Api, ListParams},
    Client, Resource,
};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::NamespaceQuery;

/// Compile-time scope of a resource kind.
pub trait ScopeExt {
    const NAMESPACED: bool;
}

impl ScopeExt for NamespaceResourceScope {
    const NAMESPACED: bool = true;
}

impl ScopeExt for ClusterResourceScope {
    const NAMESPACED: bool = false;
}

/// A statically typed resource kind that can be listed.
pub trait Listable:
    Resource<DynamicType = ()> + Clone + DeserializeOwned + fmt::Debug + Send + Sync + 'static
{
    fn namespaced() -> bool;
}

impl<K> Listable for K
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + fmt::Debug + Send + Sync + 'static,
    <K as Resource>::Scope: ScopeExt,
{
    fn namespaced() -> bool {
        <<K as Resource>::Scope as ScopeExt>::NAMESPACED
    }
}

/// Caller-supplied upstream list function.
///
/// Implementations are cheap to clone; every resource channel owns a clone
/// for the duration of its single call.
#[async_trait::async_trait]
pub trait Lister: Clone + Send + Sync + 'static {
    async fn list<K: Listable>(
        &self,
        namespace: &NamespaceQuery,
        params: &ListParams,
    ) -> Result<Vec<K>, UpstreamError>;
}

/// Tag a kube client error. Only API status responses keep their code.
pub fn upstream_error(err: kube::Error) -> UpstreamError {
    match err {
        kube::Error::Api(resp) => {
            let message = if resp.message.is_empty() { resp.reason } else { resp.message };
            UpstreamError::status(resp.code, message)
        }
        other => UpstreamError::unknown(other.to_string()),
    }
}

fn merge_selector(existing: Option<String>, extra: &str) -> String {
    match existing {
        Some(s) if !s.is_empty() => format!("{},{}", s, extra),
        _ => extra.to_string(),
    }
}

/// Lister backed by a shared kube client.
#[derive(Clone)]
pub struct KubeLister {
    client: Client,
}

impl KubeLister {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the ambient kubeconfig or in-cluster config.
    pub async fn try_default() -> Result<Self, UpstreamError> {
        let client = Client::try_default().await.map_err(upstream_error)?;
        Ok(Self::new(client))
    }
}

#[async_trait::async_trait]
impl Lister for KubeLister {
    async fn list<K: Listable>(
        &self,
        namespace: &NamespaceQuery,
        params: &ListParams,
    ) -> Result<Vec<K>, UpstreamError> {
        let t0 = Instant::now();
        let api: Api<K> = Api::all(self.client.clone());
        let mut lp = params.clone();
        if K::namespaced() {
            if let Some(ns) = namespace.to_request_param() {
                lp.field_selector = Some(merge_selector(lp.field_selector.take(), &format!("metadata.namespace={}", ns)));
            }
        }
        let list = api.list(&lp).await.map_err(upstream_error)?;
        debug!(
            kind = %K::kind(&()),
            items = list.items.len(),
            labels = ?lp.label_selector,
            fields = ?lp.field_selector,
            took_ms = %t0.elapsed().as_millis(),
            "kube list"
        );
        Ok(list.items)
    }
}

// ----------------- In-memory implementation -----------------

#[derive(Debug, Clone)]
enum Seed {
    Objects(Vec<serde_json::Value>),
    Fail(UpstreamError),
    Hang,
}

/// In-memory lister seeded with raw JSON objects (or failures) per kind.
///
/// Honours equality label selectors and single-namespace narrowing like the
/// API server would, counts calls, and tracks calls still in flight.
#[derive(Clone, Default)]
pub struct StaticLister {
    seeds: Arc<HashMap<String, Seed>>,
    delay: Option<Duration>,
    calls: Arc<Mutex<HashMap<String, usize>>>,
    in_flight: Arc<AtomicUsize>,
}

impl StaticLister {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_objects(mut self, kind: &str, objects: Vec<serde_json::Value>) -> Self {
        Arc::make_mut(&mut self.seeds).insert(kind.to_string(), Seed::Objects(objects));
        self
    }

    pub fn with_error(mut self, kind: &str, err: UpstreamError) -> Self {
        Arc::make_mut(&mut self.seeds).insert(kind.to_string(), Seed::Fail(err));
        self
    }

    /// Calls for `kind` never complete.
    pub fn with_hang(mut self, kind: &str) -> Self {
        Arc::make_mut(&mut self.seeds).insert(kind.to_string(), Seed::Hang);
        self
    }

    /// Every call sleeps this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).values().sum()
    }

    pub fn calls_for(&self, kind: &str) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).get(kind).copied().unwrap_or(0)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn labels_match(obj: &serde_json::Value, selector: Option<&str>) -> bool {
    let Some(selector) = selector else { return true };
    let labels = obj.pointer("/metadata/labels");
    let label = |k: &str| labels.and_then(|l| l.get(k)).and_then(|v| v.as_str());
    selector.split(',').map(str::trim).filter(|t| !t.is_empty()).all(|term| {
        if let Some((k, v)) = term.split_once("!=") {
            label(k.trim()) != Some(v.trim())
        } else if let Some((k, v)) = term.split_once("==").or_else(|| term.split_once('=')) {
            label(k.trim()) == Some(v.trim())
        } else {
            label(term).is_some()
        }
    })
}

#[async_trait::async_trait]
impl Lister for StaticLister {
    async fn list<K: Listable>(
        &self,
        namespace: &NamespaceQuery,
        params: &ListParams,
    ) -> Result<Vec<K>, UpstreamError> {
        let kind = K::kind(&()).to_string();
        {
            let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
            *calls.entry(kind.clone()).or_insert(0) += 1;
        }
        let _flight = InFlight::enter(&self.in_flight);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let objects = match self.seeds.get(&kind).cloned() {
            None => Vec::new(),
            Some(Seed::Objects(objects)) => objects,
            Some(Seed::Fail(err)) => return Err(err),
            Some(Seed::Hang) => return futures::future::pending().await,
        };
        let server_ns = if K::namespaced() { namespace.to_request_param() } else { None };
        let mut out = Vec::with_capacity(objects.len());
        for obj in objects {
            if let Some(ns) = server_ns {
                if obj.pointer("/metadata/namespace").and_then(|v| v.as_str()) != Some(ns) {
                    continue;
                }
            }
            if !labels_match(&obj, params.label_selector.as_deref()) {
                continue;
            }
            let item: K = serde_json::from_value(obj)
                .map_err(|e| UpstreamError::unknown(format!("decoding {}: {}", kind, e)))?;
            out.push(item);
        }
        Ok(out)
    }
}
