//! Replicated resource channels.
//!
//! A [`ResourceChannel`] is a one-shot future over a single upstream list
//! call. The call starts as soon as the channel is opened; the result is
//! cached on first resolution and handed to any number of consumers, which
//! all observe the same `Arc` (or the same error). Dropping the last handle
//! cancels a call that is still in flight.

use std::sync::Arc;
use std::time::Instant;

use futures::future::{BoxFuture, FutureExt, Shared};
use k8s_openapi::api::core::v1::Event;
use kdash_core::UpstreamError;
use kube::{api::ListParams, Resource};
use metrics::{counter, histogram};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info};

use crate::{Listable, Lister, NamespaceQuery};

pub type ListResult<K> = Result<Arc<Vec<K>>, UpstreamError>;

pub struct ResourceChannel<K> {
    kind: Arc<str>,
    result: Shared<BoxFuture<'static, ListResult<K>>>,
    _guard: Arc<DropGuard>,
}

impl<K> Clone for ResourceChannel<K> {
    fn clone(&self) -> Self {
        Self { kind: Arc::clone(&self.kind), result: self.result.clone(), _guard: Arc::clone(&self._guard) }
    }
}

impl<K> std::fmt::Debug for ResourceChannel<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceChannel").field("kind", &self.kind).finish_non_exhaustive()
    }
}

impl<K: Send + Sync + 'static> ResourceChannel<K> {
    /// Wait for the upstream call. Every consumer gets the same snapshot.
    pub async fn get(&self) -> ListResult<K> {
        self.result.clone().await
    }

    /// The result if the call already completed.
    pub fn try_get(&self) -> Option<ListResult<K>> {
        self.result.peek().cloned()
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }
}

/// Run `fetch` once in its own task and expose its result as a channel.
///
/// The task observes a child of `cancel`: cancelling the request token, or
/// dropping every handle of the returned channel, stops the call and resolves
/// the channel with a `Cancelled` error. The error from `fetch` is passed
/// through unclassified.
pub fn spawn_list<K, F>(kind: &str, cancel: &CancellationToken, fetch: F) -> ResourceChannel<K>
where
    K: Send + Sync + 'static,
    F: std::future::Future<Output = Result<Vec<K>, UpstreamError>> + Send + 'static,
{
    let token = cancel.child_token();
    let task_token = token.clone();
    let kind: Arc<str> = Arc::from(kind);
    let task_kind = Arc::clone(&kind);
    let handle = tokio::spawn(async move {
        let t0 = Instant::now();
        counter!("upstream_list_total", 1u64, "kind" => task_kind.to_string());
        let res = tokio::select! {
            biased;
            _ = task_token.cancelled() => Err(UpstreamError::cancelled(format!("list {} cancelled", task_kind))),
            r = fetch => r,
        };
        histogram!("upstream_list_ms", t0.elapsed().as_secs_f64() * 1000.0, "kind" => task_kind.to_string());
        match &res {
            Ok(items) => debug!(kind = %task_kind, items = items.len(), took_ms = %t0.elapsed().as_millis(), "upstream list ok"),
            Err(e) => {
                counter!("upstream_list_errors_total", 1u64, "kind" => task_kind.to_string(), "class" => e.kind.as_str());
                info!(kind = %task_kind, error = %e, took_ms = %t0.elapsed().as_millis(), "upstream list failed");
            }
        }
        res.map(Arc::new)
    });
    let result = async move {
        match handle.await {
            Ok(res) => res,
            Err(e) => Err(UpstreamError::internal(format!("list task failed: {}", e))),
        }
    }
    .boxed()
    .shared();
    ResourceChannel { kind, result, _guard: Arc::new(token.drop_guard()) }
}

/// Open a channel listing `K` through `lister`.
///
/// Returned items are re-checked against `namespace` client-side: a
/// multi-namespace query cannot be narrowed by the API server.
pub fn list_channel<K, L>(
    lister: &L,
    namespace: &NamespaceQuery,
    params: ListParams,
    cancel: &CancellationToken,
) -> ResourceChannel<K>
where
    K: Listable,
    L: Lister,
{
    let lister = lister.clone();
    let namespace = namespace.clone();
    let kind = K::kind(&()).to_string();
    spawn_list(&kind, cancel, async move {
        let items: Vec<K> = lister.list(&namespace, &params).await?;
        if !K::namespaced() {
            return Ok(items);
        }
        let before = items.len();
        let kept: Vec<K> = items
            .into_iter()
            .filter(|o| namespace.matches_opt(o.meta().namespace.as_deref()))
            .collect();
        if kept.len() != before {
            debug!(kind = %K::kind(&()), before, after = kept.len(), "namespace re-filter dropped items");
        }
        Ok(kept)
    })
}

/// Events whose involved object has the given UID.
pub fn event_list_channel_for<L: Lister>(
    lister: &L,
    namespace: &NamespaceQuery,
    involved_uid: &str,
    cancel: &CancellationToken,
) -> ResourceChannel<Event> {
    let lister = lister.clone();
    let namespace = namespace.clone();
    let uid = involved_uid.to_string();
    spawn_list("Event", cancel, async move {
        let params = ListParams { field_selector: Some(format!("involvedObject.uid={}", uid)), ..Default::default() };
        let items: Vec<Event> = lister.list(&namespace, &params).await?;
        Ok(items
            .into_iter()
            .filter(|e| e.involved_object.uid.as_deref() == Some(uid.as_str()))
            .filter(|e| namespace.matches_opt(e.metadata.namespace.as_deref()))
            .collect())
    })
}
