#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::core::v1::{Event, Node, Pod};
use kdash_core::{ErrorKind, UpstreamError};
use kdash_kubehub::{
    event_list_channel_for, list_channel, spawn_list, CancellationToken, ListParams, NamespaceQuery,
    StaticLister,
};

fn pod(name: &str, ns: &str, app: &str) -> serde_json::Value {
    serde_json::json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": { "name": name, "namespace": ns, "uid": format!("uid-{}", name), "labels": { "app": app } },
    })
}

fn node(name: &str) -> serde_json::Value {
    serde_json::json!({ "apiVersion": "v1", "kind": "Node", "metadata": { "name": name, "uid": format!("uid-{}", name) } })
}

fn event(name: &str, ns: &str, involved_uid: &str) -> serde_json::Value {
    serde_json::json!({
        "apiVersion": "v1",
        "kind": "Event",
        "metadata": { "name": name, "namespace": ns },
        "involvedObject": { "kind": "Pod", "uid": involved_uid },
    })
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn two_readers_observe_the_same_snapshot() {
    let lister = StaticLister::new().with_objects("Pod", vec![pod("a", "default", "web"), pod("b", "default", "db")]);
    let cancel = CancellationToken::new();
    let ch = list_channel::<Pod, _>(&lister, &NamespaceQuery::all(), ListParams::default(), &cancel);
    let other = ch.clone();

    let (first, second) = tokio::join!(ch.get(), other.get());
    let first = first.unwrap();
    let second = second.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.len(), 2);
    // a late reader still gets the cached value, no second upstream call
    let third = ch.get().await.unwrap();
    assert!(Arc::ptr_eq(&first, &third));
    assert_eq!(lister.calls_for("Pod"), 1);
}

#[tokio::test]
async fn readers_share_the_identical_error() {
    let lister = StaticLister::new().with_error("Pod", UpstreamError::status(403, "pods is forbidden"));
    let cancel = CancellationToken::new();
    let ch = list_channel::<Pod, _>(&lister, &NamespaceQuery::all(), ListParams::default(), &cancel);
    let other = ch.clone();
    let a = ch.get().await.unwrap_err();
    let b = other.get().await.unwrap_err();
    assert_eq!(a, b);
    assert_eq!(a.code, Some(403));
    assert_eq!(lister.calls(), 1);
}

#[tokio::test]
async fn multi_namespace_query_is_refiltered_client_side() {
    let lister = StaticLister::new().with_objects(
        "Pod",
        vec![pod("a", "default", "web"), pod("b", "prod", "web"), pod("c", "kube-system", "dns")],
    );
    let cancel = CancellationToken::new();
    let nsq = NamespaceQuery::parse_csv("default,prod");
    let pods = list_channel::<Pod, _>(&lister, &nsq, ListParams::default(), &cancel).get().await.unwrap();
    let names: Vec<_> = pods.iter().map(|p| p.metadata.name.clone().unwrap_or_default()).collect();
    assert_eq!(names, vec!["a", "b"]);
}

#[tokio::test]
async fn label_selector_reaches_the_lister() {
    let lister = StaticLister::new().with_objects("Pod", vec![pod("a", "default", "web"), pod("b", "default", "db")]);
    let cancel = CancellationToken::new();
    let params = ListParams::default().labels("app=db");
    let pods = list_channel::<Pod, _>(&lister, &NamespaceQuery::all(), params, &cancel).get().await.unwrap();
    assert_eq!(pods.len(), 1);
    assert_eq!(pods[0].metadata.name.as_deref(), Some("b"));
}

#[tokio::test]
async fn cluster_scoped_kinds_ignore_the_namespace() {
    let lister = StaticLister::new().with_objects("Node", vec![node("n1"), node("n2")]);
    let cancel = CancellationToken::new();
    let nodes = list_channel::<Node, _>(&lister, &NamespaceQuery::single("default"), ListParams::default(), &cancel)
        .get()
        .await
        .unwrap();
    assert_eq!(nodes.len(), 2);
}

#[tokio::test]
async fn events_are_narrowed_to_the_involved_object() {
    let lister = StaticLister::new().with_objects(
        "Event",
        vec![event("e1", "default", "uid-a"), event("e2", "default", "uid-b"), event("e3", "default", "uid-a")],
    );
    let cancel = CancellationToken::new();
    let events: Arc<Vec<Event>> =
        event_list_channel_for(&lister, &NamespaceQuery::all(), "uid-a", &cancel).get().await.unwrap();
    let names: Vec<_> = events.iter().filter_map(|e| e.metadata.name.clone()).collect();
    assert_eq!(names, vec!["e1", "e3"]);
}

#[tokio::test]
async fn independent_channels_run_concurrently() {
    let lister = StaticLister::new()
        .with_objects("Pod", vec![pod("a", "default", "web")])
        .with_objects("Node", vec![node("n1")])
        .with_delay(Duration::from_millis(50));
    let cancel = CancellationToken::new();
    let pods = list_channel::<Pod, _>(&lister, &NamespaceQuery::all(), ListParams::default(), &cancel);
    let nodes = list_channel::<Node, _>(&lister, &NamespaceQuery::all(), ListParams::default(), &cancel);
    // both calls are issued before anyone awaits
    wait_until(|| lister.in_flight() == 2).await;
    assert_eq!(pods.get().await.unwrap().len(), 1);
    assert_eq!(nodes.get().await.unwrap().len(), 1);
}

#[tokio::test]
async fn cancelling_the_request_resolves_pending_channels() {
    let lister = StaticLister::new().with_hang("Pod");
    let cancel = CancellationToken::new();
    let ch = list_channel::<Pod, _>(&lister, &NamespaceQuery::all(), ListParams::default(), &cancel);
    wait_until(|| lister.in_flight() == 1).await;
    cancel.cancel();
    let err = tokio::time::timeout(Duration::from_secs(2), ch.get()).await.unwrap().unwrap_err();
    assert_eq!(err.kind, ErrorKind::Cancelled);
    wait_until(|| lister.in_flight() == 0).await;
}

#[tokio::test]
async fn dropping_every_handle_stops_the_upstream_call() {
    let lister = StaticLister::new().with_hang("Pod");
    let cancel = CancellationToken::new();
    let ch = list_channel::<Pod, _>(&lister, &NamespaceQuery::all(), ListParams::default(), &cancel);
    let other = ch.clone();
    wait_until(|| lister.in_flight() == 1).await;
    drop(ch);
    // one handle left: still running
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(lister.in_flight(), 1);
    drop(other);
    wait_until(|| lister.in_flight() == 0).await;
    assert!(!cancel.is_cancelled());
}

#[tokio::test]
async fn try_get_is_empty_until_resolved() {
    let cancel = CancellationToken::new();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let ch = spawn_list::<u32, _>("Numbers", &cancel, async move {
        let _ = rx.await;
        Ok(vec![1, 2, 3])
    });
    assert!(ch.try_get().is_none());
    assert_eq!(ch.kind(), "Numbers");
    let _ = tx.send(());
    let v = ch.get().await.unwrap();
    assert_eq!(*v, vec![1, 2, 3]);
    assert!(ch.try_get().is_some());
}
