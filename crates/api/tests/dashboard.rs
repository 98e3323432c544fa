#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use kdash_api::{
    CancellationToken, Dashboard, DataSelectParams, DataSelectQuery, ErrorKind, NamespaceQuery, PodStatus,
    StaticLister, StaticMetricClient, UpstreamError,
};

fn pod(name: &str, ns: &str, phase: &str, ready: bool) -> serde_json::Value {
    let flag = if ready { "True" } else { "False" };
    serde_json::json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": {
            "name": name,
            "namespace": ns,
            "uid": format!("uid-{}", name),
            "creationTimestamp": "2024-03-01T10:00:00Z",
        },
        "spec": { "containers": [{ "name": "main", "image": "nginx:1.25" }], "nodeName": "node-1" },
        "status": {
            "phase": phase,
            "conditions": [
                { "type": "Initialized", "status": "True" },
                { "type": "Ready", "status": flag },
            ],
        },
    })
}

fn warning(name: &str, ns: &str, pod_name: &str) -> serde_json::Value {
    serde_json::json!({
        "apiVersion": "v1",
        "kind": "Event",
        "metadata": { "name": name, "namespace": ns },
        "involvedObject": { "kind": "Pod", "name": pod_name, "uid": format!("uid-{}", pod_name) },
        "type": "Warning",
        "reason": "BackOff",
        "message": "Back-off restarting failed container",
        "count": 3,
        "lastTimestamp": "2024-03-01T10:05:00Z",
    })
}

fn named(kind: &str, name: &str, ns: &str) -> serde_json::Value {
    serde_json::json!({ "apiVersion": "v1", "kind": kind, "metadata": { "name": name, "namespace": ns } })
}

fn query(raw: serde_json::Value) -> DataSelectQuery {
    serde_json::from_value::<DataSelectParams>(raw).unwrap().to_query()
}

#[tokio::test]
async fn pod_list_tallies_status_and_attaches_warnings() {
    let lister = StaticLister::new()
        .with_objects(
            "Pod",
            vec![
                pod("api", "prod", "Running", true),
                pod("worker", "prod", "Pending", false),
                pod("batch", "prod", "Succeeded", false),
            ],
        )
        .with_objects("Event", vec![warning("worker.1", "prod", "worker")]);
    let dash = Dashboard::new(lister.clone());
    let cancel = CancellationToken::new();
    let list = dash
        .pod_list(&NamespaceQuery::single("prod"), &DataSelectQuery::none(), &cancel)
        .await
        .unwrap();

    assert_eq!(list.list_meta.total_items, 3);
    assert_eq!((list.status.running, list.status.failed, list.status.succeeded), (1, 1, 1));
    let worker = list.pods.iter().find(|p| p.object_meta.name == "worker").unwrap();
    assert_eq!(worker.status, PodStatus::Failed);
    assert_eq!(worker.warnings.len(), 1);
    assert_eq!(worker.warnings[0].reason, "BackOff");
    assert!(list.errors.is_empty());
    assert_eq!((lister.calls_for("Pod"), lister.calls_for("Event")), (1, 1));
}

#[tokio::test]
async fn pod_list_pages_sorted_results_and_counts_before_paging() {
    let pods = (1..=5).map(|i| pod(&format!("pod-{}", i), "default", "Running", true)).collect();
    let dash = Dashboard::new(StaticLister::new().with_objects("Pod", pods));
    let q = query(serde_json::json!({ "itemsPerPage": "2", "page": "1", "sortBy": "d,name" }));
    let list = dash.pod_list(&NamespaceQuery::all(), &q, &CancellationToken::new()).await.unwrap();
    let names: Vec<&str> = list.pods.iter().map(|p| p.object_meta.name.as_str()).collect();
    assert_eq!(names, vec!["pod-5", "pod-4"]);
    assert_eq!(list.list_meta.total_items, 5);
    // the tally covers everything in scope, not the page
    assert_eq!(list.status.running, 5);
}

#[tokio::test]
async fn unauthorized_sub_fetch_surfaces_as_a_warning() {
    let lister = StaticLister::new()
        .with_objects("Pod", vec![pod("api", "default", "Running", true)])
        .with_error("Event", UpstreamError::status(401, "Unauthorized"));
    let dash = Dashboard::new(lister);
    let list = dash
        .pod_list(&NamespaceQuery::all(), &DataSelectQuery::none(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(list.pods.len(), 1);
    assert_eq!(list.errors.len(), 1);
    assert_eq!(list.errors[0].kind, ErrorKind::Unauthorized);

    let body = serde_json::to_value(&list).unwrap();
    assert_eq!(body["errors"][0]["code"], 401);
    assert_eq!(body["listMeta"]["totalItems"], 1);
}

#[tokio::test]
async fn forbidden_primary_list_yields_an_empty_list() {
    let dash = Dashboard::new(StaticLister::new().with_error("Secret", UpstreamError::status(403, "secrets is forbidden")));
    let view = dash
        .secret_list(&NamespaceQuery::all(), &DataSelectQuery::none(), &CancellationToken::new())
        .await
        .unwrap();
    assert!(view.items.is_empty());
    assert_eq!(view.list_meta.total_items, 0);
    assert_eq!(view.errors[0].code, Some(403));
}

#[tokio::test]
async fn critical_error_aborts_the_request() {
    let lister = StaticLister::new()
        .with_error("Pod", UpstreamError::status(500, "etcdserver: request timed out"))
        .with_objects("Event", vec![]);
    let dash = Dashboard::new(lister);
    let err = dash
        .pod_list(&NamespaceQuery::all(), &DataSelectQuery::none(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Internal);
    assert_eq!(err.http_status(), 500);
}

#[tokio::test]
async fn cancelled_request_reports_cancelled() {
    let lister = StaticLister::new().with_hang("Pod");
    let dash = Dashboard::new(lister.clone());
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });
    let err = dash.pod_list(&NamespaceQuery::all(), &DataSelectQuery::none(), &cancel).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Cancelled);
    assert_eq!(err.http_status(), 503);
}

#[tokio::test]
async fn simple_lists_filter_and_summarize() {
    let lister = StaticLister::new()
        .with_objects(
            "ConfigMap",
            vec![named("ConfigMap", "app-config", "default"), named("ConfigMap", "kube-root-ca.crt", "default")],
        )
        .with_objects(
            "Job",
            vec![serde_json::json!({
                "apiVersion": "batch/v1",
                "kind": "Job",
                "metadata": { "name": "migrate", "namespace": "default" },
                "spec": { "completions": 1, "template": {} },
                "status": { "succeeded": 1, "conditions": [{ "type": "Complete", "status": "True" }] },
            })],
        )
        .with_objects(
            "Namespace",
            vec![
                serde_json::json!({
                    "apiVersion": "v1",
                    "kind": "Namespace",
                    "metadata": { "name": "default" },
                    "status": { "phase": "Active" },
                }),
                serde_json::json!({
                    "apiVersion": "v1",
                    "kind": "Namespace",
                    "metadata": { "name": "old" },
                    "status": { "phase": "Terminating" },
                }),
            ],
        );
    let dash = Dashboard::new(lister);
    let cancel = CancellationToken::new();
    let all = NamespaceQuery::all();

    let cms = dash.config_map_list(&all, &query(serde_json::json!({ "filterBy": "name,app" })), &cancel).await.unwrap();
    assert_eq!(cms.items.len(), 1);
    assert_eq!(cms.items[0].object_meta.name, "app-config");

    let jobs = dash.job_list(&all, &DataSelectQuery::none(), &cancel).await.unwrap();
    assert_eq!(jobs.items[0].status, "Complete");
    assert_eq!(jobs.items[0].succeeded, 1);

    let namespaces = dash.namespace_list(&query(serde_json::json!({ "filterBy": "status,Term" })), &cancel).await.unwrap();
    assert_eq!(namespaces.items.len(), 1);
    assert_eq!(namespaces.items[0].phase, "Terminating");
}

#[tokio::test]
async fn node_list_carries_cumulative_metrics() {
    let node = |name: &str, ready: &str| {
        serde_json::json!({
            "apiVersion": "v1",
            "kind": "Node",
            "metadata": { "name": name, "uid": format!("uid-{}", name) },
            "status": { "conditions": [{ "type": "Ready", "status": ready }] },
        })
    };
    let lister = StaticLister::new().with_objects("Node", vec![node("n1", "True"), node("n2", "False")]);
    let metrics = StaticMetricClient::new()
        .with_series("uid-n1", "cpu/usage_rate", &[(0, 10), (60, 20)])
        .with_series("uid-n2", "cpu/usage_rate", &[(0, 5)]);
    let dash = Dashboard::new(lister).with_metric_client(Arc::new(metrics));
    let q = query(serde_json::json!({ "metricNames": "cpu/usage_rate" }));
    let view = dash.node_list(&q, &CancellationToken::new()).await.unwrap();

    assert_eq!(view.items.len(), 2);
    assert_eq!(view.items[1].ready, "False");
    assert_eq!(view.cumulative_metrics.len(), 1);
    let points: Vec<(i64, i64)> = view.cumulative_metrics[0].data_points.iter().map(|p| (p.x, p.y)).collect();
    assert_eq!(points, vec![(0, 15), (60, 20)]);
}

#[tokio::test]
async fn event_list_sorts_by_last_seen() {
    let mut early = warning("a", "default", "x");
    early["lastTimestamp"] = serde_json::json!("2024-03-01T09:00:00Z");
    let late = warning("b", "default", "y");
    let dash = Dashboard::new(StaticLister::new().with_objects("Event", vec![early, late]));
    let q = query(serde_json::json!({ "sortBy": "d,lastSeen" }));
    let view = dash.event_list(&NamespaceQuery::all(), &q, &CancellationToken::new()).await.unwrap();
    let names: Vec<&str> = view.items.iter().map(|e| e.object_meta.name.as_str()).collect();
    assert_eq!(names, vec!["b", "a"]);
    assert_eq!(view.items[0].count, 3);
}

#[tokio::test]
async fn events_without_last_seen_sort_after_the_rest() {
    let events: Vec<serde_json::Value> = (0..64)
        .map(|i| {
            let mut e = warning(&format!("ev-{:02}", i), "default", "x");
            if i % 3 == 0 {
                e.as_object_mut().unwrap().remove("lastTimestamp");
            } else {
                e["lastTimestamp"] = serde_json::json!(format!("2024-03-01T10:{:02}:00Z", (i * 37) % 60));
            }
            e
        })
        .collect();
    let dash = Dashboard::new(StaticLister::new().with_objects("Event", events));
    let q = query(serde_json::json!({ "sortBy": "a,lastSeen" }));
    let view = dash.event_list(&NamespaceQuery::all(), &q, &CancellationToken::new()).await.unwrap();

    assert_eq!(view.items.len(), 64);
    let (seen, unseen): (Vec<_>, Vec<_>) = view.items.iter().partition(|e| e.last_seen.is_some());
    assert_eq!(unseen.len(), 22);
    assert!(view.items[..seen.len()].iter().all(|e| e.last_seen.is_some()));
    let stamps: Vec<&str> = seen.iter().filter_map(|e| e.last_seen.as_deref()).collect();
    assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    let tail: Vec<&str> = unseen.iter().map(|e| e.object_meta.name.as_str()).collect();
    assert_eq!(tail[..3], ["ev-00", "ev-03", "ev-06"]);
}

#[tokio::test]
async fn pod_detail_collects_related_objects() {
    let mut p = pod("api", "prod", "Running", true);
    p["spec"]["volumes"] = serde_json::json!([{ "name": "cfg", "configMap": { "name": "api-config" } }]);
    p["spec"]["containers"][0]["env"] = serde_json::json!([
        { "name": "TOKEN", "valueFrom": { "secretKeyRef": { "name": "api-token", "key": "token" } } }
    ]);
    p["status"]["podIP"] = serde_json::json!("10.0.0.7");
    let lister = StaticLister::new()
        .with_objects("Pod", vec![p, pod("api", "dev", "Running", true)])
        .with_objects("Event", vec![warning("api.1", "prod", "api"), warning("other.1", "prod", "other")])
        .with_objects("ConfigMap", vec![named("ConfigMap", "api-config", "prod"), named("ConfigMap", "unused", "prod")])
        .with_objects("Secret", vec![named("Secret", "api-token", "prod"), named("Secret", "api-token", "dev")]);
    let dash = Dashboard::new(lister);
    let detail = dash.pod_detail("prod", "api", &CancellationToken::new()).await.unwrap();

    assert_eq!(detail.summary.object_meta.namespace.as_deref(), Some("prod"));
    assert_eq!(detail.pod_ip.as_deref(), Some("10.0.0.7"));
    assert_eq!(detail.containers[0].image, "nginx:1.25");
    assert_eq!(detail.events.items.len(), 1);
    assert_eq!(detail.summary.warnings.len(), 1);
    let cms: Vec<&str> = detail.config_maps.iter().map(|c| c.object_meta.name.as_str()).collect();
    assert_eq!(cms, vec!["api-config"]);
    assert_eq!(detail.secrets.len(), 1);
    assert_eq!(detail.secrets[0].object_meta.namespace.as_deref(), Some("prod"));
    assert!(detail.errors.is_empty());
}

#[tokio::test]
async fn missing_pod_is_not_found() {
    let dash = Dashboard::new(StaticLister::new().with_objects("Pod", vec![pod("api", "prod", "Running", true)]));
    let err = dash.pod_detail("prod", "nope", &CancellationToken::new()).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert_eq!(err.http_status(), 404);
}

#[tokio::test]
async fn forbidden_secrets_do_not_fail_the_detail() {
    let lister = StaticLister::new()
        .with_objects("Pod", vec![pod("api", "prod", "Running", true)])
        .with_error("Secret", UpstreamError::status(403, "secrets is forbidden"));
    let detail = Dashboard::new(lister).pod_detail("prod", "api", &CancellationToken::new()).await.unwrap();
    assert!(detail.secrets.is_empty());
    assert_eq!(detail.errors.len(), 1);
    assert_eq!(detail.errors[0].kind, ErrorKind::Forbidden);
}

#[tokio::test]
async fn event_sub_view_errors_reach_the_detail() {
    let lister = StaticLister::new()
        .with_objects("Pod", vec![pod("api", "prod", "Running", true)])
        .with_error("Event", UpstreamError::status(403, "events is forbidden"))
        .with_error("Secret", UpstreamError::status(403, "secrets is forbidden"));
    let detail = Dashboard::new(lister).pod_detail("prod", "api", &CancellationToken::new()).await.unwrap();
    assert!(detail.events.items.is_empty());
    assert_eq!(detail.events.errors.len(), 1);
    let messages: Vec<&str> = detail.errors.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(messages, vec!["events is forbidden", "secrets is forbidden"]);
}

#[tokio::test]
async fn pod_list_requests_cpu_and_memory_by_default() {
    let lister = StaticLister::new().with_objects("Pod", vec![pod("api", "prod", "Running", true)]).with_objects("Event", vec![]);
    let metrics = StaticMetricClient::new()
        .with_series("uid-api", "cpu/usage_rate", &[(0, 7)])
        .with_series("uid-api", "memory/usage", &[(0, 512)]);
    let dash = Dashboard::new(lister).with_metric_client(Arc::new(metrics));
    let list = dash.pod_list(&NamespaceQuery::all(), &DataSelectQuery::none(), &CancellationToken::new()).await.unwrap();
    let names: Vec<&str> = list.cumulative_metrics.iter().map(|m| m.metric_name.as_str()).collect();
    assert_eq!(names, vec!["cpu/usage_rate", "memory/usage"]);
    assert_eq!(list.cumulative_metrics[1].data_points[0].y, 512);

    // an explicit request wins
    let q = query(serde_json::json!({ "metricNames": "cpu/usage_rate" }));
    let list = dash.pod_list(&NamespaceQuery::all(), &q, &CancellationToken::new()).await.unwrap();
    assert_eq!(list.cumulative_metrics.len(), 1);
}
