use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use memory_gateway::config::Config;
use memory_gateway::gateway::Gateway;
use memory_gateway::server::router;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FOO_SIDECAR: &str = r#"{"risks":["unsafe pointer arithmetic"],"anchors":[{"line":42,"text":"unsafe block"}],"observation_ids":[7,9],"total_lines":120}"#;

/// Writes the single-guide fixture: `foo.rs` with one risk, one anchor and
/// two observation IDs.
fn setup_guides() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    fs::create_dir_all(root.join("g")).unwrap();
    fs::write(root.join("g/foo.json"), FOO_SIDECAR).unwrap();
    fs::write(
        root.join("index.tsv"),
        "basename\tsource\tguide_md\tguide_json\nfoo.rs\tsrc/foo.rs\tg/foo.md\tg/foo.json\n",
    )
    .unwrap();
    tmp
}

fn app_with(root: &Path, worker_uri: Option<&str>) -> Router {
    let mut config = Config::default();
    config.guides.index = root.join("index.tsv");
    config.guides.root = Some(root.to_path_buf());
    match worker_uri {
        Some(uri) => {
            let url = uri.trim_start_matches("http://");
            let (host, port) = url.rsplit_once(':').unwrap();
            config.upstream.host = host.to_string();
            config.upstream.port = port.parse().unwrap();
        }
        // Nothing listens on port 9.
        None => config.upstream.port = 9,
    }
    router(Arc::new(Gateway::new(config).unwrap()))
}

async fn call(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_brief_single_guide_local_only() {
    let tmp = setup_guides();
    let (status, body) = call(
        app_with(tmp.path(), None),
        get("/v1/memory/brief?q=foo&include_memory=false"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let files = body["files"].as_array().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0]["risks"], json!(["unsafe pointer arithmetic"]));
    assert_eq!(files[0]["anchors"], json!([{"line": 42, "text": "unsafe block"}]));
    assert_eq!(files[0]["observation_ids"], json!([7, 9]));
    assert_eq!(files[0]["total_lines"], 120);
    assert_eq!(body["memory"]["recommended_fetch_ids"], json!([7, 9]));
    assert!(body["memory"]["search_status"].is_null());
    assert_eq!(
        body["next"]["fetch_observations"]["endpoint"],
        "/v1/memory/observations"
    );
}

#[tokio::test]
async fn test_graph_single_guide_local_only() {
    let tmp = setup_guides();
    let (status, body) = call(
        app_with(tmp.path(), None),
        post("/v1/memory/graph", json!({"q": "foo", "include_memory": false})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["id"].as_str().unwrap())
        .collect();
    assert_eq!(
        ids,
        vec![
            "query:foo",
            "file:src/foo.rs",
            "risk:src/foo.rs:unsafe pointer arithmetic",
            "anchor:src/foo.rs:42",
            "obs:7",
            "obs:9"
        ]
    );
    let edge_types: Vec<&str> = body["edges"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["type"].as_str().unwrap())
        .collect();
    assert_eq!(
        edge_types,
        vec![
            "matches",
            "has_risk",
            "has_anchor",
            "maps_to_observation",
            "maps_to_observation"
        ]
    );
    assert_eq!(body["counts"], json!({"nodes": 6, "edges": 5}));
}

#[tokio::test]
async fn test_missing_index_is_empty_200() {
    let tmp = TempDir::new().unwrap();
    let (status, body) = call(
        app_with(tmp.path(), None),
        get("/v1/memory/brief?q=foo&include_memory=0"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["files"], json!([]));
    assert_eq!(body["memory"]["local_observation_ids"], json!([]));
}

#[tokio::test]
async fn test_brief_without_query_is_400() {
    let tmp = setup_guides();
    let (status, body) = call(app_with(tmp.path(), None), post("/v1/memory/brief", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Missing query"));

    let (status, _) = call(app_with(tmp.path(), None), get("/v1/memory/graph?q=%20%20")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_brief_merges_local_then_memory_ids() {
    let tmp = setup_guides();
    let worker = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/search"))
        .and(query_param("query", "foo"))
        .and(query_param("limit", "15"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "#9 first hit, #3 second, id: 1"}]
        })))
        .expect(1)
        .mount(&worker)
        .await;

    let (status, body) = call(
        app_with(tmp.path(), Some(&worker.uri())),
        get("/v1/memory/brief?q=foo"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["memory"]["search_status"], 200);
    assert_eq!(body["memory"]["search_observation_ids"], json!([1, 3, 9]));
    assert_eq!(body["memory"]["recommended_fetch_ids"], json!([7, 9, 1, 3]));
    assert_eq!(
        body["next"]["fetch_observations"]["body"]["ids"],
        json!([7, 9, 1, 3])
    );
}

#[tokio::test]
async fn test_brief_ignores_ids_from_failed_search() {
    let tmp = setup_guides();
    let worker = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/search"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom #77"))
        .mount(&worker)
        .await;

    let (status, body) = call(
        app_with(tmp.path(), Some(&worker.uri())),
        get("/v1/memory/brief?q=foo"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["memory"]["search_status"], 500);
    assert_eq!(body["memory"]["search_observation_ids"], json!([]));
    assert_eq!(body["memory"]["recommended_fetch_ids"], json!([7, 9]));
}

#[tokio::test]
async fn test_graph_adds_search_hits() {
    let tmp = setup_guides();
    let worker = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"raw": "#9 and #11"})))
        .mount(&worker)
        .await;

    let (_, body) = call(
        app_with(tmp.path(), Some(&worker.uri())),
        get("/v1/memory/graph?q=foo"),
    )
    .await;

    let nodes = body["nodes"].as_array().unwrap();
    assert_eq!(nodes.iter().filter(|n| n["id"] == "obs:9").count(), 1);
    assert!(nodes.iter().any(|n| n["id"] == "obs:11"));
    let hits: Vec<&Value> = body["edges"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|e| e["type"] == "search_hit")
        .collect();
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|e| e["source"] == "query:foo"));
}

#[tokio::test]
async fn test_brief_is_deterministic() {
    let tmp = setup_guides();
    let app = app_with(tmp.path(), None);
    let (_, first) = call(app.clone(), get("/v1/memory/brief?q=foo&include_memory=false")).await;
    let (_, second) = call(app, get("/v1/memory/brief?q=foo&include_memory=false")).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_graph_is_deterministic() {
    let tmp = setup_guides();
    let app = app_with(tmp.path(), None);
    let (_, first) = call(app.clone(), get("/v1/memory/graph?q=foo&include_memory=false")).await;
    let (_, second) = call(app, get("/v1/memory/graph?q=foo&include_memory=false")).await;
    assert_eq!(first["counts"], json!({"nodes": 6, "edges": 5}));
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_search_passthrough_get_and_post() {
    let tmp = setup_guides();
    let worker = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/search"))
        .and(query_param("query", "auth"))
        .and(query_param("type", "decision"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(2)
        .mount(&worker)
        .await;

    let app = app_with(tmp.path(), Some(&worker.uri()));
    let (status, body) = call(app.clone(), get("/v1/memory/search?query=auth&type=decision")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ok": true}));

    let (status, _) = call(
        app,
        post(
            "/v1/memory/search",
            json!({"query": "auth", "type": ["decision"], "project": ""}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_timeline_relays_non_success_status() {
    let tmp = setup_guides();
    let worker = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/timeline"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no anchor"))
        .mount(&worker)
        .await;

    let (status, body) = call(
        app_with(tmp.path(), Some(&worker.uri())),
        get("/v1/memory/timeline?anchor=5"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"raw": "no anchor"}));
}

#[tokio::test]
async fn test_save_aliases_share_upstream() {
    let tmp = setup_guides();
    let worker = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/memory/save"))
        .and(body_json(json!({"text": "remember this"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 12})))
        .expect(3)
        .mount(&worker)
        .await;

    let app = app_with(tmp.path(), Some(&worker.uri()));
    for uri in ["/v1/memory/save", "/api/memory/save", "/api/observations/save"] {
        let (status, body) = call(app.clone(), post(uri, json!({"text": "remember this"}))).await;
        assert_eq!(status, StatusCode::CREATED, "alias {}", uri);
        assert_eq!(body, json!({"id": 12}));
    }
}

#[tokio::test]
async fn test_observations_batch() {
    let tmp = setup_guides();
    let worker = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/observations/batch"))
        .and(body_json(json!({"ids": [7, 9]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 7}, {"id": 9}])))
        .mount(&worker)
        .await;

    let (status, body) = call(
        app_with(tmp.path(), Some(&worker.uri())),
        post("/v1/memory/observations", json!({"ids": [7, 9]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_memory_health_passes_status_through() {
    let tmp = setup_guides();
    let worker = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({"status": "starting"})))
        .mount(&worker)
        .await;

    let (status, body) = call(
        app_with(tmp.path(), Some(&worker.uri())),
        get("/v1/memory/health"),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["gateway"]["status"], "ok");
    assert_eq!(body["worker"]["status"], "starting");
}

#[tokio::test]
async fn test_schema_lists_endpoints() {
    let tmp = setup_guides();
    let (status, body) = call(app_with(tmp.path(), None), get("/v1/memory/schema")).await;
    assert_eq!(status, StatusCode::OK);
    let paths: Vec<&str> = body["endpoints"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["path"].as_str().unwrap())
        .collect();
    assert!(paths.contains(&"/v1/memory/brief"));
    assert!(paths.contains(&"/v1/memory/graph"));
}
