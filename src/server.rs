//! HTTP gateway.
//!
//! Fronts the memory worker with a small JSON API and adds two derived views
//! (brief and graph) built from the local guide index.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Gateway liveness |
//! | `GET`  | `/v1/memory/schema` | Capability listing |
//! | `GET`  | `/v1/memory/health` | Gateway + worker health (worker status passed through) |
//! | `GET`, `POST` | `/v1/memory/search` | Worker search passthrough |
//! | `GET`, `POST` | `/v1/memory/timeline` | Worker timeline passthrough |
//! | `POST` | `/v1/memory/observations` | Batch fetch by ID |
//! | `POST` | `/v1/memory/save`, `/api/memory/save`, `/api/observations/save` | Save a memory |
//! | `GET`, `POST` | `/v1/memory/brief` | Budget-capped brief |
//! | `GET`, `POST` | `/v1/memory/graph` | Relationship graph |
//!
//! POST bodies for search and timeline are flattened into query parameters
//! before forwarding.
//!
//! # Error Contract
//!
//! ```json
//! { "error": "Missing query. Use ?q=... or body.query", "code": "bad_request" }
//! ```
//!
//! Worker responses are relayed with their own status, including non-2xx.
//! Transport failures become `500` with `code: "upstream_error"`. Unknown
//! routes return `404` with the path and method echoed.
//!
//! # CORS
//!
//! All origins are permitted. `OPTIONS` on any path answers `204`.

use axum::{
    body::Bytes,
    extract::{
        rejection::{BytesRejection, FailedToBufferBody},
        DefaultBodyLimit, Query, Request, State,
    },
    http::{header, HeaderValue, Method, StatusCode, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::brief::build_brief;
use crate::config::Config;
use crate::error::GatewayError;
use crate::gateway::Gateway;
use crate::graph::build_graph;
use crate::models::UpstreamResponse;
use crate::params::{params_from_pairs, BriefOptions, GraphOptions, Params};
use crate::upstream::{paths, to_query_pairs};

type AppState = Arc<Gateway>;
type QueryPairs = Query<Vec<(String, String)>>;
type RawBody = Result<Bytes, BytesRejection>;

/// Starts the gateway and serves until SIGINT/SIGTERM.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind_addr();
    let gateway = Arc::new(Gateway::new(config.clone())?);
    let app = router(gateway.clone());

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(
        gateway = %format!("http://{}", bind_addr),
        worker = %gateway.upstream.base_url(),
        guide_index = %gateway.guides.path().display(),
        "memory gateway listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("memory gateway stopped");
    Ok(())
}

/// Builds the router over shared gateway state.
pub fn router(gateway: AppState) -> Router {
    let body_limit = gateway.config.server.body_limit_bytes;
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/health", get(handle_health))
        .route("/v1/memory/schema", get(handle_schema))
        .route("/v1/memory/health", get(handle_memory_health))
        .route(
            "/v1/memory/search",
            get(handle_search_get).post(handle_search_post),
        )
        .route(
            "/v1/memory/timeline",
            get(handle_timeline_get).post(handle_timeline_post),
        )
        .route("/v1/memory/observations", post(handle_observations))
        .route("/v1/memory/save", post(handle_save))
        .route("/api/memory/save", post(handle_save))
        .route("/api/observations/save", post(handle_save))
        .route(
            "/v1/memory/brief",
            get(handle_brief_get).post(handle_brief_post),
        )
        .route(
            "/v1/memory/graph",
            get(handle_graph_get).post(handle_graph_post),
        )
        .fallback(handle_not_found)
        .method_not_allowed_fallback(handle_not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(middleware::from_fn(preflight))
        .layer(TraceLayer::new_for_http())
        .with_state(gateway)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT"),
        _ = terminate => tracing::info!("received SIGTERM"),
    }
}

/// Answers every `OPTIONS` request with `204` and the CORS headers.
async fn preflight(req: Request, next: Next) -> Response {
    if req.method() != Method::OPTIONS {
        return next.run(req).await;
    }
    let mut resp = StatusCode::NO_CONTENT.into_response();
    let headers = resp.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET,POST,OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type,Authorization"),
    );
    resp
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
            code: self.code,
            details: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::MissingQuery
            | GatewayError::MalformedBody(_)
            | GatewayError::BodyRead(_) => AppError {
                status: StatusCode::BAD_REQUEST,
                code: "bad_request",
                message: err.to_string(),
                details: None,
            },
            GatewayError::BodyTooLarge { .. } => AppError {
                status: StatusCode::PAYLOAD_TOO_LARGE,
                code: "payload_too_large",
                message: err.to_string(),
                details: None,
            },
            GatewayError::Upstream(_) => {
                tracing::warn!(error = %err, "upstream transport failure");
                AppError {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    code: "upstream_error",
                    message: "Gateway request failed".to_string(),
                    details: Some(err.to_string()),
                }
            }
        }
    }
}

type HandlerResult = Result<Response, AppError>;

/// Relays an upstream response with the worker's status code.
fn relay(upstream: UpstreamResponse) -> Response {
    let status = StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::BAD_GATEWAY);
    (status, Json(upstream.body)).into_response()
}

/// Parses a buffered JSON body. An empty body is `{}`.
///
/// The size cap is enforced by `DefaultBodyLimit` while buffering, so an
/// oversized body is rejected before any parsing.
fn read_json_body(gateway: &Gateway, body: RawBody) -> Result<Value, GatewayError> {
    let bytes = body.map_err(|rejection| match rejection {
        BytesRejection::FailedToBufferBody(FailedToBufferBody::LengthLimitError(_)) => {
            GatewayError::BodyTooLarge {
                limit: gateway.config.server.body_limit_bytes,
            }
        }
        other => GatewayError::BodyRead(other.body_text()),
    })?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }
    Ok(serde_json::from_slice(&bytes)?)
}

/// Reads a body as builder params; non-object JSON is treated as `{}`.
fn read_params(gateway: &Gateway, body: RawBody) -> Result<Params, GatewayError> {
    match read_json_body(gateway, body)? {
        Value::Object(map) => Ok(map),
        _ => Ok(Params::new()),
    }
}

// ============ Gateway endpoints ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    worker: String,
}

async fn handle_health(State(gateway): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "memory-gateway",
        version: env!("CARGO_PKG_VERSION"),
        worker: gateway.upstream.base_url().to_string(),
    })
}

/// Static capability listing, also printed by `memgate schema`.
pub fn schema(worker_base_url: &str) -> Value {
    json!({
        "name": "memory-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "backend": "memory worker",
        "worker_base_url": worker_base_url,
        "endpoints": [
            { "method": "GET", "path": "/v1/memory/health", "description": "Gateway + worker health" },
            { "method": "GET|POST", "path": "/v1/memory/search", "description": "Memory index search (query, limit, type, project, dateStart/dateEnd)" },
            { "method": "GET|POST", "path": "/v1/memory/timeline", "description": "Timeline context retrieval around anchor id or query" },
            { "method": "POST", "path": "/v1/memory/observations", "description": "Fetch full observation payloads (ids array)" },
            { "method": "POST", "path": "/v1/memory/save", "description": "Save a manual memory" },
            { "method": "GET|POST", "path": "/v1/memory/brief", "description": "Budget-capped brief: sidecar shortlist + memory IDs, no full payload blast" },
            { "method": "GET|POST", "path": "/v1/memory/graph", "description": "Lightweight relationship graph (query->files->risks/anchors/observation IDs)" }
        ]
    })
}

async fn handle_schema(State(gateway): State<AppState>) -> Json<Value> {
    Json(schema(gateway.upstream.base_url()))
}

async fn handle_memory_health(State(gateway): State<AppState>) -> HandlerResult {
    let upstream = gateway.upstream.get(paths::HEALTH, &[]).await?;
    let status = StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let body = json!({
        "gateway": {
            "status": "ok",
            "host": gateway.config.server.host,
            "port": gateway.config.server.port,
        },
        "worker": upstream.body,
    });
    Ok((status, Json(body)).into_response())
}

// ============ Passthrough ============

async fn forward_get(gateway: &Gateway, path: &str, pairs: &[(String, String)]) -> HandlerResult {
    Ok(relay(gateway.upstream.get(path, pairs).await?))
}

async fn forward_get_from_body(gateway: &Gateway, path: &str, body: RawBody) -> HandlerResult {
    let pairs = match read_json_body(gateway, body)? {
        Value::Object(map) => to_query_pairs(&map),
        _ => Vec::new(),
    };
    forward_get(gateway, path, &pairs).await
}

async fn forward_post(gateway: &Gateway, path: &str, body: RawBody) -> HandlerResult {
    let payload = read_json_body(gateway, body)?;
    Ok(relay(gateway.upstream.post(path, &payload).await?))
}

async fn handle_search_get(State(gateway): State<AppState>, Query(pairs): QueryPairs) -> HandlerResult {
    forward_get(&gateway, paths::SEARCH, &pairs).await
}

async fn handle_search_post(State(gateway): State<AppState>, body: RawBody) -> HandlerResult {
    forward_get_from_body(&gateway, paths::SEARCH, body).await
}

async fn handle_timeline_get(State(gateway): State<AppState>, Query(pairs): QueryPairs) -> HandlerResult {
    forward_get(&gateway, paths::TIMELINE, &pairs).await
}

async fn handle_timeline_post(State(gateway): State<AppState>, body: RawBody) -> HandlerResult {
    forward_get_from_body(&gateway, paths::TIMELINE, body).await
}

async fn handle_observations(State(gateway): State<AppState>, body: RawBody) -> HandlerResult {
    forward_post(&gateway, paths::OBSERVATIONS_BATCH, body).await
}

async fn handle_save(State(gateway): State<AppState>, body: RawBody) -> HandlerResult {
    forward_post(&gateway, paths::MEMORY_SAVE, body).await
}

// ============ Brief / graph ============

async fn brief(gateway: &Gateway, params: &Params) -> HandlerResult {
    let opts = BriefOptions::from_params(params)?;
    Ok(Json(build_brief(gateway, &opts).await).into_response())
}

async fn graph(gateway: &Gateway, params: &Params) -> HandlerResult {
    let opts = GraphOptions::from_params(params)?;
    Ok(Json(build_graph(gateway, &opts).await).into_response())
}

async fn handle_brief_get(State(gateway): State<AppState>, Query(pairs): QueryPairs) -> HandlerResult {
    brief(&gateway, &params_from_pairs(&pairs)).await
}

async fn handle_brief_post(State(gateway): State<AppState>, body: RawBody) -> HandlerResult {
    let params = read_params(&gateway, body)?;
    brief(&gateway, &params).await
}

async fn handle_graph_get(State(gateway): State<AppState>, Query(pairs): QueryPairs) -> HandlerResult {
    graph(&gateway, &params_from_pairs(&pairs)).await
}

async fn handle_graph_post(State(gateway): State<AppState>, body: RawBody) -> HandlerResult {
    let params = read_params(&gateway, body)?;
    graph(&gateway, &params).await
}

// ============ Fallback ============

async fn handle_not_found(method: Method, uri: Uri) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Not found",
            "code": "not_found",
            "path": uri.path(),
            "method": method.as_str(),
        })),
    )
        .into_response()
}
