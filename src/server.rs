//! HTTP query server.
//!
//! A small hyper 0.14 server in front of the [`QueryService`]:
//!
//! | Route                        | Response                          |
//! |------------------------------|-----------------------------------|
//! | `GET /sensor/srf05`          | latest reading, JSON              |
//! | `GET /sensor/srf05/history`  | history newest first, JSON        |
//! | `GET /health`                | `OK`                              |
//! | `GET /metrics`               | Prometheus text format            |
//! | other `GET`/`HEAD`           | file under the document root      |
//! | anything else                | 404 `Not Found`                   |
//!
//! The document root holds the static web page and the `history/` record
//! files, so a day partition is downloadable at `/history/<date>.csv`. Paths
//! that leave the root are rejected by `ServeDir`.
//!
//! Handlers only read shared state, so any number of requests are served
//! concurrently with the scheduler and the recorder.

use std::convert::Infallible;
use std::future::poll_fn;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::service::{make_service_fn, service_fn, Service};
use hyper::{Body, Method, Request, Response, StatusCode};
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;
use tracing::{debug, error, info};

use crate::error::{AppResult, DaqError};
use crate::metrics::ServiceMetrics;
use crate::query::QueryService;

/// Path of the latest-reading endpoint
pub const LATEST_PATH: &str = "/sensor/srf05";

/// Path of the history endpoint
pub const HISTORY_PATH: &str = "/sensor/srf05/history";

const JSON: &str = "application/json";
const PLAIN: &str = "text/plain; charset=utf-8";

/// Everything a request handler needs
#[derive(Debug, Clone)]
pub struct ServerContext {
    query: QueryService,
    metrics: Option<ServiceMetrics>,
    doc_root: Option<PathBuf>,
}

impl ServerContext {
    /// Serve `query`, without a `/metrics` endpoint or static files
    pub fn new(query: QueryService) -> Self {
        Self {
            query,
            metrics: None,
            doc_root: None,
        }
    }

    /// Serve files under `root` for paths no route claims
    pub fn with_doc_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.doc_root = Some(root.into());
        self
    }

    /// Count requests in `metrics` and expose it at `/metrics`
    pub fn with_metrics(mut self, metrics: ServiceMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

/// Handle returned by [`start_server`]
///
/// Dropping the handle also stops the server.
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting, let in-flight requests finish, then return.
    pub async fn shutdown(mut self) -> AppResult<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        (&mut self.task)
            .await
            .map_err(|e| DaqError::Task(format!("HTTP server task failed: {}", e)))
    }
}

/// Bind `addr` and serve requests in the background.
pub async fn start_server(addr: SocketAddr, ctx: ServerContext) -> AppResult<ServerHandle> {
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let make_service = make_service_fn(move |_conn| {
        let ctx = ctx.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                let ctx = ctx.clone();
                async move { Ok::<_, Infallible>(route(req, &ctx).await) }
            }))
        }
    });

    let server = hyper::Server::try_bind(&addr)
        .map_err(|e| DaqError::Server(format!("failed to bind {}: {}", addr, e)))?
        .serve(make_service);
    let local_addr = server.local_addr();

    let graceful = server.with_graceful_shutdown(async {
        let _ = shutdown_rx.await;
    });

    info!(addr = %local_addr, "Query server listening");

    let task = tokio::spawn(async move {
        if let Err(e) = graceful.await {
            error!("Query server error: {}", e);
        }
        info!("Query server stopped");
    });

    Ok(ServerHandle {
        local_addr,
        shutdown_tx: Some(shutdown_tx),
        task,
    })
}

/// Route one request.
pub async fn route(req: Request<Body>, ctx: &ServerContext) -> Response<Body> {
    if let Some(metrics) = &ctx.metrics {
        metrics.request_served();
    }
    debug!(method = %req.method(), path = req.uri().path(), "Request");

    if let Some(resp) = api_route(&req, ctx) {
        return resp;
    }
    let readable = req.method() == Method::GET || req.method() == Method::HEAD;
    match &ctx.doc_root {
        Some(root) if readable => serve_file(root, req).await,
        _ => not_found(),
    }
}

fn api_route(req: &Request<Body>, ctx: &ServerContext) -> Option<Response<Body>> {
    let resp = match (req.method(), req.uri().path()) {
        (&Method::GET, LATEST_PATH) => json_response(&ctx.query.latest()),
        (&Method::GET, HISTORY_PATH) => json_response(&ctx.query.history()),
        (&Method::GET, "/health") => response(StatusCode::OK, PLAIN, "OK"),
        (&Method::GET, "/metrics") => match &ctx.metrics {
            Some(metrics) => match metrics.encode() {
                Ok(buffer) => response(StatusCode::OK, prometheus::TEXT_FORMAT, buffer),
                Err(e) => {
                    error!("Failed to encode metrics: {}", e);
                    response(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        PLAIN,
                        format!("Failed to encode metrics: {}", e),
                    )
                }
            },
            None => not_found(),
        },
        _ => return None,
    };
    Some(resp)
}

async fn serve_file(root: &Path, req: Request<Body>) -> Response<Body> {
    let mut files = ServeDir::new(root);
    let resp = match poll_fn(|cx| Service::<Request<Body>>::poll_ready(&mut files, cx)).await {
        Ok(()) => match files.call(req).await {
            Ok(resp) => resp,
            Err(never) => match never {},
        },
        Err(never) => match never {},
    };
    if resp.status() == StatusCode::NOT_FOUND {
        return not_found();
    }

    let (parts, body) = resp.into_parts();
    match hyper::body::to_bytes(body).await {
        Ok(bytes) => Response::from_parts(parts, Body::from(bytes)),
        Err(e) => {
            error!(root = %root.display(), "Failed to read static file: {}", e);
            response(StatusCode::INTERNAL_SERVER_ERROR, PLAIN, "Internal Server Error")
        }
    }
}

fn json_response<T: Serialize>(value: &T) -> Response<Body> {
    match serde_json::to_vec(value) {
        Ok(body) => response(StatusCode::OK, JSON, body),
        Err(e) => {
            error!("Failed to serialize response: {}", e);
            response(StatusCode::INTERNAL_SERVER_ERROR, PLAIN, "Internal Server Error")
        }
    }
}

fn not_found() -> Response<Body> {
    response(StatusCode::NOT_FOUND, PLAIN, "Not Found")
}

fn response(status: StatusCode, content_type: &'static str, body: impl Into<Body>) -> Response<Body> {
    let mut resp = Response::new(body.into());
    *resp.status_mut() = status;
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    resp
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::StateBridge;
    use crate::data::HistoryStore;
    use crate::measurement_types::{Fragment, SensorStatus};
    use crate::state::SensorState;
    use std::sync::Arc;

    fn context(state: &SensorState) -> ServerContext {
        let query = QueryService::new(
            Arc::new(StateBridge::new(state.clone(), 450)),
            Arc::new(HistoryStore::new(4).unwrap()),
            450,
        );
        ServerContext::new(query).with_metrics(ServiceMetrics::new().unwrap())
    }

    fn get(path: &str) -> Request<Body> {
        Request::builder()
            .method(Method::GET)
            .uri(path)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_string(resp: Response<Body>) -> String {
        let bytes = hyper::body::to_bytes(resp.into_body()).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn send(path: &str, ctx: &ServerContext) -> Response<Body> {
        route(get(path), ctx).await
    }

    #[tokio::test]
    async fn test_latest_route() {
        let state = SensorState::new();
        state.publish(Fragment {
            raw_ticks: 9_450,
            status: SensorStatus::Operational,
        });

        let resp = send(LATEST_PATH, &context(&state)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[CONTENT_TYPE], JSON);

        let value: serde_json::Value = serde_json::from_str(&body_string(resp).await).unwrap();
        assert_eq!(value["distance_raw"], 9_450);
        assert_eq!(value["distance_cm"], 21);
        assert_eq!(value["status"], "OPERATIONAL");
    }

    #[tokio::test]
    async fn test_empty_history_route() {
        let resp = send(HISTORY_PATH, &context(&SensorState::new())).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_string(resp).await, r#"{"history":[]}"#);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let ctx = context(&SensorState::new());
        for path in ["/", "/sensor", "/sensor/srf05/", "/sensor/srf05/history/x"] {
            assert_eq!(send(path, &ctx).await.status(), StatusCode::NOT_FOUND, "{}", path);
        }

        let post = Request::builder()
            .method(Method::POST)
            .uri(LATEST_PATH)
            .body(Body::empty())
            .unwrap();
        assert_eq!(route(post, &ctx).await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health_and_metrics() {
        let ctx = context(&SensorState::new());
        assert_eq!(body_string(send("/health", &ctx).await).await, "OK");

        let text = body_string(send("/metrics", &ctx).await).await;
        assert!(text.contains("srf05_http_requests_total 2"));
    }

    #[tokio::test]
    async fn test_doc_root_fallthrough() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("history")).unwrap();
        std::fs::write(root.path().join("history/2024-03-01.csv"), "\"2024-03-01\"\n").unwrap();
        let ctx = context(&SensorState::new()).with_doc_root(root.path());

        let resp = send("/history/2024-03-01.csv", &ctx).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_string(resp).await, "\"2024-03-01\"\n");

        assert_eq!(send("/history/2024-03-02.csv", &ctx).await.status(), StatusCode::NOT_FOUND);
        assert_eq!(send("/../outside.csv", &ctx).await.status(), StatusCode::NOT_FOUND);
        assert_eq!(send("/history/..%2F..%2Foutside.csv", &ctx).await.status(), StatusCode::NOT_FOUND);

        // Routes still win over files of the same name
        std::fs::write(root.path().join("health"), "file").unwrap();
        assert_eq!(body_string(send("/health", &ctx).await).await, "OK");
    }
}
