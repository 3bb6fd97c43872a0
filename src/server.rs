//! HTTP transport for the MCP endpoint
//!
//! Connections are accepted concurrently by axum, but every JSON-RPC request
//! is forwarded to a single session worker thread that owns the
//! [`SessionHandler`]. Requests are therefore handled strictly one at a time,
//! in arrival order.

use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::{Json, Router};
use serde_json::Value;
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::{codes, Result, ServerError};
use crate::rpc::{JsonRpcResponse, SessionHandler, SessionReply};

// =============================================================================
// Session worker
// =============================================================================

struct WorkItem {
    message: Value,
    reply: oneshot::Sender<SessionReply>,
}

/// Handle for submitting requests to the session worker thread
#[derive(Clone)]
pub struct SessionWorker {
    tx: mpsc::Sender<WorkItem>,
}

impl SessionWorker {
    /// Move `handler` onto a dedicated thread
    ///
    /// The thread exits once every `SessionWorker` clone has been dropped.
    pub fn spawn(mut handler: SessionHandler) -> Result<(Self, thread::JoinHandle<()>)> {
        let (tx, rx) = mpsc::channel::<WorkItem>();
        let handle = thread::Builder::new()
            .name("mcp-session".to_string())
            .spawn(move || {
                debug!("Session worker started");
                while let Ok(WorkItem { message, reply }) = rx.recv() {
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler.handle(message)));
                    let outcome = outcome.unwrap_or_else(|_| {
                        error!("Session handler panicked");
                        SessionReply::Failed(JsonRpcResponse::internal_error())
                    });
                    if reply.send(outcome).is_err() {
                        debug!("Client went away before the reply was ready");
                    }
                }
                debug!("Session worker stopped");
            })?;
        Ok((Self { tx }, handle))
    }

    pub async fn submit(&self, message: Value) -> Result<SessionReply> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(WorkItem { message, reply })
            .map_err(|_| ServerError::WorkerUnavailable)?;
        response.await.map_err(|_| ServerError::WorkerUnavailable)
    }
}

// =============================================================================
// Router
// =============================================================================

#[derive(Clone)]
pub struct AppState {
    worker: SessionWorker,
}

/// Serve the endpoint at `path`, `path/` and every sub-path
pub fn build_router(path: &str, worker: SessionWorker) -> Router {
    let base = path.trim_end_matches('/');
    let router = if base.is_empty() {
        Router::new()
            .route("/", any(mcp_endpoint))
            .route("/{*rest}", any(mcp_endpoint))
    } else {
        Router::new()
            .route(base, any(mcp_endpoint))
            .route(&format!("{}/", base), any(mcp_endpoint))
            .route(&format!("{}/{{*rest}}", base), any(mcp_endpoint))
    };

    router
        .layer(middleware::from_fn(cors))
        .with_state(AppState { worker })
}

/// Open CORS policy for browser based clients
pub async fn cors(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("Content-Type"),
    );
    response
}

async fn mcp_endpoint(State(state): State<AppState>, method: Method, body: Bytes) -> Response {
    if method == Method::OPTIONS {
        return StatusCode::NO_CONTENT.into_response();
    }
    if method != Method::POST {
        debug!("Rejecting {} request", method);
        return rpc_error(
            StatusCode::METHOD_NOT_ALLOWED,
            codes::INVALID_REQUEST,
            "Only POST is supported",
        );
    }

    if body.iter().all(u8::is_ascii_whitespace) {
        return rpc_error(StatusCode::BAD_REQUEST, codes::PARSE_ERROR, "Empty request");
    }
    let message: Value = match serde_json::from_slice(&body) {
        Ok(message) => message,
        Err(e) => {
            debug!("Unparseable request body: {}", e);
            return rpc_error(StatusCode::BAD_REQUEST, codes::PARSE_ERROR, "Parse error");
        }
    };
    match message {
        Value::Null => {
            return rpc_error(StatusCode::BAD_REQUEST, codes::PARSE_ERROR, "Empty request");
        }
        Value::Object(_) => {}
        _ => {
            return rpc_error(StatusCode::BAD_REQUEST, codes::INVALID_REQUEST, "Invalid request");
        }
    }

    match state.worker.submit(message).await {
        Ok(SessionReply::Respond(response)) => (StatusCode::OK, Json(response)).into_response(),
        Ok(SessionReply::Accepted) => StatusCode::ACCEPTED.into_response(),
        Ok(SessionReply::Failed(response)) => {
            (StatusCode::INTERNAL_SERVER_ERROR, Json(response)).into_response()
        }
        Err(e) => {
            error!("Failed to handle request: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(JsonRpcResponse::internal_error()),
            )
                .into_response()
        }
    }
}

fn rpc_error(status: StatusCode, code: i32, message: &str) -> Response {
    (
        status,
        Json(JsonRpcResponse::error(Value::from(0), code, message)),
    )
        .into_response()
}

// =============================================================================
// Server lifecycle
// =============================================================================

/// Running MCP endpoint
pub struct McpHttpServer {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    serve_task: JoinHandle<std::io::Result<()>>,
    worker_thread: thread::JoinHandle<()>,
}

impl McpHttpServer {
    /// Bind the listener and start serving; a bind failure is returned, not retried
    pub async fn start(config: &ServerConfig, handler: SessionHandler) -> Result<Self> {
        let address = config.socket_address();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| ServerError::Bind {
                address: address.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let (worker, worker_thread) = SessionWorker::spawn(handler)?;
        let router = build_router(&config.path, worker);

        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let serve_task = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        info!("MCP endpoint listening on http://{}{}", local_addr, config.path);
        Ok(Self {
            local_addr,
            shutdown: Some(shutdown),
            serve_task,
            worker_thread,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting, let in-flight requests finish, then join the worker
    pub async fn stop(mut self) -> Result<()> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }

        match self.serve_task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("HTTP server exited with error: {}", e),
            Err(e) => warn!("HTTP server task failed: {}", e),
        }

        // The router held the last worker handle, so the thread is winding down
        let worker_thread = self.worker_thread;
        let joined = tokio::task::spawn_blocking(move || worker_thread.join())
            .await
            .map_err(|e| ServerError::InternalError(e.to_string()))?;
        if joined.is_err() {
            return Err(ServerError::InternalError("session worker panicked".to_string()));
        }

        info!("MCP server stopped");
        Ok(())
    }
}
