//! HTTP surface and process lifecycle.
//!
//! The router exposes the store at `/db` (method dispatch on a `key` query
//! parameter) and the request counter at `/metrics`; everything else is 404.
//! [`run`] owns startup and shutdown ordering: it binds the listener, spawns
//! the snapshot loop, and on SIGINT/SIGTERM stops accepting connections,
//! lets in-flight requests drain, and joins the snapshotter's final persist
//! before returning.

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context as _, Result};
use axum::{
    extract::{Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{any, get},
    Router,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::timeout::TimeoutLayer;
use tracing::{info, warn};

use crate::cli::ServerArgs;
use crate::metrics::Metrics;
use crate::snapshot::Snapshotter;
use crate::store::{PutOutcome, Store, StoreError};

/// Clients get this long to deliver a request before the connection is cut.
/// Also bounds how long the shutdown drain can take.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub metrics: Metrics,
}

/// The `key` query parameter; a missing parameter acts as the empty key.
#[derive(Debug, Deserialize)]
struct KeyQuery {
    #[serde(default)]
    key: String,
}

/// Builds the application router.
///
/// The counting and logging wrappers cover `/db` only, so `/metrics`
/// scrapes do not count themselves.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/db",
            get(get_entry)
                .put(put_entry)
                .delete(delete_entry)
                .fallback(not_found),
        )
        .route_layer(middleware::from_fn(log_requests))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            count_requests,
        ))
        .route("/metrics", any(render_metrics))
        .fallback(not_found)
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .with_state(state)
}

async fn get_entry(State(state): State<AppState>, Query(query): Query<KeyQuery>) -> Response {
    match state.store.get(&query.key) {
        Some(value) => (StatusCode::OK, value).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn put_entry(
    State(state): State<AppState>,
    Query(query): Query<KeyQuery>,
    body: String,
) -> Response {
    match state.store.put(query.key, body) {
        Ok(PutOutcome::Created) => StatusCode::CREATED.into_response(),
        Ok(PutOutcome::Updated) => StatusCode::OK.into_response(),
        Err(err) => store_error_response(err),
    }
}

async fn delete_entry(State(state): State<AppState>, Query(query): Query<KeyQuery>) -> StatusCode {
    if state.store.delete(&query.key) {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

/// Maps each store rejection onto its HTTP status, with the message as body.
fn store_error_response(err: StoreError) -> Response {
    let status = match err {
        StoreError::KeyTooLong { .. } | StoreError::ValueTooLong { .. } => {
            StatusCode::PAYLOAD_TOO_LARGE
        }
        StoreError::StoreFull { .. } => StatusCode::INSUFFICIENT_STORAGE,
    };
    (status, err.to_string()).into_response()
}

async fn render_metrics(State(state): State<AppState>) -> Response {
    match state.metrics.encode() {
        Ok(body) => (StatusCode::OK, body).into_response(),
        Err(err) => {
            warn!(error = %err, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Increments the request counter before dispatch.
async fn count_requests(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    state.metrics.record_request();
    next.run(request).await
}

/// Logs method, path, key, and elapsed time for every call, on every outcome.
async fn log_requests(
    query: Option<Query<KeyQuery>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let key = query.map(|Query(query)| query.key).unwrap_or_default();
    let start = Instant::now();

    let response = next.run(request).await;

    info!(
        %method,
        path,
        key,
        status = %response.status(),
        elapsed = ?start.elapsed(),
        "handled request"
    );
    response
}

/// Runs the server until a termination signal arrives, then shuts down in
/// order: stop accepting, drain in-flight requests, persist the store one
/// final time, and only then return.
///
/// A listener failure and a failed final persist are both reported as
/// errors; neither path returns before every supervised task has finished.
pub async fn run(args: ServerArgs) -> Result<()> {
    let store = Arc::new(Store::new());
    let metrics = Metrics::new().context("failed to register metrics")?;
    let app = router(AppState {
        store: Arc::clone(&store),
        metrics,
    });

    let listener = TcpListener::bind(args.addr)
        .await
        .with_context(|| format!("failed to bind {}", args.addr))?;
    info!("listening on {}", listener.local_addr()?);

    let (shutdown_tx, shutdown_rx) = watch::channel(());

    let snapshotter = Snapshotter::new(
        store,
        args.snapshot_path,
        Duration::from_secs(args.snapshot_interval),
    );
    let snapshot_task = tokio::spawn(snapshotter.run(shutdown_rx.clone()));

    let mut serve_shutdown = shutdown_rx;
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = serve_shutdown.changed().await;
        })
        .into_future();
    tokio::pin!(server);

    let server_result = tokio::select! {
        result = &mut server => result.context("server failed"),
        _ = terminate_signal() => {
            info!("shutdown signal received, draining connections");
            let _ = shutdown_tx.send(());
            server.await.context("server failed during drain")
        }
    };

    // The listener may have stopped without any signal; wake the snapshotter
    // for its final persist either way. A second send is a no-op for the
    // receiver, which keeps the shutdown path idempotent.
    let _ = shutdown_tx.send(());
    let snapshot_result = snapshot_task.await.context("snapshot task panicked")?;

    server_result?;
    snapshot_result?;
    info!("server quit gracefully");
    Ok(())
}

/// Resolves when the process receives SIGINT (ctrl-c) or SIGTERM.
async fn terminate_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = ?err, "failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = ?err, "failed to install sigterm handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
