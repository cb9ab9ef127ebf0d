//! HTTP surface
//!
//! - `/static/*`: the public HLS tree (live playlists, VODs, mirrors)
//! - `/content/*`: objects held by a file or memory storage backend
//! - `/v1/sessions/{name}/start|end`: lifecycle hooks for the ingest server
//! - `/v1/health`

use axum::{
    extract::{Path as UrlPath, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use hlsrelay_pipeline::{SessionLifecycle, VodOutcome};
use hlsrelay_storage::HlsStorage;
use serde::Deserialize;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct AppState {
    pub public_root: PathBuf,
    pub master_file_name: String,
    pub content: Option<Arc<dyn HlsStorage>>,
    pub lifecycle: Arc<dyn SessionLifecycle>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/static/{*path}", get(serve_static))
        .route("/content/{*key}", get(serve_content))
        .route("/v1/sessions/{publish_name}/start", post(start_session))
        .route("/v1/sessions/{publish_name}/end", post(end_session))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

fn content_type_for(file_name: &str) -> Option<&'static str> {
    let extension = Path::new(file_name)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();
    match extension.as_str() {
        "m3u8" => Some("application/vnd.apple.mpegurl"),
        "ts" => Some("video/mp2t"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        _ => None,
    }
}

/// Relative path made only of plain components
fn safe_relative_path(path: &str) -> Option<PathBuf> {
    let relative = Path::new(path);
    let is_safe = !path.is_empty()
        && !path.contains('\\')
        && relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    is_safe.then(|| relative.to_path_buf())
}

async fn serve_static(State(state): State<AppState>, UrlPath(path): UrlPath<String>) -> Response {
    let Some(content_type) = content_type_for(&path) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let Some(relative) = safe_relative_path(&path) else {
        warn!("Rejected static path: {}", path);
        return StatusCode::BAD_REQUEST.into_response();
    };

    match tokio::fs::read(state.public_root.join(relative)).await {
        Ok(data) => ([(header::CONTENT_TYPE, content_type)], data).into_response(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            error!("Failed to read static file {}: {}", path, e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct ContentQuery {
    #[serde(rename = "fileName")]
    file_name: Option<String>,
}

async fn serve_content(
    State(state): State<AppState>,
    UrlPath(key): UrlPath<String>,
    Query(query): Query<ContentQuery>,
) -> Response {
    let Some(storage) = state.content else {
        return StatusCode::NOT_FOUND.into_response();
    };

    // Content-addressed keys carry no extension; the player-facing name does
    let content_type = query
        .file_name
        .as_deref()
        .and_then(content_type_for)
        .or_else(|| content_type_for(&key))
        .unwrap_or("application/octet-stream");

    match storage.read(&key).await {
        Ok(data) => ([(header::CONTENT_TYPE, content_type)], data).into_response(),
        Err(e) => match e.kind() {
            std::io::ErrorKind::NotFound => StatusCode::NOT_FOUND.into_response(),
            std::io::ErrorKind::InvalidInput => StatusCode::BAD_REQUEST.into_response(),
            _ => {
                error!("Failed to read content {}: {}", key, e);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        },
    }
}

fn is_valid_publish_name(name: &str) -> bool {
    safe_relative_path(name).is_some_and(|p| p.components().count() == 1)
}

async fn start_session(
    State(state): State<AppState>,
    UrlPath(publish_name): UrlPath<String>,
) -> StatusCode {
    if !is_valid_publish_name(&publish_name) {
        return StatusCode::BAD_REQUEST;
    }
    state.lifecycle.on_stream_start(&publish_name).await;
    StatusCode::NO_CONTENT
}

async fn end_session(
    State(state): State<AppState>,
    UrlPath(publish_name): UrlPath<String>,
) -> Result<Json<VodOutcome>, StatusCode> {
    if !is_valid_publish_name(&publish_name) {
        return Err(StatusCode::BAD_REQUEST);
    }
    let outcome = state
        .lifecycle
        .on_stream_end(&publish_name, &state.public_root, &state.master_file_name)
        .await;
    Ok(Json(outcome))
}

/// Bind and serve until `cancel` fires
pub async fn spawn_http(
    address: &str,
    router: Router,
    cancel: CancellationToken,
) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind HTTP address {address}: {e}"))?;
    info!("HTTP server listening on {}", address);

    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router)
            .with_graceful_shutdown(cancel.cancelled_owned())
            .await
        {
            error!("HTTP server error: {}", e);
        }
        info!("HTTP server shut down gracefully");
    }))
}

/// Wait for a shutdown signal (SIGTERM or SIGINT/Ctrl+C)
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("Received Ctrl+C"); }
        () = terminate => { info!("Received SIGTERM"); }
    }
}
