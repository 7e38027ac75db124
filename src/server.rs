//! HTTP front end for the resize pipeline.
//!
//! ```text
//! GET /resize?image_name=<name>&w=<int>&h=<int>   (also mounted at /)
//! GET /health
//! ```
//!
//! The handler parses the query into a [`SizeRequest`], then fetches the
//! source and runs [`resize`] on tokio's blocking pool. Decoding and
//! resampling are CPU-bound and must not stall the async workers.
//!
//! Success responses carry the source format's MIME type, the configured
//! `Cache-Control`, and a content-hash `ETag`. Errors are JSON:
//!
//! ```json
//! {"error": {"message": "Invalid width: \"abc\" is not an integer", "type": "InvalidDimension", "code": 400}}
//! ```

use crate::imaging::{
    EmptyRequestPolicy, ImageBackend, ResizeError, Resized, SizeRequest, mime_type, resize,
};
use crate::store::{SourceStore, StoreError};
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE, ETAG};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use axum_extra::TypedHeader;
use axum_extra::headers::{ETag, IfNoneMatch};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{debug, error, info, instrument};

/// Shared, read-only state handed to every request.
#[derive(Clone)]
pub struct AppState {
    backend: Arc<dyn ImageBackend>,
    store: Arc<dyn SourceStore>,
    policy: EmptyRequestPolicy,
    cache_control: HeaderValue,
}

impl AppState {
    pub fn new(
        backend: Arc<dyn ImageBackend>,
        store: Arc<dyn SourceStore>,
        policy: EmptyRequestPolicy,
        cache_control: &str,
    ) -> Result<Self, axum::http::header::InvalidHeaderValue> {
        Ok(Self {
            backend,
            store,
            policy,
            cache_control: HeaderValue::from_str(cache_control)?,
        })
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(resize_image))
        .route("/resize", get(resize_image))
        .route("/health", get(health))
        .with_state(state)
}

/// Serve until Ctrl+C or SIGTERM.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Server listening on http://{addr}");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server shutdown completed");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => error!("Failed to install signal handler: {e}"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received terminate signal, shutting down"),
    }
}

/// The query parameters the resize handler reads.
///
/// Repeated keys are allowed; the first occurrence wins.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ResizeQuery {
    pub image_name: Option<String>,
    pub w: Option<String>,
    pub h: Option<String>,
}

impl ResizeQuery {
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut query = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "image_name" => &mut query.image_name,
                "w" => &mut query.w,
                "h" => &mut query.h,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        query
    }
}

type IfNoneMatchHeader = Option<TypedHeader<IfNoneMatch>>;

async fn resize_image(
    State(state): State<AppState>,
    if_none_match: IfNoneMatchHeader,
    pairs: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Response, HttpError> {
    let Query(pairs) = pairs.map_err(|e| HttpError::Query(e.body_text()))?;
    resize_query(state, if_none_match, ResizeQuery::from_pairs(pairs)).await
}

#[instrument(skip_all, fields(image_name = query.image_name.as_deref()))]
async fn resize_query(
    state: AppState,
    if_none_match: IfNoneMatchHeader,
    query: ResizeQuery,
) -> Result<Response, HttpError> {
    let name = query
        .image_name
        .filter(|n| !n.trim().is_empty())
        .ok_or(HttpError::MissingImageName)?;
    let request = SizeRequest::from_query(query.w.as_deref(), query.h.as_deref())?;

    let worker_state = state.clone();
    let resized = tokio::task::spawn_blocking(move || -> Result<Resized, HttpError> {
        let source = worker_state.store.fetch(&name)?;
        Ok(resize(
            worker_state.backend.as_ref(),
            &source,
            request,
            worker_state.policy,
        )?)
    })
    .await
    .map_err(|e| HttpError::Task(e.to_string()))??;

    let etag = etag_for(&resized.bytes);
    info!(
        format = ?resized.format,
        size = ?resized.size,
        bytes = resized.bytes.len(),
        "resized image"
    );

    if is_not_modified(&if_none_match, &etag) {
        return Ok((
            StatusCode::NOT_MODIFIED,
            [(CACHE_CONTROL, state.cache_control.clone())],
            [(ETAG, etag)],
        )
            .into_response());
    }

    Ok((
        StatusCode::OK,
        [
            (CONTENT_TYPE, HeaderValue::from_static(mime_type(resized.format))),
            (CACHE_CONTROL, state.cache_control.clone()),
        ],
        [(ETAG, etag)],
        resized.bytes,
    )
        .into_response())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Strong ETag from the first 128 bits of the SHA-256 of the body.
pub fn etag_for(bytes: &[u8]) -> String {
    let digest = format!("{:x}", Sha256::digest(bytes));
    format!("\"{}\"", &digest[..32])
}

fn is_not_modified(if_none_match: &IfNoneMatchHeader, etag: &str) -> bool {
    if let Some(TypedHeader(header)) = if_none_match {
        if let Ok(parsed) = etag.parse::<ETag>() {
            return !header.precondition_passes(&parsed);
        }
    }
    false
}

/// Errors surfaced to HTTP clients.
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("Missing image_name parameter")]
    MissingImageName,
    #[error("Malformed query string: {0}")]
    Query(String),
    #[error("Fetch error: {0}")]
    Store(#[from] StoreError),
    #[error("Resize error: {0}")]
    Resize(#[from] ResizeError),
    #[error("Worker task failed: {0}")]
    Task(String),
}

impl HttpError {
    pub fn status(&self) -> StatusCode {
        match self {
            HttpError::MissingImageName
            | HttpError::Query(_)
            | HttpError::Store(StoreError::InvalidName(_)) => StatusCode::BAD_REQUEST,
            HttpError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            HttpError::Resize(err) if err.is_request_error() => StatusCode::BAD_REQUEST,
            HttpError::Resize(ResizeError::Decode(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            HttpError::Store(StoreError::Io { .. }) | HttpError::Resize(_) | HttpError::Task(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Value of the `type` field in the error body.
    pub fn kind(&self) -> &'static str {
        match self {
            HttpError::MissingImageName | HttpError::Store(_) => "FetchError",
            HttpError::Query(_) => "InvalidQuery",
            HttpError::Resize(err) => err.kind(),
            HttpError::Task(_) => "InternalError",
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(kind = self.kind(), "Server error response: {self}");
        } else {
            debug!(kind = self.kind(), "Client error response: {self}");
        }

        let body = json!({
            "error": {
                "message": self.to_string(),
                "type": self.kind(),
                "code": status.as_u16(),
            }
        });

        (
            status,
            [(CACHE_CONTROL, HeaderValue::from_static("no-store"))],
            Json(body),
        )
            .into_response()
    }
}
