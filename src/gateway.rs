//! Gateway HTTP surface
//!
//! The public REST API in front of the orchestrator:
//!
//! - `POST /upload` - multipart `file` field
//! - `GET /files` - redacted file summaries
//! - `GET /download/{filename}` - reconstructed bytes
//! - `GET /metadata/{filename}` - redacted manifest
//! - `DELETE /files/{filename}` - remove manifest and shards
//! - `GET /health` - aggregated node availability
//!
//! Encryption keys never appear in any response.

use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use tracing::warn;

use crate::engine::EngineError;
use crate::manifest::{FileSummary, Manifest};
use crate::orchestrator::{Orchestrator, OrchestratorError, SystemHealth};

/// Upper bound on an uploaded file (single in-memory buffer).
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// API error with HTTP status and message, rendered as `{"error": ...}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        let status = match &err {
            OrchestratorError::InvalidFilename(_) => StatusCode::BAD_REQUEST,
            OrchestratorError::Engine(EngineError::Empty) => StatusCode::BAD_REQUEST,
            OrchestratorError::UnknownFile(_) => StatusCode::NOT_FOUND,
            OrchestratorError::NodeUnavailable { .. } | OrchestratorError::Unavailable { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            OrchestratorError::UploadFailed { .. }
            | OrchestratorError::ManifestPersistFailed(_)
            | OrchestratorError::Engine(_)
            | OrchestratorError::Vault(_)
            | OrchestratorError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!(error = %err, "request failed");
        }
        Self::new(status, err.to_string())
    }
}

/// Build the gateway router.
pub fn router(orchestrator: Orchestrator) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/upload", post(upload))
        .route("/files", get(list_files))
        .route("/files/{filename}", delete(delete_file))
        .route("/download/{filename}", get(download))
        .route("/metadata/{filename}", get(metadata))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(orchestrator)
}

async fn root() -> impl IntoResponse {
    Json(json!({
        "service": "shardvault gateway",
        "endpoints": {
            "upload": "POST /upload",
            "list_files": "GET /files",
            "download": "GET /download/{filename}",
            "metadata": "GET /metadata/{filename}",
            "delete": "DELETE /files/{filename}",
            "health": "GET /health",
        },
    }))
}

#[derive(Serialize)]
struct UploadResponse {
    filename: String,
    file_size: usize,
    shards_distributed: usize,
    recovery_threshold: usize,
}

async fn upload(
    State(orchestrator): State<Orchestrator>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("malformed multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .ok_or_else(|| ApiError::bad_request("file field has no filename"))?
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("failed to read file field: {e}")))?;
        file = Some((filename, bytes.to_vec()));
        break;
    }

    let (filename, data) =
        file.ok_or_else(|| ApiError::bad_request("multipart field 'file' is required"))?;
    let file_size = data.len();

    orchestrator.upload(&filename, data).await?;

    let params = orchestrator.params();
    Ok(Json(UploadResponse {
        filename,
        file_size,
        shards_distributed: params.m_total,
        recovery_threshold: params.k_required,
    }))
}

async fn list_files(
    State(orchestrator): State<Orchestrator>,
) -> Result<Json<Vec<FileSummary>>, ApiError> {
    Ok(Json(orchestrator.list()?))
}

async fn download(
    State(orchestrator): State<Orchestrator>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let plaintext = orchestrator.download(&filename).await?;

    let disposition = format!("attachment; filename=\"{}\"", filename.replace('"', ""));
    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        plaintext,
    )
        .into_response())
}

async fn metadata(
    State(orchestrator): State<Orchestrator>,
    Path(filename): Path<String>,
) -> Result<Json<Manifest>, ApiError> {
    Ok(Json(orchestrator.public_manifest(&filename).await?))
}

async fn delete_file(
    State(orchestrator): State<Orchestrator>,
    Path(filename): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    orchestrator.delete(&filename).await?;
    Ok(Json(json!({ "status": "deleted", "filename": filename })))
}

async fn health(State(orchestrator): State<Orchestrator>) -> Json<SystemHealth> {
    Json(orchestrator.health().await)
}
