//! Storage node HTTP server
//!
//! A content-addressed blob store over HTTP. Nodes hold only ciphertext
//! shards and answer four endpoints:
//!
//! - `PUT /store/{shard_id}` - raw shard bytes in the body
//! - `GET /retrieve/{shard_id}` - raw shard bytes, 404 when absent
//! - `DELETE /delete/{shard_id}` - 200 on removal, 404 when absent
//! - `GET /health` - liveness probe

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{delete, get, put};
use axum::{Json, Router};
use serde_json::json;
use tracing::warn;

use super::store::{ShardStore, StoreError};

/// Upper bound on a single shard body. Generous relative to the gateway's
/// whole-file limit.
const MAX_SHARD_BYTES: usize = 64 * 1024 * 1024;

/// Build the node router over a shard store.
pub fn router(store: Arc<ShardStore>) -> Router {
    Router::new()
        .route("/store/{shard_id}", put(store_shard))
        .route("/retrieve/{shard_id}", get(retrieve_shard))
        .route("/delete/{shard_id}", delete(delete_shard))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_SHARD_BYTES))
        .with_state(store)
}

fn store_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::InvalidShardId(_) => StatusCode::BAD_REQUEST,
        StoreError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn store_shard(
    State(store): State<Arc<ShardStore>>,
    Path(shard_id): Path<String>,
    body: Bytes,
) -> impl IntoResponse {
    match store.put(&shard_id, &body) {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "stored",
                "shard_id": shard_id,
                "size": body.len(),
            })),
        ),
        Err(e) => {
            warn!(shard_id, error = %e, "shard store failed");
            (store_status(&e), Json(json!({ "error": e.to_string() })))
        }
    }
}

async fn retrieve_shard(
    State(store): State<Arc<ShardStore>>,
    Path(shard_id): Path<String>,
) -> impl IntoResponse {
    match store.get(&shard_id) {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/octet-stream")],
            bytes,
        )
            .into_response(),
        Err(e) => {
            let status = store_status(&e);
            if status != StatusCode::NOT_FOUND {
                warn!(shard_id, error = %e, "shard retrieve failed");
            }
            (status, Json(json!({ "error": e.to_string() }))).into_response()
        }
    }
}

async fn delete_shard(
    State(store): State<Arc<ShardStore>>,
    Path(shard_id): Path<String>,
) -> impl IntoResponse {
    match store.delete(&shard_id) {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "deleted", "shard_id": shard_id })),
        ),
        Err(e) => (store_status(&e), Json(json!({ "error": e.to_string() }))),
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "online" }))
}
