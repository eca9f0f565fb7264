//! Serves content-addressed blobs by hash (§4.3, §6.2).

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::app::AppState;
use crate::error::ApiResult;

#[derive(Deserialize)]
pub struct BlobQuery {
    /// `BlobStore` is content-addressed and doesn't track mime types itself;
    /// a caller that already knows the attachment's `mimeType` (from the
    /// message history JSON) can pass it through here.
    #[serde(rename = "mimeType")]
    pub mime_type: Option<String>,
}

/// GET /api/blob/{hash}
pub async fn get_blob(State(state): State<Arc<AppState>>, Path(hash): Path<String>, Query(q): Query<BlobQuery>) -> ApiResult<Response> {
    let bytes = state.blobs.get(&hash)?;
    let mime = q.mime_type.unwrap_or_else(|| "application/octet-stream".to_string());
    Ok((
        [(header::CONTENT_TYPE, mime), (header::CACHE_CONTROL, "public, max-age=31536000, immutable".to_string())],
        bytes,
    )
        .into_response())
}
