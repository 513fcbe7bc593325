//! HTTP handlers for the S3-compatible surface.
//!
//! Four operations: list a bucket, get an object, probe an object, and put
//! an object. Everything else falls through to a `NotImplemented` response
//! in the router. Handlers stay thin; the store does the filesystem work
//! and the sync coordinator is only poked after a successful PUT.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::errors::GateError;
use crate::xml::render_list_bucket_result;
use crate::AppState;

const DEFAULT_MAX_KEYS: u32 = 1000;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub prefix: String,
    #[serde(rename = "max-keys")]
    pub max_keys: Option<u32>,
}

/// `GET /{bucket}` -- ListObjectsV2-shaped listing of the immediate files
/// under `bucket/prefix`.
pub async fn list_bucket(
    State(state): State<Arc<AppState>>,
    Path(bucket): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Response, GateError> {
    let max_keys = query.max_keys.unwrap_or(DEFAULT_MAX_KEYS);
    let list = state.store.list(&bucket, &query.prefix, max_keys)?;
    debug!(
        "listed {}/{}: {} keys",
        list.bucket, list.prefix, list.key_count
    );

    let body = render_list_bucket_result(&list);
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/xml")],
        body,
    )
        .into_response())
}

/// `GET /{bucket}/{key}` -- full object content.
pub async fn get_object(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<Response, GateError> {
    let data = state.store.get(&bucket, &key)?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/octet-stream")],
        data,
    )
        .into_response())
}

/// `HEAD /{bucket}/{key}` -- existence probe, body-less either way.
pub async fn head_object(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<Response, GateError> {
    if state.store.head(&bucket, &key)? {
        Ok(StatusCode::OK.into_response())
    } else {
        Ok(StatusCode::NOT_FOUND.into_response())
    }
}

/// `HEAD /{bucket}` -- bucket existence. Every bucket name "exists": a PUT
/// creates it on demand, so probes always succeed.
pub async fn head_bucket() -> StatusCode {
    StatusCode::OK
}

/// `PUT /{bucket}/{key}` -- store the object, then fire a sync trigger with
/// the landing directory. The trigger never blocks the response.
pub async fn put_object(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    body: Bytes,
) -> Result<Response, GateError> {
    let result = state.store.put(&bucket, &key, &body)?;
    info!("stored {bucket}/{key} ({} bytes)", body.len());

    state.sync.trigger(result.dir_path);

    Ok((
        StatusCode::OK,
        [(header::ETAG, format!("\"{}\"", result.etag))],
    )
        .into_response())
}

/// Fallback for everything outside the supported surface.
pub async fn not_implemented() -> GateError {
    GateError::NotImplemented
}
