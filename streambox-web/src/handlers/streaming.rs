//! Range-capable streaming of loaded content.
//!
//! Only content that has already been acquired is served; this endpoint
//! never starts an acquisition.

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::Response;
use serde::Deserialize;
use streambox_core::streaming::{
    ByteRange, RangeResolution, mime_type, parse_range_header, select_file,
};
use streambox_core::{InfoHash, StreamboxError};

use super::utils::parse_file_index;
use crate::error::ApiError;
use crate::server::AppState;

/// Query parameters for streaming requests
#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    /// Explicit file index; the main video is chosen when absent
    pub file: Option<String>,
}

/// `GET /stream/{content_hash}?file=<index>`
///
/// Serves the whole file with 200, or the requested window with 206 when a
/// `Range` header is present. A header that cannot be honored falls back to
/// the whole file, still answered with 206.
///
/// # Errors
/// - `StreamboxError::InvalidIdentifier` - Hash is malformed
/// - `ApiError::BadRequest` - File index is not a number
/// - `StreamboxError::NotFound` - Content not loaded, index out of range, or no video file
/// - `StreamboxError::Swarm` - Swarm could not open the file
pub async fn stream_content(
    State(state): State<AppState>,
    Path(content_hash): Path<String>,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let info_hash = InfoHash::parse(&content_hash)?;
    let file_index = parse_file_index(query.file.as_deref())?;

    let content = state.engine.lookup(info_hash).await?.ok_or_else(|| {
        StreamboxError::not_found(format!("Content {info_hash} (not loaded, acquire it first)"))
    })?;
    let file = select_file(content.files(), file_index)?;
    let content_type = mime_type(&file.extension);

    let range_header = headers
        .get(header::RANGE)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned());

    let Some(full) = ByteRange::full(file.length) else {
        tracing::debug!("Streaming empty file '{}' of {}", file.name, info_hash);
        return build_response(StatusCode::OK, content_type, 0, None, Body::empty());
    };

    let (status, range) = match range_header {
        None => (StatusCode::OK, full),
        Some(value) => {
            let resolution =
                parse_range_header(&value, file.length).unwrap_or(RangeResolution::Exact(full));
            if let RangeResolution::Fallback { reason, .. } = resolution {
                tracing::warn!(
                    "Range '{}' on '{}' is {}, serving whole file",
                    value,
                    file.name,
                    reason
                );
            }
            (StatusCode::PARTIAL_CONTENT, resolution.range())
        }
    };

    tracing::debug!(
        "Streaming '{}' of {} bytes {}-{}/{}",
        file.name,
        info_hash,
        range.start,
        range.end,
        file.length
    );

    let stream = content
        .open_range(file, range.start, range.end)
        .map_err(StreamboxError::from)?;
    let content_range =
        (status == StatusCode::PARTIAL_CONTENT).then(|| range.content_range(file.length));

    build_response(
        status,
        content_type,
        range.length(),
        content_range,
        Body::from_stream(stream),
    )
}

fn build_response(
    status: StatusCode,
    content_type: &'static str,
    content_length: u64,
    content_range: Option<String>,
    body: Body,
) -> Result<Response, ApiError> {
    let mut response = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, HeaderValue::from_static(content_type))
        .header(header::CONTENT_LENGTH, content_length)
        .header(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));

    if let Some(content_range) = content_range {
        response = response.header(header::CONTENT_RANGE, content_range);
    }

    response.body(body).map_err(|e| ApiError::Internal {
        reason: format!("Failed to build stream response: {e}"),
    })
}
