//! Request parsing shared by handlers.

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Parses a JSON request body regardless of its declared content type.
///
/// Page-unload beacons arrive as `text/plain`, so the `Content-Type` header
/// cannot be relied on.
///
/// # Errors
/// - `ApiError::BadRequest` - Body is empty or not the expected JSON shape
pub fn parse_json_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    if body.is_empty() {
        return Err(ApiError::bad_request("Request body is empty"));
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("Invalid request body: {e}")))
}

/// Parses the optional `file` query parameter.
///
/// An empty value counts as absent.
///
/// # Errors
/// - `ApiError::BadRequest` - Value is not a non-negative integer
pub fn parse_file_index(value: Option<&str>) -> Result<Option<usize>, ApiError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse::<usize>()
            .map(Some)
            .map_err(|_| ApiError::bad_request(format!("Invalid file index: {raw}"))),
    }
}
