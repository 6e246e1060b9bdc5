//! Viewer session endpoints.
//!
//! `POST /session` starts watching content; `DELETE /session` stops. Browsers
//! can only send POST from a page-unload beacon, so a POST body carrying
//! `"method": "DELETE"` ends a session as well.

use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use streambox_core::{InfoHash, SessionEnd, SessionId};

use super::utils::parse_json_body;
use crate::error::ApiError;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    #[serde(alias = "magnet")]
    pub uri: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndSessionRequest {
    #[serde(alias = "infoHash")]
    pub content_hash: String,
    pub session_id: String,
}

/// Ending a session via POST, as sent by `navigator.sendBeacon`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeaconRequest {
    pub method: String,
    #[serde(alias = "infoHash")]
    pub content_hash: String,
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SessionPost {
    Beacon(BeaconRequest),
    Start(StartSessionRequest),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStarted {
    pub content_hash: InfoHash,
    pub session_id: SessionId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEnded {
    /// Whether the session was still open
    pub ended: bool,
    pub remaining_sessions: usize,
}

/// `POST /session`: start a session, or end one from a beacon.
///
/// # Errors
/// - `ApiError::BadRequest` - Body is neither a start request nor a beacon
/// - Acquisition errors, see [`streambox_core::ContentEngineHandle::open_session`]
pub async fn post_session(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    match parse_json_body::<SessionPost>(&body)? {
        SessionPost::Start(request) => {
            let (content, session_id) = state.engine.open_session(&request.uri).await?;
            tracing::info!("Session {} opened for '{}'", session_id, content.name());
            Ok(Json(SessionStarted {
                content_hash: content.info_hash(),
                session_id,
            })
            .into_response())
        }
        SessionPost::Beacon(beacon) => {
            if !beacon.method.eq_ignore_ascii_case("DELETE") {
                return Err(ApiError::bad_request(format!(
                    "Unsupported session method: {}",
                    beacon.method
                )));
            }
            let ended = finish_session(&state, &beacon.content_hash, beacon.session_id).await?;
            Ok(Json(ended).into_response())
        }
    }
}

/// `DELETE /session`: end a session. Unknown sessions are not an error.
///
/// # Errors
/// - `ApiError::BadRequest` - Body is missing or malformed
/// - `StreamboxError::InvalidIdentifier` - Content hash is malformed
pub async fn end_session(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SessionEnded>, ApiError> {
    let request: EndSessionRequest = parse_json_body(&body)?;
    let ended = finish_session(&state, &request.content_hash, request.session_id).await?;
    Ok(Json(ended))
}

async fn finish_session(
    state: &AppState,
    content_hash: &str,
    session_id: String,
) -> Result<SessionEnded, ApiError> {
    let info_hash = InfoHash::parse(content_hash)?;
    let outcome = state
        .engine
        .end_session(info_hash, SessionId::from(session_id))
        .await?;

    Ok(match outcome {
        SessionEnd::Removed { remaining } => SessionEnded {
            ended: true,
            remaining_sessions: remaining,
        },
        SessionEnd::NotFound => SessionEnded {
            ended: false,
            remaining_sessions: state.engine.session_count(info_hash).await?,
        },
    })
}
