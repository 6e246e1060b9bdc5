//! Status, monitoring and file listing endpoints

use axum::Json;
use axum::extract::{Query, State};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use streambox_core::content::format_size;
use streambox_core::{
    ContentStatus, ContentSummary, FileDescriptor, InfoHash, MagnetLink, StreamboxError,
};

use super::utils::parse_json_body;
use crate::error::ApiError;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    #[serde(alias = "magnet")]
    pub uri: Option<String>,
}

/// Response of `GET /status`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    /// `not_found`, `connecting` or `ready`
    pub status: &'static str,
    pub peers: usize,
    /// Integer percentage, 0-100
    pub progress: u32,
    pub name: Option<String>,
    pub content_hash: InfoHash,
    pub ready: bool,
    pub file_count: usize,
}

impl StatusResponse {
    fn from_status(status: &ContentStatus, magnet: &MagnetLink) -> Self {
        let summary = status.summary();
        let name = summary
            .map(|summary| summary.name.clone())
            .filter(|name| !name.is_empty())
            .or_else(|| magnet.display_name.clone());

        Self {
            status: status.label(),
            peers: summary.map_or(0, |summary| summary.peers),
            progress: summary.map_or(0, |summary| percent(summary.progress)),
            name,
            content_hash: magnet.info_hash,
            ready: matches!(status, ContentStatus::Ready(_)),
            file_count: summary.map_or(0, |summary| summary.files.len()),
        }
    }
}

fn percent(progress: f64) -> u32 {
    (progress.clamp(0.0, 1.0) * 100.0).round() as u32
}

/// `GET /status?uri=<uri>`: where content stands, without acquiring it.
///
/// # Errors
/// - `ApiError::BadRequest` - No `uri` parameter
/// - `StreamboxError::InvalidIdentifier` - Not a magnet URI or info hash
pub async fn status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<StatusResponse>, ApiError> {
    let uri = query
        .uri
        .filter(|uri| !uri.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing uri parameter"))?;
    let magnet = MagnetLink::from_identifier(&uri)?;

    let status = state.engine.status(magnet.info_hash).await?;
    Ok(Json(StatusResponse::from_status(&status, &magnet)))
}

#[derive(Debug, Serialize)]
pub struct TorrentList {
    pub torrents: Vec<ContentSummary>,
    pub total: usize,
}

/// `GET /torrents`: everything loaded or connecting.
///
/// # Errors
/// - `StreamboxError::EngineShutdown` - Server is stopping
pub async fn list_torrents(State(state): State<AppState>) -> Result<Json<TorrentList>, ApiError> {
    let torrents = state.engine.list_content().await?;
    Ok(Json(TorrentList {
        total: torrents.len(),
        torrents,
    }))
}

#[derive(Debug, Deserialize)]
pub struct FilesRequest {
    #[serde(alias = "magnet")]
    pub uri: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileListing {
    pub index: usize,
    pub name: String,
    pub path: String,
    pub size: u64,
    pub size_formatted: String,
    pub is_video: bool,
    pub extension: String,
}

impl From<&FileDescriptor> for FileListing {
    fn from(file: &FileDescriptor) -> Self {
        Self {
            index: file.index,
            name: file.name.clone(),
            path: file.path.clone(),
            size: file.length,
            size_formatted: format_size(file.length),
            is_video: file.is_video,
            extension: file.extension.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilesResponse {
    pub content_hash: InfoHash,
    pub name: String,
    pub files: Vec<FileListing>,
    pub main_video_index: Option<usize>,
}

/// `POST /torrent/files {uri}`: acquire content and list its files.
///
/// No session is opened, so the content is reclaimed after the grace period
/// unless a viewer starts watching.
///
/// # Errors
/// - `ApiError::BadRequest` - Body is missing or malformed
/// - Acquisition errors, see [`streambox_core::ContentEngineHandle::acquire`]
pub async fn torrent_files(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<FilesResponse>, ApiError> {
    let request: FilesRequest = parse_json_body(&body)?;
    let content = state.engine.acquire(&request.uri).await?;

    Ok(Json(FilesResponse {
        content_hash: content.info_hash(),
        name: content.name().to_string(),
        files: content.files().iter().map(FileListing::from).collect(),
        main_video_index: content.main_video_index(),
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_seconds: u64,
    pub loaded_content: usize,
}

/// `GET /health`
///
/// # Errors
/// - `StreamboxError::EngineShutdown` - Server is stopping
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    if !state.engine.is_running() {
        return Err(StreamboxError::EngineShutdown.into());
    }
    let content = state.engine.list_content().await?;
    Ok(Json(HealthResponse {
        status: "ok",
        uptime_seconds: state.server_started_at.elapsed().as_secs(),
        loaded_content: content.iter().filter(|summary| summary.ready).count(),
    }))
}
