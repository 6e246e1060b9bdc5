//! Runtime settings endpoints

use axum::Json;
use axum::extract::State;
use bytes::Bytes;
use streambox_core::{EngineSettings, SettingsUpdate};

use super::utils::parse_json_body;
use crate::error::ApiError;
use crate::server::AppState;

/// `GET /settings`
pub async fn get_settings(State(state): State<AppState>) -> Json<EngineSettings> {
    Json(state.settings.current())
}

/// `PUT /settings`: apply a partial update. Takes effect for the next
/// acquisition and the next scheduled eviction.
///
/// # Errors
/// - `ApiError::BadRequest` - Body is not a settings object
/// - `StreamboxError::InvalidSetting` - A value is out of range; nothing is changed
/// - `StreamboxError::SettingsStore` - Settings file could not be written
pub async fn update_settings(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<EngineSettings>, ApiError> {
    let update: SettingsUpdate = parse_json_body(&body)?;
    let settings = state.settings.update(&update)?;
    tracing::info!("Settings updated: {:?}", settings);
    Ok(Json(settings))
}

/// `DELETE /settings`: restore defaults.
///
/// # Errors
/// - `StreamboxError::SettingsStore` - Settings file could not be written
pub async fn reset_settings(
    State(state): State<AppState>,
) -> Result<Json<EngineSettings>, ApiError> {
    let settings = state.settings.reset()?;
    tracing::info!("Settings reset to defaults");
    Ok(Json(settings))
}
