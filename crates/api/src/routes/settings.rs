//! Automation Settings Route
//!
//! Validates and replaces the automation singleton, announces the toggle on
//! the device channel, and triggers one immediate controller evaluation so
//! a threshold change takes effect without waiting for the next reading.

use crate::{ApiError, AppState};
use automation::AutomationSettings;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Typed request body; a non-boolean `enabled` or a non-numeric threshold
/// is rejected at deserialization.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsRequest {
    pub enabled: bool,
    pub humidity_threshold: f64,
    pub heart_rate_threshold: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsResponse {
    pub success: bool,
    pub settings: AutomationSettings,
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SettingsRequest>,
) -> Result<Json<SettingsResponse>, ApiError> {
    let settings = state.settings.update(AutomationSettings {
        enabled: request.enabled,
        humidity_threshold: request.humidity_threshold,
        heart_rate_threshold: request.heart_rate_threshold,
    })?;

    state.dispatcher.announce_settings(settings.enabled).await?;

    // Settings-change trigger: one immediate evaluation.
    state.controller.evaluate().await;

    Ok(Json(SettingsResponse {
        success: true,
        settings,
    }))
}
