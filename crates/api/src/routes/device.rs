//! Manual Device Control Routes
//!
//! Direct user control of the two actuators. These writes are awaited all
//! the way through the durable upsert, so a degraded backend surfaces as an
//! error here rather than being swallowed like automation-path writes.

use crate::{ApiError, AppState};
use axum::{extract::State, Json};
use device_control::{Actuator, ActuatorCommand, CommandSink};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use storage::validate::validate_volume;
use storage::{DeviceState, SwitchState, ValidationError, WriteOrigin};

#[derive(Debug, Deserialize)]
pub struct HumidifierRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct SpeakerRequest {
    pub status: String,
    pub volume: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct ControlResponse {
    pub success: bool,
    pub message: String,
}

fn parse_status(status: &str) -> Result<SwitchState, ApiError> {
    SwitchState::parse(status)
        .ok_or_else(|| ApiError::Validation(ValidationError::InvalidStatus(status.to_string())))
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<DeviceState> {
    Json(state.repository.current_device_state().await)
}

pub async fn humidifier(
    State(state): State<Arc<AppState>>,
    Json(request): Json<HumidifierRequest>,
) -> Result<Json<ControlResponse>, ApiError> {
    let status = parse_status(&request.status)?;

    state
        .dispatcher
        .send(
            Actuator::Humidifier,
            ActuatorCommand {
                status,
                volume: None,
            },
            WriteOrigin::Manual,
        )
        .await?;

    Ok(Json(ControlResponse {
        success: true,
        message: format!("humidifier turned {status}"),
    }))
}

pub async fn speaker(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SpeakerRequest>,
) -> Result<Json<ControlResponse>, ApiError> {
    let status = parse_status(&request.status)?;

    let command = match status {
        SwitchState::On => {
            let volume = request
                .volume
                .ok_or(ApiError::Validation(ValidationError::MissingField("volume")))?;
            validate_volume(volume)?;
            ActuatorCommand::speaker_on(volume)
        }
        SwitchState::Off => ActuatorCommand::off(),
    };

    state
        .dispatcher
        .send(Actuator::Speaker, command, WriteOrigin::Manual)
        .await?;

    let message = match command.volume {
        Some(volume) => format!("speaker turned on at volume {volume}"),
        None => "speaker turned off".to_string(),
    };
    Ok(Json(ControlResponse {
        success: true,
        message,
    }))
}
