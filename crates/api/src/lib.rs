//! DeepSleep Hub API Server
//!
//! Thin validated REST wrappers over the core: current status, history and
//! statistics queries, manual device control, and automation settings. All
//! request bodies are deserialized into explicit structures before anything
//! reaches the core.

use automation::{AutomationController, SettingsStore};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use device_control::{CommandDispatcher, DispatchError};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use storage::{BackendError, StateRepository, ValidationError};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod config;
mod routes;

/// Application state shared across handlers.
pub struct AppState {
    pub repository: Arc<StateRepository>,
    pub dispatcher: Arc<CommandDispatcher>,
    pub controller: Arc<AutomationController>,
    pub settings: Arc<SettingsStore>,
    pub version: String,
    pub started_at: Instant,
}

/// Error surface of the REST layer. Validation problems are the client's
/// fault; everything else means a degraded collaborator.
#[derive(Debug)]
pub enum ApiError {
    Validation(ValidationError),
    Backend(BackendError),
    Dispatch(DispatchError),
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err)
    }
}

impl From<BackendError> for ApiError {
    fn from(err: BackendError) -> Self {
        Self::Backend(err)
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        Self::Dispatch(err)
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Validation(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Self::Backend(err) => (StatusCode::BAD_GATEWAY, err.to_string()),
            Self::Dispatch(err) => (StatusCode::BAD_GATEWAY, err.to_string()),
        };
        let body = Json(ErrorBody {
            success: false,
            error: message,
        });
        (status, body).into_response()
    }
}

/// Create the application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/sleep/status", get(routes::sleep::status))
        .route("/api/sleep/records", get(routes::sleep::records))
        .route("/api/sleep/statistics", get(routes::sleep::statistics))
        .route(
            "/api/sleep/daily-statistics",
            get(routes::sleep::daily_statistics),
        )
        .route("/api/sensor/records", get(routes::sleep::sensor_records))
        .route("/api/device/status", get(routes::device::status))
        .route("/api/device/humidifier", post(routes::device::humidifier))
        .route("/api/device/speaker", post(routes::device::speaker))
        .route("/api/settings/automation", post(routes::settings::update))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: String,
    version: String,
    timestamp: DateTime<Utc>,
    uptime_seconds: u64,
    backends: Vec<&'static str>,
    history_count: usize,
}

async fn health_handler(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        timestamp: Utc::now(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        backends: state.repository.backend_names(),
        history_count: state.repository.history_len(),
    })
}
