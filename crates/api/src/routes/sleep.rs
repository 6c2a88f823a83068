//! Sleep Data Routes
//!
//! Read-only queries over the repository: current status, sleep-quality
//! records, raw readings, and statistics.

use crate::AppState;
use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use storage::{
    DailyStatistics, ReadingQuery, SensorReading, SleepQualityRecord, SleepStatistics, SwitchState,
};

/// Query parameters shared by the history endpoints. The range is inclusive
/// and results come back newest first.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryParams {
    pub limit: Option<usize>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl HistoryParams {
    fn reading_query(&self) -> ReadingQuery {
        ReadingQuery {
            limit: self.limit,
            start: self.start_date,
            end: self.end_date,
        }
    }
}

/// Combined current reading + device state, the dashboard's main poll.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SleepStatusResponse {
    pub humidity: f64,
    pub heart_rate: i32,
    pub timestamp: DateTime<Utc>,
    pub humidifier_status: SwitchState,
    pub speaker_status: SwitchState,
    pub volume: i32,
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<SleepStatusResponse> {
    let reading = state.repository.current_reading().await;
    let device = state.repository.current_device_state().await;

    Json(SleepStatusResponse {
        humidity: reading.humidity,
        heart_rate: reading.heart_rate,
        timestamp: reading.timestamp,
        humidifier_status: device.humidifier,
        speaker_status: device.speaker,
        volume: device.volume,
    })
}

pub async fn records(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryParams>,
) -> Json<Vec<SleepQualityRecord>> {
    Json(
        state
            .repository
            .sleep_quality_records(params.reading_query())
            .await,
    )
}

pub async fn sensor_records(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryParams>,
) -> Json<Vec<SensorReading>> {
    Json(
        state
            .repository
            .historical_readings(params.reading_query())
            .await,
    )
}

pub async fn statistics(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryParams>,
) -> Json<SleepStatistics> {
    Json(state.repository.statistics(params.reading_query()).await)
}

pub async fn daily_statistics(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryParams>,
) -> Json<Vec<DailyStatistics>> {
    Json(
        state
            .repository
            .daily_statistics(params.reading_query())
            .await,
    )
}
