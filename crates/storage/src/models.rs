//! Core Data Model
//!
//! Wire and cache types shared across the hub: the immutable sensor reading,
//! the single live device state per deployment, and the derived sleep-quality
//! and statistics records.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One periodic environment sample. Immutable once recorded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    /// Relative humidity in percent.
    pub humidity: f64,
    /// Resting heart rate in bpm. Zero until the wearable has reported.
    pub heart_rate: i32,
    pub timestamp: DateTime<Utc>,
}

impl SensorReading {
    /// Placeholder returned before any telemetry has arrived.
    pub fn zero() -> Self {
        Self {
            humidity: 0.0,
            heart_rate: 0,
            timestamp: DateTime::UNIX_EPOCH,
        }
    }
}

/// Binary actuator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchState {
    On,
    #[default]
    Off,
}

impl SwitchState {
    /// Parse the wire form. Anything other than "on"/"off" is rejected.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "on" => Some(Self::On),
            "off" => Some(Self::Off),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
        }
    }

    pub fn is_on(&self) -> bool {
        matches!(self, Self::On)
    }
}

impl fmt::Display for SwitchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single live device state per deployment.
///
/// Volume is only meaningful while the speaker is on but is retained across
/// toggles so the next "on" resumes at the previous level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceState {
    pub humidifier: SwitchState,
    pub speaker: SwitchState,
    pub volume: i32,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            humidifier: SwitchState::Off,
            speaker: SwitchState::Off,
            volume: 0,
        }
    }
}

/// Field-wise partial update of [`DeviceState`]. Absent fields are left
/// untouched by [`DeviceStatePatch::apply`]; last writer wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidifier: Option<SwitchState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker: Option<SwitchState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<i32>,
}

impl DeviceStatePatch {
    pub fn humidifier(status: SwitchState) -> Self {
        Self {
            humidifier: Some(status),
            ..Self::default()
        }
    }

    pub fn speaker(status: SwitchState, volume: Option<i32>) -> Self {
        Self {
            speaker: Some(status),
            volume,
            ..Self::default()
        }
    }

    /// Merge into `state`, leaving absent fields unchanged.
    pub fn apply(&self, state: &mut DeviceState) {
        if let Some(humidifier) = self.humidifier {
            state.humidifier = humidifier;
        }
        if let Some(speaker) = self.speaker {
            state.speaker = speaker;
        }
        if let Some(volume) = self.volume {
            state.volume = volume;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.humidifier.is_none() && self.speaker.is_none() && self.volume.is_none()
    }
}

/// Sleep-quality view of a reading, derived on demand via the scorer and
/// never stored independently.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SleepQualityRecord {
    pub date: DateTime<Utc>,
    pub average_humidity: f64,
    pub average_heart_rate: i32,
    pub quality_score: f64,
}

/// Aggregate statistics over a set of readings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SleepStatistics {
    pub avg_humidity: f64,
    pub avg_heart_rate: f64,
    pub min_humidity: f64,
    pub max_humidity: f64,
    pub min_heart_rate: i32,
    pub max_heart_rate: i32,
    pub count: u64,
}

/// Per-day bucket of [`SleepStatistics`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStatistics {
    pub date: NaiveDate,
    pub avg_humidity: f64,
    pub avg_heart_rate: f64,
    pub min_humidity: f64,
    pub max_humidity: f64,
    pub min_heart_rate: i32,
    pub max_heart_rate: i32,
    pub count: u64,
}

/// History query: inclusive time range, newest first, `limit` keeps the most
/// recent matches.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReadingQuery {
    pub limit: Option<usize>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl ReadingQuery {
    pub fn matches(&self, timestamp: DateTime<Utc>) -> bool {
        if let Some(start) = self.start {
            if timestamp < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if timestamp > end {
                return false;
            }
        }
        true
    }
}
