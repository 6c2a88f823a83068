//! Actuator Commands
//!
//! The two controllable devices and the command/payload types that travel
//! over the device-control channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use storage::{DeviceStatePatch, SwitchState};

/// A controllable device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Actuator {
    Humidifier,
    Speaker,
}

impl Actuator {
    /// Topic the device listens on for commands.
    pub fn control_topic(&self) -> &'static str {
        match self {
            Self::Humidifier => "control/humidifier",
            Self::Speaker => "control/speaker",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Humidifier => "humidifier",
            Self::Speaker => "speaker",
        }
    }
}

impl fmt::Display for Actuator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single actuator command. Volume is only carried for the speaker and
/// only when turning it on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorCommand {
    pub status: SwitchState,
    pub volume: Option<i32>,
}

impl ActuatorCommand {
    pub fn on() -> Self {
        Self {
            status: SwitchState::On,
            volume: None,
        }
    }

    pub fn off() -> Self {
        Self {
            status: SwitchState::Off,
            volume: None,
        }
    }

    pub fn speaker_on(volume: i32) -> Self {
        Self {
            status: SwitchState::On,
            volume: Some(volume),
        }
    }

    /// The device-state patch this command implies once dispatched. Absent
    /// volume leaves the stored level untouched, so it survives toggles.
    pub fn patch(&self, actuator: Actuator) -> DeviceStatePatch {
        match actuator {
            Actuator::Humidifier => DeviceStatePatch::humidifier(self.status),
            Actuator::Speaker => DeviceStatePatch::speaker(self.status, self.volume),
        }
    }
}

/// Wire payload published to `control/{device}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandPayload {
    pub status: SwitchState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<i32>,
    pub timestamp: DateTime<Utc>,
    pub source: String,
}

/// Wire payload published to `settings/automation` when the automation
/// toggle changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsAnnouncement {
    pub enabled: bool,
    pub timestamp: DateTime<Utc>,
    pub source: String,
}
