//! Automation
//!
//! The threshold-based control loop: user-configurable settings plus the
//! controller that turns readings into actuator commands on every trigger
//! (new reading, periodic tick, settings change).

mod controller;
mod settings;

pub use controller::{AutomationController, RedispatchPolicy};
pub use settings::{AutomationSettings, SettingsStore};
