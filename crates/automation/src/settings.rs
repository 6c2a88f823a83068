//! Automation Settings
//!
//! The per-deployment automation singleton: one enabled flag and the two
//! actuator thresholds. Mutated rarely through the settings interface,
//! otherwise read-only to the controller.

use serde::{Deserialize, Serialize};
use std::sync::{PoisonError, RwLock};
use storage::validate::{validate_heart_rate_threshold, validate_humidity_threshold};
use storage::ValidationError;
use tracing::info;

/// Threshold configuration for the two automation channels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationSettings {
    pub enabled: bool,
    /// Humidifier turns on below this relative humidity (%).
    pub humidity_threshold: f64,
    /// Speaker turns on above this heart rate (bpm).
    pub heart_rate_threshold: i32,
}

impl Default for AutomationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            humidity_threshold: 40.0,
            heart_rate_threshold: 80,
        }
    }
}

impl AutomationSettings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_humidity_threshold(self.humidity_threshold)?;
        validate_heart_rate_threshold(self.heart_rate_threshold)?;
        Ok(())
    }
}

/// Shared settings singleton. Reads are cheap snapshots; updates replace the
/// whole record after validation.
pub struct SettingsStore {
    inner: RwLock<AutomationSettings>,
}

impl SettingsStore {
    pub fn new(initial: AutomationSettings) -> Self {
        Self {
            inner: RwLock::new(initial),
        }
    }

    pub fn snapshot(&self) -> AutomationSettings {
        *self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Validate and replace the settings. On rejection the store is left
    /// unchanged.
    pub fn update(&self, settings: AutomationSettings) -> Result<AutomationSettings, ValidationError> {
        settings.validate()?;
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *guard = settings;
        info!(
            enabled = settings.enabled,
            humidity_threshold = settings.humidity_threshold,
            heart_rate_threshold = settings.heart_rate_threshold,
            "automation settings updated"
        );
        Ok(settings)
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(AutomationSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = AutomationSettings::default();
        assert!(settings.enabled);
        assert_eq!(settings.humidity_threshold, 40.0);
        assert_eq!(settings.heart_rate_threshold, 80);
    }

    #[test]
    fn test_update_replaces_snapshot() {
        let store = SettingsStore::default();
        store
            .update(AutomationSettings {
                enabled: false,
                humidity_threshold: 55.0,
                heart_rate_threshold: 90,
            })
            .unwrap();

        let snapshot = store.snapshot();
        assert!(!snapshot.enabled);
        assert_eq!(snapshot.humidity_threshold, 55.0);
    }

    #[test]
    fn test_rejected_update_leaves_store_unchanged() {
        let store = SettingsStore::default();
        let result = store.update(AutomationSettings {
            enabled: true,
            humidity_threshold: 120.0,
            heart_rate_threshold: 80,
        });
        assert!(result.is_err());
        assert_eq!(store.snapshot(), AutomationSettings::default());

        let result = store.update(AutomationSettings {
            enabled: true,
            humidity_threshold: 40.0,
            heart_rate_threshold: 30,
        });
        assert!(result.is_err());
        assert_eq!(store.snapshot(), AutomationSettings::default());
    }

    #[test]
    fn test_settings_wire_form_is_camel_case() {
        let json = serde_json::to_value(AutomationSettings::default()).unwrap();
        assert_eq!(json["humidityThreshold"], 40.0);
        assert_eq!(json["heartRateThreshold"], 80);
    }
}
