//! Device Shadow Client
//!
//! Retained desired/reported state document for the physical device, reached
//! over the shadow service's REST endpoint. The repository hydrates device
//! state from it (reported preferred over desired) and the command
//! dispatcher uses it as the retained desired-state transport. It is not a
//! reading store.

use crate::backend::BackendError;
use crate::models::{DeviceState, DeviceStatePatch};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Connection settings for the device-shadow service.
#[derive(Debug, Clone)]
pub struct ShadowConfig {
    /// Base URL of the shadow REST endpoint.
    pub endpoint: String,
    /// Thing name the shadow document is keyed by.
    pub thing_name: String,
    pub request_timeout: Duration,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8443".to_string(),
            thing_name: "deepsleep-device".to_string(),
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// The `{"state": {"desired": ..., "reported": ...}}` shadow document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShadowDocument {
    pub state: ShadowState,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShadowState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desired: Option<DeviceStatePatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reported: Option<DeviceStatePatch>,
}

/// REST client for the retained device-shadow document.
pub struct ShadowClient {
    client: reqwest::Client,
    shadow_url: String,
}

impl ShadowClient {
    pub fn new(config: &ShadowConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| BackendError::Configuration(format!("http client: {e}")))?;

        let shadow_url = format!(
            "{}/things/{}/shadow",
            config.endpoint.trim_end_matches('/'),
            config.thing_name
        );
        Ok(Self { client, shadow_url })
    }

    /// Fetch the shadow document; `None` when the thing has no shadow yet.
    pub async fn fetch(&self) -> Result<Option<ShadowDocument>, BackendError> {
        let response = self
            .client
            .get(&self.shadow_url)
            .send()
            .await
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("no shadow document for thing yet");
            return Ok(None);
        }

        let response = response
            .error_for_status()
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;

        let document = response
            .json::<ShadowDocument>()
            .await
            .map_err(|e| BackendError::Serialization(e.to_string()))?;
        Ok(Some(document))
    }

    /// Device state the shadow knows about, preferring what the device
    /// confirmed (reported) over what was last commanded (desired).
    pub async fn device_state(&self) -> Result<Option<DeviceState>, BackendError> {
        let Some(document) = self.fetch().await? else {
            return Ok(None);
        };

        let patch = match (document.state.reported, document.state.desired) {
            (Some(reported), _) => reported,
            (None, Some(desired)) => desired,
            (None, None) => return Ok(None),
        };

        let mut state = DeviceState::default();
        patch.apply(&mut state);
        Ok(Some(state))
    }

    /// Merge a patch into the retained desired state.
    pub async fn update_desired(&self, patch: DeviceStatePatch) -> Result<(), BackendError> {
        let document = ShadowDocument {
            state: ShadowState {
                desired: Some(patch),
                reported: None,
            },
        };

        self.client
            .post(&self.shadow_url)
            .json(&document)
            .send()
            .await
            .map_err(|e| BackendError::Unavailable(e.to_string()))?
            .error_for_status()
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;
        Ok(())
    }
}
