//! Command Dispatcher
//!
//! Delivers actuator commands over the device-control channel and
//! optimistically reflects them in the repository's device state. The ack
//! confirms only that the publish/update call succeeded, never that the
//! physical actuator responded; there is no retry or delivery-confirmation
//! loop.

use crate::command::{Actuator, ActuatorCommand, CommandPayload, SettingsAnnouncement};
use async_trait::async_trait;
use chrono::Utc;
use rumqttc::{AsyncClient, QoS};
use std::sync::Arc;
use storage::shadow::ShadowClient;
use storage::{BackendError, StateRepository, WriteOrigin};
use thiserror::Error;
use tracing::{debug, warn};

/// Source tag stamped on every outbound control payload.
pub const COMMAND_SOURCE: &str = "hub";

/// Topic carrying automation on/off announcements to the device.
pub const SETTINGS_TOPIC: &str = "settings/automation";

/// Dispatch error types.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("publish failed: {0}")]
    Publish(String),

    #[error("shadow update failed: {0}")]
    Shadow(BackendError),

    #[error("device-state persistence failed: {0}")]
    Backend(BackendError),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// The two interchangeable ways to reach the device.
pub enum CommandTransport {
    /// Fire-and-forget publish to `control/{device}`.
    Mqtt(AsyncClient),
    /// Retained desired-state document update.
    Shadow(Arc<ShadowClient>),
}

/// Seam the automation controller and the manual-control surface dispatch
/// through.
#[async_trait]
pub trait CommandSink: Send + Sync {
    async fn send(
        &self,
        actuator: Actuator,
        command: ActuatorCommand,
        origin: WriteOrigin,
    ) -> Result<(), DispatchError>;
}

/// Default sink: one transport plus the repository for the optimistic
/// device-state update.
pub struct CommandDispatcher {
    transport: CommandTransport,
    repository: Arc<StateRepository>,
}

impl CommandDispatcher {
    pub fn new(transport: CommandTransport, repository: Arc<StateRepository>) -> Self {
        Self {
            transport,
            repository,
        }
    }

    /// Announce the automation toggle to the device. Only meaningful on the
    /// publish transport; the shadow transport has no announcement channel.
    pub async fn announce_settings(&self, enabled: bool) -> Result<(), DispatchError> {
        let CommandTransport::Mqtt(client) = &self.transport else {
            debug!("settings announcement skipped on shadow transport");
            return Ok(());
        };

        let payload = SettingsAnnouncement {
            enabled,
            timestamp: Utc::now(),
            source: COMMAND_SOURCE.to_string(),
        };
        let bytes =
            serde_json::to_vec(&payload).map_err(|e| DispatchError::Serialization(e.to_string()))?;

        client
            .publish(SETTINGS_TOPIC, QoS::AtLeastOnce, false, bytes)
            .await
            .map_err(|e| DispatchError::Publish(e.to_string()))?;
        debug!(enabled, "automation settings announced");
        Ok(())
    }
}

#[async_trait]
impl CommandSink for CommandDispatcher {
    async fn send(
        &self,
        actuator: Actuator,
        command: ActuatorCommand,
        origin: WriteOrigin,
    ) -> Result<(), DispatchError> {
        match &self.transport {
            CommandTransport::Mqtt(client) => {
                let payload = CommandPayload {
                    status: command.status,
                    volume: command.volume,
                    timestamp: Utc::now(),
                    source: COMMAND_SOURCE.to_string(),
                };
                let bytes = serde_json::to_vec(&payload)
                    .map_err(|e| DispatchError::Serialization(e.to_string()))?;

                client
                    .publish(actuator.control_topic(), QoS::AtLeastOnce, false, bytes)
                    .await
                    .map_err(|e| DispatchError::Publish(e.to_string()))?;
            }
            CommandTransport::Shadow(shadow) => {
                shadow
                    .update_desired(command.patch(actuator))
                    .await
                    .map_err(DispatchError::Shadow)?;
            }
        }

        debug!(
            device = actuator.name(),
            status = command.status.as_str(),
            volume = command.volume,
            "command dispatched"
        );

        // Optimistic update: the cache reflects what was last commanded.
        // Manual origin awaits the durable upsert so the caller sees an
        // accurate signal; automation origin is fire-and-forget.
        if let Err(e) = self
            .repository
            .update_device_state(command.patch(actuator), origin)
            .await
        {
            warn!(device = actuator.name(), "device-state update failed: {e}");
            return Err(DispatchError::Backend(e));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rumqttc::MqttOptions;
    use storage::{RepositoryConfig, SwitchState};

    fn test_client() -> (AsyncClient, rumqttc::EventLoop) {
        // Never polled; publishes only enqueue onto the request channel.
        AsyncClient::new(MqttOptions::new("test-hub", "localhost", 1883), 10)
    }

    #[tokio::test]
    async fn test_send_updates_device_state_optimistically() {
        let (client, _eventloop) = test_client();
        let repository = Arc::new(StateRepository::new(RepositoryConfig::default()));
        let dispatcher =
            CommandDispatcher::new(CommandTransport::Mqtt(client), Arc::clone(&repository));

        dispatcher
            .send(
                Actuator::Speaker,
                ActuatorCommand::speaker_on(65),
                WriteOrigin::Automation,
            )
            .await
            .unwrap();

        let state = repository.current_device_state().await;
        assert_eq!(state.speaker, SwitchState::On);
        assert_eq!(state.volume, 65);
        assert_eq!(state.humidifier, SwitchState::Off);
    }

    #[tokio::test]
    async fn test_speaker_off_keeps_volume() {
        let (client, _eventloop) = test_client();
        let repository = Arc::new(StateRepository::new(RepositoryConfig::default()));
        let dispatcher =
            CommandDispatcher::new(CommandTransport::Mqtt(client), Arc::clone(&repository));

        dispatcher
            .send(
                Actuator::Speaker,
                ActuatorCommand::speaker_on(65),
                WriteOrigin::Automation,
            )
            .await
            .unwrap();
        dispatcher
            .send(
                Actuator::Speaker,
                ActuatorCommand::off(),
                WriteOrigin::Automation,
            )
            .await
            .unwrap();

        let state = repository.current_device_state().await;
        assert_eq!(state.speaker, SwitchState::Off);
        assert_eq!(state.volume, 65);
    }

    #[tokio::test]
    async fn test_announce_settings_publishes() {
        let (client, _eventloop) = test_client();
        let repository = Arc::new(StateRepository::new(RepositoryConfig::default()));
        let dispatcher = CommandDispatcher::new(CommandTransport::Mqtt(client), repository);

        dispatcher.announce_settings(false).await.unwrap();
    }
}
