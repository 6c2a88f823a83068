//! Ingestion Gateway
//!
//! Sole entry point for inbound telemetry. Demultiplexes messages by topic,
//! merges metric updates with the last-known value of the untouched metric,
//! records the reading, and synchronously triggers an automation
//! evaluation. Malformed payloads are logged and dropped without mutating
//! any state.

use crate::topic::{classify, parse_device_echo, parse_numeric, Channel};
use crate::wearable::HeartRateFeed;
use automation::AutomationController;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use storage::{DeviceStatePatch, SensorReading, StateRepository, WriteOrigin};
use tracing::{debug, warn};

/// Inbound telemetry demultiplexer.
pub struct IngestGateway {
    repository: Arc<StateRepository>,
    controller: Arc<AutomationController>,
    feed: Option<Arc<dyn HeartRateFeed>>,
}

impl IngestGateway {
    pub fn new(repository: Arc<StateRepository>, controller: Arc<AutomationController>) -> Self {
        Self {
            repository,
            controller,
            feed: None,
        }
    }

    /// Attach a wearable feed consulted on every humidity message.
    pub fn with_feed(mut self, feed: Arc<dyn HeartRateFeed>) -> Self {
        self.feed = Some(feed);
        self
    }

    /// Handle one inbound message. Never raises; every failure path logs
    /// and leaves state untouched.
    pub async fn handle_message(&self, topic: &str, payload: &[u8], timestamp: DateTime<Utc>) {
        let Some(channel) = classify(topic) else {
            debug!(topic, "unrecognized topic ignored");
            return;
        };

        match channel {
            Channel::Humidity => self.handle_humidity(payload, timestamp).await,
            Channel::HeartRate => self.handle_heart_rate(payload, timestamp).await,
            Channel::Temperature => match parse_numeric(payload) {
                // Recognized but not part of the recorded data model.
                Ok(temperature) => debug!(temperature, "temperature reading received"),
                Err(e) => warn!("dropping temperature message: {e}"),
            },
            Channel::DeviceStatus(device) => self.handle_device_echo(&device, payload).await,
        }
    }

    async fn handle_humidity(&self, payload: &[u8], timestamp: DateTime<Utc>) {
        let humidity = match parse_numeric(payload) {
            Ok(value) => value,
            Err(e) => {
                warn!("dropping humidity message: {e}");
                return;
            }
        };

        let last = self.repository.current_reading().await;
        let heart_rate = match &self.feed {
            Some(feed) => match feed.resting_heart_rate().await {
                Ok(rate) => rate,
                Err(e) => {
                    warn!("wearable feed unavailable, keeping last heart rate: {e}");
                    last.heart_rate
                }
            },
            None => last.heart_rate,
        };

        self.record_and_evaluate(SensorReading {
            humidity,
            heart_rate,
            timestamp,
        })
        .await;
    }

    async fn handle_heart_rate(&self, payload: &[u8], timestamp: DateTime<Utc>) {
        let heart_rate = match parse_numeric(payload) {
            Ok(value) => value.round() as i32,
            Err(e) => {
                warn!("dropping heart-rate message: {e}");
                return;
            }
        };

        let last = self.repository.current_reading().await;
        self.record_and_evaluate(SensorReading {
            humidity: last.humidity,
            heart_rate,
            timestamp,
        })
        .await;
    }

    async fn record_and_evaluate(&self, reading: SensorReading) {
        if let Err(e) = self.repository.record_reading(reading) {
            warn!("rejecting reading: {e}");
            return;
        }
        debug!(
            humidity = reading.humidity,
            heart_rate = reading.heart_rate,
            "reading recorded"
        );
        self.controller.evaluate().await;
    }

    async fn handle_device_echo(&self, device: &str, payload: &[u8]) {
        let echo = match parse_device_echo(payload) {
            Ok(echo) => echo,
            Err(e) => {
                warn!(device, "dropping device status echo: {e}");
                return;
            }
        };

        let patch = match device {
            "humidifier" => DeviceStatePatch::humidifier(echo.status),
            "speaker" => DeviceStatePatch::speaker(echo.status, echo.volume),
            _ => {
                debug!(device, "status echo for unknown device ignored");
                return;
            }
        };

        if let Err(e) = self
            .repository
            .update_device_state(patch, WriteOrigin::Automation)
            .await
        {
            warn!(device, "device status echo not persisted: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wearable::FeedError;
    use async_trait::async_trait;
    use automation::{AutomationSettings, SettingsStore};
    use chrono::TimeZone;
    use device_control::{Actuator, ActuatorCommand, CommandSink, DispatchError};
    use std::sync::Mutex;
    use storage::{RepositoryConfig, SwitchState};

    #[derive(Default)]
    struct RecordingSink {
        calls: Mutex<Vec<(Actuator, ActuatorCommand)>>,
    }

    #[async_trait]
    impl CommandSink for RecordingSink {
        async fn send(
            &self,
            actuator: Actuator,
            command: ActuatorCommand,
            _origin: WriteOrigin,
        ) -> Result<(), DispatchError> {
            self.calls.lock().unwrap().push((actuator, command));
            Ok(())
        }
    }

    struct FixedFeed(i32);

    #[async_trait]
    impl HeartRateFeed for FixedFeed {
        async fn resting_heart_rate(&self) -> Result<i32, FeedError> {
            Ok(self.0)
        }
    }

    struct DownFeed;

    #[async_trait]
    impl HeartRateFeed for DownFeed {
        async fn resting_heart_rate(&self) -> Result<i32, FeedError> {
            Err(FeedError::Request("connection refused".to_string()))
        }
    }

    fn gateway() -> (IngestGateway, Arc<StateRepository>, Arc<RecordingSink>) {
        let repository = Arc::new(StateRepository::new(RepositoryConfig::default()));
        let sink = Arc::new(RecordingSink::default());
        let controller = Arc::new(AutomationController::new(
            Arc::clone(&repository),
            Arc::new(SettingsStore::new(AutomationSettings::default())),
            Arc::clone(&sink) as Arc<dyn CommandSink>,
        ));
        let gateway = IngestGateway::new(Arc::clone(&repository), controller);
        (gateway, repository, sink)
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_humidity_message_records_and_triggers_automation() {
        let (gateway, repository, sink) = gateway();

        gateway
            .handle_message("sensors/sleep/humidity", b"35.0", at(23))
            .await;

        let reading = repository.current_reading().await;
        assert_eq!(reading.humidity, 35.0);
        assert_eq!(reading.timestamp, at(23));
        // 35 < default threshold 40: automation ran and asked for the
        // humidifier; both channels evaluated.
        let calls = sink.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[0],
            (Actuator::Humidifier, ActuatorCommand::on())
        );
    }

    #[tokio::test]
    async fn test_heart_rate_message_merges_last_humidity() {
        let (gateway, repository, _sink) = gateway();

        gateway
            .handle_message("sensors/sleep/humidity", b"52.5", at(22))
            .await;
        gateway
            .handle_message("sensors/sleep/heartrate", br#"{"value": 72}"#, at(23))
            .await;

        let reading = repository.current_reading().await;
        assert_eq!(reading.humidity, 52.5);
        assert_eq!(reading.heart_rate, 72);
        assert_eq!(repository.history_len(), 2);
    }

    #[tokio::test]
    async fn test_non_numeric_payload_dropped_without_mutation() {
        let (gateway, repository, sink) = gateway();

        gateway
            .handle_message("sensors/sleep/humidity", b"soggy", at(23))
            .await;

        assert_eq!(repository.history_len(), 0);
        assert!(sink.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_out_of_range_payload_dropped_without_mutation() {
        let (gateway, repository, sink) = gateway();

        gateway
            .handle_message("sensors/sleep/humidity", b"140.0", at(23))
            .await;

        assert_eq!(repository.history_len(), 0);
        assert!(sink.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_topic_ignored() {
        let (gateway, repository, sink) = gateway();

        gateway
            .handle_message("sensors/sleep/pressure", b"1013", at(23))
            .await;

        assert_eq!(repository.history_len(), 0);
        assert!(sink.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_temperature_recognized_but_not_recorded() {
        let (gateway, repository, sink) = gateway();

        gateway
            .handle_message("sensors/sleep/temperature", b"21.5", at(23))
            .await;

        assert_eq!(repository.history_len(), 0);
        assert!(sink.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_device_echo_merges_device_state() {
        let (gateway, repository, _sink) = gateway();

        gateway
            .handle_message(
                "device/status/speaker",
                br#"{"status": "on", "volume": 35}"#,
                at(23),
            )
            .await;

        let state = repository.current_device_state().await;
        assert_eq!(state.speaker, SwitchState::On);
        assert_eq!(state.volume, 35);
        assert_eq!(state.humidifier, SwitchState::Off);
    }

    #[tokio::test]
    async fn test_wearable_feed_supplies_heart_rate() {
        let (gateway, repository, _sink) = gateway();
        let gateway = gateway.with_feed(Arc::new(FixedFeed(58)));

        gateway
            .handle_message("sensors/sleep/humidity", b"48.0", at(23))
            .await;

        let reading = repository.current_reading().await;
        assert_eq!(reading.heart_rate, 58);
    }

    #[tokio::test]
    async fn test_wearable_feed_failure_falls_back_to_last_known() {
        let (gateway, repository, _sink) = gateway();

        gateway
            .handle_message("sensors/sleep/heartrate", b"66", at(22))
            .await;

        let gateway = gateway.with_feed(Arc::new(DownFeed));
        gateway
            .handle_message("sensors/sleep/humidity", b"48.0", at(23))
            .await;

        let reading = repository.current_reading().await;
        assert_eq!(reading.humidity, 48.0);
        assert_eq!(reading.heart_rate, 66);
    }
}
