//! Automation Controller
//!
//! Level-triggered evaluation of the two actuator channels. Every trigger
//! recomputes desired state from scratch against the latest reading and
//! settings; there is no edge detection or latched state. Dispatch failures
//! are logged per channel and never propagate to the trigger source.

use crate::settings::SettingsStore;
use device_control::{Actuator, ActuatorCommand, CommandSink};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use storage::{StateRepository, WriteOrigin};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Whether an evaluation re-sends a command equal to the last dispatched
/// one. The default re-asserts unconditionally so a device that missed a
/// command self-heals on the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedispatchPolicy {
    #[default]
    Always,
    OnChange,
}

#[derive(Default)]
struct LastDispatched {
    humidifier: Option<ActuatorCommand>,
    speaker: Option<ActuatorCommand>,
}

/// Threshold-evaluation loop producing actuator commands.
pub struct AutomationController {
    repository: Arc<StateRepository>,
    settings: Arc<SettingsStore>,
    sink: Arc<dyn CommandSink>,
    policy: RedispatchPolicy,
    last_dispatched: Mutex<LastDispatched>,
}

impl AutomationController {
    pub fn new(
        repository: Arc<StateRepository>,
        settings: Arc<SettingsStore>,
        sink: Arc<dyn CommandSink>,
    ) -> Self {
        Self {
            repository,
            settings,
            sink,
            policy: RedispatchPolicy::default(),
            last_dispatched: Mutex::new(LastDispatched::default()),
        }
    }

    pub fn with_policy(mut self, policy: RedispatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Evaluate both channels against the current reading and dispatch the
    /// desired commands. A no-op while automation is disabled. Concurrent
    /// evaluations are tolerated; stale dispatches resolve last-write-wins
    /// on the device state.
    pub async fn evaluate(&self) {
        let settings = self.settings.snapshot();
        if !settings.enabled {
            debug!("automation disabled, skipping evaluation");
            return;
        }

        let reading = self.repository.current_reading().await;
        let device = self.repository.current_device_state().await;

        let humidifier = if reading.humidity < settings.humidity_threshold {
            ActuatorCommand::on()
        } else {
            ActuatorCommand::off()
        };

        // The speaker carries the current/last-known volume when turning on.
        let speaker = if reading.heart_rate > settings.heart_rate_threshold {
            ActuatorCommand::speaker_on(device.volume)
        } else {
            ActuatorCommand::off()
        };

        // A failure on one channel never blocks the other.
        self.dispatch(Actuator::Humidifier, humidifier).await;
        self.dispatch(Actuator::Speaker, speaker).await;
    }

    async fn dispatch(&self, actuator: Actuator, command: ActuatorCommand) {
        if self.policy == RedispatchPolicy::OnChange {
            let last = self
                .last_dispatched
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let previous = match actuator {
                Actuator::Humidifier => last.humidifier,
                Actuator::Speaker => last.speaker,
            };
            if previous == Some(command) {
                debug!(device = actuator.name(), "desired state unchanged, skipping");
                return;
            }
        }

        match self
            .sink
            .send(actuator, command, WriteOrigin::Automation)
            .await
        {
            Ok(()) => {
                let mut last = self
                    .last_dispatched
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                match actuator {
                    Actuator::Humidifier => last.humidifier = Some(command),
                    Actuator::Speaker => last.speaker = Some(command),
                }
            }
            Err(e) => {
                warn!(device = actuator.name(), "command dispatch failed: {e}");
            }
        }
    }

    /// Periodic trigger loop. Evaluates on every tick until the shutdown
    /// signal flips, then exits cleanly releasing the timer.
    pub async fn run_periodic(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(
            interval_secs = interval.as_secs(),
            "starting periodic automation trigger"
        );
        let mut ticker = tokio::time::interval(interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.evaluate().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("periodic automation trigger stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::AutomationSettings;
    use async_trait::async_trait;
    use chrono::Utc;
    use device_control::DispatchError;
    use storage::{
        DeviceStatePatch, RepositoryConfig, SensorReading, SwitchState,
    };

    /// Sink that records invocations instead of reaching a device.
    #[derive(Default)]
    struct RecordingSink {
        calls: Mutex<Vec<(Actuator, ActuatorCommand)>>,
        fail_humidifier: bool,
    }

    #[async_trait]
    impl CommandSink for RecordingSink {
        async fn send(
            &self,
            actuator: Actuator,
            command: ActuatorCommand,
            _origin: WriteOrigin,
        ) -> Result<(), DispatchError> {
            if self.fail_humidifier && actuator == Actuator::Humidifier {
                return Err(DispatchError::Publish("broker down".to_string()));
            }
            self.calls.lock().unwrap().push((actuator, command));
            Ok(())
        }
    }

    fn reading(humidity: f64, heart_rate: i32) -> SensorReading {
        SensorReading {
            humidity,
            heart_rate,
            timestamp: Utc::now(),
        }
    }

    fn controller_with(
        sink: Arc<RecordingSink>,
        settings: AutomationSettings,
    ) -> (AutomationController, Arc<StateRepository>) {
        let repository = Arc::new(StateRepository::new(RepositoryConfig::default()));
        let store = Arc::new(SettingsStore::new(settings));
        let controller = AutomationController::new(
            Arc::clone(&repository),
            store,
            sink as Arc<dyn CommandSink>,
        );
        (controller, repository)
    }

    fn sent(sink: &RecordingSink, actuator: Actuator) -> Vec<ActuatorCommand> {
        sink.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(a, _)| *a == actuator)
            .map(|(_, c)| *c)
            .collect()
    }

    #[tokio::test]
    async fn test_disabled_dispatches_nothing() {
        let sink = Arc::new(RecordingSink::default());
        let (controller, repository) = controller_with(
            Arc::clone(&sink),
            AutomationSettings {
                enabled: false,
                ..AutomationSettings::default()
            },
        );
        repository.record_reading(reading(10.0, 120)).unwrap();

        controller.evaluate().await;
        assert!(sink.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_humidifier_threshold() {
        let sink = Arc::new(RecordingSink::default());
        let (controller, repository) =
            controller_with(Arc::clone(&sink), AutomationSettings::default());

        repository.record_reading(reading(35.0, 60)).unwrap();
        controller.evaluate().await;
        assert_eq!(
            sent(&sink, Actuator::Humidifier),
            vec![ActuatorCommand::on()]
        );

        repository.record_reading(reading(45.0, 60)).unwrap();
        controller.evaluate().await;
        assert_eq!(
            sent(&sink, Actuator::Humidifier),
            vec![ActuatorCommand::on(), ActuatorCommand::off()]
        );
    }

    #[tokio::test]
    async fn test_speaker_threshold_carries_volume() {
        let sink = Arc::new(RecordingSink::default());
        let (controller, repository) =
            controller_with(Arc::clone(&sink), AutomationSettings::default());
        repository
            .update_device_state(
                DeviceStatePatch::speaker(SwitchState::Off, Some(45)),
                WriteOrigin::Automation,
            )
            .await
            .unwrap();

        repository.record_reading(reading(50.0, 85)).unwrap();
        controller.evaluate().await;
        assert_eq!(
            sent(&sink, Actuator::Speaker),
            vec![ActuatorCommand::speaker_on(45)]
        );

        repository.record_reading(reading(50.0, 75)).unwrap();
        controller.evaluate().await;
        assert_eq!(
            sent(&sink, Actuator::Speaker),
            vec![ActuatorCommand::speaker_on(45), ActuatorCommand::off()]
        );
    }

    #[tokio::test]
    async fn test_always_policy_reasserts_equal_commands() {
        let sink = Arc::new(RecordingSink::default());
        let (controller, repository) =
            controller_with(Arc::clone(&sink), AutomationSettings::default());
        repository.record_reading(reading(35.0, 60)).unwrap();

        controller.evaluate().await;
        controller.evaluate().await;
        assert_eq!(sent(&sink, Actuator::Humidifier).len(), 2);
    }

    #[tokio::test]
    async fn test_on_change_policy_suppresses_equal_commands() {
        let sink = Arc::new(RecordingSink::default());
        let (controller, repository) =
            controller_with(Arc::clone(&sink), AutomationSettings::default());
        let controller = controller.with_policy(RedispatchPolicy::OnChange);
        repository.record_reading(reading(35.0, 60)).unwrap();

        controller.evaluate().await;
        controller.evaluate().await;
        assert_eq!(sent(&sink, Actuator::Humidifier).len(), 1);

        // A changed desired state goes through again.
        repository.record_reading(reading(45.0, 60)).unwrap();
        controller.evaluate().await;
        assert_eq!(
            sent(&sink, Actuator::Humidifier),
            vec![ActuatorCommand::on(), ActuatorCommand::off()]
        );
    }

    #[tokio::test]
    async fn test_channel_failure_does_not_block_other_channel() {
        let sink = Arc::new(RecordingSink {
            fail_humidifier: true,
            ..RecordingSink::default()
        });
        let (controller, repository) =
            controller_with(Arc::clone(&sink), AutomationSettings::default());
        repository.record_reading(reading(35.0, 85)).unwrap();

        controller.evaluate().await;
        assert!(sent(&sink, Actuator::Humidifier).is_empty());
        assert_eq!(sent(&sink, Actuator::Speaker).len(), 1);
    }

    #[tokio::test]
    async fn test_periodic_trigger_stops_on_shutdown() {
        let sink = Arc::new(RecordingSink::default());
        let (controller, repository) =
            controller_with(Arc::clone(&sink), AutomationSettings::default());
        repository.record_reading(reading(35.0, 60)).unwrap();

        let controller = Arc::new(controller);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(
            Arc::clone(&controller).run_periodic(Duration::from_millis(10), shutdown_rx),
        );

        tokio::time::sleep(Duration::from_millis(35)).await;
        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("periodic trigger did not stop")
            .unwrap();

        assert!(!sink.calls.lock().unwrap().is_empty());
    }
}
