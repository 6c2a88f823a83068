//! Application Configuration
//!
//! Typed configuration loaded from an optional `deepsleep.toml` plus
//! `DEEPSLEEP_*` environment overrides (`DEEPSLEEP_MQTT__HOST=...`).
//! Durable backends and the wearable feed are only constructed when their
//! section is present; a missing section means that subsystem runs in
//! degraded memory-only mode.

use automation::RedispatchPolicy;
use config::{Config, ConfigError, Environment, File};
use ingest::WearableConfig;
use serde::Deserialize;
use std::time::Duration;
use storage::{BucketConfig, RelationalConfig, RepositoryConfig, ShadowConfig};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub mqtt: MqttConfig,
    pub repository: RepositorySettings,
    pub automation: AutomationConfig,
    pub database: Option<DatabaseSettings>,
    pub bucket: Option<BucketSettings>,
    pub shadow: Option<ShadowSettings>,
    pub wearable: Option<WearableSettings>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:4000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "deepsleep-hub".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RepositorySettings {
    pub backend_timeout_ms: u64,
    pub history_capacity: usize,
}

impl Default for RepositorySettings {
    fn default() -> Self {
        let defaults = RepositoryConfig::default();
        Self {
            backend_timeout_ms: defaults.backend_timeout.as_millis() as u64,
            history_capacity: defaults.history_capacity,
        }
    }
}

impl RepositorySettings {
    pub fn repository_config(&self) -> RepositoryConfig {
        RepositoryConfig {
            backend_timeout: Duration::from_millis(self.backend_timeout_ms),
            history_capacity: self.history_capacity,
        }
    }
}

/// Which transport carries actuator commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Mqtt,
    Shadow,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    /// Optional periodic trigger; absent means reading-driven only.
    pub poll_interval_secs: Option<u64>,
    pub redispatch: RedispatchPolicy,
    pub transport: TransportKind,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

impl DatabaseSettings {
    pub fn relational_config(&self) -> RelationalConfig {
        RelationalConfig {
            url: self.url.clone(),
            max_connections: self.max_connections,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BucketSettings {
    pub endpoint: String,
    pub bucket: String,
}

impl BucketSettings {
    pub fn bucket_config(&self, timeout: Duration) -> BucketConfig {
        BucketConfig {
            endpoint: self.endpoint.clone(),
            bucket: self.bucket.clone(),
            request_timeout: timeout,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShadowSettings {
    pub endpoint: String,
    pub thing_name: String,
}

impl ShadowSettings {
    pub fn shadow_config(&self, timeout: Duration) -> ShadowConfig {
        ShadowConfig {
            endpoint: self.endpoint.clone(),
            thing_name: self.thing_name.clone(),
            request_timeout: timeout,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WearableSettings {
    #[serde(default = "default_wearable_api_base")]
    pub api_base: String,
    pub access_token: String,
}

fn default_wearable_api_base() -> String {
    WearableConfig::default().api_base
}

impl WearableSettings {
    pub fn wearable_config(&self, timeout: Duration) -> WearableConfig {
        WearableConfig {
            api_base: self.api_base.clone(),
            access_token: self.access_token.clone(),
            request_timeout: timeout,
        }
    }
}

/// Load configuration from `deepsleep.toml` (optional) and the environment.
pub fn load() -> Result<AppConfig, ConfigError> {
    Config::builder()
        .add_source(File::with_name("deepsleep").required(false))
        .add_source(Environment::with_prefix("DEEPSLEEP").separator("__"))
        .build()?
        .try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_any_source() {
        let config = AppConfig::default();
        assert_eq!(config.http.bind, "0.0.0.0:4000");
        assert_eq!(config.mqtt.port, 1883);
        assert!(config.database.is_none());
        assert!(config.automation.poll_interval_secs.is_none());
        assert_eq!(config.automation.redispatch, RedispatchPolicy::Always);
        assert_eq!(config.automation.transport, TransportKind::Mqtt);
    }

    #[test]
    fn test_deserialize_partial_toml() {
        let config: AppConfig = Config::builder()
            .add_source(config::File::from_str(
                r#"
                [mqtt]
                host = "broker.local"

                [automation]
                poll_interval_secs = 60
                redispatch = "onchange"

                [database]
                url = "mysql://hub@db.local/deepsleep"
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.mqtt.host, "broker.local");
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.automation.poll_interval_secs, Some(60));
        assert_eq!(config.automation.redispatch, RedispatchPolicy::OnChange);
        let database = config.database.unwrap();
        assert_eq!(database.max_connections, 5);
    }
}
