//! Object Bucket Backend
//!
//! JSON documents in an S3-style HTTP bucket. Each reading is appended under
//! a unique `readings/` key, and fixed keys hold the latest reading and the
//! device state so hydration is a single GET. The bucket has no query
//! engine, so history/statistics fall through to the in-memory cache.

use crate::backend::{BackendError, DurableBackend};
use crate::models::{DeviceState, SensorReading};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

const LATEST_READING_KEY: &str = "state/current-reading.json";
const DEVICE_STATE_KEY: &str = "state/device-status.json";

/// Connection settings for the object bucket.
#[derive(Debug, Clone)]
pub struct BucketConfig {
    /// Base URL of the bucket endpoint, e.g. `https://bucket.example.com`.
    pub endpoint: String,
    /// Bucket name appended to the endpoint.
    pub bucket: String,
    pub request_timeout: Duration,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9000".to_string(),
            bucket: "deepsleep-data".to_string(),
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// HTTP object-store backend.
pub struct BucketBackend {
    client: reqwest::Client,
    base_url: String,
}

impl BucketBackend {
    pub fn new(config: &BucketConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| BackendError::Configuration(format!("http client: {e}")))?;

        let base_url = format!(
            "{}/{}",
            config.endpoint.trim_end_matches('/'),
            config.bucket
        );
        info!(bucket = %base_url, "bucket backend ready");
        Ok(Self { client, base_url })
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }

    async fn put_object<T: Serialize>(&self, key: &str, value: &T) -> Result<(), BackendError> {
        self.client
            .put(self.object_url(key))
            .json(value)
            .send()
            .await
            .map_err(|e| BackendError::Unavailable(e.to_string()))?
            .error_for_status()
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;
        Ok(())
    }

    /// GET an object; a 404 means the key has never been written.
    async fn get_object<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, BackendError> {
        let response = self
            .client
            .get(self.object_url(key))
            .send()
            .await
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = response
            .error_for_status()
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;

        let value = response
            .json::<T>()
            .await
            .map_err(|e| BackendError::Serialization(e.to_string()))?;
        Ok(Some(value))
    }
}

#[async_trait]
impl DurableBackend for BucketBackend {
    fn name(&self) -> &'static str {
        "bucket"
    }

    async fn append_reading(&self, reading: &SensorReading) -> Result<(), BackendError> {
        let key = format!(
            "readings/{}-{}.json",
            reading.timestamp.timestamp_millis(),
            Uuid::new_v4()
        );
        self.put_object(&key, reading).await?;
        // Fixed key so the latest reading is one GET away on restart.
        self.put_object(LATEST_READING_KEY, reading).await
    }

    async fn latest_reading(&self) -> Result<Option<SensorReading>, BackendError> {
        self.get_object(LATEST_READING_KEY).await
    }

    async fn upsert_device_state(&self, state: &DeviceState) -> Result<(), BackendError> {
        self.put_object(DEVICE_STATE_KEY, state).await
    }

    async fn device_state(&self) -> Result<Option<DeviceState>, BackendError> {
        self.get_object(DEVICE_STATE_KEY).await
    }
}
