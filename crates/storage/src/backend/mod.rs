//! Durable Backend Abstraction
//!
//! One interface over the interchangeable persistence stores (relational,
//! object bucket). The repository treats every backend as best-effort: a
//! failing or unsupported call degrades to the in-memory cache, which stays
//! authoritative.

mod bucket;
mod relational;

pub use bucket::{BucketBackend, BucketConfig};
pub use relational::{RelationalBackend, RelationalConfig};

use crate::models::{DailyStatistics, DeviceState, ReadingQuery, SensorReading, SleepStatistics};
use async_trait::async_trait;
use thiserror::Error;

/// A durable store or device-shadow call failed or is not applicable.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("backend call timed out after {0}ms")]
    Timeout(u64),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("backend misconfigured: {0}")]
    Configuration(String),

    #[error("operation not supported by this backend")]
    Unsupported,
}

/// A persistence store other than the in-memory cache.
///
/// Readings are append-only; device state lives in a single "latest" slot
/// that is upserted, never inserted twice. Query operations default to
/// [`BackendError::Unsupported`] so stores without server-side filtering
/// fall through to the in-memory history.
#[async_trait]
pub trait DurableBackend: Send + Sync {
    /// Short name used in logs and the health endpoint.
    fn name(&self) -> &'static str;

    async fn append_reading(&self, reading: &SensorReading) -> Result<(), BackendError>;

    /// Most recent reading, if the store has one. Used for cache hydration
    /// after a restart.
    async fn latest_reading(&self) -> Result<Option<SensorReading>, BackendError>;

    /// Upsert the single live device state keyed by the fixed "latest" slot.
    async fn upsert_device_state(&self, state: &DeviceState) -> Result<(), BackendError>;

    async fn device_state(&self) -> Result<Option<DeviceState>, BackendError>;

    /// Server-side filtered history, newest first.
    async fn readings(&self, _query: &ReadingQuery) -> Result<Vec<SensorReading>, BackendError> {
        Err(BackendError::Unsupported)
    }

    /// Server-side aggregate statistics over an optional inclusive range.
    async fn statistics(&self, _query: &ReadingQuery) -> Result<SleepStatistics, BackendError> {
        Err(BackendError::Unsupported)
    }

    /// Server-side daily-bucketed statistics, newest day first.
    async fn daily_statistics(
        &self,
        _query: &ReadingQuery,
    ) -> Result<Vec<DailyStatistics>, BackendError> {
        Err(BackendError::Unsupported)
    }
}
