//! Storage Layer
//!
//! Canonical state repository for the sleep-environment hub: the in-memory
//! cache of current sensor/device state, the append-only reading history,
//! and the pluggable durable backends (relational store, object bucket)
//! plus the device-shadow client. The cache is always authoritative; the
//! backends are best-effort mirrors.

pub mod backend;
mod models;
mod repository;
pub mod shadow;
pub mod validate;

pub use backend::{
    BackendError, BucketBackend, BucketConfig, DurableBackend, RelationalBackend, RelationalConfig,
};
pub use models::{
    DailyStatistics, DeviceState, DeviceStatePatch, ReadingQuery, SensorReading,
    SleepQualityRecord, SleepStatistics, SwitchState,
};
pub use repository::{RepositoryConfig, StateRepository, WriteOrigin};
pub use shadow::{ShadowClient, ShadowConfig};
pub use validate::ValidationError;
