//! State Repository
//!
//! Single source of truth for the current sensor reading, the current device
//! state, and the reading history. The in-memory cache is authoritative;
//! zero or more durable backends mirror it with per-backend failure
//! isolation and a bounded timeout on every call. A single writer process
//! is assumed; concurrent processes sharing one durable backend would need
//! external coordination.

use crate::backend::{BackendError, DurableBackend};
use crate::models::{
    DailyStatistics, DeviceState, DeviceStatePatch, ReadingQuery, SensorReading,
    SleepQualityRecord, SleepStatistics,
};
use crate::shadow::ShadowClient;
use crate::validate::{validate_heart_rate, validate_humidity, ValidationError};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Who initiated a device-state write. Manual writes are awaited so the
/// caller gets an accurate success/failure signal; automation writes are
/// fire-and-forget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOrigin {
    Manual,
    Automation,
}

/// Repository tunables.
#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    /// Bound on every durable-backend and shadow call. A timeout is treated
    /// as a failed call; no retry is scheduled.
    pub backend_timeout: Duration,
    /// In-memory history retention.
    pub history_capacity: usize,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            backend_timeout: Duration::from_secs(5),
            history_capacity: 10_000,
        }
    }
}

struct Cache {
    current_reading: Option<SensorReading>,
    device_state: Option<DeviceState>,
    history: VecDeque<SensorReading>,
}

/// Canonical current state plus append-only history, mirrored into the
/// configured durable backends.
pub struct StateRepository {
    cache: RwLock<Cache>,
    /// Fixed preference order, most durable first.
    backends: Vec<Arc<dyn DurableBackend>>,
    shadow: Option<Arc<ShadowClient>>,
    reading_hydration_done: AtomicBool,
    config: RepositoryConfig,
}

impl StateRepository {
    pub fn new(config: RepositoryConfig) -> Self {
        info!(
            timeout_ms = config.backend_timeout.as_millis() as u64,
            history_capacity = config.history_capacity,
            "creating state repository"
        );
        Self {
            cache: RwLock::new(Cache {
                current_reading: None,
                device_state: None,
                history: VecDeque::new(),
            }),
            backends: Vec::new(),
            shadow: None,
            reading_hydration_done: AtomicBool::new(false),
            config,
        }
    }

    /// Append a durable backend. Order of calls is the preference order for
    /// reads; writes go to all backends independently.
    pub fn with_backend(mut self, backend: Arc<dyn DurableBackend>) -> Self {
        info!(backend = backend.name(), "durable backend attached");
        self.backends.push(backend);
        self
    }

    pub fn with_shadow(mut self, shadow: Arc<ShadowClient>) -> Self {
        self.shadow = Some(shadow);
        self
    }

    /// Names of the attached durable backends, in preference order.
    pub fn backend_names(&self) -> Vec<&'static str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    pub fn history_len(&self) -> usize {
        self.cache_read().history.len()
    }

    fn cache_read(&self) -> RwLockReadGuard<'_, Cache> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn cache_write(&self) -> RwLockWriteGuard<'_, Cache> {
        self.cache.write().unwrap_or_else(PoisonError::into_inner)
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, BackendError>>,
    ) -> Result<T, BackendError> {
        bounded_call(self.config.backend_timeout, call).await
    }

    /// Current reading from the cache. On the first call after a restart the
    /// repository tries once to hydrate from the backends in preference
    /// order; with nothing recorded anywhere it returns the zero reading.
    pub async fn current_reading(&self) -> SensorReading {
        if let Some(reading) = self.cache_read().current_reading {
            return reading;
        }

        if self.reading_hydration_done.swap(true, Ordering::SeqCst) {
            return SensorReading::zero();
        }

        for backend in &self.backends {
            match self.bounded(backend.latest_reading()).await {
                Ok(Some(reading)) => {
                    debug!(backend = backend.name(), "hydrated current reading");
                    // A reading recorded while we were hydrating wins.
                    return *self.cache_write().current_reading.get_or_insert(reading);
                }
                Ok(None) => {}
                Err(e) => warn!(backend = backend.name(), "reading hydration failed: {e}"),
            }
        }

        SensorReading::zero()
    }

    /// Validate and record a reading: cache and history update synchronously,
    /// durable appends are issued fire-and-forget. A durable-write failure is
    /// logged and otherwise invisible to the caller.
    pub fn record_reading(&self, reading: SensorReading) -> Result<(), ValidationError> {
        validate_humidity(reading.humidity)?;
        validate_heart_rate(reading.heart_rate)?;

        {
            let mut cache = self.cache_write();
            cache.current_reading = Some(reading);
            while cache.history.len() >= self.config.history_capacity {
                cache.history.pop_front();
            }
            cache.history.push_back(reading);
        }
        self.reading_hydration_done.store(true, Ordering::SeqCst);

        for backend in &self.backends {
            let backend = Arc::clone(backend);
            let timeout = self.config.backend_timeout;
            tokio::spawn(async move {
                if let Err(e) = bounded_call(timeout, backend.append_reading(&reading)).await {
                    warn!(backend = backend.name(), "durable reading append failed: {e}");
                }
            });
        }

        Ok(())
    }

    /// Current device state from the cache. An empty cache is hydrated from
    /// the shadow first, then the durable backends in order, stopping at the
    /// first success; with nothing anywhere the defaults apply.
    pub async fn current_device_state(&self) -> DeviceState {
        if let Some(state) = self.cache_read().device_state {
            return state;
        }

        if let Some(shadow) = &self.shadow {
            match self.bounded(shadow.device_state()).await {
                Ok(Some(state)) => {
                    debug!("hydrated device state from shadow");
                    return self.store_hydrated_device_state(state);
                }
                Ok(None) => {}
                Err(e) => warn!("shadow device-state hydration failed: {e}"),
            }
        }

        for backend in &self.backends {
            match self.bounded(backend.device_state()).await {
                Ok(Some(state)) => {
                    debug!(backend = backend.name(), "hydrated device state");
                    return self.store_hydrated_device_state(state);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(backend = backend.name(), "device-state hydration failed: {e}")
                }
            }
        }

        DeviceState::default()
    }

    fn store_hydrated_device_state(&self, state: DeviceState) -> DeviceState {
        // A concurrent update that landed first wins.
        *self.cache_write().device_state.get_or_insert(state)
    }

    /// Merge a patch into the cached device state (last writer wins), then
    /// upsert the merged state into the durable backends keyed by the fixed
    /// "latest" slot. Manual writes await every backend and surface the
    /// first failure; the cache keeps the merged state either way.
    pub async fn update_device_state(
        &self,
        patch: DeviceStatePatch,
        origin: WriteOrigin,
    ) -> Result<DeviceState, BackendError> {
        let merged = {
            let mut cache = self.cache_write();
            let state = cache.device_state.get_or_insert_with(DeviceState::default);
            patch.apply(state);
            *state
        };

        match origin {
            WriteOrigin::Manual => {
                let mut first_error = None;
                for backend in &self.backends {
                    if let Err(e) = self.bounded(backend.upsert_device_state(&merged)).await {
                        warn!(backend = backend.name(), "device-state upsert failed: {e}");
                        first_error.get_or_insert(e);
                    }
                }
                match first_error {
                    None => Ok(merged),
                    Some(e) => Err(e),
                }
            }
            WriteOrigin::Automation => {
                for backend in &self.backends {
                    let backend = Arc::clone(backend);
                    let timeout = self.config.backend_timeout;
                    tokio::spawn(async move {
                        if let Err(e) =
                            bounded_call(timeout, backend.upsert_device_state(&merged)).await
                        {
                            warn!(
                                backend = backend.name(),
                                "device-state upsert failed: {e}"
                            );
                        }
                    });
                }
                Ok(merged)
            }
        }
    }

    /// History filtered to the inclusive range, newest first, truncated to
    /// the `limit` most recent. The first backend with query support wins;
    /// otherwise the in-memory history is filtered.
    pub async fn historical_readings(&self, query: ReadingQuery) -> Vec<SensorReading> {
        for backend in &self.backends {
            match self.bounded(backend.readings(&query)).await {
                Ok(readings) => return readings,
                Err(BackendError::Unsupported) => {
                    debug!(backend = backend.name(), "readings query unsupported")
                }
                Err(e) => warn!(backend = backend.name(), "readings query failed: {e}"),
            }
        }
        self.readings_from_memory(&query)
    }

    /// Sleep-quality view of the history, derived through the scorer.
    pub async fn sleep_quality_records(&self, query: ReadingQuery) -> Vec<SleepQualityRecord> {
        self.historical_readings(query)
            .await
            .into_iter()
            .map(|reading| SleepQualityRecord {
                date: reading.timestamp,
                average_humidity: reading.humidity,
                average_heart_rate: reading.heart_rate,
                quality_score: scorer::sleep_quality(reading.humidity, reading.heart_rate),
            })
            .collect()
    }

    /// Aggregate statistics over an optional inclusive range, delegated to
    /// the first backend with aggregation support, else computed in memory.
    pub async fn statistics(&self, query: ReadingQuery) -> SleepStatistics {
        for backend in &self.backends {
            match self.bounded(backend.statistics(&query)).await {
                Ok(statistics) => return statistics,
                Err(BackendError::Unsupported) => {
                    debug!(backend = backend.name(), "statistics unsupported")
                }
                Err(e) => warn!(backend = backend.name(), "statistics query failed: {e}"),
            }
        }
        compute_statistics(&self.readings_from_memory(&ReadingQuery {
            limit: None,
            ..query
        }))
    }

    /// Daily-bucketed statistics, newest day first.
    pub async fn daily_statistics(&self, query: ReadingQuery) -> Vec<DailyStatistics> {
        for backend in &self.backends {
            match self.bounded(backend.daily_statistics(&query)).await {
                Ok(daily) => return daily,
                Err(BackendError::Unsupported) => {
                    debug!(backend = backend.name(), "daily statistics unsupported")
                }
                Err(e) => {
                    warn!(backend = backend.name(), "daily statistics query failed: {e}")
                }
            }
        }
        self.daily_statistics_from_memory(&query)
    }

    fn readings_from_memory(&self, query: &ReadingQuery) -> Vec<SensorReading> {
        let cache = self.cache_read();
        let mut readings: Vec<SensorReading> = cache
            .history
            .iter()
            .rev()
            .filter(|reading| query.matches(reading.timestamp))
            .copied()
            .collect();
        if let Some(limit) = query.limit {
            readings.truncate(limit);
        }
        readings
    }

    fn daily_statistics_from_memory(&self, query: &ReadingQuery) -> Vec<DailyStatistics> {
        let mut buckets: BTreeMap<NaiveDate, Vec<SensorReading>> = BTreeMap::new();
        for reading in self.readings_from_memory(&ReadingQuery {
            limit: None,
            ..*query
        }) {
            buckets
                .entry(reading.timestamp.date_naive())
                .or_default()
                .push(reading);
        }

        let mut daily: Vec<DailyStatistics> = buckets
            .into_iter()
            .rev()
            .map(|(date, readings)| {
                let stats = compute_statistics(&readings);
                DailyStatistics {
                    date,
                    avg_humidity: stats.avg_humidity,
                    avg_heart_rate: stats.avg_heart_rate,
                    min_humidity: stats.min_humidity,
                    max_humidity: stats.max_humidity,
                    min_heart_rate: stats.min_heart_rate,
                    max_heart_rate: stats.max_heart_rate,
                    count: stats.count,
                }
            })
            .collect();
        if let Some(limit) = query.limit {
            daily.truncate(limit);
        }
        daily
    }
}

async fn bounded_call<T>(
    timeout: Duration,
    call: impl Future<Output = Result<T, BackendError>>,
) -> Result<T, BackendError> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(BackendError::Timeout(timeout.as_millis() as u64)),
    }
}

fn compute_statistics(readings: &[SensorReading]) -> SleepStatistics {
    if readings.is_empty() {
        return SleepStatistics {
            avg_humidity: 0.0,
            avg_heart_rate: 0.0,
            min_humidity: 0.0,
            max_humidity: 0.0,
            min_heart_rate: 0,
            max_heart_rate: 0,
            count: 0,
        };
    }

    let count = readings.len();
    let mut humidity_sum = 0.0;
    let mut heart_rate_sum = 0.0;
    let mut min_humidity = f64::MAX;
    let mut max_humidity = f64::MIN;
    let mut min_heart_rate = i32::MAX;
    let mut max_heart_rate = i32::MIN;

    for reading in readings {
        humidity_sum += reading.humidity;
        heart_rate_sum += f64::from(reading.heart_rate);
        min_humidity = min_humidity.min(reading.humidity);
        max_humidity = max_humidity.max(reading.humidity);
        min_heart_rate = min_heart_rate.min(reading.heart_rate);
        max_heart_rate = max_heart_rate.max(reading.heart_rate);
    }

    SleepStatistics {
        avg_humidity: humidity_sum / count as f64,
        avg_heart_rate: heart_rate_sum / count as f64,
        min_humidity,
        max_humidity,
        min_heart_rate,
        max_heart_rate,
        count: count as u64,
    }
}
