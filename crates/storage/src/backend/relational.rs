//! Relational Backend (MySQL)
//!
//! Append-only `sensor_data` table plus a `device_status` table upserted on
//! a fixed "latest" slot. Schema is created at connect time; range queries
//! and statistics are pushed down to SQL so history survives restarts
//! without replaying the in-memory cache.

use crate::backend::{BackendError, DurableBackend};
use crate::models::{DailyStatistics, DeviceState, ReadingQuery, SensorReading, SleepStatistics, SwitchState};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use sqlx::Row;
use tracing::info;

/// Connection settings for the relational store.
#[derive(Debug, Clone)]
pub struct RelationalConfig {
    /// MySQL connection URL.
    pub url: String,
    pub max_connections: u32,
}

impl Default for RelationalConfig {
    fn default() -> Self {
        Self {
            url: "mysql://root@localhost:3306/deepsleep".to_string(),
            max_connections: 5,
        }
    }
}

/// MySQL-backed durable store.
pub struct RelationalBackend {
    pool: MySqlPool,
}

impl RelationalBackend {
    /// Connect and create the schema if it does not exist yet.
    pub async fn connect(config: &RelationalConfig) -> Result<Self, BackendError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .map_err(|e| BackendError::Configuration(format!("mysql connect: {e}")))?;

        let backend = Self { pool };
        backend.initialize_tables().await?;
        info!("relational backend ready");
        Ok(backend)
    }

    async fn initialize_tables(&self) -> Result<(), BackendError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sensor_data (
                id INT AUTO_INCREMENT PRIMARY KEY,
                humidity DOUBLE NOT NULL,
                heart_rate INT NOT NULL,
                recorded_at DATETIME(3) NOT NULL,
                INDEX idx_recorded_at (recorded_at)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(to_backend_error)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS device_status (
                slot VARCHAR(16) PRIMARY KEY,
                humidifier VARCHAR(3) NOT NULL DEFAULT 'off',
                speaker VARCHAR(3) NOT NULL DEFAULT 'off',
                volume INT NOT NULL DEFAULT 0,
                updated_at DATETIME(3) NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(to_backend_error)?;

        Ok(())
    }
}

fn to_backend_error(err: sqlx::Error) -> BackendError {
    BackendError::Unavailable(err.to_string())
}

fn switch_from_column(value: &str) -> SwitchState {
    SwitchState::parse(value).unwrap_or(SwitchState::Off)
}

#[async_trait]
impl DurableBackend for RelationalBackend {
    fn name(&self) -> &'static str {
        "relational"
    }

    async fn append_reading(&self, reading: &SensorReading) -> Result<(), BackendError> {
        sqlx::query("INSERT INTO sensor_data (humidity, heart_rate, recorded_at) VALUES (?, ?, ?)")
            .bind(reading.humidity)
            .bind(reading.heart_rate)
            .bind(reading.timestamp)
            .execute(&self.pool)
            .await
            .map_err(to_backend_error)?;
        Ok(())
    }

    async fn latest_reading(&self) -> Result<Option<SensorReading>, BackendError> {
        let row = sqlx::query(
            "SELECT humidity, heart_rate, recorded_at FROM sensor_data \
             ORDER BY recorded_at DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(to_backend_error)?;

        row.map(|row| {
            Ok(SensorReading {
                humidity: row.try_get("humidity").map_err(to_backend_error)?,
                heart_rate: row.try_get("heart_rate").map_err(to_backend_error)?,
                timestamp: row.try_get("recorded_at").map_err(to_backend_error)?,
            })
        })
        .transpose()
    }

    async fn upsert_device_state(&self, state: &DeviceState) -> Result<(), BackendError> {
        sqlx::query(
            "INSERT INTO device_status (slot, humidifier, speaker, volume, updated_at) \
             VALUES ('latest', ?, ?, ?, ?) \
             ON DUPLICATE KEY UPDATE humidifier = VALUES(humidifier), \
             speaker = VALUES(speaker), volume = VALUES(volume), \
             updated_at = VALUES(updated_at)",
        )
        .bind(state.humidifier.as_str())
        .bind(state.speaker.as_str())
        .bind(state.volume)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(to_backend_error)?;
        Ok(())
    }

    async fn device_state(&self) -> Result<Option<DeviceState>, BackendError> {
        let row = sqlx::query(
            "SELECT humidifier, speaker, volume FROM device_status WHERE slot = 'latest'",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(to_backend_error)?;

        row.map(|row| {
            let humidifier: String = row.try_get("humidifier").map_err(to_backend_error)?;
            let speaker: String = row.try_get("speaker").map_err(to_backend_error)?;
            Ok(DeviceState {
                humidifier: switch_from_column(&humidifier),
                speaker: switch_from_column(&speaker),
                volume: row.try_get("volume").map_err(to_backend_error)?,
            })
        })
        .transpose()
    }

    async fn readings(&self, query: &ReadingQuery) -> Result<Vec<SensorReading>, BackendError> {
        let limit = query.limit.map(|l| l as i64).unwrap_or(i64::MAX);
        let rows = sqlx::query(
            "SELECT humidity, heart_rate, recorded_at FROM sensor_data \
             WHERE (? IS NULL OR recorded_at >= ?) AND (? IS NULL OR recorded_at <= ?) \
             ORDER BY recorded_at DESC LIMIT ?",
        )
        .bind(query.start)
        .bind(query.start)
        .bind(query.end)
        .bind(query.end)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(to_backend_error)?;

        rows.into_iter()
            .map(|row| {
                Ok(SensorReading {
                    humidity: row.try_get("humidity").map_err(to_backend_error)?,
                    heart_rate: row.try_get("heart_rate").map_err(to_backend_error)?,
                    timestamp: row.try_get("recorded_at").map_err(to_backend_error)?,
                })
            })
            .collect()
    }

    async fn statistics(&self, query: &ReadingQuery) -> Result<SleepStatistics, BackendError> {
        let row = sqlx::query(
            "SELECT AVG(humidity) AS avg_humidity, AVG(heart_rate * 1.0) AS avg_heart_rate, \
             MIN(humidity) AS min_humidity, MAX(humidity) AS max_humidity, \
             MIN(heart_rate) AS min_heart_rate, MAX(heart_rate) AS max_heart_rate, \
             COUNT(*) AS count FROM sensor_data \
             WHERE (? IS NULL OR recorded_at >= ?) AND (? IS NULL OR recorded_at <= ?)",
        )
        .bind(query.start)
        .bind(query.start)
        .bind(query.end)
        .bind(query.end)
        .fetch_one(&self.pool)
        .await
        .map_err(to_backend_error)?;

        let count: i64 = row.try_get("count").map_err(to_backend_error)?;
        if count == 0 {
            return Ok(empty_statistics());
        }

        Ok(SleepStatistics {
            avg_humidity: optional_f64(&row, "avg_humidity")?,
            avg_heart_rate: optional_f64(&row, "avg_heart_rate")?,
            min_humidity: optional_f64(&row, "min_humidity")?,
            max_humidity: optional_f64(&row, "max_humidity")?,
            min_heart_rate: optional_i32(&row, "min_heart_rate")?,
            max_heart_rate: optional_i32(&row, "max_heart_rate")?,
            count: count as u64,
        })
    }

    async fn daily_statistics(
        &self,
        query: &ReadingQuery,
    ) -> Result<Vec<DailyStatistics>, BackendError> {
        let limit = query.limit.map(|l| l as i64).unwrap_or(i64::MAX);
        let rows = sqlx::query(
            "SELECT DATE(recorded_at) AS day, \
             AVG(humidity) AS avg_humidity, AVG(heart_rate * 1.0) AS avg_heart_rate, \
             MIN(humidity) AS min_humidity, MAX(humidity) AS max_humidity, \
             MIN(heart_rate) AS min_heart_rate, MAX(heart_rate) AS max_heart_rate, \
             COUNT(*) AS count FROM sensor_data \
             WHERE (? IS NULL OR recorded_at >= ?) AND (? IS NULL OR recorded_at <= ?) \
             GROUP BY DATE(recorded_at) ORDER BY day DESC LIMIT ?",
        )
        .bind(query.start)
        .bind(query.start)
        .bind(query.end)
        .bind(query.end)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(to_backend_error)?;

        rows.into_iter()
            .map(|row| {
                let date: NaiveDate = row.try_get("day").map_err(to_backend_error)?;
                let count: i64 = row.try_get("count").map_err(to_backend_error)?;
                Ok(DailyStatistics {
                    date,
                    avg_humidity: optional_f64(&row, "avg_humidity")?,
                    avg_heart_rate: optional_f64(&row, "avg_heart_rate")?,
                    min_humidity: optional_f64(&row, "min_humidity")?,
                    max_humidity: optional_f64(&row, "max_humidity")?,
                    min_heart_rate: optional_i32(&row, "min_heart_rate")?,
                    max_heart_rate: optional_i32(&row, "max_heart_rate")?,
                    count: count as u64,
                })
            })
            .collect()
    }
}

fn optional_f64(row: &sqlx::mysql::MySqlRow, column: &str) -> Result<f64, BackendError> {
    let value: Option<f64> = row.try_get(column).map_err(to_backend_error)?;
    Ok(value.unwrap_or(0.0))
}

fn optional_i32(row: &sqlx::mysql::MySqlRow, column: &str) -> Result<i32, BackendError> {
    let value: Option<i32> = row.try_get(column).map_err(to_backend_error)?;
    Ok(value.unwrap_or(0))
}

fn empty_statistics() -> SleepStatistics {
    SleepStatistics {
        avg_humidity: 0.0,
        avg_heart_rate: 0.0,
        min_humidity: 0.0,
        max_humidity: 0.0,
        min_heart_rate: 0,
        max_heart_rate: 0,
        count: 0,
    }
}
