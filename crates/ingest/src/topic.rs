//! Topic Classification & Payload Parsing
//!
//! Inbound messages carry either a metric on `sensors/sleep/{metric}` or a
//! device status echo on `device/status/{device}`. Metric payloads may be a
//! bare number, a numeric string, or `{"value": n}`; anything else is a
//! validation error the gateway logs and drops.

use serde_json::Value;
use storage::{SwitchState, ValidationError};

/// Wildcard subscription covering the sensor metrics.
pub const TELEMETRY_SUBSCRIPTION: &str = "sensors/sleep/+";

/// Wildcard subscription covering device status echoes.
pub const DEVICE_STATUS_SUBSCRIPTION: &str = "device/status/+";

/// Recognized inbound channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Channel {
    Humidity,
    HeartRate,
    Temperature,
    /// Status echo for the named device.
    DeviceStatus(String),
}

/// Classify a topic against the fixed channel set. `None` means the topic
/// is unrecognized and should be ignored.
pub fn classify(topic: &str) -> Option<Channel> {
    match topic {
        "sensors/sleep/humidity" => Some(Channel::Humidity),
        "sensors/sleep/heartrate" => Some(Channel::HeartRate),
        "sensors/sleep/temperature" => Some(Channel::Temperature),
        _ => topic
            .strip_prefix("device/status/")
            .filter(|device| !device.is_empty() && !device.contains('/'))
            .map(|device| Channel::DeviceStatus(device.to_string())),
    }
}

/// Parse a metric payload: bare scalar, numeric string, or `{"value": n}`.
pub fn parse_numeric(payload: &[u8]) -> Result<f64, ValidationError> {
    let text = std::str::from_utf8(payload)
        .map_err(|_| ValidationError::NotNumeric("<non-utf8 payload>".to_string()))?;
    let trimmed = text.trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if let Some(number) = extract_number(&value) {
            return Ok(number);
        }
        return Err(ValidationError::NotNumeric(preview(trimmed)));
    }

    // Raw sensor firmware sometimes sends an unquoted numeric string.
    trimmed
        .parse::<f64>()
        .map_err(|_| ValidationError::NotNumeric(preview(trimmed)))
}

fn extract_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        Value::Object(map) => match map.get("value") {
            Some(Value::Number(number)) => number.as_f64(),
            Some(Value::String(text)) => text.trim().parse().ok(),
            _ => None,
        },
        _ => None,
    }
}

/// Device status echo payload: `{"status": "on"|"off", "volume"?: n}` or a
/// bare `on`/`off` token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EchoPayload {
    pub status: SwitchState,
    pub volume: Option<i32>,
}

pub fn parse_device_echo(payload: &[u8]) -> Result<EchoPayload, ValidationError> {
    let text = std::str::from_utf8(payload)
        .map_err(|_| ValidationError::InvalidStatus("<non-utf8 payload>".to_string()))?;
    let trimmed = text.trim();

    if let Some(status) = SwitchState::parse(trimmed) {
        return Ok(EchoPayload {
            status,
            volume: None,
        });
    }

    let value: Value = serde_json::from_str(trimmed)
        .map_err(|_| ValidationError::InvalidStatus(preview(trimmed)))?;

    match value {
        Value::String(text) => SwitchState::parse(&text)
            .map(|status| EchoPayload {
                status,
                volume: None,
            })
            .ok_or(ValidationError::InvalidStatus(text)),
        Value::Object(map) => {
            let status = map
                .get("status")
                .and_then(Value::as_str)
                .ok_or(ValidationError::MissingField("status"))?;
            let status = SwitchState::parse(status)
                .ok_or_else(|| ValidationError::InvalidStatus(status.to_string()))?;
            let volume = map.get("volume").and_then(Value::as_i64).map(|v| v as i32);
            Ok(EchoPayload { status, volume })
        }
        _ => Err(ValidationError::InvalidStatus(preview(trimmed))),
    }
}

fn preview(text: &str) -> String {
    const MAX: usize = 64;
    if text.len() <= MAX {
        text.to_string()
    } else {
        let mut end = MAX;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &text[..end])
    }
}
