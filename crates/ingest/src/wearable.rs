//! Wearable Heart-Rate Feed
//!
//! Interface-only collaborator for the wearable vendor's resting-heart-rate
//! endpoint. The gateway treats a feed failure as an external-service error
//! and falls back to the last-known heart rate; token acquisition (OAuth
//! exchange) happens outside the hub, which only carries a ready token.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Feed error types.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("no wearable access token configured")]
    MissingToken,

    #[error("feed request failed: {0}")]
    Request(String),

    #[error("unexpected feed response: {0}")]
    Parse(String),
}

/// Source of the wearer's resting heart rate.
#[async_trait]
pub trait HeartRateFeed: Send + Sync {
    async fn resting_heart_rate(&self) -> Result<i32, FeedError>;
}

/// Connection settings for the vendor API.
#[derive(Debug, Clone)]
pub struct WearableConfig {
    /// API base for the authorized user.
    pub api_base: String,
    /// Ready-to-use bearer token.
    pub access_token: String,
    pub request_timeout: Duration,
}

impl Default for WearableConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.fitbit.com/1/user/-".to_string(),
            access_token: String::new(),
            request_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Deserialize)]
struct HeartRateResponse {
    #[serde(rename = "activities-heart")]
    activities_heart: Vec<HeartRateDay>,
}

#[derive(Debug, Deserialize)]
struct HeartRateDay {
    value: HeartRateValue,
}

#[derive(Debug, Deserialize)]
struct HeartRateValue {
    #[serde(rename = "restingHeartRate")]
    resting_heart_rate: Option<i32>,
}

/// HTTP implementation against the vendor's daily heart-rate summary.
pub struct HttpHeartRateFeed {
    client: reqwest::Client,
    api_base: String,
    access_token: String,
}

impl HttpHeartRateFeed {
    pub fn new(config: &WearableConfig) -> Result<Self, FeedError> {
        if config.access_token.is_empty() {
            return Err(FeedError::MissingToken);
        }
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| FeedError::Request(e.to_string()))?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
        })
    }
}

#[async_trait]
impl HeartRateFeed for HttpHeartRateFeed {
    async fn resting_heart_rate(&self) -> Result<i32, FeedError> {
        let url = format!("{}/activities/heart/date/today/1d.json", self.api_base);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| FeedError::Request(e.to_string()))?
            .error_for_status()
            .map_err(|e| FeedError::Request(e.to_string()))?;

        let body: HeartRateResponse = response
            .json()
            .await
            .map_err(|e| FeedError::Parse(e.to_string()))?;

        body.activities_heart
            .first()
            .and_then(|day| day.value.resting_heart_rate)
            .ok_or_else(|| FeedError::Parse("restingHeartRate missing".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_token_rejected_at_construction() {
        let result = HttpHeartRateFeed::new(&WearableConfig::default());
        assert!(matches!(result, Err(FeedError::MissingToken)));
    }

    #[test]
    fn test_response_shape_parses() {
        let json = r#"{
            "activities-heart": [
                { "value": { "restingHeartRate": 58 } }
            ]
        }"#;
        let response: HeartRateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            response.activities_heart[0].value.resting_heart_rate,
            Some(58)
        );
    }
}
