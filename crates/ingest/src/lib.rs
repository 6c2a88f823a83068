//! Ingestion
//!
//! The inbound half of the hub: the MQTT telemetry subscriber, the gateway
//! that demultiplexes and validates messages, and the wearable heart-rate
//! feed consulted when a humidity sample arrives.

mod gateway;
mod subscriber;
mod topic;
mod wearable;

pub use gateway::IngestGateway;
pub use subscriber::run;
pub use topic::{
    classify, parse_device_echo, parse_numeric, Channel, EchoPayload,
    DEVICE_STATUS_SUBSCRIPTION, TELEMETRY_SUBSCRIPTION,
};
pub use wearable::{FeedError, HeartRateFeed, HttpHeartRateFeed, WearableConfig};
