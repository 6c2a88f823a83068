//! Telemetry Subscriber
//!
//! MQTT poll loop feeding the gateway. Subscriptions are re-issued on every
//! reconnect, broker errors back off instead of crashing the loop, and the
//! shutdown signal exits cleanly releasing the connection.

use crate::gateway::IngestGateway;
use crate::topic::{DEVICE_STATUS_SUBSCRIPTION, TELEMETRY_SUBSCRIPTION};
use chrono::Utc;
use rumqttc::{AsyncClient, Event, EventLoop, Packet, QoS};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);

/// Run the inbound telemetry loop until the shutdown signal flips.
pub async fn run(
    gateway: Arc<IngestGateway>,
    client: AsyncClient,
    mut eventloop: EventLoop,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("starting telemetry subscriber");

    loop {
        tokio::select! {
            event = eventloop.poll() => match event {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    gateway
                        .handle_message(&publish.topic, &publish.payload, Utc::now())
                        .await;
                }
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("mqtt connected");
                    // The broker may have dropped our session; re-subscribe
                    // on every (re)connect.
                    subscribe_all(&client).await;
                }
                Ok(_) => {}
                Err(e) => {
                    error!("mqtt error: {e}");
                    tokio::time::sleep(RECONNECT_BACKOFF).await;
                }
            },
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!("telemetry subscriber stopped");
}

async fn subscribe_all(client: &AsyncClient) {
    for topic in [TELEMETRY_SUBSCRIPTION, DEVICE_STATUS_SUBSCRIPTION] {
        if let Err(e) = client.subscribe(topic, QoS::AtLeastOnce).await {
            error!(topic, "subscribe failed: {e}");
        }
    }
}
