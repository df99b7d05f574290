use std::time::Duration;

use chrono::{DateTime, Utc};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS, SubscribeReasonCode};
use tokio::{task::JoinHandle, time};
use tracing::{error, info, warn};

use super::{
    status::{SubscriberPhase, SubscriberStatus},
    validator::{self, RejectReason},
};
use crate::{
    config::MqttConfig,
    db::{models::NewReading, Store, StoreError},
};

/// Capacity of the request channel between `AsyncClient` and its event loop.
const CLIENT_CHANNEL_CAPACITY: usize = 16;

// ---------------------------------------------------------------------------
// Per-message outcome
// ---------------------------------------------------------------------------

/// What happened to one inbound message. Nothing here is ever propagated out
/// of the subscriber loop; it is logged and the loop moves on.
#[derive(Debug)]
pub enum MessageOutcome {
    Stored { id: i64, reading: NewReading },
    Skipped(SkipReason),
}

#[derive(Debug, thiserror::Error)]
pub enum SkipReason {
    #[error("rejected: {0}")]
    Rejected(#[from] RejectReason),
    #[error("not persisted: {0}")]
    Store(#[from] StoreError),
}

impl MessageOutcome {
    pub fn log(&self, topic: &str) {
        match self {
            MessageOutcome::Stored { id, reading } => info!(
                topic = %topic,
                id = %id,
                temperature = reading.temperature,
                humidity = reading.humidity,
                illuminance = reading.illuminance,
                "Reading stored"
            ),
            MessageOutcome::Skipped(reason @ SkipReason::Rejected(_)) => {
                warn!(topic = %topic, reason = %reason, "Message skipped")
            }
            MessageOutcome::Skipped(reason @ SkipReason::Store(_)) => {
                error!(topic = %topic, reason = %reason, "Message skipped")
            }
        }
    }
}

/// Validates `payload` and, if it holds a complete reading, inserts it
/// stamped with `received_at`.
pub async fn ingest_payload(
    store: &Store,
    payload: &[u8],
    received_at: DateTime<Utc>,
) -> MessageOutcome {
    let measurement = match validator::validate(payload) {
        Ok(m) => m,
        Err(reason) => return MessageOutcome::Skipped(reason.into()),
    };

    let reading = NewReading {
        temperature: measurement.temperature,
        humidity: measurement.humidity,
        illuminance: measurement.illuminance,
        recorded_at: received_at,
    };

    match store.insert(&reading).await {
        Ok(id) => MessageOutcome::Stored { id, reading },
        Err(e) => MessageOutcome::Skipped(e.into()),
    }
}

// ---------------------------------------------------------------------------
// Subscriber
// ---------------------------------------------------------------------------

pub struct IngestionSubscriber {
    store: Store,
    options: MqttOptions,
    topic: String,
    qos: QoS,
    reconnect_delay: Duration,
    status: SubscriberStatus,
}

impl IngestionSubscriber {
    pub fn new(store: Store, config: &MqttConfig, status: SubscriberStatus) -> Self {
        Self {
            store,
            options: config.mqtt_options(),
            topic: config.topic.clone(),
            qos: config.qos,
            reconnect_delay: config.reconnect_delay(),
            status,
        }
    }

    /// Runs the subscription indefinitely, reconnecting after every broker
    /// failure. Messages are handled one at a time in arrival order.
    /// Spawn this via [`SubscriberHandle::spawn`].
    pub async fn run(self) {
        let _running = self.status.enter();
        let (host, port) = self.options.broker_address();
        info!(host = %host, port = port, topic = %self.topic, "Ingestion subscriber started");

        let (client, mut eventloop) = AsyncClient::new(self.options.clone(), CLIENT_CHANNEL_CAPACITY);
        self.status.set(SubscriberPhase::Connecting);

        loop {
            match eventloop.poll().await {
                // Clean sessions forget subscriptions, so subscribe on every
                // successful (re)connect.
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!(host = %host, port = port, "Connected to MQTT broker");
                    if let Err(e) = client.subscribe(self.topic.as_str(), self.qos).await {
                        error!(topic = %self.topic, error = %e, "Subscribe request failed");
                    }
                }
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    let granted = ack
                        .return_codes
                        .iter()
                        .all(|code| matches!(code, SubscribeReasonCode::Success(_)));
                    if granted {
                        info!(topic = %self.topic, "Subscribed");
                        self.status.set(SubscriberPhase::Subscribed);
                    } else {
                        error!(topic = %self.topic, codes = ?ack.return_codes, "Broker refused the subscription");
                    }
                }
                Ok(Event::Incoming(Packet::Publish(msg))) => {
                    let outcome = ingest_payload(&self.store, &msg.payload, Utc::now()).await;
                    outcome.log(&msg.topic);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(
                        error = %e,
                        retry_in_secs = self.reconnect_delay.as_secs_f64(),
                        "MQTT connection lost"
                    );
                    self.status.set(SubscriberPhase::Disconnected);
                    time::sleep(self.reconnect_delay).await;
                    self.status.set(SubscriberPhase::Connecting);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Owns the background subscriber task for the lifetime of the process.
pub struct SubscriberHandle {
    task: JoinHandle<()>,
    status: SubscriberStatus,
}

impl SubscriberHandle {
    pub fn spawn(subscriber: IngestionSubscriber) -> Self {
        let status = subscriber.status.clone();
        let task = tokio::spawn(subscriber.run());
        Self { task, status }
    }

    pub fn status(&self) -> SubscriberStatus {
        self.status.clone()
    }

    /// Best-effort stop. A message being persisted at this moment may or may
    /// not make it to the store.
    pub async fn shutdown(self) {
        self.task.abort();
        match self.task.await {
            Err(e) if e.is_panic() => error!(error = %e, "Ingestion subscriber panicked"),
            _ => info!("Ingestion subscriber stopped"),
        }
    }
}
