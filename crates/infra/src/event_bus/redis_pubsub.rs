//! Redis pub/sub-backed event bus (optional).
//!
//! Distributes cart change events to every running instance so each one can
//! invalidate its snapshot cache. Redis pub/sub is not durable (messages are
//! dropped if subscribers are offline); the cache TTL covers lost messages,
//! so durability is deliberately not required here.

use std::sync::mpsc;
use std::thread;

use redis::Commands;
use thiserror::Error;
use tracing::{debug, warn};

use storefront_cart::CartChangedEvent;
use storefront_events::{EventBus, Subscription};

/// Channel all instances publish and subscribe on.
pub const CART_EVENTS_CHANNEL: &str = "cart.events";

#[derive(Debug, Error)]
pub enum RedisBusError {
    #[error("redis: {0}")]
    Redis(String),
    #[error("encode cart event: {0}")]
    Serialize(String),
}

impl RedisBusError {
    fn redis(e: redis::RedisError) -> Self {
        Self::Redis(e.to_string())
    }
}

/// Redis pub/sub bus for cart change events.
#[derive(Debug, Clone)]
pub struct RedisPubSubEventBus {
    client: redis::Client,
    channel: String,
}

impl RedisPubSubEventBus {
    pub fn new(
        redis_url: impl AsRef<str>,
        channel: impl Into<String>,
    ) -> Result<Self, RedisBusError> {
        let client = redis::Client::open(redis_url.as_ref()).map_err(RedisBusError::redis)?;
        Ok(Self {
            client,
            channel: channel.into(),
        })
    }
}

impl EventBus<CartChangedEvent> for RedisPubSubEventBus {
    type Error = RedisBusError;

    fn publish(&self, message: CartChangedEvent) -> Result<(), Self::Error> {
        let payload = serde_json::to_string(&message)
            .map_err(|e| RedisBusError::Serialize(e.to_string()))?;

        let mut conn = self.client.get_connection().map_err(RedisBusError::redis)?;

        // PUBLISH returns the receiver count; zero listeners is fine.
        let _: i64 = conn
            .publish(&self.channel, payload)
            .map_err(RedisBusError::redis)?;

        Ok(())
    }

    fn subscribe(&self) -> Subscription<CartChangedEvent> {
        let (tx, rx) = mpsc::channel();

        let client = self.client.clone();
        let channel = self.channel.clone();

        // Forwarding thread; ends when the subscriber drops its end or the
        // connection dies, and a later subscribe starts a fresh one.
        thread::spawn(move || {
            if let Err(e) = forward_messages(&client, &channel, &tx) {
                warn!(error = %e, channel = %channel, "cart event subscription ended");
            }
        });

        Subscription::new(rx)
    }
}

/// Receive loop: decode each payload and hand it to the subscription until
/// the receiving side goes away.
fn forward_messages(
    client: &redis::Client,
    channel: &str,
    tx: &mpsc::Sender<CartChangedEvent>,
) -> Result<(), RedisBusError> {
    let mut conn = client.get_connection().map_err(RedisBusError::redis)?;

    let mut pubsub = conn.as_pubsub();
    pubsub.subscribe(channel).map_err(RedisBusError::redis)?;

    loop {
        let msg = pubsub.get_message().map_err(RedisBusError::redis)?;

        let Ok(payload) = msg.get_payload::<String>() else {
            continue;
        };

        let event: CartChangedEvent = match serde_json::from_str(&payload) {
            Ok(e) => e,
            Err(e) => {
                debug!(error = %e, "skipping undecodable cart event payload");
                continue;
            }
        };

        if tx.send(event).is_err() {
            // Receiver dropped: normal shutdown.
            return Ok(());
        }
    }
}
