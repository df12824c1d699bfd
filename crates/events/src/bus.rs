//! Event distribution mechanics (pub/sub, transport-agnostic).
//!
//! After a cart commit lands in the store, the resulting change events fan
//! out through this bus to whoever cares - today the cache invalidation
//! worker, tomorrow perhaps an analytics sink. The bus moves messages; it
//! never stores them. The cart store stays the single source of truth.
//!
//! Delivery is **at-least-once** and unordered, and both are fine here:
//! state is committed before anything is published, so a lost or duplicated
//! message can never corrupt a cart. Consumers stay idempotent by
//! construction - dropping a cache key twice equals dropping it once, and a
//! missed message is repaired by the cache TTL.

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

/// Receiving end of a bus subscription.
///
/// Every subscriber gets its own copy of each published message (broadcast
/// semantics). A subscription is single-consumer: hand it to exactly one
/// worker thread and let that thread poll with [`recv_timeout`] so it can
/// interleave shutdown checks.
///
/// [`recv_timeout`]: Subscription::recv_timeout
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Blocks until a message arrives.
    pub fn recv(&self) -> Result<M, std::sync::mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Non-blocking receive.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Waits up to `timeout` for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, std::sync::mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// Publish side of the bus.
///
/// Implementations pick the transport (process-local channels, Redis
/// pub/sub); callers only see `publish` and `subscribe`. `publish` runs
/// after the commit, so publish errors are logged and swallowed by the
/// caller rather than folded into the request outcome.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
