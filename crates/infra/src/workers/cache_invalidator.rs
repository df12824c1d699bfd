//! Snapshot-cache invalidation driven by cart change events.
//!
//! After every committed mutation the service publishes a `CartChangedEvent`;
//! this worker consumes the stream and drops the affected user's cached
//! snapshot so the next read reprojects from the store. Invalidation is
//! naturally idempotent, which is exactly what the bus's at-least-once
//! delivery requires, and a missed message is covered by the cache TTL.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::debug;

use storefront_cart::CartChangedEvent;
use storefront_events::{EventBus, Subscription};

use crate::read_model::SnapshotCache;

/// Handle to control and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for the worker to stop.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

/// Cache invalidation worker.
///
/// - Subscribes to the cart event bus
/// - Drops the cached snapshot for the event's user
/// - Supports graceful shutdown
#[derive(Debug)]
pub struct CacheInvalidator;

impl CacheInvalidator {
    /// Spawn a worker thread that invalidates cache entries as events arrive.
    ///
    /// Subscribes before returning, so events published after this call are
    /// never missed.
    pub fn spawn<B, K>(name: &'static str, bus: &B, cache: K) -> WorkerHandle
    where
        B: EventBus<CartChangedEvent>,
        K: SnapshotCache + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let sub: Subscription<CartChangedEvent> = bus.subscribe();

        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || worker_loop(name, sub, shutdown_rx, cache))
            .expect("failed to spawn cache invalidator thread");

        WorkerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        }
    }
}

fn worker_loop<K>(
    name: &'static str,
    sub: Subscription<CartChangedEvent>,
    shutdown_rx: mpsc::Receiver<()>,
    cache: K,
) where
    K: SnapshotCache,
{
    let tick = Duration::from_millis(250);

    loop {
        // Shutdown check (non-blocking)
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        match sub.recv_timeout(tick) {
            Ok(event) => {
                debug!(
                    worker = name,
                    user_id = %event.user_id,
                    kind = ?event.kind,
                    "invalidating cart snapshot"
                );
                cache.invalidate(event.user_id);
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => continue,
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
}
