//! Connection notifier port and an in-process hub implementation
//!
//! The broadcaster only needs three things from the transport: whether a
//! connection exists, a callback when one is established, and a way to push
//! bytes to every peer. `ConnectionHub` provides those over a tokio broadcast
//! channel so a real transport can drain frames without implementing the
//! trait itself.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::contracts::{ConnectionEvent, SubscriptionId};

/// Callback invoked once per established connection
///
/// Called on whatever thread the notifier raises events from, so it must
/// return quickly.
pub type ConnectedHandler = Arc<dyn Fn(ConnectionEvent) + Send + Sync>;

/// Port for the transport/connection manager
///
/// Implementations own the thread safety of their subscription list.
pub trait ConnectionNotifier: Send + Sync {
    /// Whether at least one connection currently exists
    fn is_connected(&self) -> bool;

    /// Register a connection-established handler
    fn subscribe(&self, handler: ConnectedHandler) -> SubscriptionId;

    /// Remove a handler. Returns false if the id was not registered.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;

    /// Transmit `length` bytes of `bytes` starting at `offset` to all peers
    ///
    /// Fire-and-forget: delivery failures are the notifier's concern.
    fn broadcast(&self, bytes: &[u8], offset: usize, length: usize);
}

/// In-process connection notifier
///
/// The transport calls `connection_established` / `connection_lost` as peers
/// come and go, and drains outbound frames from `outbound()`.
pub struct ConnectionHub {
    handlers: Mutex<HashMap<SubscriptionId, ConnectedHandler>>,
    next_subscription: AtomicU64,
    next_connection: AtomicU64,
    active_connections: AtomicUsize,
    outbound: broadcast::Sender<Bytes>,
}

impl ConnectionHub {
    /// Create a hub with the default outbound capacity
    pub fn new() -> Self {
        Self::with_capacity(crate::OUTBOUND_CHANNEL_CAPACITY)
    }

    /// Create a hub whose outbound channel holds `capacity` frames
    ///
    /// Lagging receivers skip the oldest frames.
    pub fn with_capacity(capacity: usize) -> Self {
        let (outbound, _) = broadcast::channel(capacity.max(1));
        Self {
            handlers: Mutex::new(HashMap::new()),
            next_subscription: AtomicU64::new(1),
            next_connection: AtomicU64::new(1),
            active_connections: AtomicUsize::new(0),
            outbound,
        }
    }

    /// Record a new connection and notify every registered handler
    ///
    /// Handlers run outside the registry lock, so a handler may subscribe
    /// or unsubscribe without deadlocking.
    pub fn connection_established(&self) -> ConnectionEvent {
        let event = ConnectionEvent::new(self.next_connection.fetch_add(1, Ordering::Relaxed));
        self.active_connections.fetch_add(1, Ordering::AcqRel);

        let handlers: Vec<ConnectedHandler> = self.handlers.lock().values().cloned().collect();
        debug!(
            connection_id = event.connection_id,
            handlers = handlers.len(),
            "connection established"
        );
        for handler in handlers {
            handler(event);
        }
        event
    }

    /// Record that a connection went away
    pub fn connection_lost(&self) {
        let _ = self
            .active_connections
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    /// Receive every frame broadcast after this call
    pub fn outbound(&self) -> broadcast::Receiver<Bytes> {
        self.outbound.subscribe()
    }

    /// Number of registered connection handlers
    pub fn subscriber_count(&self) -> usize {
        self.handlers.lock().len()
    }

    /// Number of live connections
    pub fn connection_count(&self) -> usize {
        self.active_connections.load(Ordering::Acquire)
    }
}

impl Default for ConnectionHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionNotifier for ConnectionHub {
    fn is_connected(&self) -> bool {
        self.connection_count() > 0
    }

    fn subscribe(&self, handler: ConnectedHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.handlers.lock().insert(id, handler);
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.handlers.lock().remove(&id).is_some()
    }

    fn broadcast(&self, bytes: &[u8], offset: usize, length: usize) {
        let Some(range) = offset
            .checked_add(length)
            .filter(|end| *end <= bytes.len())
            .map(|end| &bytes[offset..end])
        else {
            warn!(offset, length, available = bytes.len(), "broadcast range out of bounds");
            return;
        };

        if self.outbound.send(Bytes::copy_from_slice(range)).is_err() {
            debug!(length, "no outbound receivers, frame dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state() {
        let hub = ConnectionHub::new();
        assert!(!hub.is_connected());

        hub.connection_established();
        hub.connection_established();
        assert_eq!(hub.connection_count(), 2);

        hub.connection_lost();
        assert!(hub.is_connected());
        hub.connection_lost();
        hub.connection_lost();
        assert!(!hub.is_connected());
        assert_eq!(hub.connection_count(), 0);
    }

    #[test]
    fn test_subscribe_and_unsubscribe() {
        let hub = ConnectionHub::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let id = hub.subscribe(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(hub.subscriber_count(), 1);

        hub.connection_established();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(hub.unsubscribe(id));
        assert!(!hub.unsubscribe(id));
        assert_eq!(hub.subscriber_count(), 0);

        hub.connection_established();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_connection_ids_are_distinct() {
        let hub = ConnectionHub::new();
        let first = hub.connection_established();
        let second = hub.connection_established();
        assert_ne!(first.connection_id, second.connection_id);
    }

    #[test]
    fn test_broadcast_forwards_exact_range() {
        let hub = ConnectionHub::new();
        let mut rx = hub.outbound();

        hub.broadcast(&[1, 2, 3, 4, 5], 1, 3);
        assert_eq!(rx.try_recv().unwrap().as_ref(), &[2, 3, 4]);

        hub.broadcast(&[1, 2, 3], 2, 5);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_broadcast_without_receivers() {
        let hub = ConnectionHub::new();
        hub.broadcast(&[1, 2, 3], 0, 3);
    }
}
