//! Fire-and-forget broadcast of advisory events.
//!
//! Every published event is handed to each subscriber on its own short-lived
//! thread. Delivery order is unspecified: across subscribers, across
//! consecutive events, and relative to the publisher's own progress.
//! Subscribers must treat these events as telemetry, never as a
//! synchronization point.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::warn;

/// Handle returned by [`Notifier::subscribe`].
pub type SubscriptionId = u64;

type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Broadcast primitive with per-subscriber asynchronous delivery.
pub struct Notifier<E> {
    topic: &'static str,
    next_id: AtomicU64,
    handlers: RwLock<Vec<(SubscriptionId, Handler<E>)>>,
}

impl<E: Send + Sync + 'static> Notifier<E> {
    /// Create a notifier. `topic` names the delivery threads.
    pub fn new(topic: &'static str) -> Self {
        Self {
            topic,
            next_id: AtomicU64::new(1),
            handlers: RwLock::new(Vec::new()),
        }
    }

    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers.write().push((id, Arc::new(handler)));
        id
    }

    /// Remove a subscriber. Returns `false` if the id was unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        handlers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Dispatch `event` to every subscriber without waiting for any of them.
    ///
    /// Returns the number of deliveries that were started.
    pub fn publish(&self, event: E) -> usize {
        let handlers: Vec<Handler<E>> = self
            .handlers
            .read()
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        if handlers.is_empty() {
            return 0;
        }

        let event = Arc::new(event);
        let mut started = 0;
        for handler in handlers {
            let event = Arc::clone(&event);
            let spawned = thread::Builder::new()
                .name(format!("{}-notify", self.topic))
                .spawn(move || handler(event.as_ref()));

            match spawned {
                Ok(_) => started += 1,
                Err(e) => warn!(topic = self.topic, error = %e, "Failed to dispatch notification"),
            }
        }
        started
    }
}

impl<E> std::fmt::Debug for Notifier<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("topic", &self.topic)
            .field("subscribers", &self.handlers.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::unbounded;
    use std::time::Duration;

    #[test]
    fn publish_reaches_every_subscriber() {
        let notifier = Notifier::new("test");
        let (tx, rx) = unbounded();

        for tag in ["first", "second"] {
            let tx = tx.clone();
            notifier.subscribe(move |value: &u32| {
                tx.send((tag, *value)).unwrap();
            });
        }

        assert_eq!(notifier.publish(7), 2);

        let mut received: Vec<_> = (0..2)
            .map(|_| rx.recv_timeout(Duration::from_secs(1)).unwrap())
            .collect();
        received.sort();
        assert_eq!(received, vec![("first", 7), ("second", 7)]);
    }

    #[test]
    fn unsubscribed_handler_is_not_called() {
        let notifier = Notifier::new("test");
        let (tx, rx) = unbounded();

        let id = notifier.subscribe(move |value: &u32| {
            tx.send(*value).unwrap();
        });
        assert!(notifier.unsubscribe(id));
        assert!(!notifier.unsubscribe(id));

        assert_eq!(notifier.publish(1), 0);
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn panicking_subscriber_does_not_affect_others() {
        let notifier = Notifier::new("test");
        let (tx, rx) = unbounded();

        notifier.subscribe(|_: &u32| panic!("subscriber failure"));
        notifier.subscribe(move |value: &u32| {
            tx.send(*value).unwrap();
        });

        notifier.publish(3);
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), 3);
        assert_eq!(notifier.subscriber_count(), 2);
    }
}
