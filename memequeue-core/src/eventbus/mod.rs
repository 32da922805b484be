//! src/eventbus/mod.rs
//!
//! Provides an in-process event bus that supports guaranteed delivery
//! to multiple subscribers via bounded MPSC queues. Overlay and dashboard
//! clients subscribe to learn about playback changes without polling the
//! full queue.

use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use uuid::Uuid;

use memequeue_common::models::activation::EndReason;
use memequeue_common::models::queue::PlaybackPayload;

/// Queue/playback notifications published by the coordinator and admission,
/// strictly after their transaction has committed.
#[derive(Debug, Clone)]
pub enum QueueEvent {
    /// An activation was promoted into the playback slot.
    ActivationStarted {
        channel_id: Uuid,
        payload: PlaybackPayload,
        queue_revision: i64,
    },

    /// A playing activation was closed. `refunded_coins` is 0 when no refund
    /// applied.
    ActivationEnded {
        channel_id: Uuid,
        activation_id: Uuid,
        reason: EndReason,
        refunded_coins: i64,
        queue_revision: i64,
    },

    /// Queue content or pause flags changed; watchers re-read at the new
    /// revision.
    QueueChanged {
        channel_id: Uuid,
        queue_revision: i64,
    },
}

impl QueueEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            QueueEvent::ActivationStarted { .. } => "activation.started",
            QueueEvent::ActivationEnded { .. } => "activation.ended",
            QueueEvent::QueueChanged { .. } => "queue.changed",
        }
    }

    pub fn channel_id(&self) -> Uuid {
        match self {
            QueueEvent::ActivationStarted { channel_id, .. }
            | QueueEvent::ActivationEnded { channel_id, .. }
            | QueueEvent::QueueChanged { channel_id, .. } => *channel_id,
        }
    }
}

/// Each subscriber gets its own `mpsc::Sender<QueueEvent>` for guaranteed
/// delivery.
///
/// - If the subscriber’s channel buffer fills, `publish` will await
///   until there's space (backpressure).
/// - If the subscriber has dropped the `Receiver`, the channel is closed
///   and sending returns an error.
#[derive(Clone)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<mpsc::Sender<QueueEvent>>>>,
    shutdown_tx: watch::Sender<bool>,
    pub shutdown_rx: watch::Receiver<bool>,
}

/// Default size for each subscriber’s buffer. Adjust as needed.
const DEFAULT_BUFFER_SIZE: usize = 10000;

impl EventBus {
    /// Create a new, empty event bus.
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            subscribers: Arc::new(Mutex::new(vec![])),
            shutdown_tx: tx,
            shutdown_rx: rx,
        }
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// Returns a receiver on which events will be delivered.
    pub async fn subscribe(&self, buffer_size: Option<usize>) -> mpsc::Receiver<QueueEvent> {
        let size = buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE);
        let (tx, rx) = mpsc::channel(size);
        let mut subs = self.subscribers.lock().await;
        subs.push(tx);
        rx
    }

    /// Publish an event to all subscribers.
    pub async fn publish(&self, event: QueueEvent) {
        let senders = {
            let subs = self.subscribers.lock().await;
            subs.clone()
        };
        for s in senders {
            let _ = s.send(event.clone()).await;
        }
    }

    /// Convenience method: publish a `QueueChanged` stamp.
    pub async fn publish_queue_changed(&self, channel_id: Uuid, queue_revision: i64) {
        self.publish(QueueEvent::QueueChanged {
            channel_id,
            queue_revision,
        })
        .await;
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{sleep, timeout, Duration};

    fn changed(rev: i64) -> QueueEvent {
        QueueEvent::QueueChanged {
            channel_id: Uuid::new_v4(),
            queue_revision: rev,
        }
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let bus = EventBus::new();

        let mut rx1 = bus.subscribe(Some(5)).await;
        let mut rx2 = bus.subscribe(Some(5)).await;

        bus.publish(changed(1)).await;

        // Both subscribers should get it
        let evt1 = rx1.recv().await.expect("rx1 should get event");
        let evt2 = rx2.recv().await.expect("rx2 should get event");

        assert_eq!(evt1.event_type(), "queue.changed");
        assert_eq!(evt2.event_type(), "queue.changed");
    }

    #[tokio::test]
    async fn test_backpressure_blocking() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe(Some(1)).await; // queue size = 1

        // Publish first message to fill the queue.
        bus.publish(changed(1)).await;

        // Spawn a task that reads the two messages after a short delay.
        let handle = tokio::spawn(async move {
            sleep(Duration::from_millis(50)).await;
            let first = rx.recv().await.expect("expected first message");
            let second = rx.recv().await.expect("expected second message");
            (first, second)
        });

        // Publish the second message (this call will wait until there's space).
        let second_publish = bus.publish(changed(2));
        let result = timeout(Duration::from_millis(500), second_publish).await;
        assert!(result.is_ok(), "publish should eventually unblock");

        let (evt1, evt2) = handle.await.unwrap();
        match (evt1, evt2) {
            (
                QueueEvent::QueueChanged { queue_revision: r1, .. },
                QueueEvent::QueueChanged { queue_revision: r2, .. },
            ) => {
                assert_eq!(r1, 1);
                assert_eq!(r2, 2);
            }
            other => panic!("unexpected events: {:?}", other),
        }
    }
}
