#![allow(dead_code)]

//! Single-producer, many-consumer fan-out for run progress events (spec §4.9).
//!
//! Grounded on the teacher's `crates/event-bus` `InMemoryBus<E>`
//! (`tokio::sync::broadcast` wrapped behind a trait), extended with:
//! - a bounded queue per subscriber that drops the oldest event and
//!   increments a counter when full, rather than erroring the publisher;
//! - replay of the current aggregate `State` event to a new subscriber.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::debug;
use wf_core_types::{Event, EventKind};

#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish is non-blocking: a full subscriber queue drops its oldest
    /// event rather than applying backpressure to the publisher (spec §5
    /// "event publish is non-blocking (bounded queues drop when full)").
    fn publish(&self, event: Event);

    fn subscribe(&self) -> Subscription;
}

/// A subscriber's view of the bus: a bounded receiver plus the count of
/// events dropped because this subscriber fell behind.
pub struct Subscription {
    receiver: broadcast::Receiver<Event>,
    dropped: Arc<AtomicU64>,
    replay: Option<Event>,
}

impl Subscription {
    /// Number of events dropped for this subscriber so far because it could
    /// not keep up. Observers can use this to decide whether to refetch
    /// state (spec §4.9).
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Await the next event, transparently skipping past any gap left by a
    /// lagging receiver and counting the drop.
    pub async fn recv(&mut self) -> Option<Event> {
        if let Some(replay) = self.replay.take() {
            return Some(replay);
        }
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    self.dropped.fetch_add(skipped, Ordering::Relaxed);
                    debug!(skipped, "event bus subscriber lagged, dropping oldest events");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Bus implementation. `capacity` bounds each subscriber's queue; beyond
/// that, `tokio::sync::broadcast`'s own lag semantics apply (oldest first).
pub struct InMemoryEventBus {
    sender: broadcast::Sender<Event>,
    sequence: AtomicU64,
    aggregate_state: Mutex<Option<Event>>,
    dropped: Arc<AtomicU64>,
}

impl InMemoryEventBus {
    pub fn new(capacity: usize) -> Arc<Self> {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Arc::new(Self {
            sender,
            sequence: AtomicU64::new(0),
            aggregate_state: Mutex::new(None),
            dropped: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Allocate the next monotonically increasing sequence number.
    pub fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    fn publish(&self, event: Event) {
        if matches!(event.kind, EventKind::State) {
            *self.aggregate_state.lock() = Some(event.clone());
        }
        // broadcast::Sender::send only errors when there are no receivers;
        // that is not a publish failure from the producer's point of view.
        let _ = self.sender.send(event);
    }

    fn subscribe(&self) -> Subscription {
        let replay = self.aggregate_state.lock().clone();
        Subscription {
            receiver: self.sender.subscribe(),
            dropped: self.dropped.clone(),
            replay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state_event(seq: u64) -> Event {
        Event::new(EventKind::State, seq, json!({"steps_done": seq}))
    }

    #[tokio::test]
    async fn subscribe_replays_current_aggregate_state_first() {
        let bus = InMemoryEventBus::new(8);
        bus.publish(state_event(1));
        bus.publish(state_event(2));

        let mut sub = bus.subscribe();
        let first = sub.recv().await.unwrap();
        assert_eq!(first.payload, json!({"steps_done": 2}));
    }

    #[tokio::test]
    async fn lagging_subscriber_drops_oldest_and_counts() {
        let bus = InMemoryEventBus::new(2);
        let mut sub = bus.subscribe();
        // consume the (empty) replay slot first
        for i in 0..10u64 {
            bus.publish(Event::new(EventKind::Step, i, json!(i)));
        }
        // Give the lagging receiver a chance to detect the gap.
        let mut got_any = false;
        while let Some(_ev) = tokio::time::timeout(std::time::Duration::from_millis(50), sub.recv())
            .await
            .ok()
            .flatten()
        {
            got_any = true;
        }
        assert!(got_any);
        assert!(sub.dropped_count() > 0);
    }
}
