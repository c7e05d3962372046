//! Broadcast bus engine
//!
//! The bus owns the live subscriber set of a single topic and copies every
//! published payload onto each subscriber's bounded queue.
//!
//! Concurrency and usage notes:
//! - `Broker` is a cheap handle (`Clone`) over one mutex-guarded state. The
//!   mutex is the global sequencing point: every publish enqueues onto all
//!   queues while holding it, so all subscribers observe the same order.
//! - Nothing here awaits. Publishing uses `try_send`, and a subscriber whose
//!   queue is full or closed is evicted instead of slowing the publisher.
//! - `close` drops every sender, which ends every open subscription.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::Payload;
use super::message::Message;
use super::subscription::Subscription;
use super::topic::{SubscriberId, Topic};
use crate::config::BrokerSettings;
use crate::utils::{BusError, RelayError};

/// Result of a successful publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishReceipt {
    /// Position of the payload in the bus-wide publish order, starting at 1.
    pub seq: u64,
    /// Number of subscriber queues that accepted the payload.
    pub delivered: usize,
}

#[derive(Debug)]
struct BusState {
    topic: Topic,
    last_seq: u64,
    closed: bool,
}

#[derive(Debug, Clone)]
pub struct Broker {
    state: Arc<Mutex<BusState>>,
    queue_capacity: usize,
}

impl Default for Broker {
    fn default() -> Self {
        Self::new(&BrokerSettings::default())
    }
}

impl Broker {
    pub fn new(settings: &BrokerSettings) -> Self {
        Self::with_capacity(&settings.topic, settings.queue_capacity)
    }

    /// Creates a bus for `topic` whose subscriber queues hold `queue_capacity`
    /// payloads (at least one).
    pub fn with_capacity(topic: &str, queue_capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(BusState {
                topic: Topic::new(topic),
                last_seq: 0,
                closed: false,
            })),
            queue_capacity: queue_capacity.max(1),
        }
    }

    fn state(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a new subscriber with its own delivery queue.
    ///
    /// Registration happens under the bus lock, so every publish that starts
    /// after this returns is delivered to the new subscription.
    pub fn register(&self) -> Result<Subscription, BusError> {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let id: SubscriberId = format!("sub-{}", Uuid::new_v4());

        let subscribers = {
            let mut state = self.state();
            if state.closed {
                return Err(BusError::Closed);
            }
            state.topic.subscribe(id.clone(), tx);
            state.topic.len()
        };

        info!(subscriber = %id, subscribers, "subscriber registered");
        Ok(Subscription::new(id, rx, self.clone()))
    }

    /// Removes a subscriber from the live set. Unknown ids are ignored.
    pub fn deregister(&self, id: &SubscriberId) -> bool {
        let (removed, subscribers) = {
            let mut state = self.state();
            let removed = state.topic.unsubscribe(id);
            (removed, state.topic.len())
        };

        if removed {
            info!(subscriber = %id, subscribers, "subscriber deregistered");
        }
        removed
    }

    /// Enqueues a copy of `payload` on every live subscriber queue.
    ///
    /// Returns once the payload is enqueued; delivery is up to each
    /// subscriber. Subscribers that cannot take the payload are evicted.
    pub fn publish(&self, payload: impl Into<Payload>) -> Result<PublishReceipt, BusError> {
        let payload = payload.into();

        let (receipt, evicted) = {
            let mut state = self.state();
            if state.closed {
                return Err(BusError::Closed);
            }
            state.last_seq += 1;
            let seq = state.last_seq;
            let fan_out = state.topic.fan_out(&payload);
            (
                PublishReceipt {
                    seq,
                    delivered: fan_out.delivered,
                },
                fan_out.evicted,
            )
        };

        for id in &evicted {
            warn!(subscriber = %id, seq = receipt.seq, "subscriber evicted: queue full or closed");
        }
        debug!(seq = receipt.seq, delivered = receipt.delivered, "payload published");

        Ok(receipt)
    }

    /// Serializes `message` and publishes the JSON text.
    pub fn publish_message(&self, message: &Message) -> Result<PublishReceipt, RelayError> {
        let json = message.to_json()?;
        Ok(self.publish(json)?)
    }

    /// Shuts the bus down: later calls fail with [`BusError::Closed`] and all
    /// open subscriptions end once their queues are drained.
    pub fn close(&self) {
        let dropped = {
            let mut state = self.state();
            if state.closed {
                return;
            }
            state.closed = true;
            let dropped = state.topic.len();
            state.topic.clear();
            dropped
        };

        info!(subscribers = dropped, "broadcast bus closed");
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    pub fn subscriber_count(&self) -> usize {
        self.state().topic.len()
    }

    pub fn topic(&self) -> String {
        self.state().topic.name.clone()
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }
}
