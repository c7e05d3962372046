use std::collections::HashMap;

use tokio::sync::mpsc::{self, error::TrySendError};

use super::Payload;

pub type SubscriberId = String;

/// The live subscriber set of one topic.
///
/// Each subscriber is represented by the sending half of its delivery queue.
/// Removing the sender is what releases the queue: the receiving side sees the
/// end of the channel once the buffered payloads are drained.
#[derive(Debug, Default)]
pub struct Topic {
    pub name: String,
    pub subscribers: HashMap<SubscriberId, mpsc::Sender<Payload>>,
}

/// Outcome of handing one payload to every subscriber of a topic.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct FanOut {
    pub delivered: usize,
    pub evicted: Vec<SubscriberId>,
}

impl Topic {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            subscribers: HashMap::new(),
        }
    }

    /// Adds a subscriber. Re-using an id replaces the previous sender.
    pub fn subscribe(&mut self, id: SubscriberId, sender: mpsc::Sender<Payload>) {
        self.subscribers.insert(id, sender);
    }

    /// Removes a subscriber. Returns `false` when it was not registered.
    pub fn unsubscribe(&mut self, id: &SubscriberId) -> bool {
        self.subscribers.remove(id).is_some()
    }

    /// Enqueues `payload` on every subscriber queue without waiting.
    ///
    /// Subscribers whose queue is full or whose receiver is gone are removed
    /// from the topic and reported in [`FanOut::evicted`].
    pub fn fan_out(&mut self, payload: &Payload) -> FanOut {
        let mut outcome = FanOut::default();

        self.subscribers
            .retain(|id, sender| match sender.try_send(payload.clone()) {
                Ok(()) => {
                    outcome.delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => {
                    outcome.evicted.push(id.clone());
                    false
                }
            });

        outcome
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub fn clear(&mut self) {
        self.subscribers.clear();
    }
}
