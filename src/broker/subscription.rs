use std::task::{Context, Poll};

use tokio::sync::mpsc::{self, error::TryRecvError};

use super::Payload;
use super::engine::Broker;
use super::topic::SubscriberId;

/// One listener's registration with the [`Broker`].
///
/// The subscription owns the receiving half of its delivery queue. It is
/// deregistered exactly once: explicitly through [`Subscription::deregister`],
/// or when dropped.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::Receiver<Payload>,
    broker: Broker,
    live: bool,
    deregistered: bool,
}

impl Subscription {
    pub(crate) fn new(id: SubscriberId, receiver: mpsc::Receiver<Payload>, broker: Broker) -> Self {
        Self {
            id,
            receiver,
            broker,
            live: true,
            deregistered: false,
        }
    }

    pub fn id(&self) -> &SubscriberId {
        &self.id
    }

    /// `false` once deregistered or once the bus stopped feeding the queue.
    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Waits for the next payload. `None` means the queue ended: the
    /// subscription was evicted, deregistered, or the bus closed.
    pub async fn recv(&mut self) -> Option<Payload> {
        let next = self.receiver.recv().await;
        if next.is_none() {
            self.live = false;
        }
        next
    }

    pub fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Option<Payload>> {
        let next = self.receiver.poll_recv(cx);
        if let Poll::Ready(None) = next {
            self.live = false;
        }
        next
    }

    /// Takes a payload that is already queued, without waiting.
    pub fn try_recv(&mut self) -> Option<Payload> {
        match self.receiver.try_recv() {
            Ok(payload) => Some(payload),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.live = false;
                None
            }
        }
    }

    /// Removes the subscription from the bus. Calling it again has no effect.
    pub fn deregister(&mut self) {
        if self.deregistered {
            return;
        }
        self.deregistered = true;
        self.live = false;
        self.broker.deregister(&self.id);
        self.receiver.close();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.deregister();
    }
}
