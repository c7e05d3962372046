use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::broker::{Broker, Payload, Subscription};
use crate::config::SessionSettings;
use crate::utils::BusError;

/// Longest idle period allowed between heartbeats. Larger settings are capped
/// so the timer deadline always fits in an `Instant`.
pub const MAX_HEARTBEAT: Duration = Duration::from_secs(24 * 60 * 60);

/// Lifecycle of a stream session. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Registered,
    Closed,
}

/// One unit pushed to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A published message, already serialized.
    Message(Payload),
    /// Emitted when the session has been idle for the heartbeat interval.
    Heartbeat,
}

/// Per-connection adapter between the broadcast bus and a client stream.
///
/// Once opened, the session is an endless [`Stream`] of [`Frame`]s. It ends
/// when its queue ends (eviction or bus shutdown) or after [`close`]; dropping
/// it has the same effect. In every case the subscription is deregistered
/// exactly once.
///
/// [`close`]: StreamSession::close
#[derive(Debug)]
pub struct StreamSession {
    broker: Broker,
    heartbeat_every: Option<Duration>,
    heartbeat: Option<Interval>,
    subscription: Option<Subscription>,
    state: SessionState,
    delivered: u64,
}

impl StreamSession {
    pub fn new(broker: &Broker, settings: &SessionSettings) -> Self {
        let heartbeat_every =
            (settings.heartbeat_secs > 0).then(|| Duration::from_secs(settings.heartbeat_secs));
        Self::with_heartbeat(broker, heartbeat_every)
    }

    pub fn with_heartbeat(broker: &Broker, heartbeat_every: Option<Duration>) -> Self {
        Self {
            broker: broker.clone(),
            heartbeat_every: heartbeat_every.map(|every| every.min(MAX_HEARTBEAT)),
            heartbeat: None,
            subscription: None,
            state: SessionState::Created,
            delivered: 0,
        }
    }

    /// Creates a session and registers it with the bus in one step.
    pub fn open_stream(broker: &Broker, settings: &SessionSettings) -> Result<Self, BusError> {
        let mut session = Self::new(broker, settings);
        session.open()?;
        Ok(session)
    }

    /// Registers with the bus. Only valid from `Created`; opening an already
    /// open session is a no-op and a closed session cannot be reopened.
    pub fn open(&mut self) -> Result<(), BusError> {
        match self.state {
            SessionState::Registered => return Ok(()),
            SessionState::Closed => return Err(BusError::Closed),
            SessionState::Created => {}
        }

        let subscription = self.broker.register()?;
        debug!(subscriber = %subscription.id(), "stream session opened");

        self.subscription = Some(subscription);
        self.state = SessionState::Registered;
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn subscriber_id(&self) -> Option<&str> {
        self.subscription.as_ref().map(|s| s.id().as_str())
    }

    /// Number of messages (not heartbeats) yielded so far.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Deregisters and moves to `Closed`. Safe to call on any path, any
    /// number of times.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closed;
        self.heartbeat = None;

        if let Some(mut subscription) = self.subscription.take() {
            subscription.deregister();
            info!(
                subscriber = %subscription.id(),
                delivered = self.delivered,
                "stream session closed"
            );
        }
    }

    /// Waits for the next frame. Equivalent to `StreamExt::next`.
    pub async fn next_frame(&mut self) -> Option<Frame> {
        std::future::poll_fn(|cx| self.poll_frame(cx)).await
    }

    fn poll_frame(&mut self, cx: &mut Context<'_>) -> Poll<Option<Frame>> {
        let Some(subscription) = self.subscription.as_mut() else {
            return Poll::Ready(None);
        };

        match subscription.poll_recv(cx) {
            Poll::Ready(Some(payload)) => {
                self.delivered += 1;
                if let Some(heartbeat) = self.heartbeat.as_mut() {
                    heartbeat.reset();
                }
                return Poll::Ready(Some(Frame::Message(payload)));
            }
            Poll::Ready(None) => {
                self.close();
                return Poll::Ready(None);
            }
            Poll::Pending => {}
        }

        // The timer is created on first poll so that opening needs no runtime.
        if self.heartbeat.is_none() {
            self.heartbeat = self.heartbeat_every.and_then(heartbeat_interval);
            if self.heartbeat.is_none() {
                self.heartbeat_every = None;
            }
        }
        if let Some(heartbeat) = self.heartbeat.as_mut() {
            if heartbeat.poll_tick(cx).is_ready() {
                return Poll::Ready(Some(Frame::Heartbeat));
            }
        }

        Poll::Pending
    }
}

fn heartbeat_interval(every: Duration) -> Option<Interval> {
    let start = Instant::now().checked_add(every)?;
    let mut interval = tokio::time::interval_at(start, every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Some(interval)
}

impl Stream for StreamSession {
    type Item = Frame;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Frame>> {
        self.get_mut().poll_frame(cx)
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.close();
    }
}
