//! The `session` module adapts one client connection to the broadcast bus.
//!
//! A [`StreamSession`] registers a subscription when opened and turns its
//! delivery queue into a lazy, cancellable stream of frames. Transports decide
//! how a frame is written to the wire.

pub mod stream_session;

pub use stream_session::{Frame, MAX_HEARTBEAT, SessionState, StreamSession};

#[cfg(test)]
mod tests;
