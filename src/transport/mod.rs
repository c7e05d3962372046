//! The `transport` module is responsible for the network surfaces around the
//! broadcast bus.
//!
//! `http` serves the submit endpoint and the event stream, `sse` holds the
//! event-stream framing, and `websocket` is an optional push listener that
//! speaks the same messages over WebSocket.

pub mod http;
pub mod message;
pub mod sse;
pub mod websocket;


#[cfg(test)]
mod websocket_tests;
