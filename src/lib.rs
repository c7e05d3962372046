//! # chatrelay
//!
//! `chatrelay` is a minimal real-time broadcast relay built with Rust.
//! Clients post chat messages over HTTP and every connected listener receives
//! each message through a server-sent event stream (or, optionally, a
//! WebSocket).
//!
//! ## Core Modules
//!
//! - `broker`: The broadcast bus: one topic, the live subscriber set, and the fan-out.
//! - `session`: Per-connection stream sessions that drain a subscription.
//! - `config`: Handles loading and managing server configuration.
//! - `transport`: The HTTP/SSE surface and the WebSocket listener.
//! - `utils`: Error types and logging setup.

pub mod broker;
pub mod config;
pub mod session;
pub mod transport;
pub mod utils;
