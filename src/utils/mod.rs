//! The `utils` module provides the pieces shared by every other module of
//! `chatrelay`: the error types and the tracing setup.

pub mod error;
pub mod logging;

pub use error::{BusError, RelayError};
