//! The `broker` module is the broadcast bus: a single topic, a live set of
//! subscribers, and the fan-out that copies each published payload onto
//! every subscriber queue.

pub mod engine;
pub mod message;
pub mod subscription;
pub mod topic;

use std::sync::Arc;

pub use engine::{Broker, PublishReceipt};
pub use subscription::Subscription;

/// A serialized message as routed by the bus. Cloning is a reference bump.
pub type Payload = Arc<str>;
