use serde::Deserialize;

use crate::broker::message::Submission;

/// Requests a WebSocket client may send after connecting.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "publish")]
    Publish(Submission),
}
