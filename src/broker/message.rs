use serde::{Deserialize, Deserializer, Serialize};

/// Sender name used when a submission carries a blank or missing name.
pub const ANONYMOUS: &str = "<anonymous>";

/// A chat message as it travels through the broadcast bus.
///
/// Messages are created once at publish time and never mutated. They are
/// serialized to JSON before being handed to the bus, so subscribers only
/// ever see the encoded form.
///
/// # Fields
///
/// - `sender_name` - Display name of the author, `name` on the wire.
/// - `content` - The message text, passed through unchanged.
/// - `channel` - Display label chosen by the sender.
/// - `created_time` - Unix timestamp (in seconds) taken when the message was accepted.
///
/// # Example
///
/// ```rust
/// use chatrelay::broker::message::Message;
///
/// let msg = Message {
///     sender_name: "Alice".to_string(),
///     content: "hi".to_string(),
///     channel: "general".to_string(),
///     created_time: 1_725_000_000,
/// };
/// assert!(msg.to_json().unwrap().starts_with(r#"{"name":"Alice""#));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "name")]
    pub sender_name: String,
    pub content: String,
    pub channel: String,
    pub created_time: i64,
}

impl Message {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// What a client submits when posting to the relay.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Submission {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub channel: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl Submission {
    /// Stamps the submission with the current wall-clock time.
    pub fn into_message(self) -> Message {
        self.into_message_at(chrono::Utc::now().timestamp())
    }

    pub fn into_message_at(self, created_time: i64) -> Message {
        let sender_name = match self.name {
            Some(name) if !name.trim().is_empty() => name,
            _ => ANONYMOUS.to_string(),
        };

        Message {
            sender_name,
            content: self.content,
            channel: self.channel,
            created_time,
        }
    }
}
