//! Server-sent events framing.
//!
//! A message frame is `data: <payload>\n\n`. Payloads spanning several lines
//! get one `data:` line each, which standard parsers join back with `\n`.

use crate::session::Frame;

pub const CONTENT_TYPE: &str = "text/event-stream";

/// Comment frame; event-stream parsers skip it.
pub const KEEP_ALIVE: &str = ": keep-alive\n\n";

pub fn encode_data(payload: &str) -> String {
    let mut out = String::with_capacity(payload.len() + 8);
    for line in payload.split('\n') {
        out.push_str("data: ");
        out.push_str(line.strip_suffix('\r').unwrap_or(line));
        out.push('\n');
    }
    out.push('\n');
    out
}

pub fn encode(frame: &Frame) -> String {
    match frame {
        Frame::Message(payload) => encode_data(payload),
        Frame::Heartbeat => KEEP_ALIVE.to_string(),
    }
}
