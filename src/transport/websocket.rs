//! WebSocket transport
//!
//! An optional second listener for clients that prefer a socket over the
//! event stream. Responsibilities:
//! - Accept TCP/WebSocket connections
//! - Open a `StreamSession` per connection and push every message as one
//!   text frame (heartbeats become pings)
//! - Accept `{"type":"publish", ...}` requests and hand them to the `Broker`

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::broker::{Broker, PublishReceipt};
use crate::config::SessionSettings;
use crate::session::{Frame, StreamSession};
use crate::transport::message::ClientMessage;
use crate::utils::RelayError;

/// Pause after a failed `accept` before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

pub async fn start_websocket_server(listener: TcpListener, broker: Broker, settings: SessionSettings) {
    if let Ok(addr) = listener.local_addr() {
        info!("WebSocket server listening on ws://{addr}");
    }

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                tokio::spawn(handle_connection(
                    stream,
                    peer,
                    broker.clone(),
                    settings.clone(),
                ));
            }
            Err(e) => {
                // Usually transient (fd exhaustion, aborted handshakes).
                warn!("Failed to accept WebSocket connection: {e}");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    broker: Broker,
    settings: SessionSettings,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(%peer, "WebSocket handshake error: {e}");
            return;
        }
    };
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let write_timeout = Duration::from_secs(settings.write_timeout_secs.max(1));

    let mut session = match StreamSession::open_stream(&broker, &settings) {
        Ok(session) => session,
        Err(e) => {
            warn!(%peer, "refusing WebSocket client: {e}");
            let _ = timeout(write_timeout, ws_sender.close()).await;
            return;
        }
    };
    let client_id = session.subscriber_id().unwrap_or_default().to_string();
    info!(%peer, client = %client_id, "WebSocket client connected");

    // Broker -> client
    let outbound = async {
        while let Some(frame) = session.next().await {
            let msg = match frame {
                Frame::Message(payload) => WsMessage::text(payload.to_string()),
                Frame::Heartbeat => WsMessage::Ping(Default::default()),
            };
            match timeout(write_timeout, ws_sender.send(msg)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(client = %client_id, "Failed to send message: {e}");
                    return;
                }
                Err(_) => {
                    warn!(client = %client_id, "write timed out after {write_timeout:?}");
                    return;
                }
            }
        }
        // Queue ended: evicted or shutting down.
        let _ = timeout(write_timeout, ws_sender.close()).await;
    };

    // Client -> broker
    let inbound = async {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(WsMessage::Text(text)) => {
                    if let Err(e) = handle_client_text(&broker, text.as_str()) {
                        warn!(client = %client_id, "Invalid client message: {e} | {}", text.as_str());
                    }
                }
                Ok(WsMessage::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!(client = %client_id, "read error: {e}");
                    break;
                }
            }
        }
    };

    tokio::select! {
        _ = outbound => {}
        _ = inbound => {}
    }

    session.close();
    info!(client = %client_id, "WebSocket client disconnected");
}

/// Publishes the submission carried by one inbound text frame.
pub fn handle_client_text(broker: &Broker, text: &str) -> Result<PublishReceipt, RelayError> {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Publish(submission)) => broker.publish_message(&submission.into_message()),
        Err(e) => Err(RelayError::MalformedSubmission(e.to_string())),
    }
}
