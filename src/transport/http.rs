//! HTTP surface
//!
//! - `GET /`          landing page that listens and posts from a browser
//! - `POST /chat/add` submit `{"name"?, "content", "channel"?}`, answers `OK`
//! - `GET /subscribe` endless `text/event-stream` of published messages
//! - `GET /health`    liveness probe with the current subscriber count

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::{State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use futures_util::StreamExt;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

use super::sse;
use crate::broker::Broker;
use crate::broker::message::Submission;
use crate::config::SessionSettings;
use crate::session::StreamSession;
use crate::utils::{BusError, RelayError};

const INDEX_HTML: &str = include_str!("../../static/index.html");

/// Shared state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub broker: Broker,
    pub session: Arc<SessionSettings>,
}

impl AppState {
    pub fn new(broker: Broker, session: SessionSettings) -> Self {
        Self {
            broker,
            session: Arc::new(session),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/chat/add", post(chat_add_handler))
        .route("/subscribe", get(subscribe_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serves the router until `shutdown` resolves and open streams have ended.
pub async fn serve_http<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

pub async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// POST /chat/add
pub async fn chat_add_handler(
    State(state): State<AppState>,
    body: Result<Json<Submission>, JsonRejection>,
) -> Result<&'static str, RelayError> {
    let Json(submission) = body.map_err(|e| RelayError::MalformedSubmission(e.body_text()))?;
    let message = submission.into_message();
    let receipt = state.broker.publish_message(&message)?;

    debug!(
        seq = receipt.seq,
        delivered = receipt.delivered,
        name = %message.sender_name,
        channel = %message.channel,
        "message accepted"
    );
    Ok("OK")
}

/// GET /subscribe
///
/// The session is registered before the response head is returned, so a
/// publish that follows the response is never missed. Hyper drops the body
/// when the client goes away, which drops the session and deregisters it.
pub async fn subscribe_handler(State(state): State<AppState>) -> Result<Response, RelayError> {
    let session = StreamSession::open_stream(&state.broker, &state.session)?;
    let frames = session.map(|frame| Ok::<_, Infallible>(sse::encode(&frame)));

    Ok((
        [
            (header::CONTENT_TYPE, sse::CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
            (header::HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Body::from_stream(frames),
    )
        .into_response())
}

/// GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let status = if state.broker.is_closed() { "closing" } else { "ok" };
    Json(json!({
        "status": status,
        "version": env!("CARGO_PKG_VERSION"),
        "topic": state.broker.topic(),
        "subscribers": state.broker.subscriber_count(),
    }))
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = match &self {
            RelayError::MalformedSubmission(_) => StatusCode::BAD_REQUEST,
            RelayError::Bus(BusError::Closed) => StatusCode::SERVICE_UNAVAILABLE,
            RelayError::Encode(_) | RelayError::Config(_) | RelayError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status.is_server_error() {
            error!(error = %self, "request failed");
        } else {
            warn!(error = %self, "request rejected");
        }
        (status, self.to_string()).into_response()
    }
}
