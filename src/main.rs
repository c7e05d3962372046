//! CLI for chatrelay
//!
//! Subcommands:
//! - `server`: run the relay (HTTP + event stream, optional WebSocket listener)
//! - `client`: connect to the WebSocket listener, optionally say something, and
//!   print what arrives (useful for smoke tests)

use chatrelay::broker::Broker;
use chatrelay::config::load_config;
use chatrelay::transport::http::{AppState, serve_http};
use chatrelay::transport::websocket::start_websocket_server;
use chatrelay::utils::{RelayError, logging};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "chatrelay")]
enum Command {
    /// Start the relay server
    Server,
    /// Run a simple WebSocket client against a running relay
    Client {
        /// WebSocket URL to connect to
        #[arg(long, default_value = "ws://127.0.0.1:8081")]
        url: String,
        /// Name to post under
        #[arg(long)]
        name: Option<String>,
        /// Channel label to post with
        #[arg(long, default_value = "")]
        channel: String,
        /// Publish this text once connected
        #[arg(long)]
        say: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cmd = Command::parse();

    match cmd {
        Command::Server => {
            if let Err(e) = run_server().await {
                // Config errors happen before the configured subscriber is installed.
                logging::init("info");
                error!("Server failed: {}", e);
                std::process::exit(1);
            }
        }
        Command::Client {
            url,
            name,
            channel,
            say,
        } => {
            logging::init("info");
            if let Err(e) = run_client(&url, name, channel, say).await {
                error!("Client failed: {}", e);
                std::process::exit(1);
            }
        }
    }
}

async fn run_server() -> Result<(), RelayError> {
    let config = load_config()?;
    logging::init(&config.log.level);

    let broker = Broker::new(&config.broker);
    info!(
        topic = %config.broker.topic,
        queue_capacity = config.broker.queue_capacity,
        "broadcast bus ready"
    );

    if let Some(ws_addr) = config.ws_addr() {
        let listener = TcpListener::bind(&ws_addr).await?;
        tokio::spawn(start_websocket_server(
            listener,
            broker.clone(),
            config.session.clone(),
        ));
    }

    let addr = config.http_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("HTTP server listening on http://{addr}");

    let state = AppState::new(broker.clone(), config.session.clone());
    let shutdown_broker = broker.clone();
    let shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {e}");
            return;
        }
        info!("Shutdown signal received. Closing open streams.");
        // Ends every session so graceful shutdown is not held up by them.
        shutdown_broker.close();
    };

    serve_http(listener, state, shutdown).await?;
    broker.close();
    info!("Server stopped");
    Ok(())
}

async fn run_client(
    url: &str,
    name: Option<String>,
    channel: String,
    say: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    use futures_util::{SinkExt, StreamExt};
    use serde_json::json;
    use tokio_tungstenite::connect_async;
    use tokio_tungstenite::tungstenite::Message as WsMessage;

    let (mut ws_stream, _response) = connect_async(url).await?;
    info!("Connected to {url}");

    if let Some(content) = say {
        let publish = json!({
            "type": "publish",
            "name": name,
            "content": content,
            "channel": channel,
        });
        ws_stream
            .send(WsMessage::text(publish.to_string()))
            .await?;
    }

    while let Some(msg) = ws_stream.next().await {
        match msg? {
            WsMessage::Text(text) => println!("{}", text.as_str()),
            WsMessage::Close(_) => break,
            _ => {}
        }
    }

    Ok(())
}
