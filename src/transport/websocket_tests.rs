use crate::broker::Broker;
use crate::config::SessionSettings;
use crate::transport::websocket::start_websocket_server;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn quiet() -> SessionSettings {
    SessionSettings {
        heartbeat_secs: 0,
        ..SessionSettings::default()
    }
}

async fn setup_server() -> (String, Broker) {
    let broker = Broker::default();
    let url = setup_server_with(broker.clone(), quiet()).await;
    (url, broker)
}

async fn setup_server_with(broker: Broker, settings: SessionSettings) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let url = format!("ws://{}", listener.local_addr().unwrap());

    tokio::spawn(start_websocket_server(listener, broker, settings));
    url
}

async fn wait_for_subscribers(broker: &Broker, expected: usize) {
    for _ in 0..200 {
        if broker.subscriber_count() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "expected {expected} subscribers, found {}",
        broker.subscriber_count()
    );
}

async fn next_json(client: &mut Client) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), client.next())
            .await
            .expect("Did not receive a message")
            .expect("Connection closed")
            .expect("Read error");
        if let WsMessage::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

#[tokio::test]
async fn test_publish_reaches_every_client() {
    let (url, broker) = setup_server().await;
    let (mut ws_a, _) = connect_async(url.as_str()).await.expect("client A connect");
    let (mut ws_b, _) = connect_async(url.as_str()).await.expect("client B connect");
    wait_for_subscribers(&broker, 2).await;

    let publish = json!({
        "type": "publish",
        "name": "Alice",
        "content": "hello world",
        "channel": "general"
    })
    .to_string();
    ws_a.send(WsMessage::text(publish))
        .await
        .expect("Failed to send publish");

    for client in [&mut ws_a, &mut ws_b] {
        let received = next_json(client).await;
        assert_eq!(received["name"], "Alice");
        assert_eq!(received["content"], "hello world");
        assert_eq!(received["channel"], "general");
        assert!(received["created_time"].is_i64());
    }
}

#[tokio::test]
async fn test_http_side_publish_reaches_socket() {
    let (url, broker) = setup_server().await;
    let (mut ws, _) = connect_async(url.as_str()).await.expect("connect");
    wait_for_subscribers(&broker, 1).await;

    broker
        .publish(r#"{"name":"srv","content":"from bus","channel":"","created_time":0}"#)
        .unwrap();

    let received = next_json(&mut ws).await;
    assert_eq!(received["content"], "from bus");
}

#[tokio::test]
async fn test_disconnect_deregisters_client() {
    let (url, broker) = setup_server().await;
    let (mut leaving, _) = connect_async(url.as_str()).await.expect("connect");
    let (mut staying, _) = connect_async(url.as_str()).await.expect("connect");
    wait_for_subscribers(&broker, 2).await;

    leaving.close(None).await.expect("close");
    drop(leaving);
    wait_for_subscribers(&broker, 1).await;

    broker
        .publish(r#"{"name":"n","content":"after","channel":"","created_time":0}"#)
        .unwrap();
    assert_eq!(next_json(&mut staying).await["content"], "after");
}

#[tokio::test]
async fn test_bus_close_ends_socket() {
    let (url, broker) = setup_server().await;
    let (mut ws, _) = connect_async(url.as_str()).await.expect("connect");
    wait_for_subscribers(&broker, 1).await;

    broker.close();

    let ended = tokio::time::timeout(Duration::from_secs(2), async {
        while let Some(Ok(msg)) = ws.next().await {
            if msg.is_close() {
                break;
            }
        }
    })
    .await;
    assert!(ended.is_ok(), "socket stayed open after the bus closed");
}

#[tokio::test]
async fn test_idle_socket_receives_ping() {
    let broker = Broker::default();
    let settings = SessionSettings {
        heartbeat_secs: 1,
        ..SessionSettings::default()
    };
    let url = setup_server_with(broker.clone(), settings).await;
    let (mut ws, _) = connect_async(url.as_str()).await.expect("connect");
    wait_for_subscribers(&broker, 1).await;

    let pinged = tokio::time::timeout(Duration::from_secs(3), async {
        while let Some(Ok(msg)) = ws.next().await {
            if let WsMessage::Ping(_) = msg {
                return true;
            }
        }
        false
    })
    .await
    .expect("no ping within three seconds");
    assert!(pinged, "socket closed before a ping arrived");
    assert_eq!(broker.subscriber_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_client_that_never_reads_is_dropped() {
    let broker = Broker::with_capacity("chat", 4);
    let settings = SessionSettings {
        heartbeat_secs: 0,
        write_timeout_secs: 1,
    };
    let url = setup_server_with(broker.clone(), settings).await;

    // Connected but never polled again, so socket buffers fill up.
    let (_stalled, _) = connect_async(url.as_str()).await.expect("connect");
    wait_for_subscribers(&broker, 1).await;

    let payload = format!(
        r#"{{"name":"n","content":"{}","channel":"","created_time":0}}"#,
        "x".repeat(64 * 1024)
    );
    let dropped = tokio::time::timeout(Duration::from_secs(10), async {
        while broker.subscriber_count() > 0 {
            broker.publish(payload.as_str()).unwrap();
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await;
    assert!(dropped.is_ok(), "stalled client was never deregistered");
    assert_eq!(broker.subscriber_count(), 0);
}

#[tokio::test]
async fn test_listener_survives_failed_handshakes() {
    let (url, broker) = setup_server().await;
    let addr = url.trim_start_matches("ws://").to_string();

    let mut garbage = TcpStream::connect(&addr).await.expect("raw connect");
    garbage
        .write_all(b"NOT A WEBSOCKET\r\n\r\n")
        .await
        .expect("raw write");
    drop(garbage);
    drop(TcpStream::connect(&addr).await.expect("raw connect"));

    let (mut ws, _) = connect_async(url.as_str())
        .await
        .expect("listener stopped accepting");
    wait_for_subscribers(&broker, 1).await;

    broker
        .publish(r#"{"name":"n","content":"still serving","channel":"","created_time":0}"#)
        .unwrap();
    assert_eq!(next_json(&mut ws).await["content"], "still serving");
}
