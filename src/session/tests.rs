use super::{Frame, SessionState, StreamSession};
use crate::broker::Broker;
use crate::config::SessionSettings;
use crate::utils::BusError;
use futures_util::StreamExt;
use std::time::Duration;

fn quiet() -> SessionSettings {
    SessionSettings {
        heartbeat_secs: 0,
        ..SessionSettings::default()
    }
}

async fn next_within(session: &mut StreamSession, ms: u64) -> Option<Frame> {
    tokio::time::timeout(Duration::from_millis(ms), session.next())
        .await
        .expect("timed out waiting for a frame")
}

fn message(frame: Option<Frame>) -> String {
    match frame {
        Some(Frame::Message(payload)) => payload.to_string(),
        other => panic!("expected a message frame, got {other:?}"),
    }
}

#[test]
fn test_state_machine() {
    let broker = Broker::default();
    let mut session = StreamSession::new(&broker, &quiet());
    assert_eq!(session.state(), SessionState::Created);
    assert_eq!(broker.subscriber_count(), 0);
    assert!(session.subscriber_id().is_none());

    session.open().unwrap();
    assert_eq!(session.state(), SessionState::Registered);
    assert_eq!(broker.subscriber_count(), 1);
    assert!(session.subscriber_id().unwrap().starts_with("sub-"));

    // Opening twice does not register twice.
    session.open().unwrap();
    assert_eq!(broker.subscriber_count(), 1);

    session.close();
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(broker.subscriber_count(), 0);

    session.close();
    assert_eq!(session.open().unwrap_err(), BusError::Closed);
    assert_eq!(broker.subscriber_count(), 0);
}

#[test]
fn test_open_stream_on_closed_bus_fails_fast() {
    let broker = Broker::default();
    broker.close();
    let err = StreamSession::open_stream(&broker, &quiet()).unwrap_err();
    assert_eq!(err, BusError::Closed);
}

#[test]
fn test_drop_deregisters() {
    let broker = Broker::default();
    let session = StreamSession::open_stream(&broker, &quiet()).unwrap();
    let _other = StreamSession::open_stream(&broker, &quiet()).unwrap();
    assert_eq!(broker.subscriber_count(), 2);

    drop(session);
    assert_eq!(broker.subscriber_count(), 1);
}

#[tokio::test]
async fn test_frames_follow_publish_order() {
    let broker = Broker::default();
    let mut session = StreamSession::open_stream(&broker, &quiet()).unwrap();

    // Published before the first poll, after registration: must not be missed.
    broker.publish("P1").unwrap();
    broker.publish("P2").unwrap();
    assert_eq!(message(next_within(&mut session, 500).await), "P1");

    broker.publish("P3").unwrap();
    assert_eq!(message(next_within(&mut session, 500).await), "P2");
    assert_eq!(message(next_within(&mut session, 500).await), "P3");
    assert_eq!(session.delivered(), 3);
}

#[tokio::test]
async fn test_drain_suspends_until_publish() {
    let broker = Broker::default();
    let mut session = StreamSession::open_stream(&broker, &quiet()).unwrap();

    let idle = tokio::time::timeout(Duration::from_millis(50), session.next_frame()).await;
    assert!(idle.is_err(), "nothing published, the drain must stay pending");

    let publisher = broker.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        publisher.publish("late").unwrap();
    });
    assert_eq!(message(next_within(&mut session, 1000).await), "late");
}

#[tokio::test]
async fn test_bus_close_ends_stream() {
    let broker = Broker::default();
    let mut session = StreamSession::open_stream(&broker, &quiet()).unwrap();
    broker.publish("bye").unwrap();

    let closer = broker.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        closer.close();
    });

    assert_eq!(message(next_within(&mut session, 500).await), "bye");
    assert_eq!(next_within(&mut session, 1000).await, None);
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(next_within(&mut session, 100).await, None);
}

#[tokio::test]
async fn test_evicted_session_terminates() {
    let broker = Broker::with_capacity("chat", 1);
    let mut session = StreamSession::open_stream(&broker, &quiet()).unwrap();

    broker.publish("kept").unwrap();
    broker.publish("overflow").unwrap();
    assert_eq!(broker.subscriber_count(), 0);

    assert_eq!(message(next_within(&mut session, 500).await), "kept");
    assert_eq!(next_within(&mut session, 500).await, None);
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_heartbeat_when_idle() {
    let broker = Broker::default();
    let mut session =
        StreamSession::with_heartbeat(&broker, Some(Duration::from_millis(30)));
    session.open().unwrap();

    assert_eq!(next_within(&mut session, 1000).await, Some(Frame::Heartbeat));

    broker.publish("real").unwrap();
    assert_eq!(message(next_within(&mut session, 1000).await), "real");
    assert_eq!(session.delivered(), 1);
}

#[tokio::test]
async fn test_huge_heartbeat_setting_is_capped() {
    let broker = Broker::default();
    let settings = SessionSettings {
        heartbeat_secs: u64::MAX,
        ..SessionSettings::default()
    };
    let mut session = StreamSession::open_stream(&broker, &settings).unwrap();

    // Idle polling arms the timer; it must not overflow.
    let idle = tokio::time::timeout(Duration::from_millis(50), session.next()).await;
    assert!(idle.is_err());

    broker.publish("still flowing").unwrap();
    assert_eq!(message(next_within(&mut session, 500).await), "still flowing");
    let idle = tokio::time::timeout(Duration::from_millis(50), session.next()).await;
    assert!(idle.is_err());
}

#[tokio::test]
async fn test_one_session_closing_leaves_others() {
    let broker = Broker::default();
    let mut keep = StreamSession::open_stream(&broker, &quiet()).unwrap();
    let mut gone = StreamSession::open_stream(&broker, &quiet()).unwrap();

    broker.publish("both").unwrap();
    assert_eq!(message(next_within(&mut gone, 500).await), "both");
    drop(gone);

    let receipt = broker.publish("only one").unwrap();
    assert_eq!(receipt.delivered, 1);
    assert_eq!(message(next_within(&mut keep, 500).await), "both");
    assert_eq!(message(next_within(&mut keep, 500).await), "only one");
}
