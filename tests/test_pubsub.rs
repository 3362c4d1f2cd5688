//! Integration tests: pub/sub mode.

mod common;

use std::time::Duration;

use common::{assert_wire_contains, MockServer, Step};
use redlink::{ConnectionError, Error, Value};

#[tokio::test]
async fn handoff_detaches_the_client_connection() {
    let server = MockServer::start(vec![
        vec![Step::Silent],
        vec![Step::Reply(b"+PONG\r\n")],
    ])
    .await;
    let mut client = server.client();

    let pubsub = client.pubsub().await.unwrap();
    assert!(pubsub.is_connected());
    // The parent gave its connection up entirely.
    assert!(!client.is_connected());

    // And transparently opens a fresh one for the next command.
    let reply = client.call(&["PING"]).await.unwrap();
    assert_eq!(reply, Value::SimpleString("PONG".into()));
    assert_eq!(server.accepted(), 2);
}

#[tokio::test]
async fn subscribe_and_receive_events() {
    // The subscribe confirmation and a published message arrive back to
    // back; call() reads neither, next_event() reads both.
    let server = MockServer::start(vec![vec![Step::Reply(
        b"*3\r\n$9\r\nsubscribe\r\n$4\r\nnews\r\n:1\r\n\
          *3\r\n$7\r\nmessage\r\n$4\r\nnews\r\n$5\r\nhello\r\n",
    )]])
    .await;
    let mut client = server.client();
    let mut pubsub = client.pubsub().await.unwrap();

    pubsub.call(&["SUBSCRIBE", "news"]).await.unwrap();
    assert_wire_contains(&server.frames()[0], b"SUBSCRIBE");

    let confirmation = pubsub.next_event(None).await.unwrap().unwrap();
    match &confirmation {
        Value::Array(items) => assert_eq!(items[0].as_str(), Some("subscribe")),
        other => panic!("expected an array event, got {other:?}"),
    }

    let message = pubsub.next_event(None).await.unwrap().unwrap();
    match &message {
        Value::Array(items) => {
            assert_eq!(items[0].as_str(), Some("message"));
            assert_eq!(items[1].as_str(), Some("news"));
            assert_eq!(items[2].as_str(), Some("hello"));
        }
        other => panic!("expected an array event, got {other:?}"),
    }
}

#[tokio::test]
async fn next_event_timeout_is_a_null_sentinel() {
    let server = MockServer::start(vec![vec![Step::Silent]]).await;
    let mut client = server.client();
    let mut pubsub = client.pubsub().await.unwrap();

    pubsub.call(&["SUBSCRIBE", "quiet"]).await.unwrap();

    let event = pubsub
        .next_event(Some(Duration::from_millis(50)))
        .await
        .unwrap();
    assert_eq!(event, None);

    // An expired wait is normal polling; the subscription survives it.
    assert!(pubsub.is_connected());
    let event = pubsub
        .next_event(Some(Duration::from_millis(50)))
        .await
        .unwrap();
    assert_eq!(event, None);
}

#[tokio::test]
async fn server_hangup_raises_and_closes() {
    let server = MockServer::start(vec![vec![Step::Silent, Step::Close]]).await;
    let mut client = server.client();
    let mut pubsub = client.pubsub().await.unwrap();

    // The server reads the subscribe, then hangs up without a word.
    pubsub.call(&["SUBSCRIBE", "doomed"]).await.unwrap();

    let err = pubsub.next_event(None).await.unwrap_err();
    assert!(err.is_connection_error());
    assert!(!pubsub.is_connected());
}

#[tokio::test]
async fn closed_handle_refuses_everything() {
    let server = MockServer::start(vec![vec![Step::Silent]]).await;
    let mut client = server.client();
    let mut pubsub = client.pubsub().await.unwrap();

    pubsub.close();
    pubsub.close();
    assert!(!pubsub.is_connected());

    let err = pubsub.next_event(None).await.unwrap_err();
    match err {
        Error::Connection(e @ ConnectionError::Closed) => {
            assert_eq!(e.to_string(), "Connection was closed or lost");
        }
        other => panic!("expected a closed-connection error, got {other:?}"),
    }

    let err = pubsub.call(&["SUBSCRIBE", "late"]).await.unwrap_err();
    assert!(matches!(err, Error::Connection(ConnectionError::Closed)));
}
