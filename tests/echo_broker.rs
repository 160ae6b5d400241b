//! End-to-end chat over a loopback STOMP broker.
//!
//! The broker accepts one WebSocket, answers CONNECT, and echoes every SEND
//! on `/app/chat/{room}` back as a MESSAGE on `/topic/{room}` to the
//! subscriber. It records every frame it received so the test can check what
//! actually went over the wire.

use std::time::Duration;

use frames::{Command, Frame, HeartBeat};
use futures_util::{SinkExt, StreamExt};
use roomchat::chat::{Chat, Update};
use clap::Parser;
use roomchat::config::{Args, ClientConfig, ErrorPolicy};
use roomchat::net::{ClientEvent, Endpoint, WsTransport};
use roomchat::state::chat::ChatMessage;
use roomchat::state::session::ConnectionStatus;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

const WAIT: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Echo,
    RejectConnect,
}

// =============================================================================
// BROKER
// =============================================================================

async fn start_broker(mode: Mode) -> (Endpoint, JoinHandle<Vec<Frame>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");

    let task = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let mut socket = tokio_tungstenite::accept_async(stream).await.expect("handshake");
        let mut received = Vec::new();
        let mut subscription: Option<(String, String)> = None;

        while let Some(Ok(message)) = socket.next().await {
            let Message::Text(text) = message else {
                continue;
            };
            for frame in frames::decode_frames(text.as_str()).expect("client frames decode") {
                let reply = reply_to(&frame, mode, &mut subscription);
                let done = frame.command == Command::Disconnect;
                received.push(frame);
                for out in reply {
                    socket
                        .send(Message::Text(frames::encode_frame(&out).into()))
                        .await
                        .expect("broker send");
                }
                if done {
                    return received;
                }
            }
        }
        received
    });

    let endpoint = Endpoint {
        url: format!("ws://{addr}"),
        host: "localhost".to_owned(),
        heartbeat: HeartBeat::new(0, 0),
    };
    (endpoint, task)
}

fn reply_to(frame: &Frame, mode: Mode, subscription: &mut Option<(String, String)>) -> Vec<Frame> {
    match frame.command {
        Command::Connect if mode == Mode::RejectConnect => vec![
            Frame::new(Command::Error)
                .with_header("message", "bad login")
                .with_body("access denied"),
        ],
        Command::Connect => vec![
            Frame::new(Command::Connected)
                .with_header("version", "1.2")
                .with_header("heart-beat", "0,0")
                .with_header("server", "loopback/1.0"),
        ],
        Command::Subscribe => {
            *subscription = Some((
                frame.header("id").unwrap_or_default().to_owned(),
                frame.header("destination").unwrap_or_default().to_owned(),
            ));
            Vec::new()
        }
        Command::Send => {
            let destination = frame.header("destination").unwrap_or_default();
            let Some(room) = destination.strip_prefix("/app/chat/") else {
                return Vec::new();
            };
            let topic = format!("/topic/{room}");
            match subscription {
                Some((id, subscribed)) if *subscribed == topic => vec![
                    Frame::new(Command::Message)
                        .with_header("subscription", id.as_str())
                        .with_header("message-id", "m-1")
                        .with_header("destination", topic)
                        .with_body(frame.body.clone()),
                ],
                _ => Vec::new(),
            }
        }
        Command::Disconnect => frame
            .header("receipt")
            .map(|receipt| vec![Frame::new(Command::Receipt).with_header("receipt-id", receipt)])
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Pump events into the chat until one produces an update matching `want`.
async fn wait_for(chat: &mut Chat<WsTransport>, want: impl Fn(&Update) -> bool) -> Update {
    timeout(WAIT, async {
        loop {
            let event = chat.next_event().await;
            let update = chat.handle_event(event);
            if want(&update) {
                return update;
            }
        }
    })
    .await
    .expect("update should arrive")
}

// =============================================================================
// TESTS
// =============================================================================

#[tokio::test]
async fn message_round_trips_through_broker() {
    let (endpoint, broker) = start_broker(Mode::Echo).await;
    let mut chat = Chat::new(WsTransport, endpoint, ErrorPolicy::Tolerate);

    chat.connect("alice", "general").expect("connect");
    wait_for(&mut chat, |update| *update == Update::Connected).await;
    assert_eq!(chat.status(), ConnectionStatus::Connected);

    assert!(chat.send("hi").expect("send"));
    let update = wait_for(&mut chat, |update| matches!(update, Update::Appended(_))).await;
    assert_eq!(update, Update::Appended(ChatMessage::new("alice", "hi")));
    assert_eq!(chat.messages(), [ChatMessage::new("alice", "hi")]);

    chat.shutdown(WAIT).await;
    assert!(!chat.has_client());
    assert!(chat.messages().is_empty());

    let received = timeout(WAIT, broker).await.expect("broker finishes").expect("broker task");
    let commands: Vec<Command> = received.iter().map(|frame| frame.command).collect();
    assert_eq!(commands, [Command::Connect, Command::Subscribe, Command::Send, Command::Disconnect]);

    let connect = &received[0];
    assert_eq!(connect.header("accept-version"), Some("1.2,1.1,1.0"));
    assert_eq!(connect.header("host"), Some("localhost"));

    let subscribe = &received[1];
    assert_eq!(subscribe.header("destination"), Some("/topic/general"));
    assert_eq!(subscribe.header("id"), Some("sub-0"));

    let send = &received[2];
    assert_eq!(send.header("destination"), Some("/app/chat/general"));
    assert_eq!(send.body, r#"{"message":"hi","user":"alice"}"#);

    assert!(received[3].header("receipt").is_some());
}

#[tokio::test]
async fn rejected_connect_disconnects_under_disconnect_policy() {
    let (endpoint, _broker) = start_broker(Mode::RejectConnect).await;
    let mut chat = Chat::new(WsTransport, endpoint, ErrorPolicy::Disconnect);

    chat.connect("alice", "general").expect("connect");
    let update = wait_for(&mut chat, |update| matches!(update, Update::ProtocolError { .. })).await;

    assert_eq!(
        update,
        Update::ProtocolError { message: "bad login".to_owned(), disconnected: true }
    );
    assert!(!chat.has_client());
    assert_eq!(chat.status(), ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn unreachable_broker_reports_closed_with_reason() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let endpoint = Endpoint {
        url: format!("ws://{addr}"),
        host: "localhost".to_owned(),
        heartbeat: HeartBeat::default(),
    };
    let mut chat = Chat::new(WsTransport, endpoint, ErrorPolicy::Tolerate);
    chat.connect("alice", "general").expect("connect");

    let event = timeout(WAIT, chat.next_event()).await.expect("closed event");
    let ClientEvent::Closed { reason } = event.clone() else {
        panic!("expected Closed, got {event:?}");
    };
    assert!(reason.is_some_and(|reason| reason.contains("connect failed")));

    assert!(matches!(chat.handle_event(event), Update::Closed { .. }));
    assert!(!chat.send("hi").expect("send"));

    // A closed transport does not block a fresh connect.
    chat.connect("alice", "general").expect("reconnect");
}

#[tokio::test]
async fn https_endpoint_dials_over_tls() {
    // Accepts TCP and hangs up, so the TLS handshake fails instead of stalling.
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            drop(stream);
        }
    });

    let url = format!("https://127.0.0.1:{port}/ws");
    let args = Args::try_parse_from(["roomchat", "--url", url.as_str()]).expect("args");
    let config = ClientConfig::from_args(&args).expect("config");
    assert_eq!(config.endpoint.url, format!("wss://127.0.0.1:{port}/ws/websocket"));

    let mut chat = Chat::new(WsTransport, config.endpoint, ErrorPolicy::Tolerate);
    chat.connect("alice", "general").expect("connect");

    let event = timeout(WAIT, chat.next_event()).await.expect("closed event");
    let reason = match event {
        ClientEvent::Closed { reason: Some(reason) } => reason,
        other => panic!("expected Closed with a reason, got {other:?}"),
    };
    assert!(reason.contains("connect failed"), "unexpected reason: {reason}");
    assert!(!reason.contains("TLS support not compiled in"), "tls missing: {reason}");
}
