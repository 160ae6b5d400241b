//! WebSocket STOMP transport.
//!
//! LIFECYCLE
//! =========
//! 1. `activate` spawns the session task and returns the handle at once
//! 2. Dial the endpoint, send CONNECT, wait in a `select!` loop over
//!    socket frames, handle commands and the heart-beat timer
//! 3. CONNECTED → `ClientEvent::Connected`, start heart-beats if negotiated
//! 4. Disconnect command (or dropped handle) → DISCONNECT, close socket
//! 5. Any exit → `ClientEvent::Closed`
//!
//! No reconnect: a failed or closed session stays closed.

#[cfg(test)]
#[path = "ws_test.rs"]
mod ws_test;

use std::time::Duration;

use frames::{Command, Frame, HEARTBEAT, HeartBeat};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, interval_at};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{ClientCommand, ClientError, ClientEvent, ClientHandle, ClientLink, Endpoint, Transport};

const ACCEPT_VERSION: &str = "1.2,1.1,1.0";
const JSON_CONTENT_TYPE: &str = "application/json";

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Transport that speaks STOMP over `tokio-tungstenite`.
#[derive(Clone, Copy, Debug, Default)]
pub struct WsTransport;

impl Transport for WsTransport {
    fn activate(&self, endpoint: &Endpoint) -> ClientHandle {
        let (handle, link) = super::channel();
        let task = tokio::spawn(run_client(endpoint.clone(), link));
        handle.with_task(task)
    }
}

// =============================================================================
// SESSION TASK
// =============================================================================

async fn run_client(endpoint: Endpoint, link: ClientLink) {
    let ClientLink { mut commands, events } = link;

    let reason = match run_session(&endpoint, &mut commands, &events).await {
        Ok(()) => {
            info!(url = %endpoint.url, "stomp session closed");
            None
        }
        Err(error) => {
            warn!(url = %endpoint.url, %error, "stomp session ended");
            Some(error.to_string())
        }
    };

    if events.send(ClientEvent::Closed { reason }).is_err() {
        debug!("client handle dropped before close");
    }
}

async fn run_session(
    endpoint: &Endpoint,
    commands: &mut mpsc::UnboundedReceiver<ClientCommand>,
    events: &mpsc::UnboundedSender<ClientEvent>,
) -> Result<(), ClientError> {
    let (mut socket, _) = connect_async(endpoint.url.as_str())
        .await
        .map_err(|error| ClientError::Connect(Box::new(error)))?;
    info!(url = %endpoint.url, "websocket open");

    send_frame(&mut socket, &connect_frame(endpoint)).await?;

    let mut heartbeat: Option<Interval> = None;

    loop {
        tokio::select! {
            message = socket.next() => {
                let Some(message) = message else {
                    return Err(ClientError::SocketClosed);
                };
                match message.map_err(|error| ClientError::Socket(Box::new(error)))? {
                    Message::Text(text) => {
                        dispatch_text(text.as_str(), endpoint.heartbeat, events, &mut heartbeat);
                    }
                    Message::Binary(bytes) => match std::str::from_utf8(&bytes) {
                        Ok(text) => dispatch_text(text, endpoint.heartbeat, events, &mut heartbeat),
                        Err(error) => warn!(%error, "dropping non-utf8 binary message"),
                    },
                    Message::Close(_) => return Ok(()),
                    _ => {}
                }
            }
            command = commands.recv() => {
                let command = command.unwrap_or(ClientCommand::Disconnect);
                let done = command == ClientCommand::Disconnect;
                send_frame(&mut socket, &command_frame(command)).await?;
                if done {
                    if let Err(error) = socket.close(None).await {
                        debug!(%error, "close after DISCONNECT failed");
                    }
                    return Ok(());
                }
            }
            () = tick(&mut heartbeat) => {
                socket
                    .send(Message::Text(HEARTBEAT.into()))
                    .await
                    .map_err(|error| ClientError::Socket(Box::new(error)))?;
            }
        }
    }
}

async fn send_frame(socket: &mut Socket, frame: &Frame) -> Result<(), ClientError> {
    debug!(target: "stomp", command = %frame.command, ">>> frame");
    socket
        .send(Message::Text(frames::encode_frame(frame).into()))
        .await
        .map_err(|error| ClientError::Socket(Box::new(error)))
}

fn dispatch_text(
    text: &str,
    offered: HeartBeat,
    events: &mpsc::UnboundedSender<ClientEvent>,
    heartbeat: &mut Option<Interval>,
) {
    let decoded = match frames::decode_frames(text) {
        Ok(decoded) => decoded,
        Err(error) => {
            warn!(%error, "dropping undecodable websocket message");
            return;
        }
    };

    for frame in decoded {
        debug!(target: "stomp", command = %frame.command, "<<< frame");
        if frame.command == Command::Connected {
            *heartbeat = negotiated_interval(&frame, offered).map(start_interval);
        }
        let Some(event) = event_for(frame) else {
            continue;
        };
        if events.send(event).is_err() {
            debug!("client handle dropped; event discarded");
        }
    }
}

async fn tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

fn start_interval(period: Duration) -> Interval {
    interval_at(Instant::now() + period, period)
}

// =============================================================================
// FRAME MAPPING
// =============================================================================

fn connect_frame(endpoint: &Endpoint) -> Frame {
    Frame::new(Command::Connect)
        .with_header("accept-version", ACCEPT_VERSION)
        .with_header("host", endpoint.host.as_str())
        .with_header("heart-beat", endpoint.heartbeat.to_header())
}

fn command_frame(command: ClientCommand) -> Frame {
    match command {
        ClientCommand::Subscribe { id, destination } => Frame::new(Command::Subscribe)
            .with_header("id", id)
            .with_header("destination", destination)
            .with_header("ack", "auto"),
        ClientCommand::Publish { destination, body } => Frame::new(Command::Send)
            .with_header("destination", destination)
            .with_header("content-type", JSON_CONTENT_TYPE)
            .with_body(body),
        ClientCommand::Disconnect => {
            Frame::new(Command::Disconnect).with_header("receipt", Uuid::new_v4().to_string())
        }
    }
}

/// Map an inbound frame to the event the chat layer sees, if any.
fn event_for(frame: Frame) -> Option<ClientEvent> {
    match frame.command {
        Command::Connected => Some(ClientEvent::Connected {
            version: frame.header("version").map(ToOwned::to_owned),
            server: frame.header("server").map(ToOwned::to_owned),
        }),
        Command::Message => Some(ClientEvent::Message {
            subscription: frame.header("subscription").unwrap_or_default().to_owned(),
            destination: frame.header("destination").unwrap_or_default().to_owned(),
            body: frame.body,
        }),
        Command::Error => Some(ClientEvent::ProtocolError {
            message: frame.header("message").unwrap_or("broker error").to_owned(),
            body: frame.body,
        }),
        Command::Receipt => {
            debug!(receipt = frame.header("receipt-id").unwrap_or_default(), "receipt");
            None
        }
        other => {
            debug!(command = %other, "ignoring unexpected frame from broker");
            None
        }
    }
}

/// Outgoing heart-beat period agreed with the broker's CONNECTED frame.
fn negotiated_interval(connected: &Frame, offered: HeartBeat) -> Option<Duration> {
    let server = match connected.header("heart-beat").map(HeartBeat::parse) {
        Some(Ok(server)) => server,
        Some(Err(error)) => {
            warn!(%error, "ignoring broker heart-beat header");
            return None;
        }
        None => HeartBeat::default(),
    };
    offered.send_interval(server)
}
