//! STOMP client seam between the chat layer and the wire.
//!
//! DESIGN
//! ======
//! A [`Transport`] activates a client and immediately returns a
//! [`ClientHandle`]. The handle is two unbounded channels: commands go out
//! to the transport task, typed [`ClientEvent`]s come back. The chat layer
//! never sees frames or sockets, and tests swap the WebSocket transport for
//! a channel pair via [`channel`].
//!
//! Dropping the handle closes the command channel, which the transport
//! treats as a disconnect.

pub mod ws;


use std::time::Duration;

use frames::HeartBeat;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub use ws::WsTransport;

/// Where and how to open the STOMP session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    /// WebSocket URL to dial.
    pub url: String,
    /// Value of the CONNECT `host` header.
    pub host: String,
    /// Heart-beat intervals offered in CONNECT.
    pub heartbeat: HeartBeat,
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("websocket connect failed: {0}")]
    Connect(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("websocket failed: {0}")]
    Socket(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("websocket closed by peer")]
    SocketClosed,
    #[error("client is not running")]
    Inactive,
}

/// Requests from the chat layer to the transport task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientCommand {
    Subscribe { id: String, destination: String },
    Publish { destination: String, body: String },
    Disconnect,
}

/// Everything the transport reports back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientEvent {
    /// CONNECTED received; the session is usable.
    Connected { version: Option<String>, server: Option<String> },
    /// MESSAGE received on a subscription.
    Message { subscription: String, destination: String, body: String },
    /// ERROR frame from the broker.
    ProtocolError { message: String, body: String },
    /// The transport stopped. `reason` is set when it stopped on an error.
    Closed { reason: Option<String> },
}

/// Activates STOMP clients.
pub trait Transport {
    fn activate(&self, endpoint: &Endpoint) -> ClientHandle;
}

/// Owning handle to one active client.
#[derive(Debug)]
pub struct ClientHandle {
    commands: mpsc::UnboundedSender<ClientCommand>,
    events: mpsc::UnboundedReceiver<ClientEvent>,
    task: Option<JoinHandle<()>>,
}

/// Transport-facing ends of a [`ClientHandle`].
#[derive(Debug)]
pub struct ClientLink {
    pub commands: mpsc::UnboundedReceiver<ClientCommand>,
    pub events: mpsc::UnboundedSender<ClientEvent>,
}

/// Create a connected handle/link pair.
#[must_use]
pub fn channel() -> (ClientHandle, ClientLink) {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    (
        ClientHandle { commands: command_tx, events: event_rx, task: None },
        ClientLink { commands: command_rx, events: event_tx },
    )
}

impl ClientHandle {
    /// Attach the task running the transport so [`ClientHandle::close`] can
    /// wait for it.
    #[must_use]
    pub fn with_task(mut self, task: JoinHandle<()>) -> Self {
        self.task = Some(task);
        self
    }

    /// # Errors
    ///
    /// [`ClientError::Inactive`] if the transport task has exited.
    pub fn subscribe(&self, id: &str, destination: &str) -> Result<(), ClientError> {
        self.command(ClientCommand::Subscribe {
            id: id.to_owned(),
            destination: destination.to_owned(),
        })
    }

    /// Fire-and-forget SEND; no receipt is requested.
    ///
    /// # Errors
    ///
    /// [`ClientError::Inactive`] if the transport task has exited.
    pub fn publish(&self, destination: &str, body: String) -> Result<(), ClientError> {
        self.command(ClientCommand::Publish { destination: destination.to_owned(), body })
    }

    /// Ask the transport to send DISCONNECT and close, consuming the handle.
    pub fn deactivate(self) {
        if self.command(ClientCommand::Disconnect).is_err() {
            tracing::debug!("deactivate: transport already stopped");
        }
    }

    /// Deactivate, then wait up to `grace` for the transport task to finish
    /// its DISCONNECT and socket close.
    pub async fn close(mut self, grace: Duration) {
        let task = self.task.take();
        self.deactivate();
        let Some(task) = task else {
            return;
        };
        match tokio::time::timeout(grace, task).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => tracing::warn!(%error, "transport task failed"),
            Err(_) => tracing::debug!(?grace, "transport still closing after grace period"),
        }
    }

    /// Next inbound event; `None` once the transport has dropped its sender.
    pub async fn next_event(&mut self) -> Option<ClientEvent> {
        self.events.recv().await
    }

    fn command(&self, command: ClientCommand) -> Result<(), ClientError> {
        self.commands.send(command).map_err(|_| ClientError::Inactive)
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
