//! Room chat: connection manager, subscription relay and publisher.
//!
//! DESIGN
//! ======
//! `Chat` owns at most one [`ClientHandle`] and the [`Session`] it serves.
//! Nothing here awaits except [`Chat::next_event`]: `connect`, `send` and
//! `disconnect` only queue commands, and every outcome comes back as a
//! [`ClientEvent`] that the owner feeds to [`Chat::handle_event`]. All
//! mutation happens on whichever task owns the `Chat`.
//!
//! Dropping the handle on disconnect also drops its event receiver, so no
//! message can reach the log after `disconnect` returns.

#[cfg(test)]
#[path = "chat_test.rs"]
mod chat_test;

use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::ErrorPolicy;
use crate::net::{ClientError, ClientEvent, ClientHandle, Endpoint, Transport};
use crate::state::chat::{ChatMessage, ChatState, decode_incoming, encode_outgoing};
use crate::state::session::{ConnectionStatus, Session};

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("please enter a username")]
    MissingUsername,
    #[error("already connected; disconnect first")]
    AlreadyActive,
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// What an inbound event changed, for the view to render.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Update {
    Connected,
    Appended(ChatMessage),
    /// A MESSAGE body that failed to decode; the log is unchanged.
    Dropped,
    ProtocolError { message: String, disconnected: bool },
    Closed { reason: Option<String> },
    /// Event for another subscription, or arriving outside a session.
    Ignored,
}

pub struct Chat<T: Transport> {
    transport: T,
    endpoint: Endpoint,
    on_error: ErrorPolicy,
    client: Option<ClientHandle>,
    session: Option<Session>,
    log: ChatState,
    /// Set once the active handle's event stream has ended.
    events_done: bool,
    next_subscription: u64,
    decode_failures: u64,
}

impl<T: Transport> Chat<T> {
    pub fn new(transport: T, endpoint: Endpoint, on_error: ErrorPolicy) -> Self {
        Self {
            transport,
            endpoint,
            on_error,
            client: None,
            session: None,
            log: ChatState::default(),
            events_done: false,
            next_subscription: 0,
            decode_failures: 0,
        }
    }

    // =========================================================================
    // CONNECTION
    // =========================================================================

    /// Activate a client for `username` in `room_id`.
    ///
    /// Returns as soon as the transport is activated; the session becomes
    /// `Connected` only when the broker's CONNECTED arrives through
    /// [`Chat::handle_event`].
    ///
    /// # Errors
    ///
    /// [`ChatError::MissingUsername`] for empty or whitespace-only names and
    /// [`ChatError::AlreadyActive`] while a client with an open transport
    /// exists. Neither changes any state.
    pub fn connect(&mut self, username: &str, room_id: &str) -> Result<(), ChatError> {
        if username.trim().is_empty() {
            return Err(ChatError::MissingUsername);
        }
        if self.session.as_ref().is_some_and(|session| session.transport_open) {
            return Err(ChatError::AlreadyActive);
        }
        // A client whose transport already closed is only waiting to be released.
        self.disconnect();

        let subscription_id = format!("sub-{}", self.next_subscription);
        self.next_subscription += 1;

        info!(%username, %room_id, url = %self.endpoint.url, "connecting");
        self.client = Some(self.transport.activate(&self.endpoint));
        self.session = Some(Session::new(username, room_id, subscription_id));
        self.events_done = false;
        Ok(())
    }

    /// Release the client, forget the session and clear the log.
    ///
    /// Safe to call at any time; without a client it does nothing.
    pub fn disconnect(&mut self) {
        if let Some(client) = self.release() {
            client.deactivate();
        }
    }

    /// Like [`Chat::disconnect`], but waits up to `grace` for the transport
    /// to finish closing. Used on teardown.
    pub async fn shutdown(&mut self, grace: Duration) {
        if let Some(client) = self.release() {
            client.close(grace).await;
        }
    }

    fn release(&mut self) -> Option<ClientHandle> {
        let client = self.client.take()?;
        if let Some(session) = self.session.take() {
            info!(username = %session.username, room_id = %session.room_id(), "disconnected");
        }
        self.log.clear();
        self.events_done = false;
        Some(client)
    }

    // =========================================================================
    // INBOUND
    // =========================================================================

    /// Wait for the next event from the active client.
    ///
    /// Pends forever while there is no client or its stream has ended, so it
    /// can sit in a `select!` next to other input.
    pub async fn next_event(&mut self) -> ClientEvent {
        if !self.events_done {
            if let Some(client) = self.client.as_mut() {
                if let Some(event) = client.next_event().await {
                    return event;
                }
                debug!("client event stream ended");
                self.events_done = true;
            }
        }
        std::future::pending().await
    }

    /// Apply one event to the session and log.
    pub fn handle_event(&mut self, event: ClientEvent) -> Update {
        match event {
            ClientEvent::Connected { version, server } => self.on_connected(version, server),
            ClientEvent::Message { subscription, destination, body } => {
                self.on_message(&subscription, &destination, &body)
            }
            ClientEvent::ProtocolError { message, body } => self.on_protocol_error(message, &body),
            ClientEvent::Closed { reason } => {
                let Some(session) = self.session.as_mut() else {
                    return Update::Ignored;
                };
                session.transport_open = false;
                warn!(reason = reason.as_deref().unwrap_or("closed"), "transport closed");
                Update::Closed { reason }
            }
        }
    }

    fn on_connected(&mut self, version: Option<String>, server: Option<String>) -> Update {
        let (Some(client), Some(session)) = (self.client.as_ref(), self.session.as_mut()) else {
            return Update::Ignored;
        };
        if session.status == ConnectionStatus::Connected {
            return Update::Ignored;
        }

        session.status = ConnectionStatus::Connected;
        info!(
            version = version.as_deref().unwrap_or("unknown"),
            server = server.as_deref().unwrap_or("unknown"),
            room_id = %session.room_id(),
            "connected"
        );

        if let Err(error) =
            client.subscribe(&session.subscription_id, &session.destinations.subscribe)
        {
            warn!(%error, destination = %session.destinations.subscribe, "subscribe failed");
        }
        Update::Connected
    }

    fn on_message(&mut self, subscription: &str, destination: &str, body: &str) -> Update {
        let Some(session) = self.session.as_ref() else {
            return Update::Ignored;
        };
        if session.status != ConnectionStatus::Connected || subscription != session.subscription_id
        {
            debug!(%subscription, %destination, "message outside active subscription");
            return Update::Ignored;
        }

        match decode_incoming(body) {
            Ok(message) => {
                self.log.push(message.clone());
                Update::Appended(message)
            }
            Err(err) => {
                self.decode_failures += 1;
                error!(error = %err, %destination, "failed to parse chat message");
                Update::Dropped
            }
        }
    }

    fn on_protocol_error(&mut self, message: String, body: &str) -> Update {
        if self.session.is_none() {
            return Update::Ignored;
        }
        error!(%message, %body, "stomp error");

        let disconnected = self.on_error == ErrorPolicy::Disconnect;
        if disconnected {
            self.disconnect();
        }
        Update::ProtocolError { message, disconnected }
    }

    // =========================================================================
    // OUTBOUND
    // =========================================================================

    /// Publish `text` to the room as the session user.
    ///
    /// Returns `Ok(false)` without sending when there is no client, the text
    /// is empty, or the session is not active. `Ok(true)` means the frame
    /// was handed to the transport; delivery is not tracked.
    ///
    /// # Errors
    ///
    /// Encoding failures, or [`ClientError::Inactive`] if the transport task
    /// is gone.
    pub fn send(&mut self, text: &str) -> Result<bool, ChatError> {
        let (Some(client), Some(session)) = (self.client.as_ref(), self.session.as_ref()) else {
            return Ok(false);
        };
        if text.is_empty() || !session.is_active() {
            return Ok(false);
        }

        let body = encode_outgoing(&ChatMessage::new(session.username.as_str(), text))?;
        client.publish(&session.destinations.publish, body)?;
        debug!(destination = %session.destinations.publish, "message published");
        Ok(true)
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.session
            .as_ref()
            .map_or(ConnectionStatus::Disconnected, |session| session.status)
    }

    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    #[must_use]
    pub fn has_client(&self) -> bool {
        self.client.is_some()
    }

    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.log.messages
    }

    #[must_use]
    pub fn decode_failures(&self) -> u64 {
        self.decode_failures
    }
}

impl<T: Transport> Drop for Chat<T> {
    fn drop(&mut self) {
        self.disconnect();
    }
}
