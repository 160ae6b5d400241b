#[cfg(test)]
#[path = "chat_test.rs"]
mod chat_test;

use serde::{Deserialize, Serialize};

/// Message log for the room, in arrival order.
#[derive(Clone, Debug, Default)]
pub struct ChatState {
    pub messages: Vec<ChatMessage>,
}

impl ChatState {
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// A single chat message as carried in SEND and MESSAGE bodies.
///
/// On the wire: `{"message": "...", "user": "..."}`. `sender` is accepted as
/// an alias for `user` when decoding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(rename = "message")]
    pub text: String,
    #[serde(rename = "user", alias = "sender")]
    pub sender: String,
}

impl ChatMessage {
    #[must_use]
    pub fn new(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self { text: text.into(), sender: sender.into() }
    }
}

/// Encode an outgoing message body.
///
/// # Errors
///
/// Propagates `serde_json` serialization failures.
pub fn encode_outgoing(message: &ChatMessage) -> Result<String, serde_json::Error> {
    serde_json::to_string(message)
}

/// Decode an incoming MESSAGE body.
///
/// # Errors
///
/// Fails when the body is not JSON or lacks either string field.
pub fn decode_incoming(body: &str) -> Result<ChatMessage, serde_json::Error> {
    serde_json::from_str(body)
}
