//! Terminal rendering for the connect form and the chat panel.
//!
//! Every function returns the text to print so the layout is testable
//! without a terminal.

#[cfg(test)]
#[path = "view_test.rs"]
mod view_test;

use crate::chat::{ChatError, Update};
use crate::state::chat::ChatMessage;
use crate::state::session::Session;
use crate::state::ui::UiState;

/// Width own messages are right-aligned to.
pub const PANEL_WIDTH: usize = 60;

const TITLE: &str = "== Real-time chat ==";
const EMPTY_LOG: &str = "No messages yet";

pub const FORM_HELP: &str = "/user <name>  /room <id>  /connect  /quit";
pub const PANEL_HELP: &str = "type to send  /disconnect  /quit  (start a line with // to send a leading /)";

#[must_use]
pub fn render_connect_form(ui: &UiState) -> String {
    let username = if ui.username.trim().is_empty() {
        "(required)"
    } else {
        ui.username.as_str()
    };
    let connect_hint = if ui.can_connect() {
        "ready: /connect"
    } else {
        "set a username to connect"
    };
    format!(
        "{TITLE}\nusername: {username}\nroom:     {room}\n{connect_hint}\n{FORM_HELP}",
        room = ui.room_id,
    )
}

#[must_use]
pub fn render_header(session: &Session) -> String {
    format!(
        "{TITLE}\nconnected as {} in room {}\n{PANEL_HELP}",
        session.username,
        session.room_id()
    )
}

/// The full message list as shown right after connecting.
#[must_use]
pub fn render_messages(messages: &[ChatMessage], own: &str) -> String {
    if messages.is_empty() {
        return format!("Messages:\n{EMPTY_LOG}");
    }
    let lines = messages
        .iter()
        .map(|message| render_message(message, own))
        .collect::<Vec<_>>()
        .join("\n");
    format!("Messages:\n{lines}")
}

/// One message; the local user's own messages sit on the right.
#[must_use]
pub fn render_message(message: &ChatMessage, own: &str) -> String {
    let line = format!("[{}] {}", message.sender, message.text);
    if message.sender == own {
        format!("{line:>PANEL_WIDTH$}")
    } else {
        line
    }
}

/// Text for an inbound update, if it is worth showing.
///
/// Dropped payloads and tolerated protocol errors are only logged.
#[must_use]
pub fn render_update(update: &Update, session: Option<&Session>, messages: &[ChatMessage]) -> Option<String> {
    match update {
        Update::Connected => {
            let session = session?;
            Some(format!(
                "{}\n{}",
                render_header(session),
                render_messages(messages, &session.username)
            ))
        }
        Update::Appended(message) => {
            let own = session.map_or("", |session| session.username.as_str());
            Some(render_message(message, own))
        }
        Update::ProtocolError { message, disconnected: true } => {
            Some(format!("! broker error: {message}; disconnected"))
        }
        Update::Closed { reason } => Some(match reason {
            Some(reason) => format!("! connection closed: {reason}"),
            None => "! connection closed".to_owned(),
        }),
        Update::Dropped | Update::ProtocolError { .. } | Update::Ignored => None,
    }
}

#[must_use]
pub fn render_error(error: &ChatError) -> String {
    format!("! {error}")
}
