//! Terminal view loop.
//!
//! DESIGN
//! ======
//! `App` is the view state machine: it owns the [`Chat`] and the editable
//! [`UiState`] and turns input lines and client events into output text.
//! `run` is the only place that touches stdin/stdout; it `select!`s over
//! input lines and [`Chat::next_event`] on a single task, so all state
//! changes are serialized without locks.

#[cfg(test)]
#[path = "app_test.rs"]
mod app_test;

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use crate::chat::{Chat, Update};
use crate::config::ConfigError;
use crate::net::{ClientEvent, Transport};
use crate::state::session::Session;
use crate::state::ui::UiState;
use crate::view;

/// How long teardown waits for DISCONNECT to reach the broker.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("terminal input failed: {0}")]
    Io(#[from] std::io::Error),
}

/// One parsed input line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Input {
    User(String),
    Room(String),
    Connect,
    Disconnect,
    Help,
    Quit,
    Text(String),
    Unknown(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Continue,
    Quit,
}

/// Parse a line typed by the user. `//` escapes a leading slash.
#[must_use]
pub fn parse_input(line: &str) -> Input {
    let line = line.trim_end_matches(['\r', '\n']);
    if let Some(text) = line.strip_prefix("//") {
        return Input::Text(format!("/{text}"));
    }
    let Some(command) = line.strip_prefix('/') else {
        return Input::Text(line.to_owned());
    };

    let (name, arg) = command
        .split_once(char::is_whitespace)
        .map_or((command, ""), |(name, arg)| (name, arg.trim()));

    match name {
        "user" => Input::User(arg.to_owned()),
        "room" => Input::Room(arg.to_owned()),
        "connect" => Input::Connect,
        "disconnect" => Input::Disconnect,
        "help" => Input::Help,
        "quit" | "exit" => Input::Quit,
        _ => Input::Unknown(line.to_owned()),
    }
}

pub struct App<T: Transport> {
    chat: Chat<T>,
    ui: UiState,
}

impl<T: Transport> App<T> {
    pub fn new(chat: Chat<T>, ui: UiState) -> Self {
        Self { chat, ui }
    }

    #[must_use]
    pub fn chat(&self) -> &Chat<T> {
        &self.chat
    }

    #[must_use]
    pub fn ui(&self) -> &UiState {
        &self.ui
    }

    /// Connected with a live transport; a closed transport reads as the form.
    fn connected(&self) -> bool {
        self.chat.session().is_some_and(Session::is_active)
    }

    /// A client with an open transport exists, whether or not CONNECTED
    /// has arrived yet.
    fn engaged(&self) -> bool {
        self.chat.session().is_some_and(|session| session.transport_open)
    }

    /// Apply one input line, appending anything to print to `out`.
    pub fn apply(&mut self, input: Input, out: &mut Vec<String>) -> Step {
        match input {
            Input::Quit => return Step::Quit,
            Input::Help => out.push(if self.connected() {
                view::PANEL_HELP.to_owned()
            } else {
                view::FORM_HELP.to_owned()
            }),
            Input::User(_) | Input::Room(_) if self.connected() => {
                out.push("disconnect before changing user or room".to_owned());
            }
            Input::User(_) | Input::Room(_) if self.engaged() => {
                out.push("connect in progress; /disconnect to change user or room".to_owned());
            }
            Input::User(name) => {
                self.ui.username = name;
                out.push(view::render_connect_form(&self.ui));
            }
            Input::Room(room) if room.is_empty() => out.push("usage: /room <id>".to_owned()),
            Input::Room(room) => {
                self.ui.room_id = room;
                out.push(view::render_connect_form(&self.ui));
            }
            Input::Connect if self.connected() => out.push("already connected".to_owned()),
            Input::Connect if self.engaged() => out.push("connect in progress".to_owned()),
            Input::Connect => match self.chat.connect(&self.ui.username, &self.ui.room_id) {
                Ok(()) => out.push(format!(
                    "connecting to room {} as {}...",
                    self.ui.room_id,
                    self.ui.username.trim()
                )),
                Err(error) => out.push(view::render_error(&error)),
            },
            Input::Disconnect => {
                self.chat.disconnect();
                out.push(view::render_connect_form(&self.ui));
            }
            Input::Text(text) => self.send(text, out),
            Input::Unknown(line) => out.push(format!("unknown command: {line} (try /help)")),
        }
        Step::Continue
    }

    fn send(&mut self, text: String, out: &mut Vec<String>) {
        if !self.connected() {
            if !text.is_empty() {
                out.push("not connected; /connect first".to_owned());
            }
            return;
        }

        self.ui.draft = text;
        match self.chat.send(&self.ui.draft) {
            Ok(true) => self.ui.draft.clear(),
            Ok(false) if self.ui.draft.is_empty() => {}
            Ok(false) => out.push("message not sent: connection is not active".to_owned()),
            Err(error) => out.push(view::render_error(&error)),
        }
    }

    /// Apply one client event, appending anything to print to `out`.
    pub fn on_event(&mut self, event: ClientEvent, out: &mut Vec<String>) {
        let update = self.chat.handle_event(event);
        if let Some(text) = view::render_update(&update, self.chat.session(), self.chat.messages()) {
            out.push(text);
        }
        if matches!(update, Update::Closed { .. } | Update::ProtocolError { disconnected: true, .. }) {
            out.push(view::render_connect_form(&self.ui));
        }
    }

    /// Drive the terminal until `/quit` or end of input.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] if stdin fails.
    pub async fn run(mut self, auto_connect: bool) -> Result<(), AppError> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut out = vec![view::render_connect_form(&self.ui)];
        if auto_connect {
            self.apply(Input::Connect, &mut out);
        }
        flush(&mut out);

        let result = loop {
            let step = tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => self.apply(parse_input(&line), &mut out),
                    Ok(None) => Step::Quit,
                    Err(error) => break Err(AppError::Io(error)),
                },
                event = self.chat.next_event() => {
                    self.on_event(event, &mut out);
                    Step::Continue
                }
            };
            flush(&mut out);
            if step == Step::Quit {
                break Ok(());
            }
        };

        if let Err(error) = &result {
            warn!(%error, "view loop stopped");
        }
        self.chat.shutdown(SHUTDOWN_GRACE).await;
        result
    }
}

fn flush(out: &mut Vec<String>) {
    for line in out.drain(..) {
        println!("{line}");
    }
}
