#[cfg(test)]
#[path = "ui_test.rs"]
mod ui_test;

use crate::config::DEFAULT_ROOM;

/// Editable view state: the connect form fields and the outgoing draft.
#[derive(Clone, Debug)]
pub struct UiState {
    pub username: String,
    pub room_id: String,
    pub draft: String,
}

impl Default for UiState {
    fn default() -> Self {
        Self { username: String::new(), room_id: DEFAULT_ROOM.to_owned(), draft: String::new() }
    }
}

impl UiState {
    #[must_use]
    pub fn new(username: Option<String>, room_id: String) -> Self {
        Self { username: username.unwrap_or_default(), room_id, draft: String::new() }
    }

    /// Mirrors the disabled state of the connect button.
    #[must_use]
    pub fn can_connect(&self) -> bool {
        !self.username.trim().is_empty()
    }
}
