use crate::destination::{self, Destinations};

/// Connection status as shown by the view.
///
/// There is no "connecting" state: an in-flight connect still reads as
/// `Disconnected` until the broker answers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connected,
}

/// One user-initiated chat session, from `connect` to `disconnect`.
#[derive(Clone, Debug)]
pub struct Session {
    pub username: String,
    pub destinations: Destinations,
    /// Id used on the room SUBSCRIBE; incoming MESSAGE frames must carry it.
    pub subscription_id: String,
    pub status: ConnectionStatus,
    /// False once the transport reports it closed.
    pub transport_open: bool,
}

impl Session {
    #[must_use]
    pub fn new(username: &str, room_id: &str, subscription_id: String) -> Self {
        Self {
            username: username.to_owned(),
            destinations: destination::for_room(room_id),
            subscription_id,
            status: ConnectionStatus::Disconnected,
            transport_open: true,
        }
    }

    #[must_use]
    pub fn room_id(&self) -> &str {
        &self.destinations.room_id
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == ConnectionStatus::Connected && self.transport_open
    }
}
