//! Room identifier → STOMP destinations.

#[cfg(test)]
#[path = "destination_test.rs"]
mod destination_test;

/// Prefix for application-handled destinations the client publishes to.
pub const PUBLISH_PREFIX: &str = "/app/chat/";

/// Prefix for broker topics the client subscribes to.
pub const SUBSCRIBE_PREFIX: &str = "/topic/";

/// Publish and subscribe destinations for one room.
///
/// Both are always built from the same room identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Destinations {
    pub room_id: String,
    pub publish: String,
    pub subscribe: String,
}

/// Publish and subscribe destinations for `room_id`.
#[must_use]
pub fn for_room(room_id: &str) -> Destinations {
    Destinations {
        room_id: room_id.to_owned(),
        publish: format!("{PUBLISH_PREFIX}{room_id}"),
        subscribe: format!("{SUBSCRIBE_PREFIX}{room_id}"),
    }
}
