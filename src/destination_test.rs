use super::*;

#[test]
fn general_room_maps_to_app_and_topic_paths() {
    let dest = for_room("general");
    assert_eq!(dest.publish, "/app/chat/general");
    assert_eq!(dest.subscribe, "/topic/general");
    assert_eq!(dest.room_id, "general");
}

#[test]
fn both_destinations_share_the_room_identifier() {
    for room in ["general", "rust-lang", "a b", "42"] {
        let dest = for_room(room);
        assert_eq!(dest.publish.strip_prefix(PUBLISH_PREFIX), Some(room));
        assert_eq!(dest.subscribe.strip_prefix(SUBSCRIBE_PREFIX), Some(room));
    }
}
