use super::*;

fn session() -> Session {
    Session::new("alice", "general", "sub-0".to_owned())
}

#[test]
fn connect_form_marks_missing_username() {
    let rendered = render_connect_form(&UiState::default());
    assert!(rendered.contains("username: (required)"));
    assert!(rendered.contains("room:     general"));
    assert!(rendered.contains("set a username to connect"));
}

#[test]
fn connect_form_shows_ready_state() {
    let ui = UiState::new(Some("alice".to_owned()), "rust".to_owned());
    let rendered = render_connect_form(&ui);
    assert!(rendered.contains("username: alice"));
    assert!(rendered.contains("room:     rust"));
    assert!(rendered.contains("ready: /connect"));
}

#[test]
fn header_names_user_and_room() {
    assert!(render_header(&session()).contains("connected as alice in room general"));
}

#[test]
fn empty_log_shows_placeholder() {
    assert_eq!(render_messages(&[], "alice"), "Messages:\nNo messages yet");
}

#[test]
fn own_messages_are_right_aligned() {
    let own = render_message(&ChatMessage::new("alice", "hi"), "alice");
    assert_eq!(own.chars().count(), PANEL_WIDTH);
    assert!(own.ends_with("[alice] hi"));

    let other = render_message(&ChatMessage::new("bob", "yo"), "alice");
    assert_eq!(other, "[bob] yo");
}

#[test]
fn messages_render_in_order() {
    let messages = vec![ChatMessage::new("bob", "1"), ChatMessage::new("carol", "2")];
    assert_eq!(render_messages(&messages, "alice"), "Messages:\n[bob] 1\n[carol] 2");
}

#[test]
fn connected_update_renders_header_and_log() {
    let rendered = render_update(&Update::Connected, Some(&session()), &[]).expect("rendered");
    assert!(rendered.contains("connected as alice"));
    assert!(rendered.ends_with("No messages yet"));
}

#[test]
fn quiet_updates_render_nothing() {
    let s = session();
    assert_eq!(render_update(&Update::Dropped, Some(&s), &[]), None);
    assert_eq!(render_update(&Update::Ignored, Some(&s), &[]), None);
    assert_eq!(
        render_update(
            &Update::ProtocolError { message: "x".to_owned(), disconnected: false },
            Some(&s),
            &[]
        ),
        None
    );
}

#[test]
fn closing_updates_are_visible() {
    assert_eq!(
        render_update(&Update::Closed { reason: Some("refused".to_owned()) }, None, &[]),
        Some("! connection closed: refused".to_owned())
    );
    assert_eq!(
        render_update(
            &Update::ProtocolError { message: "bad".to_owned(), disconnected: true },
            None,
            &[]
        ),
        Some("! broker error: bad; disconnected".to_owned())
    );
}

#[test]
fn missing_username_error_prompts_user() {
    assert_eq!(render_error(&ChatError::MissingUsername), "! please enter a username");
}
