use super::*;

#[test]
fn event_names_round_trip_through_kind() {
    for name in [REGISTER_USER, SEND_MESSAGE, RECEIVE_MESSAGE, TYPING, STOP_TYPING, ONLINE_USERS] {
        let kind = name.parse::<EventKind>().expect("known event");
        assert_eq!(kind.as_str(), name);
    }
}

#[test]
fn unknown_event_name_is_rejected() {
    let err = "chat:message".parse::<EventKind>().expect_err("unknown");
    assert!(matches!(err, PayloadError::UnknownEvent(name) if name == "chat:message"));
}

#[test]
fn receive_message_parses_chat_message() {
    let payload = serde_json::json!({"name": "Alice", "message": "hi"});
    let parsed = Inbound::parse(EventKind::ReceiveMessage, &payload).expect("message");
    assert_eq!(parsed, Inbound::Message(ChatMessage::new("Alice", "hi")));
}

#[test]
fn receive_message_rejects_missing_body() {
    let payload = serde_json::json!({"name": "Alice"});
    let err = Inbound::parse(EventKind::ReceiveMessage, &payload).expect_err("missing message");
    assert!(matches!(err, PayloadError::Shape { event: EventKind::ReceiveMessage, .. }));
}

#[test]
fn receive_message_rejects_non_string_fields() {
    let payload = serde_json::json!({"name": 3, "message": "hi"});
    assert!(Inbound::parse(EventKind::ReceiveMessage, &payload).is_err());
}

#[test]
fn typing_requires_string_payload() {
    let ok = Inbound::parse(EventKind::Typing, &serde_json::json!("Ana")).expect("typing");
    assert_eq!(ok, Inbound::Typing("Ana".to_owned()));
    assert!(Inbound::parse(EventKind::Typing, &serde_json::json!({"name": "Ana"})).is_err());
}

#[test]
fn stop_typing_accepts_name_or_absent_payload() {
    let named = Inbound::parse(EventKind::StopTyping, &serde_json::json!("Ana")).expect("named");
    assert_eq!(named, Inbound::StopTyping(Some("Ana".to_owned())));
    let bare = Inbound::parse(EventKind::StopTyping, &Value::Null).expect("bare");
    assert_eq!(bare, Inbound::StopTyping(None));
    assert!(Inbound::parse(EventKind::StopTyping, &serde_json::json!(1)).is_err());
}

#[test]
fn online_users_keeps_coordinator_order() {
    let payload = serde_json::json!(["Zed", "Ana", "Bob"]);
    let parsed = Inbound::parse(EventKind::OnlineUsers, &payload).expect("users");
    assert_eq!(
        parsed,
        Inbound::OnlineUsers(vec!["Zed".to_owned(), "Ana".to_owned(), "Bob".to_owned()])
    );
}

#[test]
fn online_users_rejects_mixed_array() {
    let payload = serde_json::json!(["Ana", 2]);
    assert!(Inbound::parse(EventKind::OnlineUsers, &payload).is_err());
}

#[test]
fn outbound_only_events_are_not_parsed_as_inbound() {
    let err = Inbound::parse(EventKind::RegisterUser, &serde_json::json!("Bob")).expect_err("outbound");
    assert!(matches!(err, PayloadError::NotInbound(EventKind::RegisterUser)));
}

#[test]
fn from_frame_resolves_event_name() {
    let frame = new_frame(EventKind::Typing, serde_json::json!("Ana"));
    assert_eq!(Inbound::from_frame(&frame).expect("typing"), Inbound::Typing("Ana".to_owned()));
}

#[test]
fn send_message_payload_has_name_and_message() {
    let out = Outbound::SendMessage(ChatMessage::new("Alice", "hi"));
    assert_eq!(out.kind(), EventKind::SendMessage);
    assert_eq!(out.payload(), serde_json::json!({"name": "Alice", "message": "hi"}));
}

#[test]
fn name_events_carry_plain_string_payload() {
    assert_eq!(Outbound::RegisterUser("Bob".into()).payload(), serde_json::json!("Bob"));
    assert_eq!(Outbound::StopTyping("Bob".into()).payload(), serde_json::json!("Bob"));
}

#[test]
fn new_frame_assigns_id_and_timestamp() {
    let a = new_frame(EventKind::RegisterUser, serde_json::json!("Bob"));
    let b = new_frame(EventKind::RegisterUser, serde_json::json!("Bob"));
    assert_eq!(a.event, "register_user");
    assert_ne!(a.id, b.id);
    assert!(a.ts > 0);
}
