use super::*;
use std::sync::Mutex;

fn recorder() -> (Arc<Mutex<Vec<Value>>>, impl Fn(&Value) + Send + Sync + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (seen, move |value: &Value| {
        sink.lock().expect("recorder mutex should lock").push(value.clone());
    })
}

fn inbound(kind: EventKind, data: Value) -> Frame {
    event::new_frame(kind, data)
}

#[test]
fn publish_queues_named_frame_in_outbox() {
    let (channel, mut outbox) = Channel::new();
    channel.publish(EventKind::RegisterUser, serde_json::json!("Bob"));

    let frame = outbox.try_recv().expect("frame should be queued");
    assert_eq!(frame.event, "register_user");
    assert_eq!(frame.data, serde_json::json!("Bob"));
    assert!(outbox.try_recv().is_none());
}

#[test]
fn publish_event_uses_outbound_payload() {
    let (channel, mut outbox) = Channel::new();
    channel.publish_event(&Outbound::SendMessage(event::ChatMessage::new("Alice", "hi")));

    let frame = outbox.try_recv().expect("frame");
    assert_eq!(frame.event, "send_message");
    assert_eq!(frame.data, serde_json::json!({"name": "Alice", "message": "hi"}));
}

#[test]
fn publish_after_outbox_dropped_does_not_panic() {
    let (channel, outbox) = Channel::new();
    drop(outbox);
    channel.publish(EventKind::Typing, serde_json::json!("Bob"));
}

#[test]
fn dispatch_reaches_only_matching_subscribers_in_order() {
    let (channel, _outbox) = Channel::new();
    let (typing_seen, typing_handler) = recorder();
    let (users_seen, users_handler) = recorder();
    let _typing = channel.subscribe(EventKind::Typing, typing_handler);
    let _users = channel.subscribe(EventKind::OnlineUsers, users_handler);

    channel.dispatch(&inbound(EventKind::Typing, serde_json::json!("Ana")));
    channel.dispatch(&inbound(EventKind::OnlineUsers, serde_json::json!(["Ana"])));
    channel.dispatch(&inbound(EventKind::Typing, serde_json::json!("Cy")));

    let typing = typing_seen.lock().expect("lock").clone();
    assert_eq!(typing, vec![serde_json::json!("Ana"), serde_json::json!("Cy")]);
    assert_eq!(users_seen.lock().expect("lock").len(), 1);
}

#[test]
fn handlers_for_one_event_run_in_registration_order() {
    let (channel, _outbox) = Channel::new();
    let order = Arc::new(Mutex::new(Vec::new()));
    let first = Arc::clone(&order);
    let second = Arc::clone(&order);
    let _a = channel.subscribe(EventKind::Typing, move |_| first.lock().expect("lock").push(1));
    let _b = channel.subscribe(EventKind::Typing, move |_| second.lock().expect("lock").push(2));

    let invoked = channel.dispatch(&inbound(EventKind::Typing, serde_json::json!("Ana")));
    assert_eq!(invoked, 2);
    assert_eq!(*order.lock().expect("lock"), vec![1, 2]);
}

#[test]
fn dropped_subscription_is_never_invoked_again() {
    let (channel, _outbox) = Channel::new();
    let (seen, handler) = recorder();
    let subscription = channel.subscribe(EventKind::StopTyping, handler);

    channel.dispatch(&inbound(EventKind::StopTyping, Value::Null));
    drop(subscription);
    channel.dispatch(&inbound(EventKind::StopTyping, Value::Null));

    assert_eq!(seen.lock().expect("lock").len(), 1);
    assert_eq!(channel.subscriber_count(EventKind::StopTyping), 0);
}

#[test]
fn unsubscribe_removes_only_that_registration() {
    let (channel, _outbox) = Channel::new();
    let (kept_seen, kept) = recorder();
    let (gone_seen, gone) = recorder();
    let _kept = channel.subscribe(EventKind::ReceiveMessage, kept);
    let gone = channel.subscribe(EventKind::ReceiveMessage, gone);

    channel.unsubscribe(gone);
    channel.dispatch(&inbound(
        EventKind::ReceiveMessage,
        serde_json::json!({"name": "Ana", "message": "yo"}),
    ));

    assert_eq!(kept_seen.lock().expect("lock").len(), 1);
    assert!(gone_seen.lock().expect("lock").is_empty());
    assert_eq!(channel.subscriber_count(EventKind::ReceiveMessage), 1);
}

#[test]
fn subscription_outliving_channel_drops_cleanly() {
    let (channel, outbox) = Channel::new();
    let subscription = channel.subscribe(EventKind::Typing, |_| {});
    drop(channel);
    drop(outbox);
    assert_eq!(subscription.kind(), Some(EventKind::Typing));
    drop(subscription);
}

#[test]
fn unknown_event_is_dropped_without_invoking_handlers() {
    let (channel, _outbox) = Channel::new();
    let (seen, handler) = recorder();
    let _sub = channel.subscribe(EventKind::Typing, handler);

    let frame = Frame {
        id: "x".to_owned(),
        ts: 0,
        event: "presence:update".to_owned(),
        data: serde_json::json!("Ana"),
    };
    assert_eq!(channel.dispatch(&frame), 0);
    assert!(seen.lock().expect("lock").is_empty());
}

#[test]
fn handler_may_unsubscribe_others_during_dispatch() {
    let (channel, _outbox) = Channel::new();
    let victim = Arc::new(Mutex::new(Some(channel.subscribe(EventKind::Typing, |_| {}))));
    let slot = Arc::clone(&victim);
    let _killer = channel.subscribe(EventKind::Typing, move |_| {
        slot.lock().expect("lock").take();
    });

    channel.dispatch(&inbound(EventKind::Typing, serde_json::json!("Ana")));
    assert_eq!(channel.subscriber_count(EventKind::Typing), 1);
}

#[tokio::test]
async fn lifecycle_reports_only_real_transitions() {
    let (channel, _outbox) = Channel::new();
    let mut lifecycle = channel.lifecycle();
    assert_eq!(*lifecycle.borrow_and_update(), ConnectionStatus::Disconnected);

    channel.set_status(ConnectionStatus::Disconnected);
    assert!(!lifecycle.has_changed().expect("sender alive"));

    channel.set_status(ConnectionStatus::Connected);
    lifecycle.changed().await.expect("changed");
    assert_eq!(*lifecycle.borrow_and_update(), ConnectionStatus::Connected);
    assert_eq!(channel.status(), ConnectionStatus::Connected);
}

#[test]
fn lifecycle_handlers_see_every_transition_in_order() {
    let (channel, _outbox) = Channel::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let subscription = channel.subscribe_lifecycle(move |status| {
        sink.lock().expect("lock").push(status);
    });
    assert_eq!(subscription.kind(), None);
    assert_eq!(channel.lifecycle_subscriber_count(), 1);

    channel.set_status(ConnectionStatus::Connected);
    channel.set_status(ConnectionStatus::Disconnected);
    channel.set_status(ConnectionStatus::Connecting);
    channel.set_status(ConnectionStatus::Connecting);
    channel.set_status(ConnectionStatus::Connected);

    assert_eq!(
        *seen.lock().expect("lock"),
        vec![
            ConnectionStatus::Connected,
            ConnectionStatus::Disconnected,
            ConnectionStatus::Connecting,
            ConnectionStatus::Connected,
        ]
    );

    drop(subscription);
    assert_eq!(channel.lifecycle_subscriber_count(), 0);
    channel.set_status(ConnectionStatus::Disconnected);
    assert_eq!(seen.lock().expect("lock").len(), 4);
}

#[test]
fn lifecycle_handler_runs_after_frames_dispatched_before_it() {
    let (channel, _outbox) = Channel::new();
    let order = Arc::new(Mutex::new(Vec::new()));
    let events = Arc::clone(&order);
    let _typing = channel.subscribe(EventKind::Typing, move |_| {
        events.lock().expect("lock").push("typing");
    });
    let statuses = Arc::clone(&order);
    let _lifecycle = channel.subscribe_lifecycle(move |_| {
        statuses.lock().expect("lock").push("status");
    });

    channel.set_status(ConnectionStatus::Connected);
    channel.dispatch(&inbound(EventKind::Typing, serde_json::json!("Ana")));
    channel.set_status(ConnectionStatus::Disconnected);

    assert_eq!(*order.lock().expect("lock"), vec!["status", "typing", "status"]);
}
