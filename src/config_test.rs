use super::*;
use std::collections::HashMap;

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map = pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect::<HashMap<_, _>>();
    move |key: &str| map.get(key).cloned()
}

#[test]
fn defaults_match_documented_values() {
    let config = SessionConfig::default();
    assert_eq!(config.endpoint, "ws://localhost:5000");
    assert_eq!(config.typing_window, Duration::from_millis(1000));
    assert_eq!(config.codec, Codec::Binary);
    assert!(config.reconnect_initial <= config.reconnect_max);
}

#[test]
fn lookup_overrides_each_field() {
    let config = SessionConfig::from_lookup(lookup(&[
        ("CHATSYNC_ENDPOINT", "wss://chat.example.test/ws"),
        ("CHATSYNC_TYPING_WINDOW_MS", "250"),
        ("CHATSYNC_CODEC", "text"),
        ("CHATSYNC_RECONNECT_INITIAL_MS", "50"),
        ("CHATSYNC_RECONNECT_MAX_MS", "400"),
    ]));
    assert_eq!(config.endpoint, "wss://chat.example.test/ws");
    assert_eq!(config.typing_window, Duration::from_millis(250));
    assert_eq!(config.codec, Codec::Text);
    assert_eq!(config.reconnect_initial, Duration::from_millis(50));
    assert_eq!(config.reconnect_max, Duration::from_millis(400));
}

#[test]
fn invalid_or_blank_values_fall_back_to_defaults() {
    let config = SessionConfig::from_lookup(lookup(&[
        ("CHATSYNC_ENDPOINT", "   "),
        ("CHATSYNC_TYPING_WINDOW_MS", "soon"),
        ("CHATSYNC_CODEC", "xml"),
    ]));
    assert_eq!(config, SessionConfig::default());
}

#[test]
fn with_reconnect_never_lets_max_drop_below_initial() {
    let config = SessionConfig::default()
        .with_reconnect(Duration::from_secs(5), Duration::from_secs(1));
    assert_eq!(config.reconnect_max, Duration::from_secs(5));
}

#[test]
fn builders_replace_fields() {
    let config = SessionConfig::default()
        .with_endpoint("ws://10.0.0.2:5000")
        .with_typing_window(Duration::from_millis(300))
        .with_codec(Codec::Text);
    assert_eq!(config.endpoint, "ws://10.0.0.2:5000");
    assert_eq!(config.typing_window, Duration::from_millis(300));
    assert_eq!(config.codec, Codec::Text);
}
