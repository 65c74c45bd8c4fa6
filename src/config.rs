//! Session configuration.
//!
//! Everything externally tunable lives here: where the coordinator is, how
//! long the typing inactivity window lasts, which wire codec to speak, and
//! how aggressively to redial after a dropped connection.

use std::time::Duration;

use frames::Codec;

/// Coordinator address used when nothing else is configured.
pub const DEFAULT_ENDPOINT: &str = "ws://localhost:5000";

/// Inactivity window after the last keystroke before `stop_typing` is sent.
pub const DEFAULT_TYPING_WINDOW_MS: u64 = 1000;

const DEFAULT_RECONNECT_INITIAL_MS: u64 = 1000;
const DEFAULT_RECONNECT_MAX_MS: u64 = 10_000;

/// Runtime configuration for one chat session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Websocket URL of the coordinator (`ws://` or `wss://`).
    pub endpoint: String,
    /// Typing inactivity window.
    pub typing_window: Duration,
    /// Encoding for outbound frames. Inbound accepts both.
    pub codec: Codec,
    /// First reconnect delay; doubles on each consecutive failure.
    pub reconnect_initial: Duration,
    /// Upper bound for the reconnect delay.
    pub reconnect_max: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            typing_window: Duration::from_millis(DEFAULT_TYPING_WINDOW_MS),
            codec: Codec::default(),
            reconnect_initial: Duration::from_millis(DEFAULT_RECONNECT_INITIAL_MS),
            reconnect_max: Duration::from_millis(DEFAULT_RECONNECT_MAX_MS),
        }
    }
}

impl SessionConfig {
    /// Load config from `CHATSYNC_*` environment variables with defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|s| !s.trim().is_empty());

        let endpoint = var("CHATSYNC_ENDPOINT").unwrap_or(defaults.endpoint);
        let codec = var("CHATSYNC_CODEC")
            .and_then(|raw| raw.parse::<Codec>().ok())
            .unwrap_or(defaults.codec);
        let millis = |key: &str, default: Duration| {
            var(key)
                .and_then(|raw| raw.trim().parse::<u64>().ok())
                .map_or(default, Duration::from_millis)
        };

        Self {
            endpoint,
            typing_window: millis("CHATSYNC_TYPING_WINDOW_MS", defaults.typing_window),
            codec,
            ..defaults
        }
        .with_reconnect(
            millis("CHATSYNC_RECONNECT_INITIAL_MS", defaults.reconnect_initial),
            millis("CHATSYNC_RECONNECT_MAX_MS", defaults.reconnect_max),
        )
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    #[must_use]
    pub fn with_typing_window(mut self, window: Duration) -> Self {
        self.typing_window = window;
        self
    }

    #[must_use]
    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    #[must_use]
    pub fn with_reconnect(mut self, initial: Duration, max: Duration) -> Self {
        self.reconnect_initial = initial;
        self.reconnect_max = max.max(initial);
        self
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
