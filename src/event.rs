//! Typed events for the coordinator wire contract.
//!
//! DESIGN
//! ======
//! The channel moves untyped `frames::Frame` envelopes. This module is the
//! single place where event names and payload shapes are known: inbound
//! payloads are validated into [`Inbound`] before any store sees them, and
//! outbound intents ([`Outbound`]) are rendered back into frames.
//!
//! A payload that does not match its event's shape is rejected whole with a
//! [`PayloadError`]; nothing is partially applied.

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use frames::Frame;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// =============================================================================
// EVENT NAMES
// =============================================================================

pub const REGISTER_USER: &str = "register_user";
pub const SEND_MESSAGE: &str = "send_message";
pub const RECEIVE_MESSAGE: &str = "receive_message";
pub const TYPING: &str = "typing";
pub const STOP_TYPING: &str = "stop_typing";
pub const ONLINE_USERS: &str = "online_users";

/// Every event name known to the coordinator contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    RegisterUser,
    SendMessage,
    ReceiveMessage,
    Typing,
    StopTyping,
    OnlineUsers,
}

impl EventKind {
    /// Events the session subscribes to.
    pub const INBOUND: [EventKind; 4] = [
        EventKind::ReceiveMessage,
        EventKind::Typing,
        EventKind::StopTyping,
        EventKind::OnlineUsers,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RegisterUser => REGISTER_USER,
            Self::SendMessage => SEND_MESSAGE,
            Self::ReceiveMessage => RECEIVE_MESSAGE,
            Self::Typing => TYPING,
            Self::StopTyping => STOP_TYPING,
            Self::OnlineUsers => ONLINE_USERS,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = PayloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            REGISTER_USER => Ok(Self::RegisterUser),
            SEND_MESSAGE => Ok(Self::SendMessage),
            RECEIVE_MESSAGE => Ok(Self::ReceiveMessage),
            TYPING => Ok(Self::Typing),
            STOP_TYPING => Ok(Self::StopTyping),
            ONLINE_USERS => Ok(Self::OnlineUsers),
            other => Err(PayloadError::UnknownEvent(other.to_owned())),
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Rejection reasons for inbound frames.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    /// The frame names an event outside the contract.
    #[error("unknown event `{0}`")]
    UnknownEvent(String),
    /// The event exists but only flows outbound.
    #[error("event `{0}` is outbound-only")]
    NotInbound(EventKind),
    /// The payload does not have the shape the event requires.
    #[error("malformed `{event}` payload: expected {expected}")]
    Shape {
        event: EventKind,
        expected: &'static str,
    },
}

// =============================================================================
// PAYLOADS
// =============================================================================

/// One chat line: who sent it and what it says.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub name: String,
    pub message: String,
}

impl ChatMessage {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self { name: name.into(), message: message.into() }
    }
}

/// A validated event received from the coordinator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Inbound {
    Message(ChatMessage),
    Typing(String),
    /// The coordinator may or may not say who stopped.
    StopTyping(Option<String>),
    OnlineUsers(Vec<String>),
}

impl Inbound {
    /// Validate a raw payload for `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::NotInbound`] for outbound-only events and
    /// [`PayloadError::Shape`] when the payload does not match.
    pub fn parse(kind: EventKind, payload: &Value) -> Result<Self, PayloadError> {
        let shape = |expected| PayloadError::Shape { event: kind, expected };
        match kind {
            EventKind::ReceiveMessage => serde_json::from_value::<ChatMessage>(payload.clone())
                .map(Self::Message)
                .map_err(|_| shape("object with string `name` and `message`")),
            EventKind::Typing => payload
                .as_str()
                .map(|name| Self::Typing(name.to_owned()))
                .ok_or_else(|| shape("string")),
            EventKind::StopTyping => match payload {
                Value::Null => Ok(Self::StopTyping(None)),
                Value::String(name) => Ok(Self::StopTyping(Some(name.clone()))),
                _ => Err(shape("string or null")),
            },
            EventKind::OnlineUsers => serde_json::from_value::<Vec<String>>(payload.clone())
                .map(Self::OnlineUsers)
                .map_err(|_| shape("array of strings")),
            EventKind::RegisterUser | EventKind::SendMessage => Err(PayloadError::NotInbound(kind)),
        }
    }

    /// Parse a whole frame, resolving its event name first.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::UnknownEvent`] or any error from [`Inbound::parse`].
    pub fn from_frame(frame: &Frame) -> Result<Self, PayloadError> {
        let kind = frame.event.parse::<EventKind>()?;
        Self::parse(kind, &frame.data)
    }

    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Message(_) => EventKind::ReceiveMessage,
            Self::Typing(_) => EventKind::Typing,
            Self::StopTyping(_) => EventKind::StopTyping,
            Self::OnlineUsers(_) => EventKind::OnlineUsers,
        }
    }
}

/// An event this client asks the coordinator to act on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outbound {
    RegisterUser(String),
    SendMessage(ChatMessage),
    Typing(String),
    StopTyping(String),
}

impl Outbound {
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::RegisterUser(_) => EventKind::RegisterUser,
            Self::SendMessage(_) => EventKind::SendMessage,
            Self::Typing(_) => EventKind::Typing,
            Self::StopTyping(_) => EventKind::StopTyping,
        }
    }

    /// Wire payload for this event.
    #[must_use]
    pub fn payload(&self) -> Value {
        match self {
            Self::RegisterUser(name) | Self::Typing(name) | Self::StopTyping(name) => {
                Value::String(name.clone())
            }
            Self::SendMessage(msg) => serde_json::json!({
                "name": msg.name,
                "message": msg.message,
            }),
        }
    }
}

// =============================================================================
// FRAMES
// =============================================================================

/// Build an envelope for `kind` with a fresh id and the current timestamp.
#[must_use]
pub fn new_frame(kind: EventKind, data: Value) -> Frame {
    Frame {
        id: Uuid::new_v4().to_string(),
        ts: now_ms(),
        event: kind.as_str().to_owned(),
        data,
    }
}

fn now_ms() -> i64 {
    let Ok(duration) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(duration.as_millis()).unwrap_or(0)
}

#[cfg(test)]
#[path = "event_test.rs"]
mod event_test;
