//! Message log: every delivered chat line, in arrival order.
//!
//! Append-only. Own messages are not added on send; they show up when the
//! coordinator echoes them back as `receive_message`, like everyone else's.

use crate::event::{ChatMessage, Outbound};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MessageLog {
    entries: Vec<ChatMessage>,
}

impl MessageLog {
    /// Append one delivered message. No dedup, no reordering.
    pub fn append(&mut self, message: ChatMessage) {
        self.entries.push(message);
    }

    #[must_use]
    pub fn entries(&self) -> &[ChatMessage] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.entries.iter()
    }
}

/// Build the `send_message` request for `body`, or nothing when either the
/// sender or the body is empty.
#[must_use]
pub fn compose(identity: &str, body: &str) -> Option<Outbound> {
    if identity.is_empty() || body.is_empty() {
        return None;
    }
    Some(Outbound::SendMessage(ChatMessage::new(identity, body)))
}

/// Whether `message` was sent under the local identity.
#[must_use]
pub fn is_own(message: &ChatMessage, identity: &str) -> bool {
    !identity.is_empty() && message.name == identity
}

#[cfg(test)]
#[path = "message_log_test.rs"]
mod message_log_test;
