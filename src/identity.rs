//! Identity binding: the local user's display name.

use crate::event::Outbound;

/// Holds the display name and decides when the coordinator must hear about it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IdentityBinding {
    name: String,
}

impl IdentityBinding {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        !self.name.is_empty()
    }

    /// Store `name`. Yields one `register_user` only when the value changed
    /// and is non-empty; re-assigning the current name is a no-op.
    pub fn assign(&mut self, name: impl Into<String>) -> Option<Outbound> {
        let name = name.into();
        if name == self.name {
            return None;
        }
        self.name = name;
        self.reannounce()
    }

    /// Registration for the current name, if any. Used after a reconnect,
    /// when the coordinator has forgotten this client.
    #[must_use]
    pub fn reannounce(&self) -> Option<Outbound> {
        self.is_set().then(|| Outbound::RegisterUser(self.name.clone()))
    }
}

#[cfg(test)]
#[path = "identity_test.rs"]
mod identity_test;
