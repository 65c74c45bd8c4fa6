//! Presence tracker: the coordinator's last reported online-user list.
//!
//! DESIGN
//! ======
//! A pure projection of the latest `online_users` snapshot. Each snapshot
//! replaces the list wholesale, in coordinator order; there is no merge and
//! no local add/remove. A dropped connection marks the list stale until the
//! coordinator sends a fresh snapshot.

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PresenceTracker {
    users: Vec<String>,
    stale: bool,
}

impl PresenceTracker {
    /// Replace the whole list with `users`, verbatim.
    pub fn replace(&mut self, users: Vec<String>) {
        self.users = users;
        self.stale = false;
    }

    /// Keep the list but flag it as possibly out of date.
    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    #[must_use]
    pub fn users(&self) -> &[String] {
        &self.users
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.users.iter().any(|user| user == name)
    }

    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.stale
    }
}

#[cfg(test)]
#[path = "presence_test.rs"]
mod presence_test;
