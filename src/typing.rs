//! Typing coordinator: local debounce and remote indicator.
//!
//! LOCAL HALF
//! ==========
//! ```text
//!   Idle ──content change──▶ Active ──deadline──▶ Idle
//!              (typing)        │  ▲   (stop_typing)
//!                              └──┘ content change: typing, deadline reset
//!   Active ──message sent──▶ Idle (stop_typing now, deadline dropped)
//! ```
//! The deadline lives in a single [`TypingTimer`] slot. Scheduling replaces
//! whatever was there, so there is never more than one pending stop and it
//! always lands one window after the last content change. The owner awaits
//! [`expired`] on the current deadline and calls
//! [`TypingCoordinator::timer_fired`]; a wake for a deadline that has since
//! moved is ignored.
//!
//! REMOTE HALF
//! ===========
//! [`TypingIndicator`] holds at most one name. `typing` overwrites it (last
//! start wins), any `stop_typing` clears it whatever name it carries. Hiding
//! the local user's own echo is a display concern ([`TypingIndicator::visible_for`]);
//! the store keeps whatever the coordinator sent.

use std::time::Duration;

use tokio::time::Instant;

use crate::event::Outbound;

// =============================================================================
// TIMER
// =============================================================================

/// Single-slot cancellable deadline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TypingTimer {
    deadline: Option<Instant>,
}

impl TypingTimer {
    /// Cancel any pending deadline and arm a new one.
    pub fn schedule_at(&mut self, deadline: Instant) {
        self.deadline = Some(deadline);
    }

    /// Drop the pending deadline. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    #[must_use]
    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| deadline <= now)
    }
}

/// Resolve at `deadline`, or never when there is none.
pub async fn expired(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

// =============================================================================
// LOCAL HALF
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocalTyping {
    Idle,
    Active,
}

#[derive(Clone, Debug)]
pub struct TypingCoordinator {
    window: Duration,
    timer: TypingTimer,
    /// Name the pending `stop_typing` will carry.
    typing_as: Option<String>,
}

impl TypingCoordinator {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self { window, timer: TypingTimer::default(), typing_as: None }
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    #[must_use]
    pub fn state(&self) -> LocalTyping {
        if self.timer.is_pending() {
            LocalTyping::Active
        } else {
            LocalTyping::Idle
        }
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    /// The draft changed at `now`. Announces `typing` and pushes the stop
    /// deadline out to one window from now. Without an identity there is
    /// nobody to announce, so nothing happens.
    pub fn content_changed(&mut self, identity: &str, now: Instant) -> Option<Outbound> {
        if identity.is_empty() {
            return None;
        }
        self.typing_as = Some(identity.to_owned());
        self.timer.schedule_at(now + self.window);
        Some(Outbound::Typing(identity.to_owned()))
    }

    /// The deadline may have passed. Returns `stop_typing` only if the
    /// current deadline is actually due.
    pub fn timer_fired(&mut self, now: Instant) -> Option<Outbound> {
        if !self.timer.is_due(now) {
            return None;
        }
        self.timer.cancel();
        self.typing_as.take().map(Outbound::StopTyping)
    }

    /// A message went out: stop now rather than on the deadline.
    pub fn message_sent(&mut self) -> Option<Outbound> {
        if !self.timer.cancel() {
            return None;
        }
        self.typing_as.take().map(Outbound::StopTyping)
    }

    /// Forget any pending stop without announcing it (session teardown).
    pub fn cancel(&mut self) {
        self.timer.cancel();
        self.typing_as = None;
    }
}

// =============================================================================
// REMOTE HALF
// =============================================================================

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TypingIndicator {
    holder: Option<String>,
}

impl TypingIndicator {
    /// `typing(name)`: last start wins.
    pub fn start(&mut self, name: String) {
        self.holder = Some(name);
    }

    /// `stop_typing(..)`: clears regardless of who is held. The coordinator
    /// may omit the name, so the stop is never matched against the holder.
    pub fn stop(&mut self) {
        self.holder = None;
    }

    #[must_use]
    pub fn holder(&self) -> Option<&str> {
        self.holder.as_deref()
    }

    /// Name to show to `identity`, hiding blanks and the user's own echo.
    #[must_use]
    pub fn visible_for(&self, identity: &str) -> Option<&str> {
        self.holder()
            .filter(|name| !name.is_empty() && *name != identity)
    }
}

#[cfg(test)]
#[path = "typing_test.rs"]
mod typing_test;
