//! Session orchestrator.
//!
//! DESIGN
//! ======
//! [`SessionState`] is the whole engine as a synchronous state machine. Each
//! reaction (user action, inbound event, lifecycle change, timer expiry)
//! mutates the owning store and returns the outbound events to publish. It
//! never touches the channel itself.
//!
//! [`Session::start`] wraps the state in one tokio task:
//! - one channel subscription per inbound event; handlers validate the
//!   payload and forward it into the task's input queue, so arrival order
//!   is preserved across event kinds
//! - one lifecycle subscription forwards every connection transition into
//!   that same queue, so a disconnect is applied after the frames that
//!   arrived before it
//! - user actions from [`SessionHandle`] go through the same queue
//! - the task `select!`s over the queue and the current typing deadline, and
//!   publishes whatever each reaction returns
//!
//! TEARDOWN
//! ========
//! Shutdown (explicit, or dropping the handle) is handled as one input:
//! subscriptions are released first, then the typing deadline is dropped,
//! then the task exits. Inputs still queued behind it are discarded, so no
//! store changes after teardown begins.

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::channel::{Channel, ConnectionStatus, Subscription};
use crate::config::SessionConfig;
use crate::event::{ChatMessage, EventKind, Inbound, Outbound};
use crate::identity::IdentityBinding;
use crate::message_log::{self, MessageLog};
use crate::presence::PresenceTracker;
use crate::typing::{self, TypingCoordinator, TypingIndicator};

/// Error type for [`SessionHandle`] operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The session task has exited; the action was not applied.
    #[error("session has stopped")]
    Stopped,
}

// =============================================================================
// VIEW
// =============================================================================

/// Read-only snapshot of everything a front end renders.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionView {
    pub identity: String,
    pub draft: String,
    pub online_users: Vec<String>,
    /// True after a disconnect until the coordinator sends a new snapshot.
    pub presence_stale: bool,
    /// Peer currently typing, with the user's own echo already hidden.
    pub typing: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub connection: ConnectionStatus,
}

impl SessionView {
    #[must_use]
    pub fn online_count(&self) -> usize {
        self.online_users.len()
    }

    #[must_use]
    pub fn is_own(&self, message: &ChatMessage) -> bool {
        message_log::is_own(message, &self.identity)
    }
}

// =============================================================================
// STATE
// =============================================================================

/// All session stores plus the rules that connect them.
#[derive(Clone, Debug)]
pub struct SessionState {
    identity: IdentityBinding,
    presence: PresenceTracker,
    typing: TypingCoordinator,
    indicator: TypingIndicator,
    log: MessageLog,
    draft: String,
    connection: ConnectionStatus,
    connected_before: bool,
}

impl SessionState {
    #[must_use]
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            identity: IdentityBinding::default(),
            presence: PresenceTracker::default(),
            typing: TypingCoordinator::new(config.typing_window),
            indicator: TypingIndicator::default(),
            log: MessageLog::default(),
            draft: String::new(),
            connection: ConnectionStatus::Disconnected,
            connected_before: false,
        }
    }

    pub fn set_identity(&mut self, name: impl Into<String>) -> Vec<Outbound> {
        self.identity.assign(name).into_iter().collect()
    }

    /// Replace the draft. A real change counts as typing activity.
    pub fn update_draft(&mut self, text: impl Into<String>, now: Instant) -> Vec<Outbound> {
        let text = text.into();
        if text == self.draft {
            return Vec::new();
        }
        self.draft = text;
        self.notify_typing(now)
    }

    pub fn notify_typing(&mut self, now: Instant) -> Vec<Outbound> {
        self.typing
            .content_changed(self.identity.name(), now)
            .into_iter()
            .collect()
    }

    /// Send the draft. Without an identity or a draft nothing happens. The
    /// log is not touched; the coordinator's echo appends it.
    pub fn send_message(&mut self) -> Vec<Outbound> {
        let Some(request) = message_log::compose(self.identity.name(), &self.draft) else {
            return Vec::new();
        };
        self.draft.clear();

        let mut out = Vec::with_capacity(2);
        out.extend(self.typing.message_sent());
        out.push(request);
        out
    }

    pub fn apply_inbound(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Message(message) => self.log.append(message),
            Inbound::Typing(name) => self.indicator.start(name),
            Inbound::StopTyping(_) => self.indicator.stop(),
            Inbound::OnlineUsers(users) => self.presence.replace(users),
        }
    }

    /// Track a lifecycle transition. A reconnect re-registers the identity;
    /// a disconnect leaves presence stale and drops the peer indicator.
    pub fn connection_changed(&mut self, status: ConnectionStatus) -> Vec<Outbound> {
        let previous = std::mem::replace(&mut self.connection, status);
        if previous == status {
            return Vec::new();
        }

        match status {
            ConnectionStatus::Connected => {
                let reconnect = std::mem::replace(&mut self.connected_before, true);
                if reconnect {
                    return self.identity.reannounce().into_iter().collect();
                }
            }
            ConnectionStatus::Disconnected if previous == ConnectionStatus::Connected => {
                self.presence.mark_stale();
                self.indicator.stop();
            }
            ConnectionStatus::Disconnected | ConnectionStatus::Connecting => {}
        }
        Vec::new()
    }

    pub fn timer_fired(&mut self, now: Instant) -> Vec<Outbound> {
        self.typing.timer_fired(now).into_iter().collect()
    }

    #[must_use]
    pub fn typing_deadline(&self) -> Option<Instant> {
        self.typing.deadline()
    }

    /// End of session: announce a pending stop now and drop the deadline.
    pub fn teardown(&mut self) -> Vec<Outbound> {
        let out = self.typing.message_sent().into_iter().collect();
        self.typing.cancel();
        out
    }

    #[must_use]
    pub fn identity(&self) -> &str {
        self.identity.name()
    }

    #[must_use]
    pub fn draft(&self) -> &str {
        &self.draft
    }

    #[must_use]
    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    #[must_use]
    pub fn indicator(&self) -> &TypingIndicator {
        &self.indicator
    }

    #[must_use]
    pub fn typing(&self) -> &TypingCoordinator {
        &self.typing
    }

    #[must_use]
    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    #[must_use]
    pub fn view(&self) -> SessionView {
        SessionView {
            identity: self.identity.name().to_owned(),
            draft: self.draft.clone(),
            online_users: self.presence.users().to_vec(),
            presence_stale: self.presence.is_stale(),
            typing: self
                .indicator
                .visible_for(self.identity.name())
                .map(ToOwned::to_owned),
            messages: self.log.entries().to_vec(),
            connection: self.connection,
        }
    }
}

// =============================================================================
// TASK
// =============================================================================

enum Input {
    SetIdentity(String),
    UpdateDraft(String),
    NotifyTyping,
    SendMessage,
    Inbound(Inbound),
    Connection(ConnectionStatus),
    Snapshot(oneshot::Sender<SessionView>),
    Shutdown(Option<oneshot::Sender<()>>),
}

/// Entry point for running a session against a channel.
pub struct Session;

impl Session {
    /// Subscribe to `channel` and spawn the session task.
    ///
    /// Subscriptions are in place before this returns, so no inbound event
    /// dispatched afterwards is missed.
    #[must_use]
    pub fn start(channel: Channel, config: &SessionConfig) -> SessionHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut subscriptions = EventKind::INBOUND
            .iter()
            .map(|&kind| forward_inbound(&channel, kind, tx.clone()))
            .collect::<Vec<_>>();
        subscriptions.push(forward_lifecycle(&channel, tx.clone()));

        // Read after subscribing: a transition racing this read is also
        // queued, and re-applying the same status is a no-op.
        let mut state = SessionState::new(config);
        publish_all(&channel, &state.connection_changed(channel.status()));

        let (view_tx, view_rx) = watch::channel(state.view());
        let task = tokio::spawn(run(channel, state, subscriptions, rx, view_tx));

        SessionHandle { tx, view: view_rx, task: Some(task), stopped: false }
    }
}

fn forward_inbound(channel: &Channel, kind: EventKind, tx: mpsc::UnboundedSender<Input>) -> Subscription {
    channel.subscribe(kind, move |payload| match Inbound::parse(kind, payload) {
        Ok(inbound) => {
            if tx.send(Input::Inbound(inbound)).is_err() {
                debug!(event = %kind, "session: inbound after stop ignored");
            }
        }
        Err(e) => warn!(event = %kind, error = %e, "session: malformed payload dropped"),
    })
}

fn forward_lifecycle(channel: &Channel, tx: mpsc::UnboundedSender<Input>) -> Subscription {
    channel.subscribe_lifecycle(move |status| {
        if tx.send(Input::Connection(status)).is_err() {
            debug!(?status, "session: transition after stop ignored");
        }
    })
}

async fn run(
    channel: Channel,
    mut state: SessionState,
    subscriptions: Vec<Subscription>,
    mut rx: mpsc::UnboundedReceiver<Input>,
    view_tx: watch::Sender<SessionView>,
) {
    let mut subscriptions = Some(subscriptions);

    loop {
        let deadline = state.typing_deadline();
        let outcomes = tokio::select! {
            biased;
            input = rx.recv() => {
                let Some(input) = input else {
                    break;
                };
                match input {
                    Input::SetIdentity(name) => state.set_identity(name),
                    Input::UpdateDraft(text) => state.update_draft(text, Instant::now()),
                    Input::NotifyTyping => state.notify_typing(Instant::now()),
                    Input::SendMessage => state.send_message(),
                    Input::Inbound(inbound) => {
                        state.apply_inbound(inbound);
                        Vec::new()
                    }
                    Input::Connection(status) => {
                        debug!(?status, "session: connection status");
                        state.connection_changed(status)
                    }
                    Input::Snapshot(reply) => {
                        if reply.send(state.view()).is_err() {
                            debug!("session: snapshot requester went away");
                        }
                        continue;
                    }
                    Input::Shutdown(ack) => {
                        drop(subscriptions.take());
                        publish_all(&channel, &state.teardown());
                        refresh_view(&view_tx, &state);
                        info!(identity = %state.identity(), "session: stopped");
                        if let Some(ack) = ack {
                            if ack.send(()).is_err() {
                                debug!("session: shutdown requester went away");
                            }
                        }
                        return;
                    }
                }
            }
            () = typing::expired(deadline) => state.timer_fired(Instant::now()),
        };

        publish_all(&channel, &outcomes);
        refresh_view(&view_tx, &state);
    }

    // Every sender is gone; nothing can reach this session any more.
    drop(subscriptions);
    publish_all(&channel, &state.teardown());
    refresh_view(&view_tx, &state);
}

fn publish_all(channel: &Channel, outcomes: &[Outbound]) {
    for event in outcomes {
        channel.publish_event(event);
    }
}

fn refresh_view(view_tx: &watch::Sender<SessionView>, state: &SessionState) {
    let next = state.view();
    view_tx.send_if_modified(|current| {
        if *current == next {
            false
        } else {
            *current = next;
            true
        }
    });
}

// =============================================================================
// HANDLE
// =============================================================================

/// Caller side of a running session. Dropping it ends the session.
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<Input>,
    view: watch::Receiver<SessionView>,
    task: Option<JoinHandle<()>>,
    stopped: bool,
}

impl SessionHandle {
    /// Set the local display name; registers with the coordinator on change.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Stopped`] if the session task has exited.
    pub fn set_identity(&self, name: impl Into<String>) -> Result<(), SessionError> {
        self.send(Input::SetIdentity(name.into()))
    }

    /// Replace the draft (an input change); also signals typing activity.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Stopped`] if the session task has exited.
    pub fn update_draft(&self, text: impl Into<String>) -> Result<(), SessionError> {
        self.send(Input::UpdateDraft(text.into()))
    }

    /// Signal typing activity without changing the draft.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Stopped`] if the session task has exited.
    pub fn notify_typing(&self) -> Result<(), SessionError> {
        self.send(Input::NotifyTyping)
    }

    /// Send the current draft. Silently ignored without identity or draft.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Stopped`] if the session task has exited.
    pub fn send_message(&self) -> Result<(), SessionError> {
        self.send(Input::SendMessage)
    }

    /// Current view, after every input queued before this call is applied.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Stopped`] if the session task has exited.
    pub async fn snapshot(&self) -> Result<SessionView, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Input::Snapshot(reply))?;
        rx.await.map_err(|_| SessionError::Stopped)
    }

    /// Receiver that changes whenever the view does.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Release subscriptions, drop the typing deadline, and wait for the
    /// session task to finish.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Stopped`] if the session had already exited.
    pub async fn shutdown(mut self) -> Result<(), SessionError> {
        self.stopped = true;
        let (ack, done) = oneshot::channel();
        self.send(Input::Shutdown(Some(ack)))?;
        done.await.map_err(|_| SessionError::Stopped)?;
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "session: task ended abnormally");
            }
        }
        Ok(())
    }

    fn send(&self, input: Input) -> Result<(), SessionError> {
        self.tx.send(input).map_err(|_| SessionError::Stopped)
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if self.stopped {
            return;
        }
        if self.tx.send(Input::Shutdown(None)).is_err() {
            debug!("session: already stopped at drop");
        }
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;
