//! Channel adapter: the single duplex connection to the coordinator.
//!
//! DESIGN
//! ======
//! A [`Channel`] is an explicitly constructed, cloneable handle. It has three
//! faces:
//! - outbound: [`Channel::publish`] stamps a frame and pushes it into an
//!   unbounded queue. The [`Outbox`] end of that queue is drained by exactly
//!   one transport task (or read directly by tests). Publishing never blocks
//!   and never reports delivery.
//! - inbound: the transport hands each decoded frame to
//!   [`Channel::dispatch`], which invokes every handler subscribed to that
//!   event, in registration order.
//! - lifecycle: [`ConnectionStatus`] transitions. A `watch` carries the
//!   latest value; [`Channel::subscribe_lifecycle`] handlers see every
//!   transition, in order, called inline from [`Channel::set_status`]. Since
//!   the transport dispatches frames and sets status from the same task, a
//!   lifecycle handler and an event handler that feed one queue keep the
//!   order in which things actually happened on the socket.
//!
//! Subscriptions are RAII handles. Dropping one (or passing it to
//! [`Channel::unsubscribe`]) removes the handler before the next dispatch.

#[path = "channel_transport.rs"]
mod transport;

pub use self::transport::{TransportError, TransportHandle};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use frames::Frame;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::config::SessionConfig;
use crate::event::{self, EventKind, Outbound};

/// Connection lifecycle as seen by consumers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// No socket; either never connected or waiting to redial.
    #[default]
    Disconnected,
    /// Websocket handshake in progress.
    Connecting,
    /// Websocket open.
    Connected,
}

type Handler = Arc<dyn Fn(&Value) + Send + Sync>;
type StatusHandler = Arc<dyn Fn(ConnectionStatus) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: HashMap<EventKind, Vec<(u64, Handler)>>,
    status_handlers: Vec<(u64, StatusHandler)>,
}

impl Registry {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// What a [`Subscription`] is registered for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Topic {
    Event(EventKind),
    Lifecycle,
}

struct Shared {
    registry: Mutex<Registry>,
    outbound: mpsc::UnboundedSender<Frame>,
    status: watch::Sender<ConnectionStatus>,
}

impl Shared {
    fn registry(&self) -> MutexGuard<'_, Registry> {
        // Handlers run outside the lock, so a poisoned registry is still consistent.
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, topic: Topic, id: u64) {
        let mut registry = self.registry();
        match topic {
            Topic::Event(kind) => {
                if let Some(list) = registry.handlers.get_mut(&kind) {
                    list.retain(|(handler_id, _)| *handler_id != id);
                    if list.is_empty() {
                        registry.handlers.remove(&kind);
                    }
                }
            }
            Topic::Lifecycle => registry.status_handlers.retain(|(handler_id, _)| *handler_id != id),
        }
    }
}

/// Shared handle to the coordinator connection.
#[derive(Clone)]
pub struct Channel {
    shared: Arc<Shared>,
}

/// Receiving end of the outbound queue.
pub struct Outbox {
    rx: mpsc::UnboundedReceiver<Frame>,
}

impl Outbox {
    /// Wait for the next published frame.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.rx.recv().await
    }

    /// Take the next published frame if one is already queued.
    pub fn try_recv(&mut self) -> Option<Frame> {
        self.rx.try_recv().ok()
    }

    /// Take every frame queued so far.
    pub fn drain(&mut self) -> Vec<Frame> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

/// Registration of one inbound or lifecycle handler. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    topic: Topic,
    shared: Weak<Shared>,
}

impl Subscription {
    /// The inbound event this handler receives; `None` for lifecycle handlers.
    #[must_use]
    pub fn kind(&self) -> Option<EventKind> {
        match self.topic {
            Topic::Event(kind) => Some(kind),
            Topic::Lifecycle => None,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.remove(self.topic, self.id);
        }
    }
}

impl Channel {
    /// Create a channel and the outbox its transport will drain.
    #[must_use]
    pub fn new() -> (Self, Outbox) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (status, _) = watch::channel(ConnectionStatus::Disconnected);
        let shared = Arc::new(Shared {
            registry: Mutex::new(Registry::default()),
            outbound: tx,
            status,
        });
        (Self { shared }, Outbox { rx })
    }

    /// Spawn the websocket transport for this channel.
    ///
    /// The transport dials `config.endpoint`, redials with backoff on every
    /// failure, and keeps running until the returned handle is shut down or
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidEndpoint`] when the endpoint is not a
    /// `ws(s)://` or `http(s)://` URL.
    pub fn connect(
        &self,
        config: &SessionConfig,
        outbox: Outbox,
    ) -> Result<TransportHandle, TransportError> {
        transport::spawn(self.clone(), config, outbox)
    }

    /// Send a named event. Fire-and-forget.
    pub fn publish(&self, kind: EventKind, payload: Value) {
        let frame = event::new_frame(kind, payload);
        debug!(event = %kind, id = %frame.id, "channel: publish");
        if self.shared.outbound.send(frame).is_err() {
            warn!(event = %kind, "channel: outbox closed; dropping frame");
        }
    }

    /// Send a typed outbound event.
    pub fn publish_event(&self, event: &Outbound) {
        self.publish(event.kind(), event.payload());
    }

    /// Register `handler` for every inbound event of `kind`.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let mut registry = self.shared.registry();
        let id = registry.next_id();
        registry
            .handlers
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));

        Subscription { id, topic: Topic::Event(kind), shared: Arc::downgrade(&self.shared) }
    }

    /// Register `handler` for every lifecycle transition.
    ///
    /// Unlike [`Channel::lifecycle`], nothing is coalesced: each change made
    /// through [`Channel::set_status`] reaches the handler, in order.
    pub fn subscribe_lifecycle<F>(&self, handler: F) -> Subscription
    where
        F: Fn(ConnectionStatus) + Send + Sync + 'static,
    {
        let mut registry = self.shared.registry();
        let id = registry.next_id();
        registry.status_handlers.push((id, Arc::new(handler)));

        Subscription { id, topic: Topic::Lifecycle, shared: Arc::downgrade(&self.shared) }
    }

    /// Remove a registration. Equivalent to dropping it.
    pub fn unsubscribe(&self, subscription: Subscription) {
        drop(subscription);
    }

    /// Number of live handlers for `kind`.
    #[must_use]
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.shared.registry().handlers.get(&kind).map_or(0, Vec::len)
    }

    #[must_use]
    pub fn lifecycle_subscriber_count(&self) -> usize {
        self.shared.registry().status_handlers.len()
    }

    /// Deliver one inbound frame to its subscribers.
    ///
    /// Returns the number of handlers invoked. Frames naming an unknown
    /// event are logged and dropped.
    pub fn dispatch(&self, frame: &Frame) -> usize {
        let Ok(kind) = frame.event.parse::<EventKind>() else {
            warn!(event = %frame.event, id = %frame.id, "channel: unknown event dropped");
            return 0;
        };

        let handlers = self
            .shared
            .registry()
            .handlers
            .get(&kind)
            .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect::<Vec<_>>())
            .unwrap_or_default();

        if handlers.is_empty() {
            debug!(event = %kind, "channel: no subscribers");
        }
        for handler in &handlers {
            handler(&frame.data);
        }
        handlers.len()
    }

    /// Observe connection lifecycle transitions.
    #[must_use]
    pub fn lifecycle(&self) -> watch::Receiver<ConnectionStatus> {
        self.shared.status.subscribe()
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        *self.shared.status.borrow()
    }

    /// Record a lifecycle transition. Repeated values notify nobody.
    ///
    /// Lifecycle handlers run inline, before this returns. Transitions are
    /// expected from a single task (the transport).
    pub fn set_status(&self, status: ConnectionStatus) {
        let changed = self.shared.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
        if !changed {
            return;
        }

        debug!(?status, "channel: status");
        let handlers = self
            .shared
            .registry()
            .status_handlers
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect::<Vec<_>>();
        for handler in &handlers {
            handler(status);
        }
    }
}

#[cfg(test)]
#[path = "channel_test.rs"]
mod channel_test;
