//! Client-side session engine for a realtime multi-user chat room.
//!
//! A session keeps local state consistent with a shared chat room run by a
//! remote coordinator over a single websocket. It announces who the user is,
//! mirrors the coordinator's online-user list, tracks who is typing,
//! debounces the user's own typing signal, and accumulates the message
//! history in arrival order. The coordinator is authoritative: the local log
//! is never appended optimistically.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`channel`] | Duplex event channel, subscriptions, and the websocket transport |
//! | [`event`] | Event names and typed inbound/outbound payloads |
//! | [`identity`] | Local display name and `register_user` announcements |
//! | [`presence`] | Latest online-user snapshot |
//! | [`typing`] | Local typing debounce and the remote typing indicator |
//! | [`message_log`] | Ordered chat history and send composition |
//! | [`session`] | The actor that wires everything to one channel |
//! | [`config`] | Endpoint, typing window, codec, and reconnect tuning |

pub mod channel;
pub mod config;
pub mod event;
pub mod identity;
pub mod message_log;
pub mod presence;
pub mod session;
pub mod typing;

pub use channel::{Channel, ConnectionStatus, Outbox, Subscription, TransportError, TransportHandle};
pub use config::SessionConfig;
pub use event::{ChatMessage, EventKind, Inbound, Outbound, PayloadError};
pub use frames::Codec;
pub use session::{Session, SessionError, SessionHandle, SessionState, SessionView};
