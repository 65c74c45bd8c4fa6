//! Websocket transport behind a [`Channel`].
//!
//! LIFECYCLE
//! =========
//! 1. `Connecting` → dial the endpoint
//! 2. `Connected` → pump the outbox into the socket and the socket into
//!    [`Channel::dispatch`] until either side closes
//! 3. `Disconnected` → sleep with exponential backoff plus jitter → 1
//!
//! Frames published while disconnected stay queued in the outbox and are
//! flushed once the next connection opens. A frame whose socket write fails
//! is held and written first on the next connection. Delivery past a
//! successful write is not confirmed. Undecodable inbound messages are
//! logged and skipped; they never tear the connection down.

use std::time::Duration;

use frames::{Codec, Frame};
use futures_util::{Sink, SinkExt, StreamExt};
use rand::Rng;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, info, warn};

use super::{Channel, ConnectionStatus, Outbox};
use crate::config::SessionConfig;

/// Error type for transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The endpoint is not a websocket (or http) URL.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    /// The websocket handshake failed.
    #[error("websocket connect failed: {0}")]
    Connect(Box<tungstenite::Error>),
    /// The open websocket failed while reading or writing.
    #[error("websocket transport failed: {0}")]
    Socket(Box<tungstenite::Error>),
    /// An outbound frame could not be encoded.
    #[error("frame encode failed: {0}")]
    Encode(#[from] frames::CodecError),
}

/// Running transport task. Dropping the handle stops the transport.
pub struct TransportHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl TransportHandle {
    /// Close the socket and wait for the transport task to exit.
    pub async fn shutdown(mut self) {
        self.signal_stop();
        if let Err(e) = (&mut self.task).await {
            warn!(error = %e, "transport: task ended abnormally");
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    fn signal_stop(&mut self) {
        let Some(stop) = self.stop.take() else {
            return;
        };
        if stop.send(()).is_err() {
            debug!("transport: task already exited");
        }
    }
}

impl Drop for TransportHandle {
    fn drop(&mut self) {
        self.signal_stop();
    }
}

pub(super) fn spawn(
    channel: Channel,
    config: &SessionConfig,
    outbox: Outbox,
) -> Result<TransportHandle, TransportError> {
    let url = ws_url(&config.endpoint)?;
    let backoff = Backoff::new(config.reconnect_initial, config.reconnect_max);
    let (stop_tx, stop_rx) = oneshot::channel();
    let task = tokio::spawn(run(channel, url, config.codec, backoff, outbox, stop_rx));
    Ok(TransportHandle { stop: Some(stop_tx), task })
}

// =============================================================================
// CONNECTION LOOP
// =============================================================================

enum Exit {
    /// Stop was requested; do not redial.
    Stopped,
    /// Peer closed the socket.
    Closed,
}

async fn run(
    channel: Channel,
    url: String,
    codec: Codec,
    mut backoff: Backoff,
    mut outbox: Outbox,
    mut stop: oneshot::Receiver<()>,
) {
    let mut unsent = None;
    loop {
        channel.set_status(ConnectionStatus::Connecting);

        let link = Link { url: &url, codec, outbox: &mut outbox, unsent: &mut unsent };
        let exit = connect_and_run(&channel, link, &mut backoff, &mut stop).await;
        channel.set_status(ConnectionStatus::Disconnected);

        match exit {
            Ok(Exit::Stopped) => {
                info!(endpoint = %url, "transport: stopped");
                return;
            }
            Ok(Exit::Closed) => info!(endpoint = %url, "transport: connection closed"),
            Err(e) => warn!(endpoint = %url, error = %e, "transport: connection failed"),
        }

        let delay = backoff.next_delay();
        debug!(delay = ?delay, "transport: reconnect scheduled");
        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            _ = &mut stop => {
                info!(endpoint = %url, "transport: stopped while waiting to reconnect");
                return;
            }
        }
    }
}

/// Per-connection view of the transport's outbound side.
struct Link<'a> {
    url: &'a str,
    codec: Codec,
    outbox: &'a mut Outbox,
    /// Frame whose write failed on the previous connection.
    unsent: &'a mut Option<Frame>,
}

async fn connect_and_run(
    channel: &Channel,
    link: Link<'_>,
    backoff: &mut Backoff,
    stop: &mut oneshot::Receiver<()>,
) -> Result<Exit, TransportError> {
    let Link { url, codec, outbox, unsent } = link;
    let (stream, _) = tokio::select! {
        result = connect_async(url) => result.map_err(|e| TransportError::Connect(Box::new(e)))?,
        _ = &mut *stop => return Ok(Exit::Stopped),
    };

    channel.set_status(ConnectionStatus::Connected);
    backoff.reset();
    info!(endpoint = %url, "transport: connected");

    let (mut sink, mut source) = stream.split();

    if let Some(frame) = unsent.take() {
        debug!(event = %frame.event, id = %frame.id, "transport: resending held frame");
        send_frame(&mut sink, codec, frame, unsent).await?;
    }

    loop {
        tokio::select! {
            _ = &mut *stop => {
                if let Err(e) = sink.send(Message::Close(None)).await {
                    debug!(error = %e, "transport: close frame not sent");
                }
                return Ok(Exit::Stopped);
            }
            Some(frame) = outbox.recv() => send_frame(&mut sink, codec, frame, unsent).await?,
            message = source.next() => {
                let Some(message) = message else {
                    return Ok(Exit::Closed);
                };
                match message.map_err(|e| TransportError::Socket(Box::new(e)))? {
                    Message::Binary(bytes) => match frames::decode_frame(&bytes) {
                        Ok(frame) => {
                            channel.dispatch(&frame);
                        }
                        Err(e) => warn!(error = %e, "transport: binary frame dropped"),
                    },
                    Message::Text(text) => match frames::decode_text(text.as_str()) {
                        Ok(frame) => {
                            channel.dispatch(&frame);
                        }
                        Err(e) => warn!(error = %e, "transport: text frame dropped"),
                    },
                    Message::Close(_) => return Ok(Exit::Closed),
                    _ => {}
                }
            }
        }
    }
}

/// Write one frame. On a socket error the frame goes back into `unsent`;
/// a frame that cannot be encoded is logged and dropped.
async fn send_frame<S>(
    sink: &mut S,
    codec: Codec,
    frame: Frame,
    unsent: &mut Option<Frame>,
) -> Result<(), TransportError>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    let message = match encode_message(codec, &frame) {
        Ok(message) => message,
        Err(e) => {
            warn!(event = %frame.event, error = %e, "transport: unencodable frame dropped");
            return Ok(());
        }
    };
    if let Err(e) = sink.send(message).await {
        *unsent = Some(frame);
        return Err(TransportError::Socket(Box::new(e)));
    }
    Ok(())
}

fn encode_message(codec: Codec, frame: &Frame) -> Result<Message, TransportError> {
    Ok(match codec {
        Codec::Binary => Message::Binary(frames::encode_frame(frame).into()),
        Codec::Text => Message::Text(frames::encode_text(frame)?.into()),
    })
}

/// Normalize the configured endpoint to a websocket URL.
fn ws_url(endpoint: &str) -> Result<String, TransportError> {
    let trimmed = endpoint.trim().trim_end_matches('/');

    if trimmed.starts_with("ws://") || trimmed.starts_with("wss://") {
        return Ok(trimmed.to_owned());
    }
    if let Some(rest) = trimmed.strip_prefix("http://") {
        return Ok(format!("ws://{rest}"));
    }
    if let Some(rest) = trimmed.strip_prefix("https://") {
        return Ok(format!("wss://{rest}"));
    }

    Err(TransportError::InvalidEndpoint(endpoint.to_owned()))
}

// =============================================================================
// BACKOFF
// =============================================================================

/// Exponential reconnect delay with up to 25% random jitter.
#[derive(Clone, Debug)]
struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max: max.max(initial), current: initial }
    }

    fn next_delay(&mut self) -> Duration {
        let base = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);

        let jitter_ms = u64::try_from(base.as_millis() / 4).unwrap_or(u64::MAX);
        if jitter_ms == 0 {
            return base;
        }
        base + Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
    }

    fn reset(&mut self) {
        self.current = self.initial;
    }
}

#[cfg(test)]
#[path = "channel_transport_test.rs"]
mod channel_transport_test;
