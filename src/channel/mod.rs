// SPDX-License-Identifier: MIT
//! Live event channel — owns the WebSocket push connection.
//!
//! Protocol:
//! 1. Connect to `{ws_base_url}/ws/{client_token}` with a fresh random token
//!    per attempt. The token exists for server-side routing and debugging
//!    only — deduplication lives in the task store, keyed on task id.
//! 2. Parse each inbound text frame as an event envelope. Unrecognized
//!    `type` values and malformed frames are dropped and logged, never fatal.
//! 3. Deliver decoded events to the single subscriber in wire order.
//! 4. On close/error: reconnect with exponential backoff (1s → 2s → 4s …
//!    max 30s, jittered). After the configured number of consecutive failed
//!    connection attempts the channel reports [`ChannelState::Lost`] and
//!    stops; a lost channel is only revived by opening a new one.
//!
//! Delivery is at-most-once with no replay: events missed while disconnected
//! are accepted loss — the snapshot fetch is the source of truth on reload.

pub mod backoff;

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::tasks::Task;
use backoff::BackoffSchedule;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const EVENT_BUFFER: usize = 256;

type Transport = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ─── Public types ─────────────────────────────────────────────────────────────

/// Lifecycle of the current connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    /// Reconnect budget exhausted. Terminal — requires explicit re-initiation.
    Lost,
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Reconnecting => write!(f, "reconnecting"),
            Self::Lost => write!(f, "lost"),
        }
    }
}

/// A decoded inbound push message.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum LiveEvent {
    TaskCreated(Task),
}

/// Channel configuration, normally derived from
/// [`crate::config::ClientConfig`].
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Base URL of the push endpoint, e.g. `ws://host:8000`.
    pub ws_base_url: String,
    /// Consecutive failed connection attempts tolerated before giving up.
    pub max_attempts: u32,
    pub backoff: BackoffSchedule,
}

// ─── Wire decoding ────────────────────────────────────────────────────────────

/// Inbound envelope. Internally tagged; unknown tags collapse to `Unknown`
/// so a newer server never breaks an older client.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Envelope {
    TaskCreated { task: Task },
    #[serde(other)]
    Unknown,
}

/// Decode one text frame. `Ok(None)` means a well-formed envelope of a kind
/// this client does not handle.
fn decode_frame(text: &str) -> Result<Option<LiveEvent>, serde_json::Error> {
    Ok(match serde_json::from_str::<Envelope>(text)? {
        Envelope::TaskCreated { task } => Some(LiveEvent::TaskCreated(task)),
        Envelope::Unknown => None,
    })
}

// ─── Handle ───────────────────────────────────────────────────────────────────

/// Handle to a running live channel.
///
/// Owns the background connection driver. Decoded events are read with
/// [`LiveChannel::recv`] — there is exactly one subscriber, and events arrive
/// in wire order. State transitions are observed through [`LiveChannel::state`].
pub struct LiveChannel {
    events: mpsc::Receiver<LiveEvent>,
    state: watch::Receiver<ChannelState>,
    shutdown: watch::Sender<bool>,
}

impl LiveChannel {
    /// Spawn the connection driver. Returns immediately; the first connect
    /// attempt proceeds in the background.
    pub fn open(config: ChannelConfig) -> Self {
        let (event_tx, events) = mpsc::channel(EVENT_BUFFER);
        let (state_tx, state) = watch::channel(ChannelState::Disconnected);
        let (shutdown, shutdown_rx) = watch::channel(false);
        tokio::spawn(drive(config, event_tx, state_tx, shutdown_rx));
        Self {
            events,
            state,
            shutdown,
        }
    }

    /// Next decoded event, in wire order. `None` once the channel is lost
    /// or closed.
    pub async fn recv(&mut self) -> Option<LiveEvent> {
        self.events.recv().await
    }

    /// Watch lifecycle transitions.
    pub fn state(&self) -> watch::Receiver<ChannelState> {
        self.state.clone()
    }

    /// Close the transport and stop reconnecting. Idempotent.
    pub fn close(&self) {
        let _ = self.shutdown.send(true);
    }
}

impl Drop for LiveChannel {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

// ─── Connection driver ────────────────────────────────────────────────────────

async fn drive(
    config: ChannelConfig,
    events: mpsc::Sender<LiveEvent>,
    state: watch::Sender<ChannelState>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut failures: u32 = 0;
    let mut first_attempt = true;

    loop {
        if *shutdown.borrow() {
            break;
        }

        // Fresh routing token per attempt, never reused across reconnects.
        let token = Uuid::new_v4();
        let url = format!("{}/ws/{token}", config.ws_base_url.trim_end_matches('/'));

        if first_attempt {
            let _ = state.send(ChannelState::Connecting);
        }
        debug!(url = %url, failures, "channel: connecting");
        first_attempt = false;

        let connected = tokio::select! {
            res = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(&url)) => res,
            _ = shutdown.changed() => break,
        };

        match connected {
            Ok(Ok((transport, _))) => {
                info!("channel: connected");
                failures = 0;
                let _ = state.send(ChannelState::Connected);

                match pump_frames(transport, &events, &mut shutdown).await {
                    PumpEnd::Shutdown | PumpEnd::SubscriberGone => break,
                    PumpEnd::TransportClosed => {
                        warn!("channel: transport closed");
                        let _ = state.send(ChannelState::Disconnected);
                    }
                }
            }
            Ok(Err(e)) => {
                warn!(err = %e, "channel: connect failed");
                failures += 1;
            }
            Err(_) => {
                warn!(timeout_secs = CONNECT_TIMEOUT.as_secs(), "channel: connect timed out");
                failures += 1;
            }
        }

        if failures >= config.max_attempts {
            warn!(attempts = failures, "channel: reconnect budget exhausted — giving up");
            let _ = state.send(ChannelState::Lost);
            // Dropping the event sender ends the subscriber's stream.
            return;
        }

        let delay = config.backoff.delay_for(failures.saturating_sub(1));
        let _ = state.send(ChannelState::Reconnecting);
        debug!(delay_ms = delay.as_millis() as u64, "channel: backing off before reconnect");
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => break,
        }
    }

    let _ = state.send(ChannelState::Disconnected);
}

enum PumpEnd {
    TransportClosed,
    Shutdown,
    SubscriberGone,
}

/// Read frames until the transport ends or a shutdown is requested.
///
/// Malformed frames are dropped here without touching channel state.
async fn pump_frames(
    transport: Transport,
    events: &mpsc::Sender<LiveEvent>,
    shutdown: &mut watch::Receiver<bool>,
) -> PumpEnd {
    let (mut sink, mut stream) = transport.split();

    loop {
        tokio::select! {
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => match decode_frame(&text) {
                    Ok(Some(event)) => {
                        if events.send(event).await.is_err() {
                            return PumpEnd::SubscriberGone;
                        }
                    }
                    Ok(None) => debug!("channel: ignoring unrecognized event type"),
                    Err(e) => warn!(err = %e, "channel: dropping malformed frame"),
                },
                Some(Ok(Message::Ping(payload))) => {
                    let _ = sink.send(Message::Pong(payload)).await;
                }
                Some(Ok(Message::Close(_))) | None => return PumpEnd::TransportClosed,
                Some(Ok(_)) => {} // binary / pong frames carry nothing for us
                Some(Err(e)) => {
                    warn!(err = %e, "channel: transport error");
                    return PumpEnd::TransportClosed;
                }
            },
            _ = shutdown.changed() => {
                let _ = sink.send(Message::Close(None)).await;
                return PumpEnd::Shutdown;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::TaskStatus;

    #[test]
    fn decodes_task_created() {
        let event = decode_frame(
            r#"{"type":"task_created","task":{"id":"1","title":"A","status":"in_progress"}}"#,
        )
        .unwrap();
        match event {
            Some(LiveEvent::TaskCreated(task)) => {
                assert_eq!(task.id, "1");
                assert_eq!(task.status, TaskStatus::InProgress);
            }
            other => panic!("unexpected decode result: {other:?}"),
        }
    }

    #[test]
    fn unknown_event_type_is_ignored_not_an_error() {
        let event = decode_frame(r#"{"type":"unknown_event","anything":1}"#).unwrap();
        assert!(event.is_none());
    }

    #[test]
    fn malformed_frames_are_errors() {
        assert!(decode_frame("not json").is_err());
        assert!(decode_frame(r#"{"no_type_tag":true}"#).is_err());
        // Envelope of the right shape but an invalid task payload.
        assert!(decode_frame(r#"{"type":"task_created","task":{"title":"no id"}}"#).is_err());
    }
}
