//! One reconnecting streaming channel.
//!
//! [`ReconnectingChannel::open`] spawns a task that dials, forwards every
//! inbound frame as a [`ChannelEvent`], and redials after failures according
//! to [`ChannelConfig`]. The task never delivers anything itself; events go
//! to the consumer's queue tagged with a generation number, and the consumer
//! drops events from generations it no longer owns.
//!
//! Closing the handle cancels the task wherever it is suspended (dialing,
//! reading, or waiting out a reconnect delay).

use std::fmt;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use url::Url;

use super::state::{ChannelConfig, ChannelState, Transition};
use super::transport::StreamConnector;

/// Logical streams served by the rig.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChannelId {
    /// Motor telemetry (`{pos, vel, btnShot}` frames)
    Telemetry,
    /// Raw camera feed, numbered from 1
    Camera(u8),
}

impl ChannelId {
    /// Every channel the console keeps open.
    pub const ALL: [ChannelId; 3] = [Self::Telemetry, Self::Camera(1), Self::Camera(2)];

    /// Endpoint path on the rig server.
    #[must_use]
    pub fn path(self) -> String {
        match self {
            Self::Telemetry => "/ws/motor/data".to_string(),
            Self::Camera(n) => format!("/ws/cam/{n}"),
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Telemetry => write!(f, "motor"),
            Self::Camera(n) => write!(f, "cam{n}"),
        }
    }
}

/// Something that happened on a channel task.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelEvent {
    /// Source channel
    pub channel: ChannelId,
    /// Generation of the task that produced the event
    pub generation: u64,
    /// Payload
    pub kind: ChannelEventKind,
}

/// Payload of a [`ChannelEvent`].
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEventKind {
    /// One inbound text frame
    Frame(String),
    /// Lifecycle change
    State(ChannelState),
    /// Retries used up; the task has ended
    Exhausted(ChannelState),
}

/// Owning handle of a running channel task.
#[derive(Debug)]
pub struct ChannelHandle {
    generation: u64,
    cancel: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ChannelHandle {
    /// Generation this handle was opened with.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the task has ended on its own or been cancelled.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the task, including any pending reconnect delay.
    pub fn close(mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
        self.task.abort();
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Entry point for spawning channel tasks.
pub struct ReconnectingChannel;

impl ReconnectingChannel {
    /// Spawn a channel task for `url`.
    ///
    /// Events are sent to `events` in arrival order. Must be called from
    /// within a Tokio runtime.
    pub fn open(
        channel: ChannelId,
        generation: u64,
        url: Url,
        connector: Arc<dyn StreamConnector>,
        config: ChannelConfig,
        events: mpsc::Sender<ChannelEvent>,
    ) -> ChannelHandle {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let emitter = Emitter {
            channel,
            generation,
            events,
        };
        let task = tokio::spawn(run(url, connector, config, emitter, cancel_rx));
        ChannelHandle {
            generation,
            cancel: Some(cancel_tx),
            task,
        }
    }
}

struct Emitter {
    channel: ChannelId,
    generation: u64,
    events: mpsc::Sender<ChannelEvent>,
}

impl Emitter {
    /// Returns `false` once the consumer is gone.
    async fn emit(&self, kind: ChannelEventKind) -> bool {
        self.events
            .send(ChannelEvent {
                channel: self.channel,
                generation: self.generation,
                kind,
            })
            .await
            .is_ok()
    }
}

async fn run(
    url: Url,
    connector: Arc<dyn StreamConnector>,
    config: ChannelConfig,
    emitter: Emitter,
    mut cancel: oneshot::Receiver<()>,
) {
    let channel = emitter.channel;
    let mut state = ChannelState::connecting();
    if !emitter.emit(ChannelEventKind::State(state.clone())).await {
        return;
    }

    loop {
        tracing::debug!(%channel, %url, attempt = state.reconnect_attempts, "Dialing");
        let dialed = tokio::select! {
            biased;
            _ = &mut cancel => return,
            result = connector.connect(&url) => result,
        };

        let failure = match dialed {
            Ok(mut frames) => {
                state = state.opened();
                tracing::info!(%channel, %url, "Channel open");
                if !emitter.emit(ChannelEventKind::State(state.clone())).await {
                    return;
                }

                loop {
                    let next = tokio::select! {
                        biased;
                        _ = &mut cancel => return,
                        next = frames.next() => next,
                    };
                    match next {
                        Some(Ok(payload)) => {
                            if !emitter.emit(ChannelEventKind::Frame(payload)).await {
                                return;
                            }
                        }
                        Some(Err(e)) => break e.to_string(),
                        None => break "closed by server".to_string(),
                    }
                }
            }
            Err(e) => e.to_string(),
        };

        let (next, transition) = state.failed(failure, &config);
        state = next;
        match transition {
            Transition::Retry { attempt, delay } => {
                tracing::warn!(
                    %channel,
                    attempt,
                    max = config.max_reconnect_attempts,
                    "Connection lost ({}), retrying in {:.1}s",
                    state.last_error.as_deref().unwrap_or("unknown"),
                    delay.as_secs_f64()
                );
                if !emitter.emit(ChannelEventKind::State(state.clone())).await {
                    return;
                }
                tokio::select! {
                    biased;
                    _ = &mut cancel => return,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            Transition::Exhausted { attempts } => {
                tracing::error!(%channel, attempts, "Max reconnect attempts reached");
                let _ = emitter.emit(ChannelEventKind::Exhausted(state)).await;
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_paths() {
        assert_eq!(ChannelId::Telemetry.path(), "/ws/motor/data");
        assert_eq!(ChannelId::Camera(2).path(), "/ws/cam/2");
    }

    #[test]
    fn test_channel_names() {
        let names: Vec<String> = ChannelId::ALL.iter().map(ToString::to_string).collect();
        assert_eq!(names, vec!["motor", "cam1", "cam2"]);
    }
}
