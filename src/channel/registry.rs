//! Registry of the console's named streaming channels.
//!
//! The registry is the single owner of every channel task. Opening a channel
//! under a name that is already live tears the old one down first, and every
//! event coming back is checked against the generation the registry currently
//! holds for that name. Events from a replaced or closed channel (a frame
//! already queued, a late reconnect timer) are dropped here, so the consumer
//! never sees them.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use url::Url;

use super::reconnecting::{
    ChannelEvent, ChannelEventKind, ChannelHandle, ChannelId, ReconnectingChannel,
};
use super::state::{ChannelConfig, ChannelState};
use super::transport::StreamConnector;
use crate::address::ServerAddress;
use crate::error::{ConsoleError, ConsoleResult};

/// Capacity of the shared event queue.
const EVENT_QUEUE_CAPACITY: usize = 256;

/// An event accepted from a live channel.
#[derive(Debug)]
pub enum Delivery {
    /// Inbound frame for the channel's handler
    Frame {
        /// Source channel
        channel: ChannelId,
        /// Raw frame text
        payload: String,
    },
    /// Lifecycle change
    StateChanged {
        /// Source channel
        channel: ChannelId,
        /// New state
        state: ChannelState,
    },
    /// Channel stopped retrying; carries a `ChannelExhausted` error
    Exhausted {
        /// Source channel
        channel: ChannelId,
        /// Terminal error for reporting
        error: ConsoleError,
    },
}

struct ChannelEntry {
    url: Url,
    state: ChannelState,
    handle: ChannelHandle,
}

/// Owns the live channel set.
pub struct ChannelRegistry {
    connector: Arc<dyn StreamConnector>,
    config: ChannelConfig,
    events_tx: mpsc::Sender<ChannelEvent>,
    channels: BTreeMap<ChannelId, ChannelEntry>,
    next_generation: u64,
}

impl ChannelRegistry {
    /// Create an empty registry and the queue its channels report into.
    pub fn new(
        connector: Arc<dyn StreamConnector>,
        config: ChannelConfig,
    ) -> (Self, mpsc::Receiver<ChannelEvent>) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let registry = Self {
            connector,
            config,
            events_tx,
            channels: BTreeMap::new(),
            next_generation: 1,
        };
        (registry, events_rx)
    }

    /// Reconnect policy applied to new channels.
    #[must_use]
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Open `channel` at `url`, replacing any live channel with that name.
    pub fn open(&mut self, channel: ChannelId, url: Url) {
        self.close(channel);

        let generation = self.next_generation;
        self.next_generation += 1;

        tracing::info!(%channel, %url, generation, "Opening channel");
        let handle = ReconnectingChannel::open(
            channel,
            generation,
            url.clone(),
            Arc::clone(&self.connector),
            self.config.clone(),
            self.events_tx.clone(),
        );
        self.channels.insert(
            channel,
            ChannelEntry {
                url,
                state: ChannelState::connecting(),
                handle,
            },
        );
    }

    /// Close `channel`. Returns `false` if it was not open.
    ///
    /// Nothing from the closed channel is delivered afterwards.
    pub fn close(&mut self, channel: ChannelId) -> bool {
        match self.channels.remove(&channel) {
            Some(entry) => {
                tracing::info!(%channel, url = %entry.url, "Closing channel");
                entry.handle.close();
                true
            }
            None => false,
        }
    }

    /// Close every channel.
    pub fn close_all(&mut self) {
        let ids: Vec<ChannelId> = self.channels.keys().copied().collect();
        for channel in ids {
            self.close(channel);
        }
    }

    /// Tear down the whole channel set and reopen it at `address`.
    ///
    /// All URLs are built before anything is closed, so a bad address leaves
    /// the current channels untouched.
    pub fn replace_all(&mut self, address: &ServerAddress) -> ConsoleResult<()> {
        let urls = ChannelId::ALL
            .iter()
            .map(|id| address.ws_url(&id.path()).map(|url| (*id, url)))
            .collect::<Result<Vec<_>, _>>()?;

        self.close_all();
        for (channel, url) in urls {
            self.open(channel, url);
        }
        Ok(())
    }

    /// Filter one event from the queue.
    ///
    /// Returns `None` for events of channels that were closed or replaced.
    pub fn accept(&mut self, event: ChannelEvent) -> Option<Delivery> {
        let channel = event.channel;
        let entry = match self.channels.get_mut(&channel) {
            Some(entry) if entry.handle.generation() == event.generation => entry,
            _ => {
                tracing::trace!(
                    %channel,
                    generation = event.generation,
                    "Dropping stale channel event"
                );
                return None;
            }
        };

        match event.kind {
            ChannelEventKind::Frame(payload) => Some(Delivery::Frame { channel, payload }),
            ChannelEventKind::State(state) => {
                entry.state = state.clone();
                Some(Delivery::StateChanged { channel, state })
            }
            ChannelEventKind::Exhausted(state) => {
                let attempts = state.reconnect_attempts;
                entry.state = state;
                Some(Delivery::Exhausted {
                    channel,
                    error: ConsoleError::ChannelExhausted {
                        channel: channel.to_string(),
                        attempts,
                    },
                })
            }
        }
    }

    /// Current state of `channel`, if it is registered.
    #[must_use]
    pub fn state(&self, channel: ChannelId) -> Option<&ChannelState> {
        self.channels.get(&channel).map(|entry| &entry.state)
    }

    /// URL `channel` is dialing.
    #[must_use]
    pub fn url(&self, channel: ChannelId) -> Option<&Url> {
        self.channels.get(&channel).map(|entry| &entry.url)
    }

    /// Registered channels in a stable order.
    pub fn channels(&self) -> impl Iterator<Item = (ChannelId, &ChannelState)> {
        self.channels.iter().map(|(id, entry)| (*id, &entry.state))
    }
}

impl Drop for ChannelRegistry {
    fn drop(&mut self) {
        self.close_all();
    }
}
