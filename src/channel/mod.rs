//! Streaming channels with automatic reconnection.
//!
//! - [`state`]: explicit channel state and the reconnect policy
//! - [`transport`]: the dialing seam and its WebSocket implementation
//! - [`reconnecting`]: the per-channel task and its owning handle
//! - [`registry`]: the named channel set the console owns

pub mod reconnecting;
pub mod registry;
pub mod state;
pub mod transport;

pub use reconnecting::{
    ChannelEvent, ChannelEventKind, ChannelHandle, ChannelId, ReconnectingChannel,
};
pub use registry::{ChannelRegistry, Delivery};
pub use state::{ChannelConfig, ChannelState, ChannelStatus, Transition};
pub use transport::{FrameStream, StreamConnector, WsConnector};
