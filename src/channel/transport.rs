//! Streaming transport seam.
//!
//! The reconnect loop only needs "dial this URL and give me text frames".
//! [`WsConnector`] does that over WebSockets; tests plug in scripted
//! connectors.

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use crate::error::{ConsoleError, ConsoleResult};

/// Inbound frames of one connection, ending when the peer closes.
pub type FrameStream = BoxStream<'static, ConsoleResult<String>>;

/// Opens streaming connections.
#[async_trait]
pub trait StreamConnector: Send + Sync {
    /// Dial `url` and return its frame stream.
    async fn connect(&self, url: &Url) -> ConsoleResult<FrameStream>;
}

/// WebSocket connector used against the rig server.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl StreamConnector for WsConnector {
    async fn connect(&self, url: &Url) -> ConsoleResult<FrameStream> {
        let (socket, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| ConsoleError::Transport(format!("{url}: {e}")))?;

        let frames = socket.filter_map(|message| async move {
            match message {
                Ok(Message::Text(text)) => Some(Ok(text)),
                Ok(Message::Binary(bytes)) => {
                    Some(Ok(String::from_utf8_lossy(&bytes).into_owned()))
                }
                // Control frames; a Close is followed by end of stream.
                Ok(_) => None,
                Err(e) => Some(Err(ConsoleError::Transport(e.to_string()))),
            }
        });

        Ok(frames.boxed())
    }
}
