//! Latest-frame holder for one camera stream.

use base64::Engine;

use crate::error::{ConsoleError, ConsoleResult};
use crate::model::data_uri;

/// Keeps the most recent valid frame of one camera.
#[derive(Debug, Clone, Default)]
pub struct CameraFeed {
    latest: Option<String>,
    decoded_len: usize,
    frames_received: u64,
    frames_dropped: u64,
}

impl CameraFeed {
    /// Feed with no frame yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept one base64 frame.
    ///
    /// An invalid payload is counted and rejected; the previous frame stays.
    pub fn push(&mut self, payload: &str) -> ConsoleResult<()> {
        let payload = payload.trim();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| {
                self.frames_dropped += 1;
                ConsoleError::Validation(format!("camera frame is not base64: {e}"))
            })?;
        if decoded.is_empty() {
            self.frames_dropped += 1;
            return Err(ConsoleError::Validation("empty camera frame".into()));
        }

        self.decoded_len = decoded.len();
        self.latest = Some(payload.to_string());
        self.frames_received += 1;
        Ok(())
    }

    /// Latest frame as a `data:` URI.
    #[must_use]
    pub fn data_uri(&self) -> Option<String> {
        self.latest.as_deref().map(data_uri)
    }

    /// Decoded size of the latest frame in bytes.
    #[must_use]
    pub fn decoded_len(&self) -> usize {
        self.decoded_len
    }

    /// Valid frames accepted.
    #[must_use]
    pub fn frames_received(&self) -> u64 {
        self.frames_received
    }

    /// Invalid frames rejected.
    #[must_use]
    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }
}
