//! Custom error types for the console.
//!
//! `ConsoleError` is the single error type shared by the channel layer, the
//! request endpoints and the capture workflow. Variants follow the failure
//! classes the console distinguishes at runtime:
//!
//! - **`Transport`**: a streaming connection dropped or could not be opened.
//!   Recovered by the reconnecting channel until its attempt cap is hit.
//! - **`ChannelExhausted`**: a channel gave up reconnecting. Reported to the
//!   operator, never fatal; a new address has to be entered by hand.
//! - **`Request`**: an HTTP call to the rig server failed.
//! - **`CaptureFailed`**: the capture submission failed, aborting a whole
//!   capture-and-classify run before anything is rendered.
//! - **`Validation`**: operator input rejected locally (empty label, bad index).
//!
//! The remaining variants wrap library errors so `?` works across the crate.

use thiserror::Error;

use crate::address::AddressError;

/// Convenience alias for results using the console error type.
pub type ConsoleResult<T> = std::result::Result<T, ConsoleError>;

#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Channel '{channel}' gave up after {attempts} reconnect attempts")]
    ChannelExhausted { channel: String, attempts: u32 },

    #[error("Request to {endpoint} failed: {message}")]
    Request { endpoint: String, message: String },

    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Malformed payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Invalid server address: {0}")]
    Address(#[from] AddressError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConsoleError {
    /// Build a `Request` error for the given endpoint path.
    pub fn request(endpoint: impl Into<String>, message: impl ToString) -> Self {
        Self::Request {
            endpoint: endpoint.into(),
            message: message.to_string(),
        }
    }

    /// Whether the console keeps running normally after this error.
    ///
    /// Only configuration and I/O problems at startup are treated as fatal.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Transport(_)
            | Self::ChannelExhausted { .. }
            | Self::Request { .. }
            | Self::CaptureFailed(_)
            | Self::Validation(_)
            | Self::Decode(_)
            | Self::Address(_) => true,
            Self::Config(_) | Self::Io(_) => false,
        }
    }
}

impl From<figment::Error> for ConsoleError {
    fn from(value: figment::Error) -> Self {
        Self::Config(Box::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_channel_message_names_channel() {
        let err = ConsoleError::ChannelExhausted {
            channel: "motor".into(),
            attempts: 5,
        };
        assert_eq!(
            err.to_string(),
            "Channel 'motor' gave up after 5 reconnect attempts"
        );
        assert!(err.is_recoverable());
    }

    #[test]
    fn request_helper_formats_endpoint() {
        let err = ConsoleError::request("/cam/shot", "status 500");
        assert_eq!(err.to_string(), "Request to /cam/shot failed: status 500");
    }

    #[test]
    fn io_errors_are_fatal() {
        let err: ConsoleError = std::io::Error::from(std::io::ErrorKind::NotFound).into();
        assert!(!err.is_recoverable());
    }
}
