//! Rig server address handling.
//!
//! The console talks to one rig server over two transports: WebSocket streams
//! for telemetry and camera frames, and plain HTTP for requests. Both are
//! derived from a single operator-entered address.
//!
//! - [`ServerAddress`]: validated host (and optional port) with source tracking
//! - [`SchemePolicy`]: how transport security is chosen for a typed address
//! - [`AddressError`]: user-facing validation errors
//!
//! # Address Resolution Precedence
//!
//! 1. User input (`--address` flag or `connect` command)
//! 2. `RIG_CONSOLE_ADDR` environment variable
//! 3. The configured default (`server.address`)
//!
//! # Scheme Selection
//!
//! The rig's browser console picked the scheme from the shape of the input:
//! anything with a port separator was dialed in plaintext, a bare hostname
//! over TLS. That heuristic is [`SchemePolicy::ColonHeuristic`] and stays the
//! default, but it can be pinned with [`SchemePolicy::Plain`] or
//! [`SchemePolicy::Secure`].
//!
//! # Example
//!
//! ```
//! use rig_console::address::{AddressSource, SchemePolicy, ServerAddress};
//!
//! let policy = SchemePolicy::default();
//! let addr = ServerAddress::parse("10.0.0.7:8800", AddressSource::UserInput, policy)?;
//! assert_eq!(
//!     addr.ws_url("/ws/motor/data")?.as_str(),
//!     "ws://10.0.0.7:8800/ws/motor/data"
//! );
//! assert!(!addr.is_tls());
//! # Ok::<(), rig_console::address::AddressError>(())
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Environment variable consulted when no address was typed.
pub const ENV_SERVER_ADDR: &str = "RIG_CONSOLE_ADDR";

/// Default rig server address.
pub const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:8800";

/// Source of the server address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressSource {
    /// Configured default
    Default,
    /// Loaded from `RIG_CONSOLE_ADDR`
    Environment,
    /// Typed by the operator
    UserInput,
}

impl AddressSource {
    /// Short label for status output.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Environment => "env",
            Self::UserInput => "user",
        }
    }
}

impl fmt::Display for AddressSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "Default"),
            Self::Environment => write!(f, "Environment ({ENV_SERVER_ADDR})"),
            Self::UserInput => write!(f, "User input"),
        }
    }
}

/// How transport security is picked for an address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemePolicy {
    /// `host:port` dials plaintext, a bare `host` dials TLS.
    #[default]
    ColonHeuristic,
    /// Always `ws://` and `http://`.
    Plain,
    /// Always `wss://` and `https://`.
    Secure,
}

impl SchemePolicy {
    /// Decide whether `authority` should be dialed over TLS.
    #[must_use]
    pub fn use_tls(self, authority: &str) -> bool {
        match self {
            Self::ColonHeuristic => !authority.contains(':'),
            Self::Plain => false,
            Self::Secure => true,
        }
    }
}

/// Validated rig server address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerAddress {
    /// `host` or `host:port`, without scheme or path
    authority: String,
    tls: bool,
    source: AddressSource,
}

impl ServerAddress {
    /// Parse an operator-entered address.
    ///
    /// Accepts `host`, `host:port`, and `[v6]:port`. A scheme typed in front
    /// (`ws://`, `https://`, ...) is stripped, and so is any trailing path;
    /// only `policy` decides the transport.
    pub fn parse(
        input: &str,
        source: AddressSource,
        policy: SchemePolicy,
    ) -> Result<Self, AddressError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(AddressError::EmptyInput);
        }

        let without_scheme = match input.split_once("://") {
            Some((_, rest)) => rest,
            None => input,
        };
        let authority = without_scheme
            .split('/')
            .next()
            .unwrap_or_default()
            .trim();
        if authority.is_empty() {
            return Err(AddressError::MissingHost);
        }

        // Validate by building a throwaway URL.
        let probe = Url::parse(&format!("http://{authority}/"))
            .map_err(|e| AddressError::InvalidUrl(e.to_string()))?;
        if probe.host_str().map_or(true, str::is_empty) {
            return Err(AddressError::MissingHost);
        }

        Ok(Self {
            authority: authority.to_string(),
            tls: policy.use_tls(authority),
            source,
        })
    }

    /// `host` or `host:port` as typed.
    #[must_use]
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Returns `true` if this address is dialed over TLS.
    #[must_use]
    pub fn is_tls(&self) -> bool {
        self.tls
    }

    /// Where this address came from.
    #[must_use]
    pub fn source(&self) -> AddressSource {
        self.source
    }

    /// Streaming endpoint URL for `path`.
    pub fn ws_url(&self, path: &str) -> Result<Url, AddressError> {
        self.join(if self.tls { "wss" } else { "ws" }, path)
    }

    /// Request endpoint URL for `path`.
    pub fn http_url(&self, path: &str) -> Result<Url, AddressError> {
        self.join(if self.tls { "https" } else { "http" }, path)
    }

    fn join(&self, scheme: &str, path: &str) -> Result<Url, AddressError> {
        let path = path.trim_start_matches('/');
        Url::parse(&format!("{scheme}://{}/{path}", self.authority))
            .map_err(|e| AddressError::InvalidUrl(e.to_string()))
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = if self.tls { "wss" } else { "ws" };
        write!(f, "{scheme}://{}", self.authority)
    }
}

/// Address validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// Input was empty or whitespace-only
    EmptyInput,
    /// URL parsing failed
    InvalidUrl(String),
    /// No host was found in the input
    MissingHost,
}

impl std::error::Error for AddressError {}

impl fmt::Display for AddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyInput => write!(f, "Address cannot be empty"),
            Self::InvalidUrl(e) => write!(f, "Invalid URL: {e}"),
            Self::MissingHost => write!(f, "Address must include a host"),
        }
    }
}

/// Resolve the server address from the available sources.
///
/// Invalid candidates are skipped; if nothing else parses, `default` is used
/// and its parse error returned.
pub fn resolve_address(
    user_input: Option<&str>,
    default: &str,
    policy: SchemePolicy,
) -> Result<ServerAddress, AddressError> {
    if let Some(input) = user_input {
        if !input.trim().is_empty() {
            match ServerAddress::parse(input, AddressSource::UserInput, policy) {
                Ok(addr) => return Ok(addr),
                Err(e) => tracing::warn!("Ignoring address '{}': {}", input, e),
            }
        }
    }

    if let Ok(env_addr) = std::env::var(ENV_SERVER_ADDR) {
        if let Ok(addr) = ServerAddress::parse(&env_addr, AddressSource::Environment, policy) {
            return Ok(addr);
        }
    }

    ServerAddress::parse(default, AddressSource::Default, policy)
}
