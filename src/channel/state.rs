//! Channel lifecycle state and reconnect policy.
//!
//! Each streaming channel carries an explicit [`ChannelState`] value. State
//! changes go through the transition methods below, which take the old value
//! and return the new one, so the reconnect loop never mutates hidden fields.
//!
//! # State Machine
//!
//! ```text
//!   Connecting ──open──> Open
//!      ▲   │               │
//!      │ failure        failure
//!      │   ▼               ▼
//!      └─ Retry ◄──────────┘     (attempts < max)
//!          │
//!          └──> Closed (exhausted, attempts == max)
//!
//!   any ──close()──> Closed (operator, attempts reset)
//! ```

use std::fmt;
use std::time::Duration;

/// Connection status of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    /// Dialing, or waiting to redial.
    Connecting,
    /// Frames are flowing.
    Open,
    /// Closed by the operator or after exhausting retries.
    Closed,
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Reconnect policy for a channel.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Delay before the first reconnect attempt.
    pub reconnect_interval: Duration,
    /// Consecutive failures tolerated before giving up.
    pub max_reconnect_attempts: u32,
    /// Delay multiplier per attempt; 1.0 keeps the interval fixed.
    pub backoff_multiplier: f64,
    /// Cap on any single delay.
    pub max_delay: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            reconnect_interval: Duration::from_millis(1000),
            max_reconnect_attempts: 5,
            backoff_multiplier: 1.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl ChannelConfig {
    /// Calculate the delay for a given attempt number (1-based).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay = self.reconnect_interval.as_secs_f64()
            * self
                .backoff_multiplier
                .powi(attempt.saturating_sub(1) as i32);
        Duration::from_secs_f64(base_delay.min(self.max_delay.as_secs_f64()))
    }

    /// Whether another reconnect may be scheduled after `attempts` retries.
    #[must_use]
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_reconnect_attempts
    }
}

/// What the reconnect loop does after a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Redial after `delay`; this is retry number `attempt`.
    Retry { attempt: u32, delay: Duration },
    /// Stop for good.
    Exhausted { attempts: u32 },
}

/// Observable state of one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelState {
    /// Current status
    pub status: ChannelStatus,
    /// Consecutive reconnect attempts since the last successful open
    pub reconnect_attempts: u32,
    /// Most recent transport error
    pub last_error: Option<String>,
}

impl ChannelState {
    /// State of a freshly opened channel handle.
    #[must_use]
    pub fn connecting() -> Self {
        Self {
            status: ChannelStatus::Connecting,
            reconnect_attempts: 0,
            last_error: None,
        }
    }

    /// The transport opened; the attempt counter resets.
    #[must_use]
    pub fn opened(self) -> Self {
        Self {
            status: ChannelStatus::Open,
            reconnect_attempts: 0,
            last_error: None,
        }
    }

    /// The transport failed to open or dropped.
    #[must_use]
    pub fn failed(self, error: impl Into<String>, config: &ChannelConfig) -> (Self, Transition) {
        let last_error = Some(error.into());
        if config.should_retry(self.reconnect_attempts) {
            let attempt = self.reconnect_attempts + 1;
            let next = Self {
                status: ChannelStatus::Connecting,
                reconnect_attempts: attempt,
                last_error,
            };
            let delay = config.delay_for_attempt(attempt);
            (next, Transition::Retry { attempt, delay })
        } else {
            let attempts = self.reconnect_attempts;
            let next = Self {
                status: ChannelStatus::Closed,
                reconnect_attempts: attempts,
                last_error,
            };
            (next, Transition::Exhausted { attempts })
        }
    }

    /// The operator closed the channel.
    #[must_use]
    pub fn closed(self) -> Self {
        Self {
            status: ChannelStatus::Closed,
            reconnect_attempts: 0,
            last_error: self.last_error,
        }
    }

    /// Whether this channel gave up reconnecting.
    #[must_use]
    pub fn is_exhausted(&self, config: &ChannelConfig) -> bool {
        self.status == ChannelStatus::Closed
            && self.reconnect_attempts >= config.max_reconnect_attempts
            && self.last_error.is_some()
    }

    /// Short label for status output.
    #[must_use]
    pub fn label(&self) -> String {
        match (self.status, self.reconnect_attempts) {
            (ChannelStatus::Connecting, 0) => "connecting".to_string(),
            (ChannelStatus::Connecting, n) => format!("reconnecting ({n})"),
            (status, _) => status.to_string(),
        }
    }
}
