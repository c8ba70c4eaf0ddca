//! Console configuration using Figment
//!
//! Configuration is loaded from:
//! 1. `config/rig-console.toml` (optional, every field has a default)
//! 2. Environment variables prefixed with `RIG_CONSOLE_`, nested keys split on `__`
//!
//! # Example
//! ```no_run
//! use rig_console::config::ConsoleConfig;
//!
//! let config = ConsoleConfig::load()?;
//! println!("Server: {}", config.server.address);
//! # Ok::<(), rig_console::error::ConsoleError>(())
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::address::{SchemePolicy, DEFAULT_SERVER_ADDR};
use crate::channel::ChannelConfig;
use crate::error::{ConsoleError, ConsoleResult};
use crate::telemetry::{MonitorConfig, TriggerMode};

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/rig-console.toml";

/// Top-level console configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsoleConfig {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Rig server location
    #[serde(default)]
    pub server: ServerConfig,
    /// Streaming channel reconnect policy
    #[serde(default)]
    pub channels: ChannelSettings,
    /// Capture trigger settings
    #[serde(default)]
    pub telemetry: TelemetrySettings,
    /// Request endpoint settings
    #[serde(default)]
    pub http: HttpSettings,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    #[serde(default = "default_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Rig server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// `host` or `host:port`
    #[serde(default = "default_address")]
    pub address: String,
    /// Transport security selection
    #[serde(default)]
    pub scheme_policy: SchemePolicy,
}

/// Reconnect policy shared by all streaming channels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSettings {
    /// Delay before the first reconnect attempt
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval_ms: u64,
    /// Consecutive failures before a channel gives up
    #[serde(default = "default_max_attempts")]
    pub max_reconnect_attempts: u32,
    /// Delay growth per attempt (1.0 keeps the interval fixed)
    #[serde(default = "default_backoff")]
    pub backoff_multiplier: f64,
    /// Upper bound on any single reconnect delay
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
}

/// Capture trigger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySettings {
    /// Minimum time between two capture triggers
    #[serde(default = "default_min_trigger_interval")]
    pub min_trigger_interval_ms: u64,
    /// Wait after a trigger so the motor can finish braking
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,
    /// How the button field is read
    #[serde(default)]
    pub trigger_mode: TriggerMode,
}

/// HTTP request configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    /// Per-request timeout
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

// Default value functions
fn default_name() -> String {
    "Rig Console".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_address() -> String {
    DEFAULT_SERVER_ADDR.to_string()
}

fn default_reconnect_interval() -> u64 {
    1000
}

fn default_max_attempts() -> u32 {
    5
}

fn default_backoff() -> f64 {
    1.0
}

fn default_max_delay() -> u64 {
    30_000
}

fn default_min_trigger_interval() -> u64 {
    2000
}

fn default_settle_delay() -> u64 {
    300
}

fn default_timeout() -> u64 {
    10_000
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            scheme_policy: SchemePolicy::default(),
        }
    }
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            reconnect_interval_ms: default_reconnect_interval(),
            max_reconnect_attempts: default_max_attempts(),
            backoff_multiplier: default_backoff(),
            max_delay_ms: default_max_delay(),
        }
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            min_trigger_interval_ms: default_min_trigger_interval(),
            settle_delay_ms: default_settle_delay(),
            trigger_mode: TriggerMode::default(),
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout(),
        }
    }
}

impl ConsoleConfig {
    /// Load configuration from the default file and environment variables
    ///
    /// Example override: `RIG_CONSOLE_CHANNELS__MAX_RECONNECT_ATTEMPTS=10`
    pub fn load() -> ConsoleResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    ///
    /// A missing file is not an error; defaults apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> ConsoleResult<Self> {
        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("RIG_CONSOLE_").split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> ConsoleResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(ConsoleError::Validation(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.channels.reconnect_interval_ms == 0 {
            return Err(ConsoleError::Validation(
                "reconnect_interval_ms must be greater than 0".into(),
            ));
        }

        if self.channels.backoff_multiplier < 1.0 {
            return Err(ConsoleError::Validation(format!(
                "Invalid backoff_multiplier {}. Must be >= 1.0",
                self.channels.backoff_multiplier
            )));
        }

        Ok(())
    }

    /// Reconnect policy for the streaming channels
    #[must_use]
    pub fn channel_config(&self) -> ChannelConfig {
        ChannelConfig {
            reconnect_interval: Duration::from_millis(self.channels.reconnect_interval_ms),
            max_reconnect_attempts: self.channels.max_reconnect_attempts,
            backoff_multiplier: self.channels.backoff_multiplier,
            max_delay: Duration::from_millis(self.channels.max_delay_ms),
        }
    }

    /// Capture trigger policy
    #[must_use]
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            min_interval: Duration::from_millis(self.telemetry.min_trigger_interval_ms),
            settle_delay: Duration::from_millis(self.telemetry.settle_delay_ms),
            mode: self.telemetry.trigger_mode,
        }
    }

    /// Per-request timeout
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.http.timeout_ms)
    }
}
