//! Motor telemetry decoding and the capture trigger.
//!
//! The motor channel pushes `{pos, vel, btnShot}` records roughly every
//! 100ms. [`TelemetryMonitor`] keeps the last position and velocity for
//! display and turns the physical shot button into capture requests.
//!
//! The trigger is rate limited: once a request fires, further qualifying
//! records are ignored until `min_interval` has passed. Excess presses are
//! dropped, never queued. Each request carries a `fire_at` instant
//! `settle_delay` in the future so the motor can finish braking before the
//! shot.
//!
//! How a record qualifies depends on [`TriggerMode`]. The rig's firmware
//! reports the button level, and the console historically fired on the level
//! (`btnShot == 1`) with only the window preventing repeats while the button
//! is held. That is [`TriggerMode::Level`], the default. [`TriggerMode::Edge`]
//! also requires the previous record to have had the button released.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{ConsoleError, ConsoleResult};

/// One telemetry snapshot pushed by the rig.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// Motor position in encoder units
    #[serde(rename = "pos")]
    pub position: f64,
    /// Motor velocity
    #[serde(rename = "vel")]
    pub velocity: f64,
    /// Shot button level, 0 or 1
    #[serde(rename = "btnShot", default)]
    pub button_state: u8,
}

impl TelemetryRecord {
    /// Whether the shot button reads as pressed.
    #[must_use]
    pub fn button_pressed(&self) -> bool {
        self.button_state == 1
    }
}

impl FromStr for TelemetryRecord {
    type Err = ConsoleError;

    fn from_str(frame: &str) -> ConsoleResult<Self> {
        Ok(serde_json::from_str(frame)?)
    }
}

/// How the button field turns into a trigger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    /// Every record with the button down qualifies.
    #[default]
    Level,
    /// Only a released-to-pressed transition qualifies.
    Edge,
}

/// Trigger policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Minimum time between two requests
    pub min_interval: Duration,
    /// Delay between a request and the shot
    pub settle_delay: Duration,
    /// Qualification rule
    pub mode: TriggerMode,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(2000),
            settle_delay: Duration::from_millis(300),
            mode: TriggerMode::Level,
        }
    }
}

/// A capture request derived from the shot button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRequest {
    /// When the qualifying record was observed
    pub requested_at: Instant,
    /// When the capture should start
    pub fire_at: Instant,
}

/// Tracks the latest telemetry and derives capture requests.
#[derive(Debug, Clone)]
pub struct TelemetryMonitor {
    config: MonitorConfig,
    last_record: Option<TelemetryRecord>,
    last_trigger: Option<Instant>,
    records_seen: u64,
    triggers_fired: u64,
}

impl TelemetryMonitor {
    /// Create a monitor with the given policy.
    #[must_use]
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            last_record: None,
            last_trigger: None,
            records_seen: 0,
            triggers_fired: 0,
        }
    }

    /// Decode one raw frame and observe it.
    pub fn ingest(&mut self, frame: &str, now: Instant) -> ConsoleResult<Option<CaptureRequest>> {
        let record: TelemetryRecord = frame.parse()?;
        Ok(self.observe(record, now))
    }

    /// Observe one record; returns a request if this record triggers a shot.
    pub fn observe(&mut self, record: TelemetryRecord, now: Instant) -> Option<CaptureRequest> {
        let previously_pressed = self
            .last_record
            .map_or(false, |previous| previous.button_pressed());
        self.last_record = Some(record);
        self.records_seen += 1;

        let qualifies = match self.config.mode {
            TriggerMode::Level => record.button_pressed(),
            TriggerMode::Edge => record.button_pressed() && !previously_pressed,
        };
        if !qualifies {
            return None;
        }

        if let Some(last) = self.last_trigger {
            if now.saturating_duration_since(last) < self.config.min_interval {
                tracing::trace!("Shot button suppressed by rate limit");
                return None;
            }
        }

        self.last_trigger = Some(now);
        self.triggers_fired += 1;
        tracing::debug!(position = record.position, "Shot button triggered capture");
        Some(CaptureRequest {
            requested_at: now,
            fire_at: now + self.config.settle_delay,
        })
    }

    /// Last reported motor position.
    #[must_use]
    pub fn last_position(&self) -> Option<f64> {
        self.last_record.map(|r| r.position)
    }

    /// Last reported motor velocity.
    #[must_use]
    pub fn last_velocity(&self) -> Option<f64> {
        self.last_record.map(|r| r.velocity)
    }

    /// When the last request fired.
    #[must_use]
    pub fn last_trigger(&self) -> Option<Instant> {
        self.last_trigger
    }

    /// Records observed so far.
    #[must_use]
    pub fn records_seen(&self) -> u64 {
        self.records_seen
    }

    /// Requests fired so far.
    #[must_use]
    pub fn triggers_fired(&self) -> u64 {
        self.triggers_fired
    }
}

impl Default for TelemetryMonitor {
    fn default() -> Self {
        Self::new(MonitorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(button: u8) -> TelemetryRecord {
        TelemetryRecord {
            position: 1200.0,
            velocity: 0.0,
            button_state: button,
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_decode_frame() {
        let record: TelemetryRecord =
            r#"{"pos": 3500, "vel": -12.5, "btnShot": 1}"#.parse().unwrap();
        assert_eq!(record.position, 3500.0);
        assert_eq!(record.velocity, -12.5);
        assert!(record.button_pressed());
    }

    #[test]
    fn test_decode_without_button_field() {
        let record: TelemetryRecord = r#"{"pos": 1, "vel": 2}"#.parse().unwrap();
        assert!(!record.button_pressed());
    }

    #[test]
    fn test_malformed_frame() {
        let mut monitor = TelemetryMonitor::default();
        let err = monitor.ingest("not json", Instant::now()).unwrap_err();
        assert!(matches!(err, ConsoleError::Decode(_)));
        assert_eq!(monitor.records_seen(), 0);
    }

    #[test]
    fn test_tracks_last_position_and_velocity() {
        let mut monitor = TelemetryMonitor::default();
        assert_eq!(monitor.last_position(), None);
        monitor
            .ingest(r#"{"pos": 42, "vel": 3, "btnShot": 0}"#, Instant::now())
            .unwrap();
        assert_eq!(monitor.last_position(), Some(42.0));
        assert_eq!(monitor.last_velocity(), Some(3.0));
    }

    #[test]
    fn test_toggles_within_window_fire_once() {
        let start = Instant::now();
        let mut monitor = TelemetryMonitor::default();
        let fired: Vec<_> = [(0, 0), (300, 1), (900, 0), (1900, 1)]
            .into_iter()
            .filter_map(|(t, b)| monitor.observe(record(b), start + ms(t)))
            .collect();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].requested_at, start + ms(300));
        assert_eq!(fired[0].fire_at, start + ms(600));
    }

    #[test]
    fn test_toggles_past_window_fire_twice() {
        let start = Instant::now();
        let mut monitor = TelemetryMonitor::default();
        let fired = [(0, 1), (1000, 0), (2000, 1)]
            .into_iter()
            .filter_map(|(t, b)| monitor.observe(record(b), start + ms(t)))
            .count();
        assert_eq!(fired, 2);
        assert_eq!(monitor.triggers_fired(), 2);
    }

    #[test]
    fn test_level_mode_refires_while_held() {
        let start = Instant::now();
        let mut monitor = TelemetryMonitor::default();
        let fired = (0..=25)
            .filter_map(|i| monitor.observe(record(1), start + ms(i * 100)))
            .count();
        // Held for 2.5s: fires at 0 and at 2000ms.
        assert_eq!(fired, 2);
    }

    #[test]
    fn test_edge_mode_needs_release() {
        let start = Instant::now();
        let mut monitor = TelemetryMonitor::new(MonitorConfig {
            mode: TriggerMode::Edge,
            ..Default::default()
        });
        let held = (0..=25)
            .filter_map(|i| monitor.observe(record(1), start + ms(i * 100)))
            .count();
        assert_eq!(held, 1);

        assert!(monitor.observe(record(0), start + ms(2600)).is_none());
        assert!(monitor.observe(record(1), start + ms(2700)).is_some());
    }
}
