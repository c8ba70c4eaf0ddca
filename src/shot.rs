//! Trigger control of the "shoot and classify" action.
//!
//! While a shot runs the control is disabled and its label follows the
//! workflow phase (`idle -> capturing -> classifying -> idle`). The control
//! is re-enabled by dropping the [`ShotGuard`], so every exit path of a shot,
//! including early returns on error, restores it.

use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// Phase of the shoot-and-classify workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShotPhase {
    /// Ready for a new shot
    Idle,
    /// Motor moving through setpoints and cameras shooting
    Capturing,
    /// Waiting for classification and reference images
    Classifying,
}

impl ShotPhase {
    /// Label shown on the trigger control.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "shoot and classify",
            Self::Capturing => "motor running",
            Self::Classifying => "classifying",
        }
    }
}

impl fmt::Display for ShotPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Observable state of the trigger control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShotStatus {
    /// Current phase
    pub phase: ShotPhase,
    /// Whether a new shot may start
    pub enabled: bool,
}

impl ShotStatus {
    /// Ready state.
    #[must_use]
    pub fn idle() -> Self {
        Self {
            phase: ShotPhase::Idle,
            enabled: true,
        }
    }
}

/// Shared trigger control.
#[derive(Debug, Clone)]
pub struct ShotControl {
    status: Arc<watch::Sender<ShotStatus>>,
}

impl ShotControl {
    /// Enabled control in the idle phase.
    #[must_use]
    pub fn new() -> Self {
        let (status, _) = watch::channel(ShotStatus::idle());
        Self {
            status: Arc::new(status),
        }
    }

    /// Watch status changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ShotStatus> {
        self.status.subscribe()
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> ShotStatus {
        *self.status.borrow()
    }

    /// Whether a new shot may start.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.status().enabled
    }

    /// Disable the control and enter `Capturing`.
    ///
    /// Returns `None` if a shot is already running.
    #[must_use]
    pub fn try_begin(&self) -> Option<ShotGuard> {
        let began = self.status.send_if_modified(|status| {
            if status.enabled {
                *status = ShotStatus {
                    phase: ShotPhase::Capturing,
                    enabled: false,
                };
                true
            } else {
                false
            }
        });
        began.then(|| ShotGuard {
            control: self.clone(),
        })
    }
}

impl Default for ShotControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Held for the duration of one shot; dropping it re-enables the control.
#[derive(Debug)]
pub struct ShotGuard {
    control: ShotControl,
}

impl ShotGuard {
    /// Advance the phase shown on the control.
    pub fn set_phase(&self, phase: ShotPhase) {
        self.control
            .status
            .send_modify(|status| status.phase = phase);
    }
}

impl Drop for ShotGuard {
    fn drop(&mut self) {
        self.control.status.send_replace(ShotStatus::idle());
    }
}
