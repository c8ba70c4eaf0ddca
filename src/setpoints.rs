//! Operator-edited setpoint list.
//!
//! The list order is the exposure order sent to the capture endpoint. Values
//! are opaque motor targets; no range checks are applied.

use serde::{Deserialize, Serialize};

use crate::error::{ConsoleError, ConsoleResult};

/// Value used when the operator adds a setpoint without one.
pub const DEFAULT_SETPOINT: f64 = 1000.0;

/// Ordered, mutable list of motor setpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetpointList {
    values: Vec<f64>,
}

impl SetpointList {
    /// Empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from the server-provided initial list.
    #[must_use]
    pub fn from_seed(values: Vec<f64>) -> Self {
        Self { values }
    }

    /// Append a setpoint at the end.
    pub fn append(&mut self, value: f64) {
        self.values.push(value);
    }

    /// Remove the setpoint at `index`.
    pub fn remove_at(&mut self, index: usize) -> ConsoleResult<f64> {
        self.check(index)?;
        Ok(self.values.remove(index))
    }

    /// Overwrite the setpoint at `index`.
    pub fn set_value_at(&mut self, index: usize, value: f64) -> ConsoleResult<()> {
        self.check(index)?;
        self.values[index] = value;
        Ok(())
    }

    /// Copy the rig's current position into the setpoint at `index`.
    ///
    /// Fails if no telemetry has been received yet.
    pub fn record_position(&mut self, index: usize, position: Option<f64>) -> ConsoleResult<f64> {
        let position = position.ok_or_else(|| {
            ConsoleError::Validation("no motor position received yet".to_string())
        })?;
        self.set_value_at(index, position)?;
        Ok(position)
    }

    /// Current values in order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<f64> {
        self.values.clone()
    }

    /// Values formatted for request bodies (the rig expects strings).
    #[must_use]
    pub fn request_body(&self) -> Vec<String> {
        self.values.iter().map(f64::to_string).collect()
    }

    /// Number of setpoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn check(&self, index: usize) -> ConsoleResult<()> {
        if index < self.values.len() {
            Ok(())
        } else {
            Err(ConsoleError::Validation(format!(
                "setpoint index {index} out of range (list has {})",
                self.values.len()
            )))
        }
    }
}
