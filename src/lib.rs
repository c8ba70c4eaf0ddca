//! # Rig Console Library
//!
//! Operator console for a motorized inspection rig. The rig server streams
//! motor telemetry and two camera feeds over WebSocket channels and serves
//! capture, classification and motor endpoints over HTTP. This crate keeps
//! those channels alive, turns the rig's shot button into rate-limited
//! capture requests, runs the capture-then-classify workflow, and presents
//! the results in a gallery.
//!
//! ## Crate Structure
//!
//! - **`address`**: Server address parsing and the transport scheme policy.
//! - **`api`**: The `RigApi` seam over the request endpoints and its HTTP client.
//! - **`channel`**: Reconnecting streaming channels and the registry that owns them.
//! - **`config`**: Figment-based configuration (`config/rig-console.toml` + `RIG_CONSOLE_*`).
//! - **`console`**: The operator console event loop and its command language.
//! - **`error`**: The `ConsoleError` enum shared across the crate.
//! - **`gallery`**: Gallery presenter with leak-free widget teardown.
//! - **`logging`**: `tracing-subscriber` setup.
//! - **`model`**: Wire types of the rig server and the result card view model.
//! - **`orchestrator`**: The capture-and-classify workflow.
//! - **`setpoints`**: The operator-edited setpoint list.
//! - **`shot`**: The shot trigger control and its phases.
//! - **`telemetry`**: Telemetry decoding and the rate-limited capture trigger.

pub mod address;
pub mod api;
pub mod channel;
pub mod config;
pub mod console;
pub mod error;
pub mod gallery;
pub mod logging;
pub mod model;
pub mod orchestrator;
pub mod setpoints;
pub mod shot;
pub mod telemetry;

pub use error::{ConsoleError, ConsoleResult};
