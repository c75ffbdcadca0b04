//! Prometheus metrics for the streaming pipeline.
//!
//! The supervisor pushes a [`MetricsSnapshot`] into the shared
//! [`MetricsRegistry`] after every cycle. With the `metrics` feature the
//! registry is served over HTTP.
//!
//! # Metrics Exposed
//!
//! ## Frame Flow
//! - `camera_driver_frames_captured_total` - Frames read from the device
//! - `camera_driver_frames_published_total` - Frames acknowledged by the twin
//! - `camera_driver_frames_dropped_total` - Captured frames never published
//! - `camera_driver_bytes_published_total` - Envelope bytes uploaded
//! - `camera_driver_last_sequence` - Sequence of the last published frame
//!
//! ## Recovery
//! - `camera_driver_session_reconnects_total` - Sessions reopened after failure
//! - `camera_driver_device_reopens_total` - Device reopened after failure
//! - `camera_driver_consecutive_failures` - Failures counted against the budget
//! - `camera_driver_state` - Supervisor state code
//!
//! # Endpoints
//!
//! - `/metrics` - Prometheus text format
//! - `/health` - 200 while streaming, 503 otherwise
//!
//! # Example
//!
//! ```no_run
//! use camera_driver::metrics::{MetricsRegistry, MetricsSnapshot};
//! use camera_driver::supervisor::{StreamStats, SupervisorState};
//!
//! let registry = MetricsRegistry::new().expect("Failed to create registry");
//! let stats = StreamStats {
//!     frames_published: 120,
//!     last_sequence: 120,
//!     ..StreamStats::default()
//! };
//! registry.update(&MetricsSnapshot::from_stats(&stats, SupervisorState::Streaming));
//! ```

mod collector;
#[cfg(feature = "metrics")]
mod server;

pub use collector::{MetricsError, MetricsRegistry, MetricsSnapshot};
#[cfg(feature = "metrics")]
pub use server::{MetricsServer, MetricsServerConfig, ServerError};
