//! Metrics collection and registry.

use crate::supervisor::{StreamStats, SupervisorState};
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Registration or encoding failed.
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// A snapshot of supervisor state for metrics update.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    /// Supervisor state.
    pub state: SupervisorState,
    /// Frames read from the device.
    pub frames_captured: u64,
    /// Frames acknowledged by the endpoint.
    pub frames_published: u64,
    /// Captured frames never published.
    pub frames_dropped: u64,
    /// Envelope bytes uploaded.
    pub bytes_published: u64,
    /// Sessions reopened after a failure.
    pub session_reconnects: u64,
    /// Device reopened after a failure.
    pub device_reopens: u64,
    /// Sequence of the last published frame.
    pub last_sequence: u64,
    /// Failures counted against the retry budget.
    pub consecutive_failures: u32,
}

impl MetricsSnapshot {
    /// Captures the supervisor's counters and state.
    pub fn from_stats(stats: &StreamStats, state: SupervisorState) -> Self {
        Self {
            state,
            frames_captured: stats.frames_captured,
            frames_published: stats.frames_published,
            frames_dropped: stats.frames_dropped,
            bytes_published: stats.bytes_published,
            session_reconnects: stats.session_reconnects,
            device_reopens: stats.device_reopens,
            last_sequence: stats.last_sequence,
            consecutive_failures: stats.consecutive_failures,
        }
    }
}

/// Prometheus registry for the streaming pipeline.
///
/// Clones share the same underlying metrics.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,

    // Frame flow
    frames_captured: IntCounter,
    frames_published: IntCounter,
    frames_dropped: IntCounter,
    bytes_published: IntCounter,
    last_sequence: IntGauge,

    // Recovery
    session_reconnects: IntCounter,
    device_reopens: IntCounter,
    consecutive_failures: IntGauge,
    state: IntGauge,
}

impl MetricsRegistry {
    /// Creates and registers every metric.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let frames_captured = IntCounter::new(
            "camera_driver_frames_captured_total",
            "Frames read from the capture device",
        )?;
        let frames_published = IntCounter::new(
            "camera_driver_frames_published_total",
            "Frames acknowledged by the twin endpoint",
        )?;
        let frames_dropped = IntCounter::new(
            "camera_driver_frames_dropped_total",
            "Captured frames that were not published",
        )?;
        let bytes_published = IntCounter::new(
            "camera_driver_bytes_published_total",
            "Envelope bytes uploaded",
        )?;
        let last_sequence = IntGauge::new(
            "camera_driver_last_sequence",
            "Sequence number of the last published frame",
        )?;
        let session_reconnects = IntCounter::new(
            "camera_driver_session_reconnects_total",
            "Stream sessions reopened after a failure",
        )?;
        let device_reopens = IntCounter::new(
            "camera_driver_device_reopens_total",
            "Capture device reopened after a failure",
        )?;
        let consecutive_failures = IntGauge::new(
            "camera_driver_consecutive_failures",
            "Failures since the last reset of the retry budget",
        )?;
        let state = IntGauge::new(
            "camera_driver_state",
            "Supervisor state (0=starting, 1=streaming, 2=recovering, 3=failed, 4=stopped)",
        )?;

        registry.register(Box::new(frames_captured.clone()))?;
        registry.register(Box::new(frames_published.clone()))?;
        registry.register(Box::new(frames_dropped.clone()))?;
        registry.register(Box::new(bytes_published.clone()))?;
        registry.register(Box::new(last_sequence.clone()))?;
        registry.register(Box::new(session_reconnects.clone()))?;
        registry.register(Box::new(device_reopens.clone()))?;
        registry.register(Box::new(consecutive_failures.clone()))?;
        registry.register(Box::new(state.clone()))?;

        Ok(Self {
            registry,
            frames_captured,
            frames_published,
            frames_dropped,
            bytes_published,
            last_sequence,
            session_reconnects,
            device_reopens,
            consecutive_failures,
            state,
        })
    }

    /// Updates all metrics from a snapshot.
    pub fn update(&self, snapshot: &MetricsSnapshot) {
        advance(&self.frames_captured, snapshot.frames_captured);
        advance(&self.frames_published, snapshot.frames_published);
        advance(&self.frames_dropped, snapshot.frames_dropped);
        advance(&self.bytes_published, snapshot.bytes_published);
        advance(&self.session_reconnects, snapshot.session_reconnects);
        advance(&self.device_reopens, snapshot.device_reopens);

        self.last_sequence.set(snapshot.last_sequence as i64);
        self.consecutive_failures
            .set(i64::from(snapshot.consecutive_failures));
        self.state.set(snapshot.state.code());
    }

    /// Whether the last reported state was streaming.
    pub fn is_streaming(&self) -> bool {
        self.state.get() == SupervisorState::Streaming.code()
    }

    /// The underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry")
            .field("state", &self.state.get())
            .field("frames_published", &self.frames_published.get())
            .finish()
    }
}

/// Counters only move forward; increment by the difference.
fn advance(counter: &IntCounter, total: u64) {
    let current = counter.get();
    if total > current {
        counter.inc_by(total - current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(state: SupervisorState, published: u64) -> MetricsSnapshot {
        MetricsSnapshot::from_stats(
            &StreamStats {
                frames_captured: published + 1,
                frames_published: published,
                frames_dropped: 1,
                session_reconnects: 2,
                last_sequence: published + 1,
                consecutive_failures: 1,
                ..StreamStats::default()
            },
            state,
        )
    }

    #[test]
    fn test_registry_creation() {
        assert!(MetricsRegistry::new().is_ok());
    }

    #[test]
    fn test_metrics_update() {
        let registry = MetricsRegistry::new().unwrap();
        registry.update(&snapshot(SupervisorState::Streaming, 10));

        let output = registry.encode().unwrap();
        assert!(output.contains("camera_driver_frames_published_total 10"));
        assert!(output.contains("camera_driver_session_reconnects_total 2"));
        assert!(output.contains("camera_driver_last_sequence 11"));
        assert!(output.contains("camera_driver_state 1"));
        assert!(registry.is_streaming());
    }

    #[test]
    fn test_counters_never_decrease() {
        let registry = MetricsRegistry::new().unwrap();
        registry.update(&snapshot(SupervisorState::Streaming, 10));
        registry.update(&snapshot(SupervisorState::Recovering, 4));

        let output = registry.encode().unwrap();
        assert!(output.contains("camera_driver_frames_published_total 10"));
        assert!(!registry.is_streaming());
    }

    #[test]
    fn test_clones_share_metrics() {
        let registry = MetricsRegistry::new().unwrap();
        let exporter = registry.clone();
        registry.update(&snapshot(SupervisorState::Streaming, 3));
        assert!(exporter
            .encode()
            .unwrap()
            .contains("camera_driver_frames_published_total 3"));
    }
}
