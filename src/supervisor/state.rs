//! Supervisor lifecycle states and run counters.

use serde::Serialize;
use std::fmt;

/// Lifecycle of a driver run.
///
/// ```text
/// Starting ──► Streaming ◄──► Recovering
///    │             │               │
///    └─────────────┴──► Failed ◄───┘        (any live state) ──► Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorState {
    /// Nothing opened yet.
    Starting,
    /// Frames are being published.
    Streaming,
    /// Waiting out a backoff after a failure.
    Recovering,
    /// Gave up; the run ended with an error.
    Failed,
    /// Shut down on request.
    Stopped,
}

impl SupervisorState {
    /// Lowercase name used in logs.
    pub fn label(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Streaming => "streaming",
            Self::Recovering => "recovering",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        }
    }

    /// Numeric value exported as a gauge.
    pub fn code(self) -> i64 {
        match self {
            Self::Starting => 0,
            Self::Streaming => 1,
            Self::Recovering => 2,
            Self::Failed => 3,
            Self::Stopped => 4,
        }
    }

    /// Whether the run has ended.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Stopped)
    }

    /// Whether moving to `next` is allowed.
    pub fn can_transition_to(self, next: SupervisorState) -> bool {
        use SupervisorState::*;
        match (self, next) {
            (Failed | Stopped, _) => false,
            (_, Failed | Stopped) => true,
            (Starting | Recovering, Streaming) => true,
            (Starting | Streaming, Recovering) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamStats {
    /// Frames read from the device.
    pub frames_captured: u64,
    /// Frames acknowledged by the endpoint.
    pub frames_published: u64,
    /// Captured frames that never reached the endpoint.
    pub frames_dropped: u64,
    /// Envelope bytes uploaded.
    pub bytes_published: u64,
    /// Sessions opened, including the first.
    pub sessions_opened: u64,
    /// Sessions opened after the first.
    pub session_reconnects: u64,
    /// Device opens, including the first.
    pub device_opens: u64,
    /// Device opens after the first.
    pub device_reopens: u64,
    /// Sequence of the last frame the endpoint acknowledged.
    pub last_sequence: u64,
    /// Failures counted against the retry budget.
    pub consecutive_failures: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use SupervisorState::*;

    #[test]
    fn test_allowed_transitions() {
        assert!(Starting.can_transition_to(Streaming));
        assert!(Streaming.can_transition_to(Recovering));
        assert!(Recovering.can_transition_to(Streaming));
        assert!(Recovering.can_transition_to(Failed));
        assert!(Starting.can_transition_to(Stopped));
    }

    #[test]
    fn test_terminal_states_are_final() {
        for next in [Starting, Streaming, Recovering, Failed, Stopped] {
            assert!(!Failed.can_transition_to(next));
            assert!(!Stopped.can_transition_to(next));
        }
        assert!(!Streaming.can_transition_to(Starting));
    }

    #[test]
    fn test_codes_are_distinct() {
        let codes: std::collections::HashSet<i64> = [Starting, Streaming, Recovering, Failed, Stopped]
            .iter()
            .map(|s| s.code())
            .collect();
        assert_eq!(codes.len(), 5);
    }
}
