//! Retry policy: exponential backoff with a consecutive-failure budget.
//!
//! Everything here is plain data; the supervisor feeds outcomes in and
//! gets decisions back.

use crate::config::SupervisorSettings;
use rand_core::{OsRng, RngCore};
use std::time::Duration;

/// Backoff parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    initial: Duration,
    max: Duration,
    max_retries: u32,
    reset_after_frames: u64,
    jitter: f64,
}

impl BackoffPolicy {
    /// Builds the policy from the `[supervisor]` settings.
    pub fn from_settings(settings: &SupervisorSettings) -> Self {
        Self {
            initial: Duration::from_millis(settings.initial_backoff_ms),
            max: Duration::from_millis(settings.max_backoff_ms),
            max_retries: settings.max_retries,
            reset_after_frames: settings.reset_after_frames,
            jitter: settings.jitter.clamp(0.0, 1.0),
        }
    }

    /// Consecutive failures tolerated before giving up.
    #[inline]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Published frames in a row that reset the failure count.
    #[inline]
    pub fn reset_after_frames(&self) -> u64 {
        self.reset_after_frames
    }

    /// Delay before retry `attempt` (1-based) without jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let doublings = attempt.saturating_sub(1).min(63);
        let factor = 1u64 << doublings;
        let millis = (self.initial.as_millis() as u64).saturating_mul(factor);
        Duration::from_millis(millis).min(self.max)
    }

    /// Delay for `attempt` with jitter drawn from `unit` in `[0, 1)`.
    ///
    /// The result never exceeds the ceiling.
    pub fn delay_with(&self, attempt: u32, unit: f64) -> Duration {
        let base = self.base_delay(attempt);
        if self.jitter == 0.0 {
            return base;
        }
        let spread = self.jitter * (2.0 * unit.clamp(0.0, 1.0) - 1.0);
        base.mul_f64((1.0 + spread).max(0.0)).min(self.max)
    }

    /// Delay for `attempt` with jitter from the OS RNG.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.delay_with(attempt, unit_sample())
    }
}

fn unit_sample() -> f64 {
    (OsRng.next_u64() >> 11) as f64 / (1u64 << 53) as f64
}

/// What to do after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Wait `delay`, then retry. `attempt` counts from 1.
    Retry { attempt: u32, delay: Duration },
    /// The budget is spent.
    GiveUp { attempts: u32 },
}

/// Tracks consecutive failures against a [`BackoffPolicy`].
#[derive(Debug, Clone)]
pub struct RecoveryTracker {
    policy: BackoffPolicy,
    consecutive_failures: u32,
    success_streak: u64,
}

impl RecoveryTracker {
    /// A tracker with no failures recorded.
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            consecutive_failures: 0,
            success_streak: 0,
        }
    }

    /// The policy in use.
    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Failures since the last reset.
    #[inline]
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Records a failure and decides whether to retry.
    pub fn record_failure(&mut self) -> Decision {
        self.success_streak = 0;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.consecutive_failures > self.policy.max_retries {
            Decision::GiveUp {
                attempts: self.consecutive_failures,
            }
        } else {
            Decision::Retry {
                attempt: self.consecutive_failures,
                delay: self.policy.delay(self.consecutive_failures),
            }
        }
    }

    /// Records one published frame. Returns `true` when this clears the
    /// failure count.
    pub fn record_success(&mut self) -> bool {
        self.success_streak = self.success_streak.saturating_add(1);
        if self.consecutive_failures > 0 && self.success_streak >= self.policy.reset_after_frames {
            self.consecutive_failures = 0;
            return true;
        }
        false
    }
}
