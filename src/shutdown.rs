//! Cooperative shutdown signal.
//!
//! SIGINT/SIGTERM set a flag guarded by a mutex and wake every thread
//! parked in [`ShutdownSignal::wait_timeout`], so backoff sleeps end as soon
//! as the signal arrives.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug, Default)]
struct Inner {
    triggered: Mutex<bool>,
    wake: Condvar,
}

/// Cloneable handle to a process-wide shutdown flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    inner: Arc<Inner>,
}

impl ShutdownSignal {
    /// A signal that has not fired.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests shutdown and wakes all waiters.
    pub fn trigger(&self) {
        let mut triggered = self
            .inner
            .triggered
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *triggered = true;
        self.inner.wake.notify_all();
    }

    /// Whether shutdown was requested.
    pub fn is_triggered(&self) -> bool {
        *self
            .inner
            .triggered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleeps up to `timeout`, returning `true` if shutdown was requested.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let guard = self
            .inner
            .triggered
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = self
            .inner
            .wake
            .wait_timeout_while(guard, timeout, |triggered| !*triggered)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }

    /// Routes SIGINT/SIGTERM to this signal.
    pub fn install_handler(&self) -> Result<(), ctrlc::Error> {
        let signal = self.clone();
        ctrlc::set_handler(move || {
            tracing::info!("Shutdown requested");
            signal.trigger();
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_untriggered_wait_times_out() {
        let signal = ShutdownSignal::new();
        assert!(!signal.wait_timeout(Duration::from_millis(20)));
        assert!(!signal.is_triggered());
    }

    #[test]
    fn test_trigger_interrupts_wait() {
        let signal = ShutdownSignal::new();
        let remote = signal.clone();
        let waiter = thread::spawn(move || {
            let started = Instant::now();
            let stopped = remote.wait_timeout(Duration::from_secs(30));
            (stopped, started.elapsed())
        });

        thread::sleep(Duration::from_millis(50));
        signal.trigger();

        let (stopped, elapsed) = waiter.join().unwrap();
        assert!(stopped);
        assert!(elapsed < Duration::from_secs(5));
    }

    #[test]
    fn test_triggered_signal_returns_immediately() {
        let signal = ShutdownSignal::new();
        signal.trigger();
        assert!(signal.wait_timeout(Duration::from_secs(30)));
    }
}
