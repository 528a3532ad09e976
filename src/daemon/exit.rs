use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crossbeam_channel::{self as cb, RecvTimeoutError, TryRecvError};

// ============================================================================
// Daemon Exit - When Is the Daemon No Longer Needed?
// ============================================================================
//
// The trigger side drops its sender exactly once; every clone of the signal
// observes the disconnect. The exit policy decides when to pull the trigger.
//
// ============================================================================

pub struct ShutdownTrigger {
    tx: Mutex<Option<cb::Sender<()>>>,
}

impl ShutdownTrigger {
    /// Release everybody waiting on the signal. Idempotent.
    pub fn fire(&self) {
        let fired = self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
        if fired.is_some() {
            tracing::info!("🛑 Daemon shutdown triggered");
        }
    }

    pub fn is_fired(&self) -> bool {
        self.tx.lock().unwrap_or_else(PoisonError::into_inner).is_none()
    }
}

#[derive(Clone)]
pub struct ShutdownSignal {
    rx: cb::Receiver<()>,
}

impl ShutdownSignal {
    pub fn wait(&self) {
        while self.rx.recv().is_ok() {}
    }

    /// `true` when the trigger fired within `timeout`
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        loop {
            match self.rx.recv_timeout(timeout) {
                Ok(()) => continue,
                Err(RecvTimeoutError::Disconnected) => return true,
                Err(RecvTimeoutError::Timeout) => return false,
            }
        }
    }

    pub fn is_triggered(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }
}

pub fn shutdown_channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = cb::bounded(0);
    (ShutdownTrigger { tx: Mutex::new(Some(tx)) }, ShutdownSignal { rx })
}

/// Decides when the daemon process should go away
pub trait ExitPolicy: Send + Sync {
    /// The launcher sent the shutdown command
    fn on_shutdown_requested(&self);

    /// The connection to the launcher closed or could not be established
    fn on_launcher_disconnected(&self);
}

/// Fires the trigger a fixed delay after the first exit reason
pub struct DelayedExit {
    delay: Duration,
    trigger: Arc<ShutdownTrigger>,
    armed: AtomicBool,
}

impl DelayedExit {
    pub fn new(delay: Duration, trigger: ShutdownTrigger) -> Self {
        Self {
            delay,
            trigger: Arc::new(trigger),
            armed: AtomicBool::new(false),
        }
    }

    fn arm(&self, reason: &'static str) {
        if self.armed.swap(true, Ordering::SeqCst) {
            tracing::debug!(reason, "Exit already scheduled");
            return;
        }

        tracing::info!(
            reason,
            delay_ms = self.delay.as_millis() as u64,
            "⏳ Daemon exit scheduled"
        );

        let trigger = self.trigger.clone();
        let delay = self.delay;
        let timer = std::thread::Builder::new()
            .name("exit-timer".to_string())
            .spawn(move || {
                std::thread::sleep(delay);
                trigger.fire();
            });

        if let Err(error) = timer {
            tracing::warn!(error = %error, "Could not start exit timer; exiting now");
            self.trigger.fire();
        }
    }
}

impl ExitPolicy for DelayedExit {
    fn on_shutdown_requested(&self) {
        self.arm("shutdown requested");
    }

    fn on_launcher_disconnected(&self) {
        self.arm("launcher disconnected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_is_released_by_trigger() {
        let (trigger, signal) = shutdown_channel();
        let waiter = signal.clone();

        assert!(!signal.is_triggered());
        trigger.fire();

        assert!(waiter.wait_timeout(Duration::from_secs(1)));
        assert!(signal.is_triggered());
        assert!(trigger.is_fired());
    }

    #[test]
    fn test_signal_times_out_while_untriggered() {
        let (_trigger, signal) = shutdown_channel();

        assert!(!signal.wait_timeout(Duration::from_millis(20)));
    }

    #[test]
    fn test_delayed_exit_fires_after_delay() {
        let (trigger, signal) = shutdown_channel();
        let policy = DelayedExit::new(Duration::from_millis(30), trigger);

        policy.on_launcher_disconnected();

        assert!(!signal.is_triggered());
        assert!(signal.wait_timeout(Duration::from_secs(5)));
    }

    #[test]
    fn test_repeated_exit_reasons_schedule_once() {
        let (trigger, signal) = shutdown_channel();
        let policy = DelayedExit::new(Duration::ZERO, trigger);

        policy.on_shutdown_requested();
        policy.on_launcher_disconnected();

        assert!(signal.wait_timeout(Duration::from_secs(5)));
    }
}
