//! Stop signals
//!
//! [`StopSignal`] is a cloneable, level-triggered flag used both for process
//! shutdown and for ending a single adapter monitoring session. Once
//! triggered it stays triggered, so late subscribers observe it immediately.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

/// Shared stop flag that tasks can await.
#[derive(Clone)]
pub struct StopSignal {
    sender: watch::Sender<bool>,
}

impl StopSignal {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }

    pub fn is_triggered(&self) -> bool {
        *self.sender.borrow()
    }

    /// Trigger the signal. Returns `false` if it was already triggered.
    pub fn trigger(&self) -> bool {
        let mut first = false;
        self.sender.send_if_modified(|stopped| {
            if *stopped {
                false
            } else {
                *stopped = true;
                first = true;
                true
            }
        });
        first
    }

    /// Resolves once the signal has been triggered.
    pub async fn stopped(&self) {
        let mut rx = self.sender.subscribe();
        // The sender lives in `self`, so `wait_for` can only fail if the
        // signal itself is dropped mid-await, which `&self` rules out.
        let _ = rx.wait_for(|stopped| *stopped).await;
    }

    /// Sleep for `duration`, returning early (with `false`) if stopped.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.stopped() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Listen for OS shutdown signals (SIGTERM, SIGINT) and trigger `signal`.
pub async fn listen_for_shutdown_signals(signal: StopSignal) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal as unix_signal, SignalKind};

        match (
            unix_signal(SignalKind::terminate()),
            unix_signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("📡 Received SIGTERM signal"),
                    _ = sigint.recv() => info!("📡 Received SIGINT signal (Ctrl+C)"),
                }
            }
            _ => {
                warn!("Failed to install unix signal handlers, falling back to Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("📡 Received Ctrl+C signal");
    }

    if signal.trigger() {
        info!("🛑 Shutdown signal triggered");
    }
}

/// Graceful shutdown coordinator for the service process.
pub struct ShutdownCoordinator {
    signal: StopSignal,
    timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            signal: StopSignal::new(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn signal(&self) -> StopSignal {
        self.signal.clone()
    }

    pub fn start_signal_listener(&self) {
        let signal = self.signal.clone();
        tokio::spawn(listen_for_shutdown_signals(signal));
    }

    /// Wait for the signal, then run `cleanup` bounded by the shutdown timeout.
    ///
    /// Returns `false` if cleanup did not finish in time.
    pub async fn shutdown_with_cleanup<F, Fut>(&self, cleanup: F) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ()>,
    {
        self.signal.stopped().await;
        info!(
            timeout_secs = self.timeout.as_secs(),
            "⏳ Starting graceful shutdown"
        );

        match tokio::time::timeout(self.timeout, cleanup()).await {
            Ok(()) => {
                info!("✅ Graceful shutdown completed");
                true
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.timeout.as_secs(),
                    "⚠️ Graceful shutdown timed out"
                );
                false
            }
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new(30)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn late_subscriber_sees_trigger() {
        let signal = StopSignal::new();
        assert!(signal.trigger());
        assert!(!signal.trigger());
        tokio::time::timeout(Duration::from_millis(100), signal.stopped())
            .await
            .expect("stopped() should resolve immediately");
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_returns_early_when_stopped() {
        let signal = StopSignal::new();
        let s = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            s.trigger();
        });
        assert!(!signal.sleep(Duration::from_secs(60)).await);
        assert!(signal.is_triggered());
    }
}
