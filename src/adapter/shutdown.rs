//!
//! Shutdown phases for the server adapter.
//!
//! [`ShutdownNotifier`] broadcasts [`ShutdownPhase`] events to any number of
//! subscribers and triggers a [`CancellationToken`] as soon as shutdown starts, so
//! background work (deferred tasks, long renders) can stop early.
//!
//! ```rust
//! use keywork::{ShutdownNotifier, ShutdownPhase};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let notifier = ShutdownNotifier::default();
//! let token = notifier.cancellation_token();
//! let mut phases = notifier.subscribe();
//!
//! tokio::spawn(async move {
//!     while let Ok(phase) = phases.recv().await {
//!         if phase == ShutdownPhase::GracePeriodEnded {
//!             tracing::warn!("Forcing shutdown");
//!         }
//!     }
//! });
//! assert!(!token.is_cancelled());
//! # }
//! ```
//!

use {
    std::time::Duration,
    tokio::{signal, sync::broadcast},
    tokio_util::sync::CancellationToken,
};

/// The phases of a graceful shutdown, emitted in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShutdownPhase {
    /// A signal was received. The listener stops accepting connections and the
    /// cancellation token fires.
    Initiated,

    /// In-flight requests are draining for at most `timeout`.
    GracePeriodStarted { timeout: Duration },

    /// The grace period expired before the connections drained.
    GracePeriodEnded,
}

/// Broadcasts shutdown phases. Clones share the same channel and token.
#[derive(Clone)]
pub struct ShutdownNotifier {
    sender: broadcast::Sender<ShutdownPhase>,
    cancel_token: CancellationToken,
}

impl ShutdownNotifier {
    /// Creates a notifier buffering up to `capacity` unread phases per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Subscribes to the phases emitted from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ShutdownPhase> {
        self.sender.subscribe()
    }

    /// The token cancelled on [`ShutdownPhase::Initiated`].
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    #[must_use]
    pub fn is_shutdown_initiated(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Emits `phase` and returns the number of subscribers that received it.
    pub(crate) fn emit(&self, phase: ShutdownPhase) -> usize {
        if phase == ShutdownPhase::Initiated {
            self.cancel_token.cancel();
        }
        self.sender.send(phase).unwrap_or(0)
    }

    /// Emits the start-of-shutdown phases. Used once the trigger (a signal or a
    /// caller-supplied future) has fired.
    pub(crate) fn begin(&self, timeout: Duration) {
        tracing::info!(
            timeout_secs = timeout.as_secs(),
            "Shutdown requested, starting graceful shutdown"
        );
        let subscribers = self.emit(ShutdownPhase::Initiated);
        tracing::debug!(subscribers, "Shutdown initiated notification sent");
        self.emit(ShutdownPhase::GracePeriodStarted { timeout });
    }
}

impl Default for ShutdownNotifier {
    fn default() -> Self {
        Self::new(16)
    }
}

impl std::fmt::Debug for ShutdownNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownNotifier")
            .field("subscriber_count", &self.sender.receiver_count())
            .field("is_shutdown_initiated", &self.is_shutdown_initiated())
            .finish()
    }
}

/// Resolves on Ctrl+C or SIGTERM. A handler that cannot be installed is logged
/// and never resolves.
pub(crate) async fn termination_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => tracing::debug!("Ctrl+C signal received"),
            Err(err) => {
                tracing::warn!(error = %err, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut handler) => {
                handler.recv().await;
                tracing::debug!("SIGTERM signal received");
            }
            Err(err) => {
                tracing::warn!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_begin_emits_phases_in_order() {
        let notifier = ShutdownNotifier::new(8);
        let token = notifier.cancellation_token();
        let mut rx = notifier.subscribe();

        notifier.begin(Duration::from_secs(5));

        assert!(token.is_cancelled());
        assert_eq!(rx.recv().await.unwrap(), ShutdownPhase::Initiated);
        assert_eq!(
            rx.recv().await.unwrap(),
            ShutdownPhase::GracePeriodStarted {
                timeout: Duration::from_secs(5)
            }
        );
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let notifier = ShutdownNotifier::default();
        let clone = notifier.clone();
        let mut rx = notifier.subscribe();

        clone.emit(ShutdownPhase::Initiated);

        assert_eq!(rx.recv().await.unwrap(), ShutdownPhase::Initiated);
        assert!(notifier.is_shutdown_initiated());
    }

    #[test]
    fn test_emit_without_subscribers() {
        let notifier = ShutdownNotifier::new(8);
        assert_eq!(notifier.emit(ShutdownPhase::GracePeriodEnded), 0);
        assert!(!notifier.is_shutdown_initiated());

        let _rx = notifier.subscribe();
        assert_eq!(notifier.emit(ShutdownPhase::GracePeriodEnded), 1);
        assert!(format!("{notifier:?}").contains("subscriber_count"));
    }
}
