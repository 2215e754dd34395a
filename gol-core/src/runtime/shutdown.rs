//! Graceful shutdown handling
//!
//! Level-triggered shutdown flag: once fired it stays fired, so tasks that
//! subscribe late still observe it.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Shutdown signal shared across tasks
///
/// Clones observe and trigger the same signal.
#[derive(Clone)]
pub struct ShutdownSignal {
    sender: Arc<watch::Sender<bool>>,
}

impl ShutdownSignal {
    /// Create a new, untriggered signal
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Trigger shutdown
    pub fn shutdown(&self) {
        let fired = self.sender.send_replace(true);
        if !fired {
            info!("Shutdown requested");
        }
    }

    /// Whether shutdown has been triggered
    pub fn is_shutdown(&self) -> bool {
        *self.sender.borrow()
    }

    /// Wait until shutdown is triggered
    pub async fn wait(&self) {
        let mut receiver = self.sender.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = receiver.wait_for(|fired| *fired).await;
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}
