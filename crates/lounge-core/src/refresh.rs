//! Single-slot "state changed" notification

use tokio::sync::mpsc;
use tracing::trace;

/// Create a connected signal/listener pair
pub fn refresh_channel() -> (RefreshSignal, RefreshListener) {
    let (tx, rx) = mpsc::channel(1);
    (RefreshSignal { tx }, RefreshListener { rx })
}

/// Sending half. Posting never blocks: while a signal is pending, further
/// posts are dropped.
#[derive(Debug, Clone)]
pub struct RefreshSignal {
    tx: mpsc::Sender<()>,
}

impl RefreshSignal {
    /// Returns false when the post was dropped (already pending, or no
    /// listener left)
    pub fn post(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(())) => {
                trace!("Refresh already pending");
                false
            }
            Err(mpsc::error::TrySendError::Closed(())) => false,
        }
    }
}

/// Receiving half. Consumers re-read the whole state on each signal.
#[derive(Debug)]
pub struct RefreshListener {
    rx: mpsc::Receiver<()>,
}

impl RefreshListener {
    /// Consume a pending signal, if any
    pub fn try_take(&mut self) -> bool {
        self.rx.try_recv().is_ok()
    }

    /// Wait for the next signal. Returns false once every signal handle
    /// is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.recv().await.is_some()
    }
}
