//! "Bring the window to front and notify the renderer" signal.
//!
//! Raised by external triggers such as a global hotkey or a helper process.
//! The generation controller never touches it.

use tokio::sync::broadcast;

const SIGNAL_CAPACITY: usize = 16;

#[derive(Debug, Clone)]
pub struct ShowSignal {
    tx: broadcast::Sender<()>,
}

impl ShowSignal {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(SIGNAL_CAPACITY);
        Self { tx }
    }

    /// Returns how many listeners were notified.
    pub fn notify(&self) -> usize {
        self.tx.send(()).unwrap_or(0)
    }

    /// Dropping the returned receiver removes the listener.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }
}

impl Default for ShowSignal {
    fn default() -> Self {
        Self::new()
    }
}
