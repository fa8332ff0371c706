//! Observable `isGenerating` flag.

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GenerationStatus {
    pub is_generating: bool,
}

/// Holder of the generation status. Only the controller writes it; any
/// number of observers may subscribe.
#[derive(Debug)]
pub struct StatusStore {
    tx: watch::Sender<GenerationStatus>,
}

impl StatusStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(GenerationStatus::default());
        Self { tx }
    }

    pub fn current(&self) -> GenerationStatus {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<GenerationStatus> {
        self.tx.subscribe()
    }

    /// Observers are only woken when the flag actually flips.
    pub(crate) fn set_generating(&self, is_generating: bool) {
        self.tx.send_if_modified(|status| {
            if status.is_generating == is_generating {
                return false;
            }
            status.is_generating = is_generating;
            true
        });
    }
}

impl Default for StatusStore {
    fn default() -> Self {
        Self::new()
    }
}
