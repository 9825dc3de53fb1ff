use std::sync::atomic::{AtomicBool, Ordering};

/// Change monitor for a resource file. Bundles never change, so it never fires.
#[derive(Debug, Default)]
pub struct FileMonitor {
    cancelled: AtomicBool,
}

impl FileMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop monitoring. Always succeeds.
    pub fn cancel(&self) -> bool {
        self.cancelled.store(true, Ordering::Relaxed);
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Pending change events; always empty.
    pub fn poll_events(&self) -> impl Iterator<Item = String> {
        std::iter::empty()
    }
}
