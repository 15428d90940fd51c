//! Deferred buffer reset requests.
//!
//! A config edit that changes the agent count calls [`ResetHandle::notify`].
//! The flock checks the flag at the start of its next tick and, if set,
//! rebuilds its buffers before simulating. Any number of notifications
//! between two ticks collapse into one reset.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Reset state of the flock's buffers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResetState {
    Ready,
    PendingReset,
}

/// Cloneable handle that requests a reset.
///
/// Handles can be given to an editor or config watcher, including on
/// another thread.
#[derive(Clone, Debug, Default)]
pub struct ResetHandle {
    pending: Arc<AtomicBool>,
}

impl ResetHandle {
    /// Request a reset on the next tick.
    pub fn notify(&self) {
        self.pending.store(true, Ordering::Release);
    }

    pub fn state(&self) -> ResetState {
        if self.pending.load(Ordering::Acquire) {
            ResetState::PendingReset
        } else {
            ResetState::Ready
        }
    }
}

/// Owner side of the reset flag.
#[derive(Debug, Default)]
pub struct ConfigChangeNotifier {
    handle: ResetHandle,
}

impl ConfigChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new handle sharing this notifier's flag.
    pub fn handle(&self) -> ResetHandle {
        self.handle.clone()
    }

    pub fn notify(&self) {
        self.handle.notify();
    }

    pub fn state(&self) -> ResetState {
        self.handle.state()
    }

    /// Move `PendingReset` to `Ready`, returning whether a reset is due.
    ///
    /// The flag is cleared before the reset runs, so a notification that
    /// arrives during the reset is kept for the following tick.
    pub fn begin_reset(&self) -> bool {
        self.handle.pending.swap(false, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_ready() {
        let notifier = ConfigChangeNotifier::new();
        assert_eq!(notifier.state(), ResetState::Ready);
        assert!(!notifier.begin_reset());
    }

    #[test]
    fn test_multiple_notifies_collapse() {
        let notifier = ConfigChangeNotifier::new();
        notifier.notify();
        notifier.notify();
        notifier.handle().notify();
        assert_eq!(notifier.state(), ResetState::PendingReset);

        assert!(notifier.begin_reset());
        assert_eq!(notifier.state(), ResetState::Ready);
        assert!(!notifier.begin_reset());
    }

    #[test]
    fn test_notify_after_begin_is_kept() {
        let notifier = ConfigChangeNotifier::new();
        let handle = notifier.handle();
        handle.notify();
        assert!(notifier.begin_reset());
        // Arrives while the reset is running
        handle.notify();
        assert!(notifier.begin_reset());
    }

    #[test]
    fn test_handle_from_other_thread() {
        let notifier = ConfigChangeNotifier::new();
        let handle = notifier.handle();
        std::thread::spawn(move || handle.notify()).join().unwrap();
        assert_eq!(notifier.state(), ResetState::PendingReset);
    }
}
