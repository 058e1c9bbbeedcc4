//! Scoped suppression of transform-changed notifications.

use std::cell::Cell;
use std::rc::Rc;

/// Shared flag that tells a notification hook to ignore what it hears.
///
/// Clones share the same counter, so a listener closure can hold one clone
/// while the controller holds another.
#[derive(Debug, Clone, Default)]
pub struct NotifyGate {
    depth: Rc<Cell<u32>>,
}

impl NotifyGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Suppress notifications until the returned guard is dropped.
    #[must_use = "notifications are only suppressed while the guard is alive"]
    pub fn suppress(&self) -> SuppressGuard {
        self.depth.set(self.depth.get() + 1);
        SuppressGuard {
            depth: Rc::clone(&self.depth),
        }
    }

    pub fn is_suppressed(&self) -> bool {
        self.depth.get() > 0
    }
}

/// Releases its [`NotifyGate`] on drop, on every exit path.
#[derive(Debug)]
pub struct SuppressGuard {
    depth: Rc<Cell<u32>>,
}

impl Drop for SuppressGuard {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}
