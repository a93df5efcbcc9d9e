//! Render-thread ownership.

use std::thread::{self, ThreadId};

/// Identity of the thread that owns all GPU object lifetimes.
///
/// Captured once when the renderer is created. Every GPU-touching entry
/// point checks it with [`RenderOwner::assert_owner`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderOwner {
    thread: ThreadId,
}

impl RenderOwner {
    /// Claims the calling thread as the render owner.
    #[must_use]
    pub fn current() -> Self {
        Self {
            thread: thread::current().id(),
        }
    }

    /// Returns true if the calling thread is the render owner.
    #[inline]
    #[must_use]
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread
    }

    /// Panics unless called from the render-owning thread.
    ///
    /// # Panics
    ///
    /// Panics if the calling thread is not the owner. Issuing GPU commands
    /// from another thread is a precondition violation, not a recoverable error.
    #[inline]
    #[track_caller]
    pub fn assert_owner(&self, operation: &str) {
        assert!(
            self.is_current(),
            "{operation} must run on the render-owning thread ({:?}), called from {:?}",
            self.thread,
            thread::current().id(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_is_current_thread() {
        let owner = RenderOwner::current();
        assert!(owner.is_current());
        owner.assert_owner("test");
    }

    #[test]
    fn test_other_thread_is_rejected() {
        let owner = RenderOwner::current();
        let on_other = thread::spawn(move || owner.is_current()).join().unwrap();
        assert!(!on_other);
    }

    #[test]
    fn test_assert_panics_off_thread() {
        let owner = RenderOwner::current();
        let result = thread::spawn(move || owner.assert_owner("upload")).join();
        assert!(result.is_err());
    }
}
