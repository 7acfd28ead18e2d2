//! The concurrency facade.
//!
//! # Overview
//!
//! A [`SyncSource`] pairs a root [`Source`](crate::Source) with one
//! [`StreamLock`]. Publish, listen, source dispose and every per-handle detach
//! take that lock before touching the subscriber set, so from the point of
//! view of any thread each of those operations is atomic:
//!
//! ```text
//!   thread A: publish(1) ──┐                 ┌── fan-out of 1 ──┐
//!   thread B: publish(2) ──┼─► StreamLock ──►│                  │──► fan-out of 2
//!   thread C: dispose()  ──┘                 └──────────────────┘
//! ```
//!
//! Decorated streams built on a facade source report the same lock through
//! [`Stream::stream_lock`](crate::Stream::stream_lock). `listen` takes it once
//! for the whole chain, so materializing the chain and registering with the
//! root happen as one step.
//!
//! The lock is reentrant: a listener may publish, listen or dispose on its own
//! stream from inside a callback without deadlocking.
//!
//! Join operators over several facade streams never dispose an inner handle
//! while holding their own session lock, so inner streams may complete on
//! different threads at the same time. See [`crate::join`].

mod source;

use std::sync::Arc;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

pub use source::SyncSource;

/// One coarse lock per logical stream. Clones share the lock.
#[derive(Clone, Default)]
pub struct StreamLock {
    inner: Arc<ReentrantMutex<()>>,
}

impl StreamLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the lock is held by this thread.
    #[inline]
    pub fn enter(&self) -> ReentrantMutexGuard<'_, ()> {
        self.inner.lock()
    }

    /// Returns `true` if both values are the same lock.
    pub fn same(&self, other: &StreamLock) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for StreamLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamLock")
            .field("held", &self.inner.is_locked())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn enter_is_reentrant() {
        let lock = StreamLock::new();
        let _outer = lock.enter();
        let _inner = lock.enter();
    }

    #[test]
    fn clones_are_the_same_lock() {
        let a = StreamLock::new();
        let b = a.clone();
        let c = StreamLock::new();

        assert!(a.same(&b));
        assert!(!a.same(&c));
    }

    #[test]
    fn enter_excludes_other_threads() {
        let lock = StreamLock::new();
        let guard = lock.enter();

        let other = lock.clone();
        let contender = thread::spawn(move || other.inner.try_lock().is_none());

        assert!(contender.join().unwrap());
        drop(guard);
    }
}
