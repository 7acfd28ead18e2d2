//! Subscription handles: the single owner of "is this listener still live".
//!
//! A [`Subscription`] is created before a stream registers the listener, is
//! threaded through every decorator in the chain, and is finally bound by the
//! registering stream to a *detach* callback. Disposal is a one-way
//! `Active → Disposed` transition guarded by a compare-and-swap; whichever
//! caller wins the transition runs the detach callback, every other caller is
//! a no-op.
//!
//! # Lifecycle
//!
//! ```text
//!   Subscription::new()          stream.attach(listener, &sub)
//!          │                               │
//!          ▼                               ▼
//!     ┌─────────┐  on_detach(cb)    ┌─────────────┐
//!     │ Active  │ ────────────────► │ Active+bound│
//!     └─────────┘                   └─────────────┘
//!          │ dispose()                     │ dispose()  → cb(Subscriber)
//!          │ close()                       │ close()    → cb dropped
//!          ▼                               ▼
//!     ┌──────────────────────────────────────────┐
//!     │                 Disposed                 │
//!     └──────────────────────────────────────────┘
//! ```
//!
//! `close()` is the source-side path: a source tearing down marks each handle
//! disposed and notifies the listener itself, so the per-handle detach
//! callback must not run.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use parking_lot::Mutex;

use super::DisposeReason;

const ACTIVE: u8 = 0;
const DISPOSED: u8 = 1;

type Detach = Box<dyn FnOnce(DisposeReason) + Send>;

struct Handle {
    state: AtomicU8,
    /// Bound by the registering stream. Only ever locked to swap the slot.
    detach: Mutex<Option<Detach>>,
}

/// Disposable token for one listen session.
///
/// Cloning shares the same handle; disposing any clone disposes the session.
/// Dropping a subscription does **not** dispose it.
#[derive(Clone)]
pub struct Subscription {
    handle: Arc<Handle>,
}

impl Subscription {
    /// Create an active, unbound handle.
    ///
    /// Streams receive the handle through [`Stream::attach`](super::Stream::attach);
    /// consumers normally get one back from [`StreamExt::listen`](super::StreamExt::listen).
    pub fn new() -> Self {
        Self {
            handle: Arc::new(Handle {
                state: AtomicU8::new(ACTIVE),
                detach: Mutex::new(None),
            }),
        }
    }

    /// End the session. Idempotent: only the first call has any effect.
    pub fn dispose(&self) {
        if self.transition() {
            let detach = self.handle.detach.lock().take();
            if let Some(detach) = detach {
                detach(DisposeReason::Subscriber);
            }
        }
    }

    /// Returns `true` once the session has ended.
    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.handle.state.load(Ordering::Acquire) == DISPOSED
    }

    /// Returns `true` while the session is live.
    #[inline]
    pub fn is_active(&self) -> bool {
        !self.is_disposed()
    }

    /// Bind the callback that detaches this session from whatever registered it.
    ///
    /// If the handle is already disposed the callback runs immediately with
    /// [`DisposeReason::Subscriber`]. Binding twice chains the callbacks in
    /// binding order. A source tearing down closes the handle instead, which
    /// drops every bound callback unrun.
    pub(crate) fn on_detach(&self, detach: impl FnOnce(DisposeReason) + Send + 'static) {
        let mut slot = self.handle.detach.lock();
        if self.is_disposed() {
            drop(slot);
            detach(DisposeReason::Subscriber);
            return;
        }
        let chained: Detach = match slot.take() {
            None => Box::new(detach),
            Some(previous) => Box::new(move |reason| {
                previous(reason);
                detach(reason);
            }),
        };
        *slot = Some(chained);
    }

    /// Mark disposed without running the detach callback.
    ///
    /// Returns `true` if this call performed the transition. Used by sources
    /// that notify the listener themselves during teardown.
    pub(crate) fn close(&self) -> bool {
        if !self.transition() {
            return false;
        }
        let detach = self.handle.detach.lock().take();
        drop(detach);
        true
    }

    /// Returns `true` if both values refer to the same session.
    pub fn same_session(&self, other: &Subscription) -> bool {
        Arc::ptr_eq(&self.handle, &other.handle)
    }

    #[inline]
    fn transition(&self) -> bool {
        self.handle
            .state
            .compare_exchange(ACTIVE, DISPOSED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for Subscription {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
