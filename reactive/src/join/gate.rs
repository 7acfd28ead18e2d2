//! Fan-in state shared by the join operators.
//!
//! Every operator session owns one [`Gate`]: its state behind a reentrant
//! lock. Inner listeners hold a `Weak` reference plus a key (an index or a
//! registry key), never the state itself. The only strong reference is the
//! detach callback bound to the outer subscription, so disposing the outer
//! handle releases the whole session.
//!
//! ```text
//!   inner 0 ──► Inner { Weak<Gate>, key: 0 } ──┐
//!   inner 1 ──► Inner { Weak<Gate>, key: 1 } ──┼──► Gate<State> ──► Outlet ──► listener
//!   inner 2 ──► Inner { Weak<Gate>, key: 2 } ──┘        ▲
//!                                                       │ Arc
//!                                outer.on_detach(teardown)
//! ```
//!
//! The lock may be held across listener callbacks so emissions from
//! different producer threads reach the outlet one at a time. The `RefCell`
//! borrow never is: callbacks re-enter the gate on the same thread.
//!
//! # Invariants
//!
//! - No subscription is disposed while the current thread is inside the gate.
//!   [`Gate::defer`] queues that work until the thread's outermost
//!   [`Gate::enter`] guard drops. A producer on a facade stream holds that
//!   stream's lock while it waits here, and disposing its inner handle needs
//!   the same lock.
//! - Deferred work left behind by a panicking listener runs on the next exit
//!   from the gate.

use std::cell::{Cell, RefCell};
use std::sync::{Arc, Weak};

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

use crate::stream::{BoxListener, DisposeReason, Event, Listener, Subscription};

/// Per-session operator state.
pub(super) trait Fanin: Send + Sized + 'static {
    type In: Event;
    type Out: Event;
    type Key: Copy + Send + 'static;

    fn outlet(&mut self) -> &mut Outlet<Self::Out>;

    /// An inner stream delivered an event.
    fn on_inner(gate: &Arc<Gate<Self>>, key: Self::Key, event: &Self::In);

    /// An inner stream's session ended, for whatever reason.
    fn on_inner_dispose(gate: &Arc<Gate<Self>>, key: Self::Key);

    /// The outer handle was disposed. Release inner sessions, then close the outlet.
    fn teardown(gate: &Arc<Gate<Self>>, reason: DisposeReason);
}

/// The downstream end of an operator session.
pub(super) struct Outlet<E> {
    /// `None` while an emission is running.
    listener: Option<BoxListener<E>>,
    closed: bool,
    /// Close requested during an emission.
    pending: Option<DisposeReason>,
}

impl<E> Outlet<E> {
    pub(super) fn new(listener: BoxListener<E>) -> Self {
        Self {
            listener: Some(listener),
            closed: false,
            pending: None,
        }
    }

    pub(super) fn is_closed(&self) -> bool {
        self.closed
    }
}

type Deferred = Box<dyn FnOnce() + Send>;

struct Slot<S> {
    state: RefCell<S>,
    /// Live `enter` guards on the holding thread.
    depth: Cell<usize>,
    deferred: RefCell<Vec<Deferred>>,
}

pub(super) struct Gate<S> {
    cell: ReentrantMutex<Slot<S>>,
}

/// Held section of a [`Gate`]. Dropping the outermost one runs deferred work
/// after the lock is released.
pub(super) struct Entered<'a, S> {
    guard: Option<ReentrantMutexGuard<'a, Slot<S>>>,
}

impl<S> Drop for Entered<'_, S> {
    fn drop(&mut self) {
        let Some(guard) = self.guard.take() else {
            return;
        };
        let depth = guard.depth.get() - 1;
        guard.depth.set(depth);
        let deferred = if depth == 0 && !std::thread::panicking() {
            guard.deferred.take()
        } else {
            Vec::new()
        };
        drop(guard);
        for job in deferred {
            job();
        }
    }
}

impl<S: Fanin> Gate<S> {
    /// Create the session state and bind its teardown to `outer`.
    ///
    /// Returns `None` if `outer` was already disposed; teardown has run by then.
    pub(super) fn open(state: S, outer: &Subscription) -> Option<Arc<Self>> {
        let gate = Arc::new(Self {
            cell: ReentrantMutex::new(Slot {
                state: RefCell::new(state),
                depth: Cell::new(0),
                deferred: RefCell::new(Vec::new()),
            }),
        });
        let owner = Arc::clone(&gate);
        outer.on_detach(move |reason| S::teardown(&owner, reason));
        if outer.is_disposed() { None } else { Some(gate) }
    }

    /// Hold the lock across several steps.
    pub(super) fn enter(&self) -> Entered<'_, S> {
        let guard = self.cell.lock();
        guard.depth.set(guard.depth.get() + 1);
        Entered { guard: Some(guard) }
    }

    /// Run `f` against the state. `f` must not call back into listeners.
    pub(super) fn with<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        let slot = self.cell.lock();
        let mut state = slot.state.borrow_mut();
        f(&mut state)
    }

    /// Run `job` once this thread has left the gate, or now if it is outside.
    pub(super) fn defer(&self, job: impl FnOnce() + Send + 'static) {
        let slot = self.cell.lock();
        if slot.depth.get() > 0 {
            slot.deferred.borrow_mut().push(Box::new(job));
            return;
        }
        drop(slot);
        job();
    }

    /// Dispose `subscriptions` outside the gate.
    pub(super) fn release(&self, subscriptions: Vec<Subscription>) {
        if subscriptions.is_empty() {
            return;
        }
        self.defer(move || {
            for subscription in subscriptions {
                subscription.dispose();
            }
        });
    }

    /// A listener for the inner stream identified by `key`.
    pub(super) fn inner(self: &Arc<Self>, key: S::Key) -> BoxListener<S::In> {
        Box::new(Inner {
            gate: Arc::downgrade(self),
            key,
        })
    }

    /// Deliver `event` downstream. Dropped if the outlet is closed or busy.
    pub(super) fn emit(&self, event: &S::Out) {
        let _guard = self.enter();
        let taken = self.with(|state| {
            let outlet = state.outlet();
            if outlet.closed {
                None
            } else {
                outlet.listener.take()
            }
        });
        let Some(mut listener) = taken else {
            return;
        };

        listener.react(event);

        let closing = self.with(move |state| {
            let outlet = state.outlet();
            match outlet.pending.take() {
                Some(reason) => Some((listener, reason)),
                None => {
                    outlet.listener = Some(listener);
                    None
                }
            }
        });
        // Closed while the listener was running.
        if let Some((mut listener, reason)) = closing {
            listener.on_dispose(reason);
        }
    }

    /// End the downstream session. Idempotent.
    pub(super) fn close(&self, reason: DisposeReason) {
        let _guard = self.enter();
        let taken = self.with(|state| {
            let outlet = state.outlet();
            if outlet.closed {
                return None;
            }
            outlet.closed = true;
            let listener = outlet.listener.take();
            if listener.is_none() {
                outlet.pending = Some(reason);
            }
            listener
        });
        if let Some(mut listener) = taken {
            listener.on_dispose(reason);
        }
    }
}

struct Inner<S: Fanin> {
    gate: Weak<Gate<S>>,
    key: S::Key,
}

impl<S: Fanin> Listener<S::In> for Inner<S> {
    fn react(&mut self, event: &S::In) {
        if let Some(gate) = self.gate.upgrade() {
            S::on_inner(&gate, self.key, event);
        }
    }

    fn on_dispose(&mut self, _: DisposeReason) {
        if let Some(gate) = self.gate.upgrade() {
            S::on_inner_dispose(&gate, self.key);
        }
    }
}
