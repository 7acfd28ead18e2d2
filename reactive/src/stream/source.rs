//! The root publisher.
//!
//! # Overview
//!
//! A [`Source`] owns the set of active subscribers and dispatches every
//! [`publish`](Source::publish) to them synchronously, on the calling thread.
//! Clones share the same subscriber set.
//!
//! ```text
//!   publish(e)
//!     │  snapshot ids (registration order)
//!     ▼
//!   ┌──────────┬──────────┬──────────┐
//!   │ id 0     │ id 1     │ id 3     │   entries: BTreeMap<u64, Entry>
//!   │ listener │ (leased) │ listener │
//!   └──────────┴──────────┴──────────┘
//!     │ checkout → react → checkin
//! ```
//!
//! # Invariants
//!
//! - The internal lock is never held while a listener runs. Each delivery
//!   *checks out* the listener, calls it, and *checks it back in*.
//! - A checked-out listener is never delivered to again until it is checked
//!   in, so a listener that publishes to its own source is skipped.
//! - A handle disposed while its listener is checked out is marked closing;
//!   check-in removes it and runs `on_dispose` once the listener returns.
//! - A pass iterates the ids present when it started. Subscribers removed
//!   mid-pass are skipped; subscribers added mid-pass wait for the next publish.
//!
//! # Failure Modes
//!
//! - A panicking listener propagates to the caller of `publish`. Remaining
//!   subscribers in that pass are skipped. The panicking listener is checked
//!   back in, so the source stays usable.
//! - A listener that captures a clone of its own source keeps the source
//!   alive until that listener is disposed.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use log::{debug, trace};
use parking_lot::Mutex;

use super::hook::{ListenHook, Replay, Session};
use super::{BoxListener, DisposeReason, Event, Stream, Subscription};
use crate::sync::StreamLock;

struct Entry<E> {
    subscription: Subscription,
    /// `None` while checked out for delivery.
    listener: Option<BoxListener<E>>,
    /// Set when the handle ended while the listener was checked out.
    closing: Option<DisposeReason>,
}

struct State<E> {
    disposed: bool,
    next_id: u64,
    entries: BTreeMap<u64, Entry<E>>,
    /// Id buffer reused across publishes.
    scratch: Vec<u64>,
}

pub(super) struct Shared<E> {
    state: Mutex<State<E>>,
    hook: Option<Box<dyn ListenHook<E>>>,
    lock: Option<StreamLock>,
}

/// A checked-out listener. Checked back in on drop, including during unwinding.
struct Lease<'a, E: Event> {
    shared: &'a Shared<E>,
    id: u64,
    listener: Option<BoxListener<E>>,
}

impl<E: Event> Lease<'_, E> {
    fn react(&mut self, event: &E) {
        if let Some(listener) = self.listener.as_mut() {
            listener.react(event);
        }
    }
}

impl<E: Event> Drop for Lease<'_, E> {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            self.shared.checkin(self.id, listener);
        }
    }
}

impl<E: Event> Shared<E> {
    fn enter(&self) -> Option<parking_lot::ReentrantMutexGuard<'_, ()>> {
        self.lock.as_ref().map(StreamLock::enter)
    }

    fn checkout(&self, id: u64) -> Option<Lease<'_, E>> {
        let mut state = self.state.lock();
        let entry = state.entries.get_mut(&id)?;
        if entry.closing.is_some() || entry.subscription.is_disposed() {
            return None;
        }
        let listener = entry.listener.take()?;
        Some(Lease {
            shared: self,
            id,
            listener: Some(listener),
        })
    }

    fn checkin(&self, id: u64, mut listener: BoxListener<E>) {
        let closing = {
            let mut state = self.state.lock();
            let closing = match state.entries.get_mut(&id) {
                Some(entry) if entry.closing.is_none() => {
                    entry.listener = Some(listener);
                    return;
                }
                Some(entry) => entry.closing,
                None => None,
            };
            state.entries.remove(&id);
            closing
        };
        if let Some(reason) = closing {
            trace!("subscriber {id} detached after delivery ({reason:?})");
            if !std::thread::panicking() {
                listener.on_dispose(reason);
            }
        }
    }

    /// Deliver one event to one subscriber, if it is still live and not
    /// already running.
    pub(super) fn deliver(&self, id: u64, event: &E) {
        if let Some(mut lease) = self.checkout(id) {
            lease.react(event);
        }
    }

    fn detach(&self, id: u64, reason: DisposeReason) {
        let _guard = self.enter();
        let mut listener = {
            let mut state = self.state.lock();
            let Some(entry) = state.entries.get_mut(&id) else {
                return;
            };
            if entry.closing.is_some() {
                return;
            }
            let taken = entry.listener.take();
            match taken {
                Some(listener) => {
                    state.entries.remove(&id);
                    listener
                }
                None => {
                    entry.closing = Some(reason);
                    return;
                }
            }
        };
        trace!("subscriber {id} detached ({reason:?})");
        listener.on_dispose(reason);
    }
}

impl<E> Drop for Shared<E> {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if state.disposed {
            return;
        }
        state.disposed = true;
        let entries = std::mem::take(&mut state.entries);
        if !entries.is_empty() {
            debug!("source dropped with {} live subscribers", entries.len());
        }
        for (_, mut entry) in entries {
            if !entry.subscription.close() {
                continue;
            }
            if let Some(listener) = entry.listener.as_mut() {
                listener.on_dispose(DisposeReason::Source);
            }
        }
    }
}

/// Root event publisher. See the [module docs](self).
///
/// ```rust,ignore
/// let source = Source::<u32>::new();
/// let sub = source.listen(Callback::new(|v: &u32| println!("{v}")));
///
/// source.publish(&1);
/// sub.dispose();
/// source.publish(&2); // nobody listening
/// ```
pub struct Source<E> {
    shared: Arc<Shared<E>>,
}

impl<E: Event> Source<E> {
    pub fn new() -> Self {
        Self::build(None, None)
    }

    /// A source that calls `hook` for every new listener.
    pub fn with_hook(hook: impl ListenHook<E> + 'static) -> Self {
        Self::build(Some(Box::new(hook)), None)
    }

    /// A source that replays `items` to every new listener, then disposes
    /// that listener's handle.
    pub fn replay(items: impl IntoIterator<Item = E>) -> Self
    where
        E: Sync,
    {
        Self::with_hook(Replay::new(items))
    }

    pub(crate) fn build(hook: Option<Box<dyn ListenHook<E>>>, lock: Option<StreamLock>) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    disposed: false,
                    next_id: 0,
                    entries: BTreeMap::new(),
                    scratch: Vec::new(),
                }),
                hook,
                lock,
            }),
        }
    }

    /// Deliver `event` to every active subscriber, in registration order.
    ///
    /// No-op once the source is disposed.
    pub fn publish(&self, event: &E) {
        let _guard = self.shared.enter();
        let ids = {
            let mut state = self.shared.state.lock();
            if state.disposed {
                return;
            }
            let mut ids = std::mem::take(&mut state.scratch);
            ids.clear();
            ids.extend(state.entries.keys().copied());
            ids
        };

        for &id in &ids {
            self.shared.deliver(id, event);
        }

        let mut state = self.shared.state.lock();
        if state.scratch.capacity() < ids.capacity() {
            state.scratch = ids;
        }
    }

    /// Tear down: every active subscriber is disposed with
    /// [`DisposeReason::Source`] and later listeners end immediately.
    /// Idempotent.
    pub fn dispose(&self) {
        let _guard = self.shared.enter();
        let drained = {
            let mut state = self.shared.state.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            let mut drained = Vec::with_capacity(state.entries.len());
            state.entries.retain(|_, entry| {
                if !entry.subscription.close() {
                    // Disposed concurrently; its own detach finishes it.
                    return true;
                }
                match entry.listener.take() {
                    Some(listener) => {
                        drained.push(listener);
                        false
                    }
                    None => {
                        entry.closing = Some(DisposeReason::Source);
                        true
                    }
                }
            });
            drained
        };

        debug!("source disposed, {} subscribers torn down", drained.len());
        for mut listener in drained {
            listener.on_dispose(DisposeReason::Source);
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.state.lock().disposed
    }

    /// Subscribers that will receive the next publish.
    pub fn subscriber_count(&self) -> usize {
        self.shared
            .state
            .lock()
            .entries
            .values()
            .filter(|entry| entry.closing.is_none() && entry.subscription.is_active())
            .count()
    }
}

impl<E: Event> Stream for Source<E> {
    type Event = E;

    fn attach(&self, mut listener: BoxListener<E>, subscription: &Subscription) {
        let _guard = self.shared.enter();
        let id = {
            let mut state = self.shared.state.lock();
            if state.disposed {
                drop(state);
                subscription.close();
                listener.on_dispose(DisposeReason::Source);
                return;
            }
            if subscription.is_disposed() {
                drop(state);
                listener.on_dispose(DisposeReason::Subscriber);
                return;
            }
            let id = state.next_id;
            state.next_id += 1;
            state.entries.insert(
                id,
                Entry {
                    subscription: subscription.clone(),
                    listener: Some(listener),
                    closing: None,
                },
            );
            id
        };
        trace!("subscriber {id} registered");

        let weak: Weak<Shared<E>> = Arc::downgrade(&self.shared);
        subscription.on_detach(move |reason| {
            if let Some(shared) = weak.upgrade() {
                shared.detach(id, reason);
            }
        });

        if let Some(hook) = self.shared.hook.as_deref() {
            hook.on_listen(&Session::new(&self.shared, id, subscription));
        }
    }

    fn stream_lock(&self) -> Option<StreamLock> {
        self.shared.lock.clone()
    }
}

impl<E> Clone for Source<E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<E: Event> Default for Source<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Event + Sync> FromIterator<E> for Source<E> {
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        Self::replay(iter)
    }
}

impl<E: Event> std::fmt::Debug for Source<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Source")
            .field("disposed", &self.is_disposed())
            .field("subscribers", &self.subscriber_count())
            .field("hooked", &self.shared.hook.is_some())
            .finish()
    }
}
