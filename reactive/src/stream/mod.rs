//! Root sources, listeners, subscription handles and lazy decorator chains.
//!
//! # Overview
//!
//! ```text
//!   producer ──publish──► Source ──► decorator ──► decorator ──► listener
//!                           ▲                                        │
//!                           └──────────── Subscription::dispose ◄────┘
//! ```
//!
//! - **[`Source`]**: the root publisher. Owns the active subscriber set and
//!   performs dispatch.
//! - **[`Subscription`]**: the handle returned by [`StreamExt::listen`]; the
//!   only cancellation primitive.
//! - **[`Decorated`]**: a descriptor pairing an upstream stream with a
//!   [`Decorator`]. Building one does no work; each `listen` materializes a
//!   fresh wrapped-listener chain and registers exactly one handle with the root.
//!
//! # Stream Contract
//!
//! Every stream implements [`Stream::attach`], which registers an
//! already-created [`Subscription`] together with its (possibly wrapped)
//! listener. Consumers call [`StreamExt::listen`], which creates the handle,
//! takes the stream's lock if it has one, and attaches.

mod decorate;
pub mod decorators;
mod hook;
mod listener;
mod source;
mod subscription;

use std::sync::Arc;

pub use decorate::{Decorated, Decorator};
pub use decorators::{Filter, FilterMap, First, Inspect, Last, Map, Take};
pub use hook::{ListenHook, Replay, Session};
pub use listener::{BoxListener, Callback, DisposeReason, Listener};
pub use source::Source;
pub use subscription::Subscription;

use crate::sync::StreamLock;

/// Marker trait for event payloads.
///
/// Events must be:
/// - `'static`: No borrowed data
/// - `Send`: Listeners holding events may move across threads
pub trait Event: Send + 'static {}

impl<T: Send + 'static> Event for T {}

/// Something that can be listened to.
pub trait Stream: Send + Sync {
    /// The event type delivered to listeners.
    type Event: Event;

    /// Register `listener` under `subscription`.
    ///
    /// The handle is created by the caller, so a stream may notify or dispose
    /// it synchronously before `attach` returns. If the stream is already
    /// disposed the handle ends immediately and the listener's `on_dispose`
    /// runs before this call returns.
    fn attach(&self, listener: BoxListener<Self::Event>, subscription: &Subscription);

    /// The lock serializing this stream, if it sits behind the concurrency facade.
    fn stream_lock(&self) -> Option<StreamLock> {
        None
    }
}

/// Shared, type-erased stream.
pub type BoxStream<E> = Arc<dyn Stream<Event = E>>;

impl<S: Stream + ?Sized> Stream for Arc<S> {
    type Event = S::Event;

    #[inline]
    fn attach(&self, listener: BoxListener<Self::Event>, subscription: &Subscription) {
        (**self).attach(listener, subscription);
    }

    #[inline]
    fn stream_lock(&self) -> Option<StreamLock> {
        (**self).stream_lock()
    }
}

/// Attach under the stream's lock, taken once for the whole chain.
pub(crate) fn attach_locked<S: Stream + ?Sized>(
    stream: &S,
    listener: BoxListener<S::Event>,
    subscription: &Subscription,
) {
    let lock = stream.stream_lock();
    let _guard = lock.as_ref().map(StreamLock::enter);
    stream.attach(listener, subscription);
}

/// Consumer-facing combinators available on every [`Stream`].
pub trait StreamExt: Stream {
    /// Start listening. The returned handle ends the session when disposed.
    #[must_use = "dropping the subscription leaves the listener attached with no way to dispose it"]
    fn listen<L>(&self, listener: L) -> Subscription
    where
        L: Listener<Self::Event> + 'static,
    {
        let subscription = Subscription::new();
        attach_locked(self, Box::new(listener), &subscription);
        subscription
    }

    /// Apply a decorator lazily.
    fn decorate<D, A>(self, decorator: D) -> Decorated<Self, D, A>
    where
        Self: Sized,
        D: Decorator<Self::Event, A>,
        A: Event,
    {
        Decorated::new(self, decorator)
    }

    /// Transform every event.
    fn map<A, F>(self, f: F) -> Decorated<Self, Map<F>, A>
    where
        Self: Sized,
        F: Fn(&Self::Event) -> A + Send + Sync + 'static,
        A: Event,
    {
        self.decorate(Map::new(f))
    }

    /// Forward only events matching `predicate`.
    fn filter<F>(self, predicate: F) -> Decorated<Self, Filter<F>, Self::Event>
    where
        Self: Sized,
        F: Fn(&Self::Event) -> bool + Send + Sync + 'static,
    {
        self.decorate(Filter::new(predicate))
    }

    /// Transform and filter in one step.
    fn filter_map<A, F>(self, f: F) -> Decorated<Self, FilterMap<F>, A>
    where
        Self: Sized,
        F: Fn(&Self::Event) -> Option<A> + Send + Sync + 'static,
        A: Event,
    {
        self.decorate(FilterMap::new(f))
    }

    /// Observe events without changing them.
    fn inspect<F>(self, f: F) -> Decorated<Self, Inspect<F>, Self::Event>
    where
        Self: Sized,
        F: Fn(&Self::Event) + Send + Sync + 'static,
    {
        self.decorate(Inspect::new(f))
    }

    /// Forward at most `count` events, then dispose the session.
    fn take(self, count: usize) -> Decorated<Self, Take, Self::Event>
    where
        Self: Sized,
    {
        self.decorate(Take::new(count))
    }

    /// Forward the first event, then dispose the session.
    fn first(self) -> Decorated<Self, First, Self::Event>
    where
        Self: Sized,
    {
        self.decorate(First)
    }

    /// Hold back every event and deliver only the last one, when the session ends.
    fn last(self) -> Decorated<Self, Last, Self::Event>
    where
        Self: Sized,
        Self::Event: Clone,
    {
        self.decorate(Last)
    }

    /// Erase the concrete stream type.
    fn boxed(self) -> BoxStream<Self::Event>
    where
        Self: Sized + 'static,
    {
        Arc::new(self)
    }
}

impl<S: Stream + ?Sized> StreamExt for S {}
