//! Built-in decorators.
//!
//! | Decorator     | Per-session state        | Ends the session        |
//! |---------------|--------------------------|-------------------------|
//! | [`Map`]       | none                     | never                   |
//! | [`Filter`]    | none                     | never                   |
//! | [`FilterMap`] | none                     | never                   |
//! | [`Inspect`]   | none                     | never                   |
//! | [`Take`]      | remaining count          | after `n` events        |
//! | [`First`]     | remaining count (1)      | after the first event   |
//! | [`Last`]      | last seen value          | never (waits for end)   |
//!
//! Closures are held behind an `Arc` so a decorator can be shared by every
//! session materialized from the same descriptor.

use std::sync::Arc;

use super::{BoxListener, Decorator, DisposeReason, Event, Listener, Subscription};

// =============================================================================
// Map
// =============================================================================

/// Transforms each event with a closure.
pub struct Map<F> {
    f: Arc<F>,
}

impl<F> Map<F> {
    pub fn new(f: F) -> Self {
        Self { f: Arc::new(f) }
    }
}

impl<F> Clone for Map<F> {
    fn clone(&self) -> Self {
        Self {
            f: Arc::clone(&self.f),
        }
    }
}

struct Mapped<F, Out> {
    f: Arc<F>,
    next: BoxListener<Out>,
}

impl<In, Out, F> Listener<In> for Mapped<F, Out>
where
    F: Fn(&In) -> Out + Send + Sync,
{
    fn react(&mut self, event: &In) {
        let out = (self.f)(event);
        self.next.react(&out);
    }

    fn on_dispose(&mut self, reason: DisposeReason) {
        self.next.on_dispose(reason);
    }
}

impl<In, Out, F> Decorator<In, Out> for Map<F>
where
    In: Event,
    Out: Event,
    F: Fn(&In) -> Out + Send + Sync + 'static,
{
    fn decorate(&self, next: BoxListener<Out>, _: &Subscription) -> BoxListener<In> {
        Box::new(Mapped {
            f: Arc::clone(&self.f),
            next,
        })
    }
}

// =============================================================================
// Filter
// =============================================================================

/// Forwards events for which the predicate holds.
pub struct Filter<F> {
    predicate: Arc<F>,
}

impl<F> Filter<F> {
    pub fn new(predicate: F) -> Self {
        Self {
            predicate: Arc::new(predicate),
        }
    }
}

impl<F> Clone for Filter<F> {
    fn clone(&self) -> Self {
        Self {
            predicate: Arc::clone(&self.predicate),
        }
    }
}

struct Filtered<F, E> {
    predicate: Arc<F>,
    next: BoxListener<E>,
}

impl<E, F> Listener<E> for Filtered<F, E>
where
    F: Fn(&E) -> bool + Send + Sync,
{
    fn react(&mut self, event: &E) {
        if (self.predicate)(event) {
            self.next.react(event);
        }
    }

    fn on_dispose(&mut self, reason: DisposeReason) {
        self.next.on_dispose(reason);
    }
}

impl<E, F> Decorator<E, E> for Filter<F>
where
    E: Event,
    F: Fn(&E) -> bool + Send + Sync + 'static,
{
    fn decorate(&self, next: BoxListener<E>, _: &Subscription) -> BoxListener<E> {
        Box::new(Filtered {
            predicate: Arc::clone(&self.predicate),
            next,
        })
    }
}

// =============================================================================
// FilterMap
// =============================================================================

/// Transforms events, dropping those mapped to `None`.
pub struct FilterMap<F> {
    f: Arc<F>,
}

impl<F> FilterMap<F> {
    pub fn new(f: F) -> Self {
        Self { f: Arc::new(f) }
    }
}

impl<F> Clone for FilterMap<F> {
    fn clone(&self) -> Self {
        Self {
            f: Arc::clone(&self.f),
        }
    }
}

struct FilterMapped<F, Out> {
    f: Arc<F>,
    next: BoxListener<Out>,
}

impl<In, Out, F> Listener<In> for FilterMapped<F, Out>
where
    F: Fn(&In) -> Option<Out> + Send + Sync,
{
    fn react(&mut self, event: &In) {
        if let Some(out) = (self.f)(event) {
            self.next.react(&out);
        }
    }

    fn on_dispose(&mut self, reason: DisposeReason) {
        self.next.on_dispose(reason);
    }
}

impl<In, Out, F> Decorator<In, Out> for FilterMap<F>
where
    In: Event,
    Out: Event,
    F: Fn(&In) -> Option<Out> + Send + Sync + 'static,
{
    fn decorate(&self, next: BoxListener<Out>, _: &Subscription) -> BoxListener<In> {
        Box::new(FilterMapped {
            f: Arc::clone(&self.f),
            next,
        })
    }
}

// =============================================================================
// Inspect
// =============================================================================

/// Calls a closure on each event before forwarding it unchanged.
pub struct Inspect<F> {
    f: Arc<F>,
}

impl<F> Inspect<F> {
    pub fn new(f: F) -> Self {
        Self { f: Arc::new(f) }
    }
}

impl<F> Clone for Inspect<F> {
    fn clone(&self) -> Self {
        Self {
            f: Arc::clone(&self.f),
        }
    }
}

struct Inspected<F, E> {
    f: Arc<F>,
    next: BoxListener<E>,
}

impl<E, F> Listener<E> for Inspected<F, E>
where
    F: Fn(&E) + Send + Sync,
{
    fn react(&mut self, event: &E) {
        (self.f)(event);
        self.next.react(event);
    }

    fn on_dispose(&mut self, reason: DisposeReason) {
        self.next.on_dispose(reason);
    }
}

impl<E, F> Decorator<E, E> for Inspect<F>
where
    E: Event,
    F: Fn(&E) + Send + Sync + 'static,
{
    fn decorate(&self, next: BoxListener<E>, _: &Subscription) -> BoxListener<E> {
        Box::new(Inspected {
            f: Arc::clone(&self.f),
            next,
        })
    }
}

// =============================================================================
// Take / First
// =============================================================================

/// Forwards at most `count` events, then disposes the session.
///
/// `Take::new(0)` disposes the session as soon as it is materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Take {
    count: usize,
}

impl Take {
    pub fn new(count: usize) -> Self {
        Self { count }
    }
}

/// Forwards the first event, then disposes the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct First;

struct Taking<E> {
    remaining: usize,
    subscription: Subscription,
    next: BoxListener<E>,
}

impl<E> Listener<E> for Taking<E> {
    fn react(&mut self, event: &E) {
        if self.remaining == 0 {
            return;
        }
        self.remaining -= 1;
        self.next.react(event);
        if self.remaining == 0 {
            self.subscription.dispose();
        }
    }

    fn on_dispose(&mut self, reason: DisposeReason) {
        self.next.on_dispose(reason);
    }
}

fn taking<E: Event>(count: usize, next: BoxListener<E>, subscription: &Subscription) -> BoxListener<E> {
    if count == 0 {
        subscription.dispose();
    }
    Box::new(Taking {
        remaining: count,
        subscription: subscription.clone(),
        next,
    })
}

impl<E: Event> Decorator<E, E> for Take {
    fn decorate(&self, next: BoxListener<E>, subscription: &Subscription) -> BoxListener<E> {
        taking(self.count, next, subscription)
    }
}

impl<E: Event> Decorator<E, E> for First {
    fn decorate(&self, next: BoxListener<E>, subscription: &Subscription) -> BoxListener<E> {
        taking(1, next, subscription)
    }
}

// =============================================================================
// Last
// =============================================================================

/// Swallows events, remembering the most recent one, and delivers it exactly
/// once when the session ends (for either [`DisposeReason`]).
///
/// Nothing is delivered if the session ends before any event arrived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Last;

struct Latest<E> {
    value: Option<E>,
    next: BoxListener<E>,
}

impl<E: Clone + Send> Listener<E> for Latest<E> {
    fn react(&mut self, event: &E) {
        self.value = Some(event.clone());
    }

    fn on_dispose(&mut self, reason: DisposeReason) {
        if let Some(value) = self.value.take() {
            self.next.react(&value);
        }
        self.next.on_dispose(reason);
    }
}

impl<E: Event + Clone> Decorator<E, E> for Last {
    fn decorate(&self, next: BoxListener<E>, _: &Subscription) -> BoxListener<E> {
        Box::new(Latest { value: None, next })
    }
}
