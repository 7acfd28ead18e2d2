//! Lazy decorator chains.
//!
//! A [`Decorated`] stream is a thin descriptor: `{ upstream, decorator }`.
//! Applying more decorators nests descriptors, so the chain is an explicit
//! type built once and walked at listen time:
//!
//! ```text
//!   source.map(f).filter(p).listen(l)
//!
//!   Decorated<Decorated<Source<A>, Map<f>, B>, Filter<p>, B>
//!        │ attach(l, sub)
//!        ├─► Filter::decorate(l)         = lf
//!        │      │ attach(lf, sub)
//!        │      ├─► Map::decorate(lf)    = lm
//!        │      │      │ attach(lm, sub)
//!        │      │      └─► Source registers (lm, sub)
//! ```
//!
//! Each listen allocates one wrapper per decorator and registers a single
//! handle with the root, regardless of chain depth. Disposing that handle
//! detaches the whole chain at once.

use std::marker::PhantomData;

use super::{BoxListener, Event, Stream, Subscription};
use crate::sync::StreamLock;

/// Turns a listener of `Out` events into a listener of `In` events.
///
/// Decorators are stateless with respect to the stream; any per-session state
/// lives in the listener returned by [`decorate`](Self::decorate). The
/// subscription is the session's single handle, shared by the whole chain, so
/// a decorator may dispose it (see [`Take`](super::Take)).
pub trait Decorator<In, Out>: Send + Sync {
    /// Wrap `next` for one listen session.
    fn decorate(&self, next: BoxListener<Out>, subscription: &Subscription) -> BoxListener<In>;
}

impl<In, Out, F> Decorator<In, Out> for F
where
    F: Fn(BoxListener<Out>, &Subscription) -> BoxListener<In> + Send + Sync,
{
    #[inline]
    fn decorate(&self, next: BoxListener<Out>, subscription: &Subscription) -> BoxListener<In> {
        self(next, subscription)
    }
}

/// A stream with one more decorator applied. See [`StreamExt::decorate`](super::StreamExt::decorate).
pub struct Decorated<S, D, A> {
    upstream: S,
    decorator: D,
    _out: PhantomData<fn() -> A>,
}

impl<S, D, A> Decorated<S, D, A> {
    /// Pair `upstream` with `decorator`. No listener is registered.
    pub fn new(upstream: S, decorator: D) -> Self {
        Self {
            upstream,
            decorator,
            _out: PhantomData,
        }
    }

    /// The stream this decorator applies to.
    pub fn upstream(&self) -> &S {
        &self.upstream
    }
}

impl<S, D, A> Stream for Decorated<S, D, A>
where
    S: Stream,
    D: Decorator<S::Event, A>,
    A: Event,
{
    type Event = A;

    fn attach(&self, listener: BoxListener<A>, subscription: &Subscription) {
        let wrapped = self.decorator.decorate(listener, subscription);
        self.upstream.attach(wrapped, subscription);
    }

    fn stream_lock(&self) -> Option<StreamLock> {
        self.upstream.stream_lock()
    }
}

impl<S: Clone, D: Clone, A> Clone for Decorated<S, D, A> {
    fn clone(&self) -> Self {
        Self::new(self.upstream.clone(), self.decorator.clone())
    }
}

impl<S: std::fmt::Debug, D, A> std::fmt::Debug for Decorated<S, D, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decorated")
            .field("upstream", &self.upstream)
            .field("decorator", &std::any::type_name::<D>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{DisposeReason, Listener, Source, StreamExt};
    use crate::testing::Recorder;

    /// Adds a fixed offset; written as a plain closure decorator.
    fn offset(by: i32) -> impl Decorator<i32, i32> + Clone {
        move |next: BoxListener<i32>, _: &Subscription| -> BoxListener<i32> {
            struct Offset {
                by: i32,
                next: BoxListener<i32>,
            }
            impl Listener<i32> for Offset {
                fn react(&mut self, event: &i32) {
                    self.next.react(&(event + self.by));
                }
                fn on_dispose(&mut self, reason: DisposeReason) {
                    self.next.on_dispose(reason);
                }
            }
            Box::new(Offset { by, next })
        }
    }

    // ==================== Laziness ====================

    #[test]
    fn building_a_chain_registers_nothing() {
        let source = Source::<i32>::new();

        let _chain = source
            .clone()
            .map(|v| v * 2)
            .filter(|v| *v > 0)
            .decorate(offset(1));

        assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn listen_registers_one_handle_regardless_of_depth() {
        let source = Source::<i32>::new();
        let chain = source
            .clone()
            .map(|v| v + 1)
            .map(|v| v + 1)
            .map(|v| v + 1)
            .decorate(offset(10));

        let recorder = Recorder::new();
        let _sub = chain.listen(recorder.clone());

        assert_eq!(source.subscriber_count(), 1);

        source.publish(&0);
        assert_eq!(recorder.events(), vec![13]);
    }

    #[test]
    fn chain_is_reusable() {
        let source = Source::<i32>::new();
        let chain = source.clone().map(|v| v * 3);

        let a = Recorder::new();
        let b = Recorder::new();
        let _sa = chain.listen(a.clone());
        let _sb = chain.listen(b.clone());
        source.publish(&2);

        assert_eq!(source.subscriber_count(), 2);
        assert_eq!(a.events(), vec![6]);
        assert_eq!(b.events(), vec![6]);
    }

    // ==================== Disposal ====================

    #[test]
    fn disposing_detaches_the_whole_chain() {
        let source = Source::<i32>::new();
        let chain = source.clone().map(|v| v + 1).decorate(offset(1));
        let recorder = Recorder::new();
        let sub = chain.listen(recorder.clone());

        sub.dispose();
        source.publish(&5);

        assert_eq!(source.subscriber_count(), 0);
        assert!(recorder.events().is_empty());
        assert_eq!(recorder.disposals(), vec![DisposeReason::Subscriber]);
    }

    #[test]
    fn source_teardown_reaches_the_terminal_listener() {
        let source = Source::<i32>::new();
        let recorder = Recorder::new();
        let _sub = source.clone().map(|v| v + 1).listen(recorder.clone());

        source.dispose();

        assert_eq!(recorder.disposals(), vec![DisposeReason::Source]);
    }
}
