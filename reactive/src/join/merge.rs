//! Forward-any: every event from every inner stream, with a bound on how many
//! inner streams are subscribed at once.
//!
//! ```text
//!   streams:  s0  s1  s2  s3        bound = 2
//!             ──  ──                started on listen
//!             s0 ends ──► s2 starts
//!             s1 ends ──► s3 starts
//!             s2, s3 end ──► outer disposed
//! ```
//!
//! Starting an inner stream may complete it synchronously (a replay source
//! does). A single pump loop owns all starts, so a nested completion only
//! records itself and the running loop picks up the next stream.

use std::sync::Arc;

use log::{debug, trace};

use super::gate::{Fanin, Gate, Outlet};
use crate::error::{Error, Result};
use crate::stream::{BoxListener, DisposeReason, Stream, Subscription, attach_locked};
use crate::util::{Key, Registry};

/// Merges a set of streams. See the [module docs](self).
pub struct Merge<S> {
    streams: Arc<[S]>,
    max_concurrent: usize,
}

impl<S: Stream + 'static> Merge<S> {
    /// Merge `streams`, keeping at most `max_concurrent` subscribed at once.
    ///
    /// Fails with [`Error::InvalidConcurrency`] if the bound is zero.
    pub fn new(streams: impl IntoIterator<Item = S>, max_concurrent: usize) -> Result<Self> {
        if max_concurrent == 0 {
            return Err(Error::InvalidConcurrency(max_concurrent));
        }
        Ok(Self {
            streams: streams.into_iter().collect(),
            max_concurrent,
        })
    }

    /// Merge `streams`, subscribing to all of them on listen.
    pub fn unbounded(streams: impl IntoIterator<Item = S>) -> Self {
        let streams: Arc<[S]> = streams.into_iter().collect();
        let max_concurrent = streams.len().max(1);
        Self {
            streams,
            max_concurrent,
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Number of inner streams.
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

impl<S> Clone for Merge<S> {
    fn clone(&self) -> Self {
        Self {
            streams: Arc::clone(&self.streams),
            max_concurrent: self.max_concurrent,
        }
    }
}

impl<S: Stream + 'static> Stream for Merge<S> {
    type Event = S::Event;

    fn attach(&self, listener: BoxListener<S::Event>, subscription: &Subscription) {
        let state = MergeState {
            outlet: Outlet::new(listener),
            outer: subscription.clone(),
            streams: Arc::clone(&self.streams),
            max_concurrent: self.max_concurrent,
            next: 0,
            active: Registry::with_capacity(self.max_concurrent.min(self.streams.len())),
            pumping: false,
            finished: false,
        };
        if let Some(gate) = Gate::open(state, subscription) {
            MergeState::pump(&gate);
        }
    }
}

impl<S> std::fmt::Debug for Merge<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Merge")
            .field("streams", &self.streams.len())
            .field("max_concurrent", &self.max_concurrent)
            .finish()
    }
}

struct MergeState<S: Stream> {
    outlet: Outlet<S::Event>,
    outer: Subscription,
    streams: Arc<[S]>,
    max_concurrent: usize,
    /// Index of the next stream to start.
    next: usize,
    active: Registry<Subscription>,
    pumping: bool,
    finished: bool,
}

enum Step<S> {
    Start(Arc<[S]>, usize, Key, Subscription),
    Drained(Subscription),
    Idle,
}

impl<S: Stream + 'static> MergeState<S> {
    /// Start inner streams up to the bound. Runs outside the gate; a call
    /// made while another pump is running only leaves its change behind for
    /// that loop to pick up.
    fn pump(gate: &Arc<Gate<Self>>) {
        if gate.with(|state| std::mem::replace(&mut state.pumping, true)) {
            return;
        }
        loop {
            let step = gate.with(|state| {
                if state.finished || state.outlet.is_closed() {
                    state.pumping = false;
                    return Step::Idle;
                }
                if state.active.len() < state.max_concurrent && state.next < state.streams.len() {
                    let index = state.next;
                    state.next += 1;
                    let inner = Subscription::new();
                    let key = state.active.insert(inner.clone());
                    return Step::Start(Arc::clone(&state.streams), index, key, inner);
                }
                state.pumping = false;
                if state.active.is_empty() && state.next == state.streams.len() {
                    return Step::Drained(state.outer.clone());
                }
                Step::Idle
            });

            match step {
                Step::Start(streams, index, key, inner) => {
                    trace!("merge starting inner stream {index}");
                    attach_locked(&streams[index], gate.inner(key), &inner);
                }
                Step::Drained(outer) => {
                    debug!("merge drained");
                    outer.dispose();
                    return;
                }
                Step::Idle => return,
            }
        }
    }
}

impl<S: Stream + 'static> Fanin for MergeState<S> {
    type In = S::Event;
    type Out = S::Event;
    type Key = Key;

    fn outlet(&mut self) -> &mut Outlet<S::Event> {
        &mut self.outlet
    }

    fn on_inner(gate: &Arc<Gate<Self>>, key: Key, event: &S::Event) {
        let _guard = gate.enter();
        if gate.with(|state| state.active.contains(key)) {
            gate.emit(event);
        }
    }

    fn on_inner_dispose(gate: &Arc<Gate<Self>>, key: Key) {
        let removed = gate.with(|state| !state.finished && state.active.remove(key).is_some());
        if removed {
            let owner = Arc::clone(gate);
            gate.defer(move || Self::pump(&owner));
        }
    }

    fn teardown(gate: &Arc<Gate<Self>>, reason: DisposeReason) {
        let inners = gate.with(|state| {
            state.finished = true;
            state.active.drain()
        });
        gate.close(reason);
        gate.release(inners);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{Source, StreamExt};
    use crate::testing::Recorder;

    fn active(sources: &[Source<i32>]) -> Vec<usize> {
        sources.iter().map(Source::subscriber_count).collect()
    }

    // ==================== Construction ====================

    #[test]
    fn zero_bound_is_rejected() {
        let result = Merge::new(vec![Source::<i32>::new()], 0);
        assert_eq!(result.err(), Some(Error::InvalidConcurrency(0)));
    }

    #[test]
    fn no_streams_disposes_immediately() {
        let merge = Merge::<Source<i32>>::new(Vec::new(), 3).unwrap();
        let recorder = Recorder::new();

        let sub = merge.listen(recorder.clone());

        assert!(sub.is_disposed());
        assert!(recorder.events().is_empty());
        assert_eq!(recorder.disposals(), vec![DisposeReason::Subscriber]);
    }

    // ==================== Forwarding ====================

    #[test]
    fn forwards_events_from_every_stream() {
        let a = Source::new();
        let b = Source::new();
        let merge = Merge::unbounded(vec![a.clone(), b.clone()]);
        let recorder = Recorder::new();
        let _sub = merge.listen(recorder.clone());

        a.publish(&1);
        b.publish(&2);
        a.publish(&3);

        assert_eq!(recorder.events(), vec![1, 2, 3]);
    }

    #[test]
    fn disposes_once_every_stream_is_done() {
        let a = Source::new();
        let b = Source::new();
        let recorder = Recorder::new();
        let sub = Merge::unbounded(vec![a.clone(), b.clone()]).listen(recorder.clone());

        a.dispose();
        assert!(sub.is_active());
        b.publish(&1);
        b.dispose();

        assert!(sub.is_disposed());
        assert_eq!(recorder.events(), vec![1]);
        assert_eq!(recorder.disposals(), vec![DisposeReason::Subscriber]);
    }

    // ==================== Concurrency bound ====================

    #[test]
    fn bound_limits_active_streams() {
        let sources: Vec<Source<i32>> = (0..4).map(|_| Source::new()).collect();
        let recorder = Recorder::new();
        let sub = Merge::new(sources.clone(), 2).unwrap().listen(recorder.clone());

        assert_eq!(active(&sources), vec![1, 1, 0, 0]);

        sources[2].publish(&99);
        sources[0].publish(&1);
        sources[0].dispose();
        assert_eq!(active(&sources), vec![0, 1, 1, 0]);

        sources[1].dispose();
        assert_eq!(active(&sources), vec![0, 0, 1, 1]);

        sources[3].publish(&3);
        sources[2].dispose();
        assert!(sub.is_active());
        sources[3].dispose();

        assert!(sub.is_disposed());
        assert_eq!(recorder.events(), vec![1, 3]);
    }

    #[test]
    fn synchronous_completions_chain_through_the_bound() {
        let streams = vec![
            Source::replay(vec![1, 2]),
            Source::replay(vec![3]),
            Source::replay(Vec::new()),
            Source::replay(vec![4, 5]),
        ];
        let recorder = Recorder::new();

        let sub = Merge::new(streams, 1).unwrap().listen(recorder.clone());

        assert_eq!(recorder.events(), vec![1, 2, 3, 4, 5]);
        assert!(sub.is_disposed());
    }

    // ==================== Disposal ====================

    #[test]
    fn outer_dispose_releases_inner_streams() {
        let sources: Vec<Source<i32>> = (0..3).map(|_| Source::new()).collect();
        let recorder = Recorder::new();
        let sub = Merge::new(sources.clone(), 2).unwrap().listen(recorder.clone());

        sub.dispose();

        assert_eq!(active(&sources), vec![0, 0, 0]);
        sources[0].publish(&1);
        assert!(recorder.events().is_empty());
        assert_eq!(recorder.disposals(), vec![DisposeReason::Subscriber]);
    }

    #[test]
    fn downstream_take_stops_the_merge() {
        let a = Source::new();
        let b = Source::new();
        let recorder = Recorder::new();
        let _sub = Merge::unbounded(vec![a.clone(), b.clone()])
            .take(2)
            .listen(recorder.clone());

        a.publish(&1);
        b.publish(&2);
        b.publish(&3);

        assert_eq!(recorder.events(), vec![1, 2]);
        assert_eq!(a.subscriber_count(), 0);
        assert_eq!(b.subscriber_count(), 0);
    }

    // ==================== Re-entrancy ====================

    #[test]
    fn emission_while_downstream_is_running_is_dropped() {
        let a = Source::new();
        let b = Source::new();
        let feedback = b.clone();
        let recorder = Recorder::new();
        let _sub = Merge::unbounded(vec![a.clone(), b.clone()])
            .inspect(move |v| {
                if *v == 1 {
                    feedback.publish(&2);
                }
            })
            .listen(recorder.clone());

        a.publish(&1);
        b.publish(&3);

        assert_eq!(recorder.events(), vec![1, 3]);
        assert_eq!(b.subscriber_count(), 1);
    }
}
