//! Snapshot-on-any: once every inner stream has produced a value, each new
//! inner event emits the full vector of latest values.
//!
//! ```text
//!   a: ──1──────────3──────
//!   b: ──────x─────────y───
//!   out: ────[1,x]──[3,x]──[3,y]
//! ```
//!
//! # Completion
//!
//! - Any inner stream ending before every slot is filled ends the operator
//!   without emitting; it can never become ready.
//! - After that, the operator ends once every inner stream has ended.

use std::sync::Arc;

use fixedbitset::FixedBitSet;
use log::debug;

use super::gate::{Fanin, Gate, Outlet};
use crate::stream::{BoxListener, DisposeReason, Event, Stream, Subscription, attach_locked};

/// Combines the latest value of each stream. See the [module docs](self).
pub struct CombineLatest<S> {
    streams: Arc<[S]>,
}

impl<S> CombineLatest<S>
where
    S: Stream + 'static,
    S::Event: Clone,
{
    pub fn new(streams: impl IntoIterator<Item = S>) -> Self {
        Self {
            streams: streams.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

impl<S> Clone for CombineLatest<S> {
    fn clone(&self) -> Self {
        Self {
            streams: Arc::clone(&self.streams),
        }
    }
}

impl<S> Stream for CombineLatest<S>
where
    S: Stream + 'static,
    S::Event: Clone,
{
    type Event = Vec<S::Event>;

    fn attach(&self, listener: BoxListener<Vec<S::Event>>, subscription: &Subscription) {
        let count = self.streams.len();
        let inners: Vec<Subscription> = (0..count).map(|_| Subscription::new()).collect();
        let state = CombineState {
            outlet: Outlet::new(listener),
            outer: subscription.clone(),
            inners: inners.clone(),
            latest: (0..count).map(|_| None).collect(),
            seen: FixedBitSet::with_capacity(count),
            contributed: 0,
            ended: FixedBitSet::with_capacity(count),
            ended_count: 0,
            finished: false,
        };
        let Some(gate) = Gate::open(state, subscription) else {
            return;
        };
        if count == 0 {
            subscription.dispose();
            return;
        }
        for (index, (stream, inner)) in self.streams.iter().zip(&inners).enumerate() {
            if subscription.is_disposed() {
                break;
            }
            attach_locked(stream, gate.inner(index), inner);
        }
    }
}

impl<S> std::fmt::Debug for CombineLatest<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CombineLatest")
            .field("streams", &self.streams.len())
            .finish()
    }
}

struct CombineState<E> {
    outlet: Outlet<Vec<E>>,
    outer: Subscription,
    inners: Vec<Subscription>,
    latest: Vec<Option<E>>,
    seen: FixedBitSet,
    /// Streams that have produced at least one value.
    contributed: usize,
    ended: FixedBitSet,
    ended_count: usize,
    finished: bool,
}

impl<E: Event + Clone> CombineState<E> {
    fn is_ready(&self) -> bool {
        self.contributed == self.latest.len()
    }
}

impl<E: Event + Clone> Fanin for CombineState<E> {
    type In = E;
    type Out = Vec<E>;
    type Key = usize;

    fn outlet(&mut self) -> &mut Outlet<Vec<E>> {
        &mut self.outlet
    }

    fn on_inner(gate: &Arc<Gate<Self>>, index: usize, event: &E) {
        let _guard = gate.enter();
        let snapshot = gate.with(|state| {
            if state.finished {
                return None;
            }
            state.latest[index] = Some(event.clone());
            if !state.seen.put(index) {
                state.contributed += 1;
            }
            if !state.is_ready() {
                return None;
            }
            state.latest.iter().cloned().collect::<Option<Vec<E>>>()
        });
        if let Some(snapshot) = snapshot {
            gate.emit(&snapshot);
        }
    }

    fn on_inner_dispose(gate: &Arc<Gate<Self>>, index: usize) {
        let done = gate.with(|state| {
            if state.finished {
                return None;
            }
            if !state.is_ready() {
                debug!(
                    "combine-latest aborted: stream {index} ended with {}/{} ready",
                    state.contributed,
                    state.latest.len()
                );
                return Some(state.outer.clone());
            }
            if !state.ended.put(index) {
                state.ended_count += 1;
            }
            (state.ended_count == state.latest.len()).then(|| state.outer.clone())
        });
        if let Some(outer) = done {
            outer.dispose();
        }
    }

    fn teardown(gate: &Arc<Gate<Self>>, reason: DisposeReason) {
        let inners = gate.with(|state| {
            state.finished = true;
            state.latest.clear();
            std::mem::take(&mut state.inners)
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

    // ==================== Readiness ====================

    #[test]
    fn waits_until_every_stream_contributed() {
        let a = Source::new();
        let b = Source::new();
        let c = Source::new();
        let recorder = Recorder::new();
        let _sub = CombineLatest::new(vec![a.clone(), b.clone(), c.clone()]).listen(recorder.clone());

        a.publish(&1);
        a.publish(&2);
        b.publish(&10);
        assert!(recorder.events().is_empty());

        c.publish(&100);
        assert_eq!(recorder.events(), vec![vec![2, 10, 100]]);
    }

    #[test]
    fn every_later_event_emits_one_snapshot() {
        let a = Source::new();
        let b = Source::new();
        let recorder = Recorder::new();
        let _sub = CombineLatest::new(vec![a.clone(), b.clone()]).listen(recorder.clone());

        a.publish(&1);
        b.publish(&2);
        a.publish(&3);
        b.publish(&4);
        b.publish(&5);

        assert_eq!(
            recorder.events(),
            vec![vec![1, 2], vec![3, 2], vec![3, 4], vec![3, 5]]
        );
    }

    // ==================== Completion ====================

    #[test]
    fn early_end_aborts_without_emitting() {
        let a = Source::new();
        let b = Source::new();
        let recorder = Recorder::new();
        let sub = CombineLatest::new(vec![a.clone(), b.clone()]).listen(recorder.clone());

        a.publish(&1);
        b.dispose();

        assert!(sub.is_disposed());
        assert!(recorder.events().is_empty());
        assert_eq!(recorder.disposals(), vec![DisposeReason::Subscriber]);
        assert_eq!(a.subscriber_count(), 0);
    }

    #[test]
    fn once_ready_ends_only_after_all_streams_end() {
        let a = Source::new();
        let b = Source::new();
        let recorder = Recorder::new();
        let sub = CombineLatest::new(vec![a.clone(), b.clone()]).listen(recorder.clone());

        a.publish(&1);
        b.publish(&2);
        a.dispose();
        assert!(sub.is_active());

        b.publish(&3);
        b.dispose();

        assert!(sub.is_disposed());
        assert_eq!(recorder.events(), vec![vec![1, 2], vec![1, 3]]);
    }

    #[test]
    fn finite_sources_combine_synchronously() {
        let recorder = Recorder::new();
        let a = Source::replay(vec![1, 2]);
        let b = Source::new();
        let _sub = CombineLatest::new(vec![a.boxed(), b.clone().boxed()]).listen(recorder.clone());

        // `a` ended before `b` produced anything.
        assert!(recorder.is_disposed());
        assert_eq!(b.subscriber_count(), 0);
    }

    #[test]
    fn no_streams_disposes_without_emitting() {
        let recorder = Recorder::<Vec<i32>>::new();
        let sub = CombineLatest::<Source<i32>>::new(Vec::new()).listen(recorder.clone());

        assert!(sub.is_disposed());
        assert!(recorder.events().is_empty());
    }

    #[test]
    fn outer_dispose_releases_inner_streams() {
        let a = Source::<i32>::new();
        let b = Source::<i32>::new();
        let recorder = Recorder::new();
        let sub = CombineLatest::new(vec![a.clone(), b.clone()]).listen(recorder.clone());

        sub.dispose();

        assert_eq!(a.subscriber_count(), 0);
        assert_eq!(b.subscriber_count(), 0);
        assert_eq!(recorder.disposals(), vec![DisposeReason::Subscriber]);
    }
}
