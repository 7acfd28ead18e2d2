//! Wait-for-all: one snapshot of each inner stream's final value, emitted
//! exactly once when the operator ends.
//!
//! Each inner stream is listened to through [`Last`], so it reports a single
//! value at the moment it ends. A stream that ends without producing anything
//! leaves `None` in its slot.
//!
//! Forced teardown (the outer handle disposed early) still emits: inner
//! sessions are released first, which flushes their last values, and the
//! partial snapshot goes out before the outlet closes.

use std::sync::Arc;

use fixedbitset::FixedBitSet;
use log::debug;

use super::gate::{Fanin, Gate, Outlet};
use crate::stream::{
    BoxListener, Decorator, DisposeReason, Event, Last, Stream, Subscription, attach_locked,
};

/// Joins the final values of a set of streams. See the [module docs](self).
pub struct JoinAll<S> {
    streams: Arc<[S]>,
}

impl<S> JoinAll<S>
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

impl<S> Clone for JoinAll<S> {
    fn clone(&self) -> Self {
        Self {
            streams: Arc::clone(&self.streams),
        }
    }
}

impl<S> Stream for JoinAll<S>
where
    S: Stream + 'static,
    S::Event: Clone,
{
    type Event = Vec<Option<S::Event>>;

    fn attach(&self, listener: BoxListener<Self::Event>, subscription: &Subscription) {
        let count = self.streams.len();
        let inners: Vec<Subscription> = (0..count).map(|_| Subscription::new()).collect();
        let state = JoinState {
            outlet: Outlet::new(listener),
            outer: subscription.clone(),
            inners: inners.clone(),
            finals: (0..count).map(|_| None).collect(),
            ended: FixedBitSet::with_capacity(count),
            ended_count: 0,
            finished: false,
            emitted: false,
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
            let listener = Last.decorate(gate.inner(index), inner);
            attach_locked(stream, listener, inner);
        }
    }
}

impl<S> std::fmt::Debug for JoinAll<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JoinAll")
            .field("streams", &self.streams.len())
            .finish()
    }
}

struct JoinState<E> {
    outlet: Outlet<Vec<Option<E>>>,
    outer: Subscription,
    inners: Vec<Subscription>,
    finals: Vec<Option<E>>,
    ended: FixedBitSet,
    ended_count: usize,
    finished: bool,
    emitted: bool,
}

impl<E: Event + Clone> Fanin for JoinState<E> {
    type In = E;
    type Out = Vec<Option<E>>;
    type Key = usize;

    fn outlet(&mut self) -> &mut Outlet<Vec<Option<E>>> {
        &mut self.outlet
    }

    fn on_inner(gate: &Arc<Gate<Self>>, index: usize, event: &E) {
        gate.with(|state| {
            if !state.emitted {
                state.finals[index] = Some(event.clone());
            }
        });
    }

    fn on_inner_dispose(gate: &Arc<Gate<Self>>, index: usize) {
        let done = gate.with(|state| {
            if state.finished {
                return None;
            }
            if !state.ended.put(index) {
                state.ended_count += 1;
            }
            (state.ended_count == state.finals.len()).then(|| state.outer.clone())
        });
        if let Some(outer) = done {
            outer.dispose();
        }
    }

    fn teardown(gate: &Arc<Gate<Self>>, reason: DisposeReason) {
        let inners = gate.with(|state| {
            state.finished = true;
            std::mem::take(&mut state.inners)
        });

        // Inner streams flush their final values on release, before the snapshot.
        let owner = Arc::clone(gate);
        gate.defer(move || {
            for inner in inners {
                inner.dispose();
            }
            let snapshot = owner.with(|state| {
                if state.emitted {
                    return None;
                }
                state.emitted = true;
                debug!(
                    "join-all complete: {}/{} streams ended",
                    state.ended_count,
                    state.finals.len()
                );
                Some(std::mem::take(&mut state.finals))
            });
            if let Some(snapshot) = snapshot {
                owner.emit(&snapshot);
            }
            owner.close(reason);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{Source, StreamExt};
    use crate::testing::{Note, Recorder};

    #[test]
    fn snapshot_holds_each_final_value() {
        let a = Source::new();
        let b = Source::new();
        let c = Source::new();
        let recorder = Recorder::new();
        let sub = JoinAll::new(vec![a.clone(), b.clone(), c.clone()]).listen(recorder.clone());

        a.publish(&1);
        a.publish(&2);
        a.dispose();
        b.dispose();
        c.publish(&9);
        assert!(recorder.events().is_empty());
        c.dispose();

        assert_eq!(
            recorder.notes(),
            vec![
                Note::Event(vec![Some(2), None, Some(9)]),
                Note::Disposed(DisposeReason::Subscriber),
            ]
        );
        assert!(sub.is_disposed());
    }

    #[test]
    fn forced_teardown_emits_partial_snapshot() {
        let a = Source::new();
        let b = Source::new();
        let recorder = Recorder::new();
        let sub = JoinAll::new(vec![a.clone(), b.clone()]).listen(recorder.clone());

        a.publish(&4);
        b.publish(&5);
        b.publish(&6);
        a.dispose();
        sub.dispose();
        sub.dispose();

        assert_eq!(recorder.events(), vec![vec![Some(4), Some(6)]]);
        assert_eq!(recorder.disposals(), vec![DisposeReason::Subscriber]);
        assert_eq!(b.subscriber_count(), 0);
    }

    #[test]
    fn replayed_streams_join_synchronously() {
        let recorder = Recorder::new();
        let streams = vec![Source::replay(vec!["a", "b"]), Source::replay(vec!["c"])];

        let sub = JoinAll::new(streams).listen(recorder.clone());

        assert_eq!(recorder.events(), vec![vec![Some("b"), Some("c")]]);
        assert!(sub.is_disposed());
    }

    #[test]
    fn no_streams_emit_an_empty_snapshot() {
        let recorder = Recorder::new();
        let sub = JoinAll::<Source<i32>>::new(Vec::new()).listen(recorder.clone());

        assert_eq!(recorder.events(), vec![Vec::<Option<i32>>::new()]);
        assert!(sub.is_disposed());
    }
}
