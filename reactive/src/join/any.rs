//! First-to-emit wins.
//!
//! Each inner stream is listened to through [`First`]. The first value to
//! arrive is emitted tagged with its stream's index, then every other inner
//! session and the outer handle are disposed. If all inner streams end
//! without a value, the operator ends without emitting.

use std::sync::Arc;

use fixedbitset::FixedBitSet;
use log::debug;

use super::gate::{Fanin, Gate, Outlet};
use crate::stream::{
    BoxListener, Decorator, DisposeReason, Event, First, Stream, Subscription, attach_locked,
};

/// A value tagged with the position of the stream that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Indexed<E> {
    pub index: usize,
    pub value: E,
}

/// Races a set of streams. See the [module docs](self).
pub struct RaceAny<S> {
    streams: Arc<[S]>,
}

impl<S> RaceAny<S>
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

impl<S> Clone for RaceAny<S> {
    fn clone(&self) -> Self {
        Self {
            streams: Arc::clone(&self.streams),
        }
    }
}

impl<S> Stream for RaceAny<S>
where
    S: Stream + 'static,
    S::Event: Clone,
{
    type Event = Indexed<S::Event>;

    fn attach(&self, listener: BoxListener<Self::Event>, subscription: &Subscription) {
        let count = self.streams.len();
        let inners: Vec<Subscription> = (0..count).map(|_| Subscription::new()).collect();
        let state = RaceState {
            outlet: Outlet::new(listener),
            outer: subscription.clone(),
            inners: inners.clone(),
            ended: FixedBitSet::with_capacity(count),
            ended_count: 0,
            won: false,
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
            let listener = First.decorate(gate.inner(index), inner);
            attach_locked(stream, listener, inner);
        }
    }
}

impl<S> std::fmt::Debug for RaceAny<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RaceAny")
            .field("streams", &self.streams.len())
            .finish()
    }
}

struct RaceState<E> {
    outlet: Outlet<Indexed<E>>,
    outer: Subscription,
    inners: Vec<Subscription>,
    ended: FixedBitSet,
    ended_count: usize,
    won: bool,
    finished: bool,
}

impl<E: Event + Clone> Fanin for RaceState<E> {
    type In = E;
    type Out = Indexed<E>;
    type Key = usize;

    fn outlet(&mut self) -> &mut Outlet<Indexed<E>> {
        &mut self.outlet
    }

    fn on_inner(gate: &Arc<Gate<Self>>, index: usize, event: &E) {
        let outer = {
            let _guard = gate.enter();
            let outer = gate.with(|state| {
                if state.finished || state.won {
                    return None;
                }
                state.won = true;
                Some(state.outer.clone())
            });
            let Some(outer) = outer else {
                return;
            };
            debug!("race won by stream {index}");
            gate.emit(&Indexed {
                index,
                value: event.clone(),
            });
            outer
        };
        outer.dispose();
    }

    fn on_inner_dispose(gate: &Arc<Gate<Self>>, index: usize) {
        let done = gate.with(|state| {
            if state.finished || state.won {
                return None;
            }
            if !state.ended.put(index) {
                state.ended_count += 1;
            }
            (state.ended_count == state.inners.len()).then(|| state.outer.clone())
        });
        if let Some(outer) = done {
            debug!("race ended with no winner");
            outer.dispose();
        }
    }

    fn teardown(gate: &Arc<Gate<Self>>, reason: DisposeReason) {
        let inners = gate.with(|state| {
            state.finished = true;
            std::mem::take(&mut state.inners)
        });
        gate.close(reason);
        gate.release(inners);
    }
}
