//! Multi-stream operators.
//!
//! # Overview
//!
//! Each operator is a stream built from N inner streams. Listening to it
//! listens to the inner streams and re-publishes a derived event:
//!
//! | Operator          | Emits                          | Ends when                                   |
//! |-------------------|--------------------------------|---------------------------------------------|
//! | [`Merge`]         | every inner event              | all inner streams ended                     |
//! | [`CombineLatest`] | `Vec<E>` of latest values      | any ends before ready, else all ended       |
//! | [`JoinAll`]       | `Vec<Option<E>>` once          | all inner streams ended (or outer disposed) |
//! | [`RaceAny`]       | [`Indexed<E>`] once            | first value, or all ended empty             |
//!
//! Operators are descriptors like decorated streams: building one does no
//! work, each `listen` starts an independent session, and disposing that
//! session's handle disposes every inner subscription it holds. Disposal
//! never reaches the producers behind the inner streams.
//!
//! Inner streams are passed by value; mix stream types with
//! [`StreamExt::boxed`](crate::StreamExt::boxed):
//!
//! ```rust,ignore
//! let ticks = Source::<u32>::new();
//! let fixed = Source::replay([1, 2, 3]);
//!
//! let merged = join::merge([ticks.clone().boxed(), fixed.map(|v| v * 100).boxed()], 2)?;
//! let sub = merged.listen(Callback::new(|v: &u32| println!("{v}")));
//! ```
//!
//! # Threading
//!
//! Operator state sits behind a reentrant lock per session, so inner streams
//! may deliver from different threads, including facade streams that each
//! hold their own lock while delivering. Disposing inner or outer handles is
//! deferred until the delivering thread has left the session lock.
//!
//! # Re-entrant emissions
//!
//! Downstream listeners run one emission at a time. An emission that arrives
//! on the same thread while the downstream listener is still running, for
//! example because that listener published into one of the operator's inner
//! sources, is dropped:
//!
//! ```rust,ignore
//! let merged = join::merge([a.clone(), b.clone()], 2)?;
//! let _sub = merged
//!     .inspect(move |v| if *v == 1 { b.publish(&2) })   // 2 is dropped
//!     .listen(recorder);
//! a.publish(&1);
//! ```

mod all;
mod any;
mod combine;
mod gate;
mod merge;

pub use all::JoinAll;
pub use any::{Indexed, RaceAny};
pub use combine::CombineLatest;
pub use merge::Merge;

use crate::error::Result;
use crate::stream::Stream;

/// Forward every event of `streams`, at most `max_concurrent` subscribed at once.
pub fn merge<S>(streams: impl IntoIterator<Item = S>, max_concurrent: usize) -> Result<Merge<S>>
where
    S: Stream + 'static,
{
    Merge::new(streams, max_concurrent)
}

/// Emit the latest value of every stream whenever any of them produces one.
pub fn combine_latest<S>(streams: impl IntoIterator<Item = S>) -> CombineLatest<S>
where
    S: Stream + 'static,
    S::Event: Clone,
{
    CombineLatest::new(streams)
}

/// Emit the final value of every stream once all of them have ended.
pub fn join_all<S>(streams: impl IntoIterator<Item = S>) -> JoinAll<S>
where
    S: Stream + 'static,
    S::Event: Clone,
{
    JoinAll::new(streams)
}

/// Emit the first value produced by any stream, tagged with its index.
pub fn race_any<S>(streams: impl IntoIterator<Item = S>) -> RaceAny<S>
where
    S: Stream + 'static,
    S::Event: Clone,
{
    RaceAny::new(streams)
}
