//! Push-based event streams with lazy decorator chains and multi-stream joins.
//!
//! # Overview
//!
//! - [`stream`]: the listener contract, subscription handles, the root
//!   [`Source`] and the decorator chain that transforms events at listen time.
//! - [`join`]: operators that listen to many streams and re-publish derived
//!   events ([`Merge`], [`CombineLatest`], [`JoinAll`], [`RaceAny`]).
//! - [`sync`]: the concurrency facade ([`SyncSource`]) that serializes publish,
//!   listen and dispose behind one lock per stream.
//! - [`tasks`]: a small worker pool and [`TaskStream`], which bridges a
//!   computation running on that pool into a single-value stream.
//!
//! Dispatch is synchronous: `publish` calls every listener on the calling
//! thread, and disposal notifies listeners on the thread that disposed.
//!
//! ```rust,ignore
//! use rusty_reactive::{Callback, Source, StreamExt};
//!
//! let source = Source::<i32>::new();
//! let doubled = source.clone().map(|v| v * 2).filter(|v| *v > 2);
//!
//! let subscription = doubled.listen(Callback::new(|v: &i32| println!("{v}")));
//! source.publish(&1); // filtered out
//! source.publish(&2); // prints 4
//! subscription.dispose();
//! ```

pub mod error;
pub mod join;
pub mod stream;
pub mod sync;
pub mod tasks;
pub(crate) mod util;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Result};
pub use join::{CombineLatest, Indexed, JoinAll, Merge, RaceAny};
pub use stream::{
    BoxListener, BoxStream, Callback, Decorated, Decorator, DisposeReason, Event, ListenHook,
    Listener, Session, Source, Stream, StreamExt, Subscription,
};
pub use sync::{StreamLock, SyncSource};
pub use tasks::{PoolHandle, Spawn, TaskStream, WorkerPool};
