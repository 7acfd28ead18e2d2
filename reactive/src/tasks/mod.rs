//! Background computations as streams.
//!
//! # Overview
//!
//! - **[`WorkerPool`]**: a fixed set of threads fed by a crossbeam channel.
//!   [`PoolHandle`] submits from other threads without owning the workers.
//! - **[`TaskStream`]**: runs one closure on a pool and exposes its result as
//!   a single-value stream that ends once the value is out.
//!
//! ```text
//!   TaskStream::spawn(pool, f)
//!        │ job
//!        ▼
//!   ┌─────────┐   f() = v   ┌────────────┐  publish(v), dispose()
//!   │ worker  │ ──────────► │ SyncSource │ ─────────────────────► listeners
//!   └─────────┘             └────────────┘
//! ```
//!
//! Delivery happens on the worker thread. The task's source sits behind the
//! concurrency facade, so listening from another thread while the task
//! completes is safe.

mod pool;
mod stream;

pub use pool::{Job, PoolHandle, Spawn, WorkerPool};
pub use stream::TaskStream;
