//! Error type shared by the stream constructors and the worker pool.
//!
//! Most of the engine has no failure path at all: listening to a disposed
//! source yields an already-disposed handle, and disposing twice is a no-op.
//! The variants here cover construction-time precondition violations and the
//! task bridge.

use thiserror::Error;

/// Errors reported by stream constructors and the task bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// A merge was built with a concurrency bound of zero.
    #[error("merge concurrency bound must be at least 1 (got {0})")]
    InvalidConcurrency(usize),

    /// The worker pool stopped accepting jobs.
    #[error("worker pool is shut down")]
    PoolClosed,

    /// A task-backed computation panicked before producing a value.
    #[error("task failed before producing a value")]
    TaskFailed,
}

/// Result alias defaulting to the crate [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;
