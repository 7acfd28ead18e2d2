use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread;

use crossbeam::channel::{Receiver, Sender, unbounded};
use log::{debug, warn};

use crate::error::{Error, Result};

/// A unit of work run by a [`WorkerPool`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Job(Job),
    Shutdown,
}

/// Something that can run jobs in the background.
pub trait Spawn: Send + Sync {
    /// Queue `job`. Fails with [`Error::PoolClosed`] once the pool has stopped.
    fn spawn_job(&self, job: Job) -> Result<()>;
}

/// A fixed-size thread pool.
///
/// Jobs are started in FIFO order; completion order is non-deterministic.
/// Dropping the pool lets every queued job finish, then joins the workers.
pub struct WorkerPool {
    sender: Sender<Message>,
    workers: Vec<Worker>,
}

struct Worker {
    id: usize,
    handle: Option<thread::JoinHandle<()>>,
}

impl WorkerPool {
    /// Creates a pool with `size` worker threads.
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "worker pool size must be greater than 0");

        let (sender, receiver) = unbounded();
        let workers = (0..size)
            .map(|id| Worker::new(id, receiver.clone()))
            .collect();

        debug!("worker pool started with {size} threads");
        Self { sender, workers }
    }

    pub fn single_threaded() -> Self {
        Self::new(1)
    }

    /// Queue `f` on the pool.
    pub fn execute<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.spawn_job(Box::new(f))
    }

    /// A cloneable handle for submitting jobs from other threads.
    pub fn handle(&self) -> PoolHandle {
        PoolHandle {
            sender: self.sender.clone(),
        }
    }

    /// Number of worker threads.
    pub fn size(&self) -> usize {
        self.workers.len()
    }
}

impl Spawn for WorkerPool {
    fn spawn_job(&self, job: Job) -> Result<()> {
        self.sender
            .send(Message::Job(job))
            .map_err(|_| Error::PoolClosed)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        for _ in &self.workers {
            let _ = self.sender.send(Message::Shutdown);
        }

        for worker in &mut self.workers {
            let Some(handle) = worker.handle.take() else {
                continue;
            };
            if handle.join().is_err() {
                warn!("worker {} exited abnormally", worker.id);
            }
        }
        debug!("worker pool stopped");
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.workers.len())
            .field("queued", &self.sender.len())
            .finish()
    }
}

impl Worker {
    fn new(id: usize, receiver: Receiver<Message>) -> Self {
        let handle = thread::spawn(move || {
            while let Ok(Message::Job(job)) = receiver.recv() {
                if catch_unwind(AssertUnwindSafe(job)).is_err() {
                    warn!("worker {id}: job panicked");
                }
            }
        });

        Self {
            id,
            handle: Some(handle),
        }
    }
}

/// Submits jobs to a [`WorkerPool`] from any thread.
///
/// Handles do not keep the workers alive: once the pool is dropped,
/// submitting fails with [`Error::PoolClosed`].
#[derive(Clone)]
pub struct PoolHandle {
    sender: Sender<Message>,
}

impl PoolHandle {
    pub fn execute<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.spawn_job(Box::new(f))
    }

    /// Messages waiting for a worker, shutdown requests included.
    pub fn queued(&self) -> usize {
        self.sender.len()
    }
}

impl Spawn for PoolHandle {
    fn spawn_job(&self, job: Job) -> Result<()> {
        self.sender
            .send(Message::Job(job))
            .map_err(|_| Error::PoolClosed)
    }
}

impl std::fmt::Debug for PoolHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolHandle").finish_non_exhaustive()
    }
}
