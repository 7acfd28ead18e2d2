use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, OnceLock};

use crossbeam::channel::bounded;
use log::{trace, warn};

use super::Spawn;
use crate::error::{Error, Result};
use crate::stream::{BoxListener, Callback, DisposeReason, Event, Stream, StreamExt, Subscription};
use crate::sync::{StreamLock, SyncSource};

/// A stream fed by one background computation.
///
/// The computation runs on a pool. Its result is published once, then the
/// stream is disposed. Listeners that arrive after completion receive the
/// stored result immediately and are then disposed with
/// [`DisposeReason::Source`]. A computation that panics ends the stream with
/// no value.
///
/// ```rust,ignore
/// let pool = WorkerPool::new(2);
/// let answer = TaskStream::spawn(&pool, || 6 * 7)?;
///
/// let sub = answer.clone().map(|v| v + 1).listen(Callback::new(|v: &i32| println!("{v}")));
/// assert_eq!(answer.wait(), Ok(&42));
/// ```
pub struct TaskStream<E> {
    source: SyncSource<E>,
    result: Arc<OnceLock<E>>,
}

impl<E: Event + Sync> TaskStream<E> {
    /// Start `task` on `pool`.
    ///
    /// Fails with [`Error::PoolClosed`] if the pool no longer accepts jobs.
    pub fn spawn<P, F>(pool: &P, task: F) -> Result<Self>
    where
        P: Spawn + ?Sized,
        F: FnOnce() -> E + Send + 'static,
    {
        let stream = Self {
            source: SyncSource::new(),
            result: Arc::new(OnceLock::new()),
        };
        let completion = Completion(stream.source.clone());
        let result = Arc::clone(&stream.result);

        pool.spawn_job(Box::new(move || {
            let outcome = catch_unwind(AssertUnwindSafe(task));
            let source = &completion.0;
            let _guard = source.lock().enter();
            match outcome {
                Ok(value) => {
                    trace!("task completed");
                    let value = result.get_or_init(|| value);
                    source.publish(value);
                }
                Err(_) => warn!("task panicked before producing a value"),
            }
            source.dispose();
        }))?;

        Ok(stream)
    }

    /// `None` while running, then the value or [`Error::TaskFailed`].
    pub fn result(&self) -> Option<Result<&E>> {
        if let Some(value) = self.result.get() {
            return Some(Ok(value));
        }
        self.source.is_disposed().then_some(Err(Error::TaskFailed))
    }

    pub fn is_complete(&self) -> bool {
        self.source.is_disposed()
    }

    /// Block until the computation finishes.
    ///
    /// Must not be called from a job on the pool running this task when that
    /// pool has a single worker.
    pub fn wait(&self) -> Result<&E> {
        let (done_tx, done_rx) = bounded::<()>(1);
        let _subscription = self.listen(Callback::new(|_: &E| {}).with_dispose(
            move |_: DisposeReason| {
                let _ = done_tx.try_send(());
            },
        ));
        let _ = done_rx.recv();
        self.result().unwrap_or(Err(Error::TaskFailed))
    }
}

/// Ends a task's stream when its job is dropped, run or not.
struct Completion<E: Event>(SyncSource<E>);

impl<E: Event> Drop for Completion<E> {
    fn drop(&mut self) {
        if !self.0.is_disposed() {
            warn!("task dropped before it produced a value");
            self.0.dispose();
        }
    }
}

impl<E: Event + Sync> Stream for TaskStream<E> {
    type Event = E;

    fn attach(&self, mut listener: BoxListener<E>, subscription: &Subscription) {
        let _guard = self.source.lock().enter();
        match self.result.get() {
            Some(value) if self.source.is_disposed() => {
                subscription.close();
                listener.react(value);
                listener.on_dispose(DisposeReason::Source);
            }
            _ => self.source.attach(listener, subscription),
        }
    }

    fn stream_lock(&self) -> Option<StreamLock> {
        Some(self.source.lock().clone())
    }
}

impl<E> Clone for TaskStream<E> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            result: Arc::clone(&self.result),
        }
    }
}

impl<E: Event + Sync> std::fmt::Debug for TaskStream<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskStream")
            .field("complete", &self.is_complete())
            .field("has_value", &self.result.get().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::join;
    use crate::tasks::WorkerPool;
    use crate::testing::Recorder;
    use crossbeam::channel::Receiver;

    /// A task that blocks until released.
    fn gated(pool: &WorkerPool, value: u32) -> (TaskStream<u32>, crossbeam::channel::Sender<()>) {
        let (release, wait): (_, Receiver<()>) = bounded(1);
        let stream = TaskStream::spawn(pool, move || {
            let _ = wait.recv();
            value
        })
        .unwrap();
        (stream, release)
    }

    #[test]
    fn publishes_result_then_disposes() {
        let pool = WorkerPool::new(1);
        let (task, release) = gated(&pool, 42);
        let recorder = Recorder::new();
        let _sub = task.listen(recorder.clone());

        assert!(task.result().is_none());
        release.send(()).unwrap();

        assert_eq!(task.wait(), Ok(&42));
        assert_eq!(recorder.events(), vec![42]);
        assert_eq!(recorder.disposals(), vec![DisposeReason::Source]);
    }

    #[test]
    fn late_listener_gets_stored_result() {
        let pool = WorkerPool::new(1);
        let task = TaskStream::spawn(&pool, || "done").unwrap();
        assert_eq!(task.wait(), Ok(&"done"));

        let recorder = Recorder::new();
        let sub = task.clone().map(|s| s.len()).listen(recorder.clone());

        assert!(sub.is_disposed());
        assert_eq!(recorder.events(), vec![4]);
        assert_eq!(recorder.disposals(), vec![DisposeReason::Source]);
    }

    #[test]
    fn panicking_task_ends_without_value() {
        let pool = WorkerPool::new(1);
        let task = TaskStream::<u8>::spawn(&pool, || panic!("task failure")).unwrap();
        let recorder = Recorder::new();
        let _sub = task.listen(recorder.clone());

        assert_eq!(task.wait(), Err(Error::TaskFailed));
        assert!(recorder.events().is_empty());
        assert!(recorder.is_disposed());
        assert_eq!(task.result(), Some(Err(Error::TaskFailed)));
    }

    #[test]
    fn closed_pool_rejects_spawn() {
        let pool = WorkerPool::new(1);
        let handle = pool.handle();
        drop(pool);

        let result = TaskStream::spawn(&handle, || 1u8);

        assert!(matches!(result, Err(Error::PoolClosed)));
    }

    #[test]
    fn job_queued_behind_shutdown_ends_the_stream() {
        let pool = WorkerPool::single_threaded();
        let handle = pool.handle();
        let (started_tx, started_rx) = bounded::<()>(1);
        let (release, hold) = bounded::<()>(1);
        pool.execute(move || {
            let _ = started_tx.send(());
            let _ = hold.recv();
        })
        .unwrap();
        started_rx.recv().unwrap();

        let stopper = std::thread::spawn(move || drop(pool));
        while handle.queued() == 0 {
            std::thread::yield_now();
        }
        let task = TaskStream::spawn(&handle, || 7u8).unwrap();
        release.send(()).unwrap();
        stopper.join().unwrap();

        assert!(task.is_complete());
        assert_eq!(task.result(), Some(Err(Error::TaskFailed)));
        assert_eq!(task.wait(), Err(Error::TaskFailed));
    }

    #[test]
    fn tasks_race_through_the_join_operators() {
        let pool = WorkerPool::new(2);
        let (slow, release_slow) = gated(&pool, 1);
        let (fast, release_fast) = gated(&pool, 2);
        let recorder = Recorder::new();
        let _sub = join::race_any([slow.clone(), fast.clone()]).listen(recorder.clone());

        release_fast.send(()).unwrap();
        fast.wait().unwrap();
        release_slow.send(()).unwrap();
        slow.wait().unwrap();

        assert_eq!(recorder.events(), vec![join::Indexed { index: 1, value: 2 }]);
    }

    #[test]
    fn simultaneous_completions_have_one_winner() {
        let pool = WorkerPool::new(2);
        for _ in 0..50 {
            let (left, release_left) = gated(&pool, 1);
            let (right, release_right) = gated(&pool, 2);
            let recorder = Recorder::new();
            let sub = join::race_any([left.clone(), right.clone()]).listen(recorder.clone());

            release_left.send(()).unwrap();
            release_right.send(()).unwrap();
            left.wait().unwrap();
            right.wait().unwrap();

            assert_eq!(recorder.events().len(), 1);
            assert!(sub.is_disposed());
            assert_eq!(recorder.disposals(), vec![DisposeReason::Subscriber]);
        }
    }
}
