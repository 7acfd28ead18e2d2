use crate::stream::{BoxListener, Event, ListenHook, Replay, Source, Stream, Subscription};

use super::StreamLock;

/// A [`Source`] that is safe to publish to, listen to and dispose from any
/// number of threads. See the [module docs](super).
///
/// ```rust,ignore
/// let source = SyncSource::<u64>::new();
/// let sub = source.clone().map(|v| v * 2).listen(Callback::new(|v: &u64| log(v)));
///
/// let producer = source.clone();
/// std::thread::spawn(move || producer.publish(&21));
/// ```
pub struct SyncSource<E> {
    source: Source<E>,
    lock: StreamLock,
}

impl<E: Event> SyncSource<E> {
    pub fn new() -> Self {
        Self::build(None)
    }

    pub fn with_hook(hook: impl ListenHook<E> + 'static) -> Self {
        Self::build(Some(Box::new(hook)))
    }

    pub fn replay(items: impl IntoIterator<Item = E>) -> Self
    where
        E: Sync,
    {
        Self::with_hook(Replay::new(items))
    }

    fn build(hook: Option<Box<dyn ListenHook<E>>>) -> Self {
        let lock = StreamLock::new();
        Self {
            source: Source::build(hook, Some(lock.clone())),
            lock,
        }
    }

    /// Deliver `event` to every subscriber while holding the stream lock.
    pub fn publish(&self, event: &E) {
        self.source.publish(event);
    }

    /// Tear down under the stream lock.
    pub fn dispose(&self) {
        self.source.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        let _guard = self.lock.enter();
        self.source.is_disposed()
    }

    pub fn subscriber_count(&self) -> usize {
        let _guard = self.lock.enter();
        self.source.subscriber_count()
    }

    /// The lock shared by this source and every stream decorated from it.
    pub fn lock(&self) -> &StreamLock {
        &self.lock
    }
}

impl<E: Event> Stream for SyncSource<E> {
    type Event = E;

    fn attach(&self, listener: BoxListener<E>, subscription: &Subscription) {
        self.source.attach(listener, subscription);
    }

    fn stream_lock(&self) -> Option<StreamLock> {
        Some(self.lock.clone())
    }
}

impl<E> Clone for SyncSource<E> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            lock: self.lock.clone(),
        }
    }
}

impl<E: Event> Default for SyncSource<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Event + Sync> FromIterator<E> for SyncSource<E> {
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        Self::replay(iter)
    }
}

impl<E: Event> std::fmt::Debug for SyncSource<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSource")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}
