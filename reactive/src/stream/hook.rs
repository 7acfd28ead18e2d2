//! Listen-time hooks.
//!
//! A [`Source`](super::Source) built with a hook calls it once for every
//! listener that registers, right after registration and before `listen`
//! returns. The hook gets a [`Session`] scoped to that one subscriber: it can
//! deliver events to it alone and end it. This is how finite sources replay
//! stored values synchronously.

use super::source::Shared;
use super::{Event, Subscription};

/// Called by a source for each newly registered listener.
pub trait ListenHook<E>: Send + Sync {
    fn on_listen(&self, session: &Session<'_, E>);
}

impl<E, F> ListenHook<E> for F
where
    F: Fn(&Session<'_, E>) + Send + Sync,
{
    #[inline]
    fn on_listen(&self, session: &Session<'_, E>) {
        self(session)
    }
}

/// One subscriber, as seen by a [`ListenHook`].
pub struct Session<'a, E> {
    shared: &'a Shared<E>,
    id: u64,
    subscription: &'a Subscription,
}

impl<'a, E: Event> Session<'a, E> {
    pub(super) fn new(shared: &'a Shared<E>, id: u64, subscription: &'a Subscription) -> Self {
        Self {
            shared,
            id,
            subscription,
        }
    }

    /// Deliver `event` to this subscriber only. No-op once the session ended.
    pub fn emit(&self, event: &E) {
        self.shared.deliver(self.id, event);
    }

    /// End this subscriber's session, as if it disposed its own handle.
    pub fn finish(&self) {
        self.subscription.dispose();
    }

    pub fn is_active(&self) -> bool {
        self.subscription.is_active()
    }

    /// The subscriber's handle.
    pub fn subscription(&self) -> &Subscription {
        self.subscription
    }
}

/// Replays a fixed sequence to every new listener, then finishes it.
#[derive(Debug, Clone)]
pub struct Replay<E> {
    items: Vec<E>,
}

impl<E> Replay<E> {
    pub fn new(items: impl IntoIterator<Item = E>) -> Self {
        Self {
            items: items.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<E: Event + Sync> ListenHook<E> for Replay<E> {
    fn on_listen(&self, session: &Session<'_, E>) {
        for item in &self.items {
            if !session.is_active() {
                return;
            }
            session.emit(item);
        }
        session.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{DisposeReason, Source, StreamExt};
    use crate::testing::Recorder;

    #[test]
    fn replay_delivers_then_finishes() {
        let source = Source::replay(vec![1, 2, 3]);
        let recorder = Recorder::new();

        let sub = source.listen(recorder.clone());

        assert_eq!(recorder.events(), vec![1, 2, 3]);
        assert_eq!(recorder.disposals(), vec![DisposeReason::Subscriber]);
        assert!(sub.is_disposed());
        assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn replay_restarts_for_each_listener() {
        let source: Source<&'static str> = ["a", "b"].into_iter().collect();
        let first = Recorder::new();
        let second = Recorder::new();

        let _a = source.listen(first.clone());
        let _b = source.listen(second.clone());

        assert_eq!(first.events(), vec!["a", "b"]);
        assert_eq!(second.events(), vec!["a", "b"]);
    }

    #[test]
    fn replay_stops_when_listener_ends_early() {
        let source = Source::replay(0..10);
        let recorder = Recorder::new();

        let _sub = source.clone().take(3).listen(recorder.clone());

        assert_eq!(recorder.events(), vec![0, 1, 2]);
        assert_eq!(recorder.disposals(), vec![DisposeReason::Subscriber]);
    }

    fn greet(session: &Session<'_, i32>) {
        session.emit(&-1);
    }

    #[test]
    fn function_hook_targets_only_the_new_listener() {
        let source = Source::with_hook(greet);
        let early = Recorder::new();
        let late = Recorder::new();

        let _e = source.listen(early.clone());
        source.publish(&5);
        let _l = source.listen(late.clone());

        assert_eq!(early.events(), vec![-1, 5]);
        assert_eq!(late.events(), vec![-1]);
        assert!(!late.is_disposed());
    }
}
