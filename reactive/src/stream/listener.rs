//! The listener contract: a `react`/`on_dispose` capability pair.

/// Why a listener stopped receiving events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisposeReason {
    /// The subscription handle was disposed (by the consumer, a decorator,
    /// or an operator that completed).
    Subscriber,
    /// The source tore down and disposed every subscriber it had.
    Source,
}

/// Receives events from a stream.
///
/// `on_dispose` is called exactly once, after which the listener is dropped
/// and never sees another event.
pub trait Listener<E>: Send {
    /// Handle one event.
    fn react(&mut self, event: &E);

    /// The session ended.
    fn on_dispose(&mut self, reason: DisposeReason);
}

/// Type-erased listener, the form every stream stores internally.
pub type BoxListener<E> = Box<dyn Listener<E>>;

impl<E, L: Listener<E> + ?Sized> Listener<E> for Box<L> {
    #[inline]
    fn react(&mut self, event: &E) {
        (**self).react(event);
    }

    #[inline]
    fn on_dispose(&mut self, reason: DisposeReason) {
        (**self).on_dispose(reason);
    }
}

/// Closure-backed listener.
///
/// ```rust,ignore
/// let listener = Callback::new(|v: &u32| println!("got {v}"))
///     .with_dispose(|reason: DisposeReason| println!("done: {reason:?}"));
/// ```
pub struct Callback<F, D = fn(DisposeReason)> {
    react: F,
    dispose: Option<D>,
}

impl<F> Callback<F> {
    /// A listener that ignores disposal.
    pub fn new(react: F) -> Self {
        Self {
            react,
            dispose: None,
        }
    }
}

impl<F, D> Callback<F, D> {
    /// Attach a disposal callback.
    pub fn with_dispose<D2>(self, dispose: D2) -> Callback<F, D2> {
        Callback {
            react: self.react,
            dispose: Some(dispose),
        }
    }
}

impl<E, F, D> Listener<E> for Callback<F, D>
where
    F: FnMut(&E) + Send,
    D: FnMut(DisposeReason) + Send,
{
    fn react(&mut self, event: &E) {
        (self.react)(event);
    }

    fn on_dispose(&mut self, reason: DisposeReason) {
        if let Some(dispose) = self.dispose.as_mut() {
            dispose(reason);
        }
    }
}

impl<F, D> std::fmt::Debug for Callback<F, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callback")
            .field("has_dispose", &self.dispose.is_some())
            .finish_non_exhaustive()
    }
}
