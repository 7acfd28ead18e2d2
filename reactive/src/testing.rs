//! Shared listeners for unit tests.

use std::sync::{Arc, Mutex};

use crate::stream::{DisposeReason, Listener};

/// One observation made by a [`Recorder`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Note<E> {
    Event(E),
    Disposed(DisposeReason),
}

/// Records every event and disposal it receives. Clones share the same log.
pub(crate) struct Recorder<E> {
    log: Arc<Mutex<Vec<Note<E>>>>,
}

impl<E> Clone for Recorder<E> {
    fn clone(&self) -> Self {
        Self {
            log: Arc::clone(&self.log),
        }
    }
}

impl<E: Clone> Recorder<E> {
    pub(crate) fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn notes(&self) -> Vec<Note<E>> {
        self.log.lock().unwrap().clone()
    }

    pub(crate) fn events(&self) -> Vec<E> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter_map(|note| match note {
                Note::Event(e) => Some(e.clone()),
                Note::Disposed(_) => None,
            })
            .collect()
    }

    pub(crate) fn disposals(&self) -> Vec<DisposeReason> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter_map(|note| match note {
                Note::Disposed(r) => Some(*r),
                Note::Event(_) => None,
            })
            .collect()
    }

    pub(crate) fn is_disposed(&self) -> bool {
        !self.disposals().is_empty()
    }
}

impl<E: Clone + Send> Listener<E> for Recorder<E> {
    fn react(&mut self, event: &E) {
        self.log.lock().unwrap().push(Note::Event(event.clone()));
    }

    fn on_dispose(&mut self, reason: DisposeReason) {
        self.log.lock().unwrap().push(Note::Disposed(reason));
    }
}
