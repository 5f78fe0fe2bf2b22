use std::cell::RefCell;
use std::rc::Rc;

use leptos::prelude::*;

/// Shared home of a viewer's state. Flows only touch state through these
/// two calls, each a single synchronous step, so they run unchanged against
/// a leptos signal in the app and a plain `RefCell` in tests.
///
/// Both return `None` once the owner is gone (e.g. the viewer unmounted
/// while a request was in flight).
pub trait StateCell<S> {
    fn mutate<R>(&self, f: impl FnOnce(&mut S) -> R) -> Option<R>;
    fn observe<R>(&self, f: impl FnOnce(&S) -> R) -> Option<R>;
}

impl<S: Send + Sync + 'static> StateCell<S> for RwSignal<S> {
    fn mutate<R>(&self, f: impl FnOnce(&mut S) -> R) -> Option<R> {
        self.try_update(f)
    }

    fn observe<R>(&self, f: impl FnOnce(&S) -> R) -> Option<R> {
        self.try_with_untracked(f)
    }
}

impl<S> StateCell<S> for Rc<RefCell<S>> {
    fn mutate<R>(&self, f: impl FnOnce(&mut S) -> R) -> Option<R> {
        Some(f(&mut self.borrow_mut()))
    }

    fn observe<R>(&self, f: impl FnOnce(&S) -> R) -> Option<R> {
        Some(f(&self.borrow()))
    }
}
