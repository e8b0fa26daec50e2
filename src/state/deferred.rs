//! Deferred updates - coalescing change notifications.
//!
//! When deferral is active, an observable's `Change` notification is queued
//! instead of delivered. Several writes to the same observable collapse into
//! one queued entry; delivery then carries whatever value the observable holds
//! at flush time, and is `forced` if any of the coalesced writes was.
//!
//! Deferral is active when either
//! - the process-wide options carry [`Features::DEFER_UPDATES`], or
//! - code runs inside [`batch`].
//!
//! With the feature flag, nothing flushes on its own: call
//! [`process_deferred_updates`]. The outermost `batch` flushes when it returns.

use std::cell::{Cell, RefCell};

use tracing::debug;

use super::observable::{Observable, ObservableEvent};
use crate::engine::{default_features, Features};

struct Pending {
    observable: Observable,
    forced: bool,
}

thread_local! {
    static QUEUE: RefCell<Vec<Pending>> = const { RefCell::new(Vec::new()) };
    static BATCH_DEPTH: Cell<usize> = const { Cell::new(0) };
    static FLUSHING: Cell<bool> = const { Cell::new(false) };
}

/// Whether change notifications are currently being queued.
pub fn is_deferring() -> bool {
    BATCH_DEPTH.with(|depth| depth.get() > 0)
        || default_features().contains(Features::DEFER_UPDATES)
}

pub(crate) fn enqueue(observable: &Observable, forced: bool) {
    QUEUE.with(|queue| {
        let mut queue = queue.borrow_mut();
        match queue.iter_mut().find(|p| p.observable.ptr_eq(observable)) {
            Some(pending) => pending.forced |= forced,
            None => queue.push(Pending {
                observable: observable.clone(),
                forced,
            }),
        }
    });
}

/// Number of observables with a queued notification.
pub fn pending_count() -> usize {
    QUEUE.with(|queue| queue.borrow().len())
}

/// Deliver every queued notification.
///
/// Notifications queued while flushing (listeners that write) are delivered
/// in the same call. Re-entrant calls return immediately.
pub fn process_deferred_updates() {
    if FLUSHING.with(|f| f.replace(true)) {
        return;
    }

    loop {
        let batch: Vec<Pending> = QUEUE.with(|queue| std::mem::take(&mut *queue.borrow_mut()));
        if batch.is_empty() {
            break;
        }
        debug!(count = batch.len(), "delivering deferred notifications");
        for pending in batch {
            let value = pending.observable.peek();
            pending
                .observable
                .deliver(ObservableEvent::Change, value, pending.forced);
        }
    }

    FLUSHING.with(|f| f.set(false));
}

/// Run `f` with notifications deferred, then deliver them once.
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    BATCH_DEPTH.with(|depth| depth.set(depth.get() + 1));
    let result = f();
    let outermost = BATCH_DEPTH.with(|depth| {
        let next = depth.get() - 1;
        depth.set(next);
        next == 0
    });
    if outermost && !default_features().contains(Features::DEFER_UPDATES) {
        process_deferred_updates();
    }
    result
}

/// Drop queued notifications (for testing).
pub fn reset_deferred() {
    QUEUE.with(|queue| queue.borrow_mut().clear());
    BATCH_DEPTH.with(|depth| depth.set(0));
    FLUSHING.with(|f| f.set(false));
}
