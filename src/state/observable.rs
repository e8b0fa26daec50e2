//! Observable - the reactive value cell.
//!
//! An [`Observable`] holds one [`Value`] and a list of subscribers.
//!
//! - `get()` reads and registers a dependency with the current tracking frame
//! - `peek()` reads without tracking
//! - `set()` writes and notifies, unless old and new are equal primitives
//! - `value_has_mutated()` re-notifies without a write (in-place mutation)
//!
//! # Delivery
//!
//! Subscribers are notified from a snapshot. A subscriber removed while a
//! notification is in flight is skipped; one added in flight first hears the
//! next notification. This is what lets a region dispose and re-create its
//! descendants' subscriptions from inside a notification.
//!
//! # Example
//!
//! ```ignore
//! use spark_bind::state::{observable, ObservableEvent};
//!
//! let name = observable("Ann".into());
//! let token = name.subscribe(ObservableEvent::Change, |n| println!("{:?}", n.value));
//! name.set("Bob".into());
//! assert_eq!(name.subscription_count(None), 1);
//! token.dispose();
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::trace;

use super::{deferred, dependency};
use crate::types::Value;

// =============================================================================
// Types
// =============================================================================

/// Subscription topics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObservableEvent {
    /// After a write (or a forced re-notify). Carries the new value.
    Change,
    /// Before a write. Carries the old value.
    BeforeChange,
}

/// What a subscriber receives.
#[derive(Clone, Debug)]
pub struct Notification {
    pub event: ObservableEvent,
    pub value: Value,
    /// Raised by `value_has_mutated` rather than by a write.
    pub forced: bool,
}

type Listener = Rc<dyn Fn(&Notification)>;

struct Subscriber {
    id: u64,
    event: ObservableEvent,
    listener: Listener,
}

struct ObservableInner {
    value: RefCell<Value>,
    subscribers: RefCell<Vec<Subscriber>>,
    next_id: Cell<u64>,
}

/// A reactive value cell. Cloning shares the cell.
#[derive(Clone)]
pub struct Observable {
    inner: Rc<ObservableInner>,
}

/// Token returned by [`Observable::subscribe`].
///
/// Dropping the token does NOT unsubscribe; call [`Subscription::dispose`] or
/// [`Observable::unsubscribe`].
#[derive(Clone)]
pub struct Subscription {
    id: u64,
    event: ObservableEvent,
    target: Weak<ObservableInner>,
}

/// Create an observable holding `value`.
pub fn observable(value: Value) -> Observable {
    Observable::new(value)
}

// =============================================================================
// Observable
// =============================================================================

impl Observable {
    /// Create a cell holding `value`, with no subscribers.
    pub fn new(value: Value) -> Self {
        Self {
            inner: Rc::new(ObservableInner {
                value: RefCell::new(value),
                subscribers: RefCell::new(Vec::new()),
                next_id: Cell::new(0),
            }),
        }
    }

    /// Read the current value and register it as a dependency.
    pub fn get(&self) -> Value {
        dependency::register_read(self);
        self.peek()
    }

    /// Read the current value without tracking.
    pub fn peek(&self) -> Value {
        self.inner.value.borrow().clone()
    }

    /// Write a value.
    ///
    /// Writing a primitive equal to the current primitive is a no-op.
    /// Objects always notify: the cell cannot tell whether they changed.
    ///
    /// `BeforeChange` subscribers hear the old value first, then `Change`
    /// subscribers hear the new one (queued instead while deferring, see
    /// [`crate::state::batch`]).
    ///
    /// # Example
    ///
    /// ```ignore
    /// let count = observable(Value::from(1));
    /// count.set(Value::from(1)); // equal primitive, nobody hears it
    /// count.set(Value::from(2)); // notifies
    /// ```
    pub fn set(&self, value: Value) {
        let old = self.peek();
        if Value::primitive_eq(&old, &value) {
            return;
        }

        self.deliver(ObservableEvent::BeforeChange, old, false);
        *self.inner.value.borrow_mut() = value;
        self.notify_change(false);
    }

    /// Re-notify subscribers with the current value, for in-place mutation.
    ///
    /// The notification is `forced`, which makes a bound `with` region
    /// rebuild even though the value's identity did not change.
    pub fn value_has_mutated(&self) {
        self.notify_change(true);
    }

    fn notify_change(&self, forced: bool) {
        if deferred::is_deferring() {
            deferred::enqueue(self, forced);
        } else {
            self.deliver(ObservableEvent::Change, self.peek(), forced);
        }
    }

    /// Send one notification to a snapshot of the current subscribers.
    pub(crate) fn deliver(&self, event: ObservableEvent, value: Value, forced: bool) {
        let snapshot: Vec<(u64, Listener)> = self
            .inner
            .subscribers
            .borrow()
            .iter()
            .filter(|s| s.event == event)
            .map(|s| (s.id, s.listener.clone()))
            .collect();

        if snapshot.is_empty() {
            return;
        }

        let notification = Notification { event, value, forced };
        for (id, listener) in snapshot {
            if self.is_subscribed(id) {
                listener(&notification);
            }
        }
    }

    fn is_subscribed(&self, id: u64) -> bool {
        self.inner.subscribers.borrow().iter().any(|s| s.id == id)
    }

    // -------------------------------------------------------------------------
    // Subscriptions
    // -------------------------------------------------------------------------

    /// Register a listener for `event`.
    ///
    /// # Arguments
    ///
    /// * `event` - Which notifications to hear
    /// * `listener` - Called with every matching [`Notification`]
    ///
    /// # Returns
    ///
    /// A [`Subscription`] token. The listener stays registered until the
    /// token is disposed; dropping it is not enough.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let item = observable(Value::Null);
    /// let token = item.subscribe(ObservableEvent::BeforeChange, |n| {
    ///     println!("leaving {:?}", n.value);
    /// });
    /// item.set(Value::from("next"));
    /// token.dispose();
    /// assert_eq!(item.subscription_count(None), 0);
    /// ```
    pub fn subscribe<F>(&self, event: ObservableEvent, listener: F) -> Subscription
    where
        F: Fn(&Notification) + 'static,
    {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner.subscribers.borrow_mut().push(Subscriber {
            id,
            event,
            listener: Rc::new(listener),
        });
        trace!(observable = ?self.id(), subscription = id, ?event, "subscribe");

        Subscription {
            id,
            event,
            target: Rc::downgrade(&self.inner),
        }
    }

    /// Remove a subscription. Returns false if it was already gone or
    /// belongs to another observable.
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        if !Weak::ptr_eq(&subscription.target, &Rc::downgrade(&self.inner)) {
            return false;
        }
        let mut subscribers = self.inner.subscribers.borrow_mut();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != subscription.id);
        let removed = subscribers.len() != before;
        if removed {
            trace!(observable = ?self.id(), subscription = subscription.id, "unsubscribe");
        }
        removed
    }

    /// Number of live subscriptions, optionally for one event only.
    ///
    /// `None` counts every event. Bindings that were disposed no longer count,
    /// which makes this the leak check for teardown.
    pub fn subscription_count(&self, event: Option<ObservableEvent>) -> usize {
        self.inner
            .subscribers
            .borrow()
            .iter()
            .filter(|s| event.is_none_or(|e| s.event == e))
            .count()
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Observable) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Stable address-based id, for logging and de-duplication.
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.inner) as usize
    }
}

impl fmt::Debug for Observable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.value.try_borrow() {
            Ok(value) => write!(f, "Observable({:?})", *value),
            Err(_) => write!(f, "Observable(<borrowed>)"),
        }
    }
}

// =============================================================================
// Subscription
// =============================================================================

impl Subscription {
    /// Unsubscribe. Safe to call more than once, or after the observable is gone.
    pub fn dispose(&self) -> bool {
        match self.target.upgrade() {
            Some(inner) => Observable { inner }.unsubscribe(self),
            None => false,
        }
    }

    pub fn event(&self) -> ObservableEvent {
        self.event
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("event", &self.event)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
