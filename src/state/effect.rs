//! Effect - tracked re-evaluation.
//!
//! An [`Effect`] runs a closure inside a tracking frame, subscribes to every
//! observable the closure read, and runs it again when one of them changes.
//!
//! Subscriptions are diffed after every run: a dependency that is still read
//! keeps the token it got the first time. That is what keeps a region's own
//! subscription alive across rebuilds instead of churning it.
//!
//! # Lifecycle
//!
//! - `Effect::new(f)` runs `f` once with `Trigger::initial()`
//! - each change notification runs `f` with the notification's `forced` flag
//! - a trigger that arrives while `f` is running is dropped
//! - `dispose()` unsubscribes everything; later notifications are ignored

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::trace;

use super::dependency;
use super::observable::{Observable, ObservableEvent, Subscription};

/// Why an effect is running.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Trigger {
    /// First run, from `Effect::new`.
    pub initial: bool,
    /// A dependency re-notified without a write.
    pub forced: bool,
}

impl Trigger {
    pub fn initial() -> Self {
        Self { initial: true, forced: false }
    }
}

struct Dependency {
    observable: Observable,
    subscription: Subscription,
}

struct EffectInner {
    run: RefCell<Option<Box<dyn FnMut(Trigger)>>>,
    dependencies: RefCell<Vec<Dependency>>,
    running: Cell<bool>,
    disposed: Cell<bool>,
}

/// Handle to a running effect. Cloning shares it.
#[derive(Clone)]
pub struct Effect {
    inner: Rc<EffectInner>,
}

impl Effect {
    /// Create the effect and run it once.
    pub fn new(run: impl FnMut(Trigger) + 'static) -> Self {
        let inner = Rc::new(EffectInner {
            run: RefCell::new(Some(Box::new(run))),
            dependencies: RefCell::new(Vec::new()),
            running: Cell::new(false),
            disposed: Cell::new(false),
        });
        execute(&inner, Trigger::initial());
        Self { inner }
    }

    /// Unsubscribe from every dependency and drop the closure.
    pub fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        let dependencies = std::mem::take(&mut *self.inner.dependencies.borrow_mut());
        for dependency in dependencies {
            dependency.subscription.dispose();
        }
        // A running closure is dropped by `execute` once it returns.
        if !self.inner.running.get() {
            self.inner.run.borrow_mut().take();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Number of observables this effect is subscribed to.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.borrow().len()
    }
}

fn execute(inner: &Rc<EffectInner>, trigger: Trigger) {
    if inner.disposed.get() || inner.running.get() {
        return;
    }
    let Some(mut run) = inner.run.borrow_mut().take() else {
        return;
    };

    inner.running.set(true);
    let ((), reads) = dependency::track(|| run(trigger));
    inner.running.set(false);

    if inner.disposed.get() {
        return;
    }
    *inner.run.borrow_mut() = Some(run);
    update_dependencies(inner, reads);
}

fn update_dependencies(inner: &Rc<EffectInner>, reads: Vec<Observable>) {
    let mut dependencies = inner.dependencies.borrow_mut();

    dependencies.retain(|dep| {
        let still_read = reads.iter().any(|obs| obs.ptr_eq(&dep.observable));
        if !still_read {
            dep.subscription.dispose();
        }
        still_read
    });

    for observable in reads {
        if dependencies.iter().any(|dep| dep.observable.ptr_eq(&observable)) {
            continue;
        }
        let weak: Weak<EffectInner> = Rc::downgrade(inner);
        let subscription = observable.subscribe(ObservableEvent::Change, move |notification| {
            if let Some(inner) = weak.upgrade() {
                execute(
                    &inner,
                    Trigger {
                        initial: false,
                        forced: notification.forced,
                    },
                );
            }
        });
        trace!(observable = observable.id(), "effect dependency added");
        dependencies.push(Dependency {
            observable,
            subscription,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::observable;
    use crate::types::Value;

    #[test]
    fn test_runs_initially_and_on_change() {
        let source = observable(Value::from(1));
        let runs = Rc::new(RefCell::new(Vec::new()));

        let source_clone = source.clone();
        let runs_clone = runs.clone();
        let _effect = Effect::new(move |trigger| {
            let value = source_clone.get().as_number().unwrap_or_default();
            runs_clone.borrow_mut().push((value, trigger));
        });

        source.set(Value::from(2));

        let runs = runs.borrow();
        assert_eq!(runs.len(), 2);
        assert!(runs[0].1.initial);
        assert_eq!(runs[1], (2.0, Trigger::default()));
    }

    #[test]
    fn test_subscription_is_kept_across_runs() {
        let source = observable(Value::from(1));
        let source_clone = source.clone();
        let effect = Effect::new(move |_| {
            source_clone.get();
        });

        for i in 2..6 {
            source.set(Value::from(i));
        }
        assert_eq!(source.subscription_count(None), 1);
        assert_eq!(effect.dependency_count(), 1);
    }

    #[test]
    fn test_forced_flag_reaches_run() {
        let source = observable(Value::object([("x", Value::from(1))]));
        let forced = Rc::new(Cell::new(false));

        let source_clone = source.clone();
        let forced_clone = forced.clone();
        let _effect = Effect::new(move |trigger| {
            source_clone.get();
            forced_clone.set(trigger.forced);
        });

        source.value_has_mutated();
        assert!(forced.get());
    }

    #[test]
    fn test_dynamic_dependencies_are_diffed() {
        let flag = observable(Value::Bool(true));
        let a = observable(Value::from("a"));
        let b = observable(Value::from("b"));

        let (flag_c, a_c, b_c) = (flag.clone(), a.clone(), b.clone());
        let _effect = Effect::new(move |_| {
            if flag_c.get().is_truthy() {
                a_c.get();
            } else {
                b_c.get();
            }
        });

        assert_eq!(a.subscription_count(None), 1);
        assert_eq!(b.subscription_count(None), 0);

        flag.set(Value::Bool(false));
        assert_eq!(a.subscription_count(None), 0);
        assert_eq!(b.subscription_count(None), 1);
        assert_eq!(flag.subscription_count(None), 1);
    }

    #[test]
    fn test_dispose_releases_and_silences() {
        let source = observable(Value::from(1));
        let runs = Rc::new(Cell::new(0));

        let source_clone = source.clone();
        let runs_clone = runs.clone();
        let effect = Effect::new(move |_| {
            source_clone.get();
            runs_clone.set(runs_clone.get() + 1);
        });

        effect.dispose();
        assert!(effect.is_disposed());
        assert_eq!(source.subscription_count(None), 0);

        source.set(Value::from(2));
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn test_reentrant_write_does_not_recurse() {
        let source = observable(Value::from(0));
        let runs = Rc::new(Cell::new(0));

        let source_clone = source.clone();
        let runs_clone = runs.clone();
        let _effect = Effect::new(move |_| {
            runs_clone.set(runs_clone.get() + 1);
            let n = source_clone.get().as_number().unwrap_or_default();
            if n < 10.0 {
                source_clone.set(Value::from(n + 1.0));
            }
        });

        assert_eq!(runs.get(), 1, "writes from inside the run are not re-entered");
        assert_eq!(source.peek().as_number(), Some(1.0));
    }
}
