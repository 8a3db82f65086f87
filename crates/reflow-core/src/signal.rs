use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::effects::{Effect, watch_effect_labeled};
use crate::reactive::{Dep, untrack};

/// A readable and writable reactive value.
///
/// `get` records the running observer as a dependent; `set` may notify the
/// dependents. Implementations decide whether a write has any effect at all.
pub trait Reactive {
    type Value;

    fn get(&self) -> Self::Value;
    fn get_untracked(&self) -> Self::Value;
    fn set(&self, value: Self::Value);
}

impl<R: Reactive + ?Sized> Reactive for Rc<R> {
    type Value = R::Value;

    fn get(&self) -> Self::Value {
        (**self).get()
    }
    fn get_untracked(&self) -> Self::Value {
        (**self).get_untracked()
    }
    fn set(&self, value: Self::Value) {
        (**self).set(value)
    }
}

/// Observable single-value container.
pub struct Signal<T: 'static>(Rc<Inner<T>>);

struct Inner<T> {
    value: RefCell<T>,
    dep: Dep,
    // None: every write notifies
    equals: Option<fn(&T, &T) -> bool>,
}

pub type Subscription = Effect;

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: fmt::Debug> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Signal").field(&*self.0.value.borrow()).finish()
    }
}

impl<T: 'static> Signal<T> {
    /// A signal whose writes are skipped when equal to the current value.
    pub fn new(value: T) -> Self
    where
        T: PartialEq,
    {
        Self::build(value, Some(<T as PartialEq>::eq))
    }

    /// A signal that notifies on every write. Works for any `T`.
    pub fn always_notify(value: T) -> Self {
        Self::build(value, None)
    }

    fn build(value: T, equals: Option<fn(&T, &T) -> bool>) -> Self {
        Self(Rc::new(Inner {
            value: RefCell::new(value),
            dep: Dep::new(),
            equals,
        }))
    }

    /// Borrow the value. `f` must not write to this signal; use
    /// [`get`](Self::get) when it might.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.0.dep.track();
        f(&self.0.value.borrow())
    }

    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.0.value.borrow())
    }

    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.with(T::clone)
    }

    pub fn get_untracked(&self) -> T
    where
        T: Clone,
    {
        self.with_untracked(T::clone)
    }

    /// Store `v`. Skipped when the signal compares values and `v` equals the
    /// current one.
    pub fn set(&self, v: T) {
        let unchanged = self
            .0
            .equals
            .is_some_and(|eq| eq(&self.0.value.borrow(), &v));
        if unchanged {
            return;
        }
        self.force_set(v);
    }

    /// Store `v` and notify dependents unconditionally.
    pub fn force_set(&self, v: T) {
        *self.0.value.borrow_mut() = v;
        self.0.dep.trigger();
    }

    pub fn update<F: FnOnce(&mut T)>(&self, f: F) {
        f(&mut self.0.value.borrow_mut());
        self.0.dep.trigger();
    }

    /// Call `f` with the new value after every change. Not called for the current value.
    ///
    /// `f` gets a copy, so it may write back to this signal.
    pub fn subscribe(&self, f: impl Fn(&T) + 'static) -> Subscription
    where
        T: Clone,
    {
        let weak = Rc::downgrade(&self.0);
        let primed = std::cell::Cell::new(false);
        watch_effect_labeled("subscribe", move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            inner.dep.track();
            if primed.replace(true) {
                let value = inner.value.borrow().clone();
                untrack(|| f(&value));
            }
        })
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.0.dep.subscriber_count()
    }
}

impl<T: Clone + 'static> Reactive for Signal<T> {
    type Value = T;

    fn get(&self) -> T {
        Signal::get(self)
    }
    fn get_untracked(&self) -> T {
        Signal::get_untracked(self)
    }
    fn set(&self, value: T) {
        Signal::set(self, value)
    }
}

pub fn signal<T: PartialEq>(t: T) -> Signal<T> {
    Signal::new(t)
}
