//! Reactive values with user-controlled reads and writes.
//!
//! [`custom_ref`] hands the factory a [`Track`] and a [`Trigger`] bound to a
//! fresh dependency node. The handler decides when reads register dependents
//! and when writes notify them, which is what lets a value ignore writes or
//! notify without its stored value changing.
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::reactive::{Dep, untrack};
use crate::signal::Reactive;

/// Read/write behaviour behind a [`CustomRef`].
pub trait CustomRefHandler<T> {
    fn get(&self) -> T;
    fn set(&self, value: T);
}

/// Registers the running observer on the ref's node.
#[derive(Clone)]
pub struct Track(Rc<Dep>);

impl Track {
    pub fn track(&self) {
        self.0.track();
    }
}

/// Notifies every dependent of the ref's node.
#[derive(Clone)]
pub struct Trigger(Rc<Dep>);

impl Trigger {
    pub fn trigger(&self) {
        self.0.trigger();
    }

    pub fn dependent_count(&self) -> usize {
        self.0.subscriber_count()
    }
}

impl fmt::Debug for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Trigger").field(&self.0.id()).finish()
    }
}

pub struct CustomRef<T> {
    handler: Rc<dyn CustomRefHandler<T>>,
    dep: Rc<Dep>,
}

impl<T> Clone for CustomRef<T> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
            dep: self.dep.clone(),
        }
    }
}

impl<T> fmt::Debug for CustomRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomRef")
            .field("node", &self.dep.id())
            .finish_non_exhaustive()
    }
}

impl<T: 'static> Reactive for CustomRef<T> {
    type Value = T;

    fn get(&self) -> T {
        self.handler.get()
    }

    fn get_untracked(&self) -> T {
        untrack(|| self.handler.get())
    }

    fn set(&self, value: T) {
        self.handler.set(value)
    }
}

pub fn custom_ref<T, H>(factory: impl FnOnce(Track, Trigger) -> H) -> CustomRef<T>
where
    H: CustomRefHandler<T> + 'static,
{
    let dep = Rc::new(Dep::new());
    let handler = factory(Track(dep.clone()), Trigger(dep.clone()));
    CustomRef {
        handler: Rc::new(handler),
        dep,
    }
}

/// Closure pair usable as a [`CustomRefHandler`].
pub struct FnHandler<T, G, S> {
    get: G,
    set: S,
    _value: PhantomData<fn(T) -> T>,
}

pub fn handler_fn<T, G, S>(get: G, set: S) -> FnHandler<T, G, S>
where
    G: Fn() -> T,
    S: Fn(T),
{
    FnHandler {
        get,
        set,
        _value: PhantomData,
    }
}

impl<T, G, S> CustomRefHandler<T> for FnHandler<T, G, S>
where
    G: Fn() -> T,
    S: Fn(T),
{
    fn get(&self) -> T {
        (self.get)()
    }

    fn set(&self, value: T) {
        (self.set)(value)
    }
}
