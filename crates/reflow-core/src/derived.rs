//! Projection operators: `concat_map` and `switch_map`.
//!
//! A [`DerivedReactive`] re-runs a projection every time its source changes.
//! Each run (an observation step) does, strictly in this order:
//!
//! 1. take the cleanup registered by the previous run and invoke it;
//! 2. call `project(source.get(), &mut projection)` and install the returned
//!    reactive as the current projected reactive;
//! 3. trigger every dependent of the derived value, whether or not the
//!    projected value is equal to the previous one.
//!
//! Reads go through the current projected reactive. Writes are ignored.
//!
//! # Invariants
//!
//! 1. At most one projected reactive is installed; it belongs to the most
//!    recent run that completed.
//! 2. A cleanup runs exactly once, right before the next run projects, or never
//!    if the derived value is torn down first.
//! 3. Dependents are triggered only after the new projected reactive is
//!    installed.
//!
//! # Failure modes
//!
//! - **Projection returns `Err` or panics**: nothing is installed and no
//!   dependent is triggered. The previous projected reactive stays live and the
//!   failure goes to the effect error handler. A cleanup registered before an
//!   `Err` still runs before the next run.
//!
//! # Concat vs. switch
//!
//! Runs are synchronous and an observer is never re-entered, so there is never
//! an earlier run still in flight when a new one starts. Both policies share
//! one implementation; [`MapPolicy`] only names the operator in diagnostics.
use std::cell::RefCell;
use std::convert::Infallible;
use std::fmt;
use std::rc::Rc;

use crate::effects::{Dispose, Effect, watch_effect_labeled};
use crate::error::{BoxError, ReactiveError, report_effect_error};
use crate::reactive::Dep;
use crate::signal::Reactive;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MapPolicy {
    /// Every source value is projected, in order.
    #[default]
    Concat,
    /// A new source value supersedes the previous projection.
    Switch,
}

impl MapPolicy {
    pub fn label(self) -> &'static str {
        match self {
            MapPolicy::Concat => "concat_map",
            MapPolicy::Switch => "switch_map",
        }
    }
}

impl fmt::Display for MapPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-run context handed to the projection function.
#[derive(Debug)]
pub struct Projection {
    run: u64,
    cleanup: Option<Dispose>,
}

impl Projection {
    fn new(run: u64) -> Self {
        Self { run, cleanup: None }
    }

    /// 1-based index of the current run.
    pub fn run(&self) -> u64 {
        self.run
    }

    /// Register the cleanup for this run. Replaces (without invoking) any
    /// cleanup registered earlier in the same run.
    pub fn on_cleanup(&mut self, f: impl FnOnce() + 'static) {
        self.set_cleanup(Dispose::new(f));
    }

    pub fn set_cleanup(&mut self, cleanup: Dispose) {
        if self.cleanup.replace(cleanup).is_some() {
            log::trace!("run {}: cleanup replaced", self.run);
        }
    }

    pub fn clear_cleanup(&mut self) {
        self.cleanup = None;
    }
}

struct Slots<U> {
    projected: Option<Rc<dyn Reactive<Value = U>>>,
    cleanup: Option<Dispose>,
    runs: u64,
}

struct DerivedInner<U> {
    policy: MapPolicy,
    slots: Rc<RefCell<Slots<U>>>,
    dep: Rc<Dep>,
    effect: Effect,
}

/// Read-only reactive value produced by a projection operator.
///
/// Cloning creates a new handle to the same value. The projection stops when
/// the last handle is dropped, when [`dispose`](Self::dispose) is called, or
/// when the scope it was created in is disposed.
pub struct DerivedReactive<U> {
    inner: Rc<DerivedInner<U>>,
}

impl<U> Clone for DerivedReactive<U> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<U> fmt::Debug for DerivedReactive<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.inner.slots.borrow();
        f.debug_struct("DerivedReactive")
            .field("policy", &self.inner.policy)
            .field("runs", &slots.runs)
            .field("installed", &slots.projected.is_some())
            .field("cleanup_pending", &slots.cleanup.is_some())
            .finish()
    }
}

impl<U: 'static> DerivedReactive<U> {
    pub fn new<S, R, F>(source: S, policy: MapPolicy, mut project: F) -> Self
    where
        S: Reactive + 'static,
        R: Reactive<Value = U> + 'static,
        F: FnMut(S::Value, &mut Projection) -> R + 'static,
    {
        Self::build(source, policy, move |value, projection| {
            Ok::<_, Infallible>(project(value, projection))
        })
    }

    /// Build from a fallible projection.
    ///
    /// Fails with [`ReactiveError::Uninitialized`] when the first run installs
    /// nothing; the cause has already been reported to the effect error handler.
    pub fn try_new<S, R, E, F>(
        source: S,
        policy: MapPolicy,
        project: F,
    ) -> Result<Self, ReactiveError>
    where
        S: Reactive + 'static,
        R: Reactive<Value = U> + 'static,
        E: Into<BoxError>,
        F: FnMut(S::Value, &mut Projection) -> Result<R, E> + 'static,
    {
        let derived = Self::build(source, policy, project);
        if derived.is_initialized() {
            Ok(derived)
        } else {
            Err(ReactiveError::Uninitialized { policy })
        }
    }

    fn build<S, R, E, F>(source: S, policy: MapPolicy, mut project: F) -> Self
    where
        S: Reactive + 'static,
        R: Reactive<Value = U> + 'static,
        E: Into<BoxError>,
        F: FnMut(S::Value, &mut Projection) -> Result<R, E> + 'static,
    {
        let slots = Rc::new(RefCell::new(Slots {
            projected: None,
            cleanup: None,
            runs: 0,
        }));
        let dep = Rc::new(Dep::new());

        let effect = {
            let slots = slots.clone();
            let dep = dep.clone();
            watch_effect_labeled(policy.label(), move || {
                let previous = slots.borrow_mut().cleanup.take();
                if let Some(cleanup) = previous {
                    cleanup.run();
                }

                let run = {
                    let mut slots = slots.borrow_mut();
                    slots.runs += 1;
                    slots.runs
                };
                let mut projection = Projection::new(run);
                let result = project(source.get(), &mut projection);

                let mut guard = slots.borrow_mut();
                guard.cleanup = projection.cleanup.take();
                match result {
                    Ok(projected) => {
                        let replaced = guard.projected.replace(Rc::new(projected));
                        drop(guard);
                        drop(replaced);
                        log::trace!("{policy} run {run} installed");
                        dep.trigger();
                    }
                    Err(err) => {
                        drop(guard);
                        report_effect_error(ReactiveError::Projection {
                            policy,
                            source: err.into(),
                        });
                    }
                }
            })
        };

        log::debug!("{policy} created");
        Self {
            inner: Rc::new(DerivedInner {
                policy,
                slots,
                dep,
                effect,
            }),
        }
    }

    /// Current projected value, tracked.
    ///
    /// # Panics
    ///
    /// If no run has ever completed (the first projection failed).
    /// Use [`try_get`](Self::try_get) when that is possible.
    pub fn get(&self) -> U {
        match self.try_get() {
            Some(value) => value,
            None => panic!(
                "{} read before its first projection completed",
                self.inner.policy
            ),
        }
    }

    pub fn try_get(&self) -> Option<U> {
        self.inner.dep.track();
        let projected = self.inner.slots.borrow().projected.clone();
        projected.map(|p| p.get())
    }

    pub fn get_untracked(&self) -> U {
        crate::reactive::untrack(|| self.get())
    }

    /// Ignored. The value only ever changes through the source.
    pub fn set(&self, _value: U) {
        log::trace!("write to {} value ignored", self.inner.policy);
    }

    pub fn policy(&self) -> MapPolicy {
        self.inner.policy
    }

    /// Number of runs started so far, failed ones included.
    pub fn runs(&self) -> u64 {
        self.inner.slots.borrow().runs
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.slots.borrow().projected.is_some()
    }

    pub fn is_active(&self) -> bool {
        self.inner.effect.is_active()
    }

    pub fn dependent_count(&self) -> usize {
        self.inner.dep.subscriber_count()
    }

    /// Stop re-projecting. A pending cleanup is dropped without being invoked;
    /// the last projected value stays readable.
    pub fn dispose(&self) {
        self.inner.effect.stop();
        let pending = self.inner.slots.borrow_mut().cleanup.take();
        drop(pending);
        log::debug!("{} disposed", self.inner.policy);
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<U: 'static> Reactive for DerivedReactive<U> {
    type Value = U;

    fn get(&self) -> U {
        DerivedReactive::get(self)
    }
    fn get_untracked(&self) -> U {
        DerivedReactive::get_untracked(self)
    }
    fn set(&self, value: U) {
        DerivedReactive::set(self, value)
    }
}

/// Project every value of `source` through `project`.
///
/// ```
/// use reflow_core::*;
///
/// let count = signal(1);
/// let doubled = concat_map(count.clone(), |v, _| signal(v * 2));
/// assert_eq!(doubled.get(), 2);
/// count.set(5);
/// assert_eq!(doubled.get(), 10);
/// ```
pub fn concat_map<S, U, R, F>(source: S, project: F) -> DerivedReactive<U>
where
    S: Reactive + 'static,
    U: 'static,
    R: Reactive<Value = U> + 'static,
    F: FnMut(S::Value, &mut Projection) -> R + 'static,
{
    DerivedReactive::new(source, MapPolicy::Concat, project)
}

/// Project the latest value of `source`, superseding the previous projection.
pub fn switch_map<S, U, R, F>(source: S, project: F) -> DerivedReactive<U>
where
    S: Reactive + 'static,
    U: 'static,
    R: Reactive<Value = U> + 'static,
    F: FnMut(S::Value, &mut Projection) -> R + 'static,
{
    DerivedReactive::new(source, MapPolicy::Switch, project)
}

pub fn try_concat_map<S, U, R, E, F>(
    source: S,
    project: F,
) -> Result<DerivedReactive<U>, ReactiveError>
where
    S: Reactive + 'static,
    U: 'static,
    R: Reactive<Value = U> + 'static,
    E: Into<BoxError>,
    F: FnMut(S::Value, &mut Projection) -> Result<R, E> + 'static,
{
    DerivedReactive::try_new(source, MapPolicy::Concat, project)
}

pub fn try_switch_map<S, U, R, E, F>(
    source: S,
    project: F,
) -> Result<DerivedReactive<U>, ReactiveError>
where
    S: Reactive + 'static,
    U: 'static,
    R: Reactive<Value = U> + 'static,
    E: Into<BoxError>,
    F: FnMut(S::Value, &mut Projection) -> Result<R, E> + 'static,
{
    DerivedReactive::try_new(source, MapPolicy::Switch, project)
}
