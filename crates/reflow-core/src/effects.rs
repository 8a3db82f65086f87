use std::cell::Cell;
use std::fmt;

use crate::error::{BoxError, ReactiveError, report_effect_error};
use crate::reactive::{self, ObserverId};
use crate::scope::{ScopeEntry, current_scope};

/// A one-shot teardown callback. Calling [`run`](Self::run) more than once
/// is harmless; only the first call does anything.
pub struct Dispose(Cell<Option<Box<dyn FnOnce()>>>);

impl Dispose {
    pub fn new(f: impl FnOnce() + 'static) -> Self {
        Self(Cell::new(Some(Box::new(f))))
    }

    pub fn run(&self) {
        if let Some(f) = self.0.take() {
            f()
        }
    }

    pub fn is_pending(&self) -> bool {
        let f = self.0.take();
        let pending = f.is_some();
        self.0.set(f);
        pending
    }
}

impl fmt::Debug for Dispose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispose")
            .field("pending", &self.is_pending())
            .finish()
    }
}

/// Handle to a running effect. Dropping it stops the effect unless it was detached.
#[derive(Debug)]
pub struct Effect {
    id: ObserverId,
    scope: Option<ScopeEntry>,
    detached: bool,
}

impl Effect {
    pub fn id(&self) -> ObserverId {
        self.id
    }

    pub fn stop(&self) {
        reactive::remove_observer(self.id);
    }

    pub fn is_active(&self) -> bool {
        reactive::observer_exists(self.id)
    }

    /// Keep the effect alive after this handle is dropped. It still stops with
    /// its scope, if it was created inside one.
    pub fn detach(mut self) {
        self.detached = true;
    }
}

impl Drop for Effect {
    fn drop(&mut self) {
        if self.detached {
            return;
        }
        reactive::remove_observer(self.id);
        if let Some(entry) = self.scope.take() {
            entry.remove();
        }
    }
}

/// Run `f` now, and again every time a reactive value it read changes.
pub fn watch_effect(f: impl FnMut() + 'static) -> Effect {
    watch_effect_labeled("watch_effect", f)
}

/// Like [`watch_effect`], with a label used in diagnostics.
pub fn watch_effect_labeled(label: &'static str, f: impl FnMut() + 'static) -> Effect {
    let f = std::cell::RefCell::new(f);
    let id = reactive::new_observer(label, move || {
        // An observer is never re-entered, so this only fails if `f` panicked mid-borrow.
        if let Ok(mut f) = f.try_borrow_mut() {
            f()
        }
    });

    let scope = current_scope().map(|scope| scope.entry(move || reactive::remove_observer(id)));

    log::trace!("starting effect `{label}` ({id:?})");
    reactive::run_observer_now(id);
    Effect {
        id,
        scope,
        detached: false,
    }
}

/// Fallible [`watch_effect`]. Errors go to the effect error handler; the effect
/// keeps its dependencies and runs again on the next change.
pub fn try_watch_effect<E>(
    label: &'static str,
    mut f: impl FnMut() -> Result<(), E> + 'static,
) -> Effect
where
    E: Into<BoxError>,
{
    watch_effect_labeled(label, move || {
        if let Err(err) = f() {
            report_effect_error(ReactiveError::Effect {
                label,
                source: err.into(),
            });
        }
    })
}
