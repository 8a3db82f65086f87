use std::cell::RefCell;
use std::rc::{Rc, Weak};

use slotmap::{SlotMap, new_key_type};

new_key_type! {
    /// A disposer registered with [`Scope::add_disposer`].
    pub struct DisposerId;
}

thread_local! {
    static CURRENT_SCOPE: RefCell<Option<Weak<ScopeInner>>> = const { RefCell::new(None) };
}

/// Owner of teardown work. Effects and derived values created while a scope
/// is current are stopped when the scope is disposed, or when its last handle
/// is dropped.
#[derive(Clone, Default)]
pub struct Scope {
    inner: Rc<ScopeInner>,
}

#[derive(Default)]
struct ScopeInner {
    disposers: RefCell<SlotMap<DisposerId, Box<dyn FnOnce()>>>,
    children: RefCell<Vec<Scope>>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with this scope current.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        struct Restore(Option<Weak<ScopeInner>>);
        impl Drop for Restore {
            fn drop(&mut self) {
                let prev = self.0.take();
                CURRENT_SCOPE.with(|current| *current.borrow_mut() = prev);
            }
        }

        let prev = CURRENT_SCOPE.with(|current| {
            current
                .borrow_mut()
                .replace(Rc::downgrade(&self.inner))
        });
        let _restore = Restore(prev);
        f()
    }

    pub fn add_disposer(&self, disposer: impl FnOnce() + 'static) -> DisposerId {
        self.inner.disposers.borrow_mut().insert(Box::new(disposer))
    }

    /// Forget a disposer without running it. `false` if it already ran or was removed.
    pub fn remove_disposer(&self, id: DisposerId) -> bool {
        self.inner.remove(id)
    }

    pub fn disposer_count(&self) -> usize {
        self.inner.disposers.borrow().len()
    }

    pub fn child(&self) -> Scope {
        let child = Scope::new();
        self.inner.children.borrow_mut().push(child.clone());
        child
    }

    /// Dispose children, then run this scope's disposers. Other handles to
    /// the scope stay valid and may register new work.
    pub fn dispose(self) {
        self.inner.teardown();
    }

    /// A registration that can be withdrawn without keeping the scope alive.
    pub(crate) fn entry(&self, disposer: impl FnOnce() + 'static) -> ScopeEntry {
        ScopeEntry {
            scope: Rc::downgrade(&self.inner),
            id: self.add_disposer(disposer),
        }
    }
}

impl ScopeInner {
    fn remove(&self, id: DisposerId) -> bool {
        let removed = self.disposers.borrow_mut().remove(id);
        removed.is_some()
    }

    // Both lists are drained before anything runs: disposers may touch the scope.
    fn teardown(&self) {
        let children = std::mem::take(&mut *self.children.borrow_mut());
        for child in children {
            child.dispose();
        }

        let disposers = std::mem::take(&mut *self.disposers.borrow_mut());
        for (_, disposer) in disposers {
            disposer();
        }
    }
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[derive(Debug)]
pub(crate) struct ScopeEntry {
    scope: Weak<ScopeInner>,
    id: DisposerId,
}

impl ScopeEntry {
    pub(crate) fn remove(self) {
        if let Some(inner) = self.scope.upgrade() {
            inner.remove(self.id);
        }
    }
}

pub fn current_scope() -> Option<Scope> {
    CURRENT_SCOPE
        .try_with(|current| {
            current
                .borrow()
                .as_ref()
                .and_then(|weak| weak.upgrade().map(|inner| Scope { inner }))
        })
        .ok()
        .flatten()
}
