//! Dependency graph shared by every reactive value on the current thread.
//!
//! Reactive values own a [`Dep`] node. Reading a value while an observer runs
//! records an edge `node -> observer` ([`track`]); writing it queues every
//! observer on that edge set ([`trigger`]). Queued observers are flushed in
//! FIFO order before the write returns, unless a [`batch`] is open or a flush
//! is already running further up the stack.
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;

use crate::error::{ReactiveError, report_effect_error};

new_key_type! {
    /// A trackable node (the dependency side of an edge).
    pub struct NodeId;
    /// A computation that re-runs when a node it read is triggered.
    pub struct ObserverId;
}

const DEFAULT_MAX_ITERATIONS: usize = 10_000;

/// Runtime knobs for the flush loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlushConfig {
    /// Observer runs allowed in one flush before it is aborted.
    pub max_iterations: usize,
}

impl Default for FlushConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

thread_local! {
    static CURRENT_OBSERVER: Cell<Option<ObserverId>> = const { Cell::new(None) };
    static CONFIG: Cell<FlushConfig> = const {
        Cell::new(FlushConfig {
            max_iterations: DEFAULT_MAX_ITERATIONS,
        })
    };
    static GRAPH: RefCell<DepGraph> = RefCell::new(DepGraph::default());
}

#[derive(Default)]
struct DepNode {
    subscribers: SmallVec<[ObserverId; 4]>,
}

struct ObserverNode {
    label: &'static str,
    run: Rc<dyn Fn()>,
    deps: SmallVec<[NodeId; 4]>,
    queued: bool,
}

#[derive(Default)]
struct DepGraph {
    nodes: SlotMap<NodeId, DepNode>,
    observers: SlotMap<ObserverId, ObserverNode>,
    queue: VecDeque<ObserverId>,
    // stack: observers may start other observers (effects created inside effects)
    running: SmallVec<[ObserverId; 8]>,
    flushing: bool,
    batch_depth: usize,
}

impl DepGraph {
    fn clear_deps(&mut self, obs: ObserverId) {
        let Some(observer) = self.observers.get_mut(obs) else {
            return;
        };
        for node in std::mem::take(&mut observer.deps) {
            if let Some(node) = self.nodes.get_mut(node) {
                node.subscribers.retain(|s| *s != obs);
            }
        }
    }

    fn enqueue(&mut self, obs: ObserverId) {
        if self.running.contains(&obs) {
            return;
        }
        if let Some(observer) = self.observers.get_mut(obs)
            && !observer.queued
        {
            observer.queued = true;
            self.queue.push_back(obs);
        }
    }

    fn pop_queued(&mut self) -> Option<ObserverId> {
        let obs = self.queue.pop_front()?;
        if let Some(observer) = self.observers.get_mut(obs) {
            observer.queued = false;
        }
        Some(obs)
    }

    fn should_flush(&self) -> bool {
        !self.flushing && self.batch_depth == 0 && !self.queue.is_empty()
    }
}

/// Replace the flush configuration for this thread.
pub fn set_flush_config(config: FlushConfig) {
    CONFIG.with(|c| c.set(config));
}

pub fn flush_config() -> FlushConfig {
    CONFIG.with(Cell::get)
}

/// Owned dependency node. Removed from the graph on drop.
#[derive(Debug)]
pub struct Dep {
    id: NodeId,
}

impl Dep {
    pub fn new() -> Self {
        let id = GRAPH.with(|g| g.borrow_mut().nodes.insert(DepNode::default()));
        Self { id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn track(&self) {
        track(self.id);
    }

    pub fn trigger(&self) {
        trigger(self.id);
    }

    pub fn subscriber_count(&self) -> usize {
        GRAPH.with(|g| {
            g.borrow()
                .nodes
                .get(self.id)
                .map_or(0, |n| n.subscribers.len())
        })
    }
}

impl Default for Dep {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Dep {
    fn drop(&mut self) {
        // The graph may already be gone during thread teardown.
        let _ = GRAPH.try_with(|g| {
            let mut g = g.borrow_mut();
            if let Some(node) = g.nodes.remove(self.id) {
                for obs in node.subscribers {
                    if let Some(observer) = g.observers.get_mut(obs) {
                        observer.deps.retain(|d| *d != self.id);
                    }
                }
            }
        });
    }
}

/// Record that the running observer (if any) read `node`.
pub fn track(node: NodeId) {
    let Some(obs) = current_observer() else {
        return;
    };
    GRAPH.with(|g| {
        let mut g = g.borrow_mut();
        let g = &mut *g;
        let (Some(dep), Some(observer)) = (g.nodes.get_mut(node), g.observers.get_mut(obs)) else {
            return;
        };
        if !dep.subscribers.contains(&obs) {
            dep.subscribers.push(obs);
            observer.deps.push(node);
        }
    });
}

/// Queue every observer of `node`, then flush unless a flush or batch is in progress.
pub fn trigger(node: NodeId) {
    let flush_now = GRAPH.with(|g| {
        let mut g = g.borrow_mut();
        let Some(dep) = g.nodes.get(node) else {
            return false;
        };
        let subscribers = dep.subscribers.clone();
        for obs in subscribers {
            g.enqueue(obs);
        }
        g.should_flush()
    });
    if flush_now {
        flush();
    }
}

fn flush() {
    let limit = flush_config().max_iterations;
    GRAPH.with(|g| g.borrow_mut().flushing = true);
    let mut runs = 0usize;
    while let Some(obs) = GRAPH.with(|g| g.borrow_mut().pop_queued()) {
        runs += 1;
        if runs > limit {
            GRAPH.with(|g| {
                let mut g = g.borrow_mut();
                while g.pop_queued().is_some() {}
            });
            report_effect_error(ReactiveError::FlushLimit { limit });
            break;
        }
        run_observer(obs);
    }
    GRAPH.with(|g| g.borrow_mut().flushing = false);
}

/// Register a new observer. It does not run until [`run_observer_now`] or a trigger.
pub fn new_observer(label: &'static str, f: impl Fn() + 'static) -> ObserverId {
    GRAPH.with(|g| {
        g.borrow_mut().observers.insert(ObserverNode {
            label,
            run: Rc::new(f),
            deps: SmallVec::new(),
            queued: false,
        })
    })
}

/// Remove an observer and all of its dependency edges.
pub fn remove_observer(id: ObserverId) {
    let removed = GRAPH
        .try_with(|g| {
            let mut g = g.borrow_mut();
            g.clear_deps(id);
            let removed = g.observers.remove(id);
            if removed.is_some() {
                g.queue.retain(|o| *o != id);
            }
            removed
        })
        .ok()
        .flatten();
    // Dropped outside the borrow: the closure may own nodes that unregister themselves.
    if let Some(observer) = removed {
        log::trace!("removed observer `{}` ({id:?})", observer.label);
        drop(observer);
    }
}

pub fn observer_exists(id: ObserverId) -> bool {
    GRAPH.with(|g| g.borrow().observers.contains_key(id))
}

pub fn observer_count() -> usize {
    GRAPH.with(|g| g.borrow().observers.len())
}

pub fn current_observer() -> Option<ObserverId> {
    CURRENT_OBSERVER.with(Cell::get)
}

/// Run an observer immediately under tracking, replacing its previous edges.
pub fn run_observer_now(id: ObserverId) {
    run_observer(id);
    let flush_now = GRAPH.with(|g| g.borrow().should_flush());
    if flush_now {
        flush();
    }
}

fn run_observer(obs: ObserverId) {
    let Some((label, run)) = GRAPH.with(|g| {
        let mut g = g.borrow_mut();
        if g.running.contains(&obs) {
            return None;
        }
        let (label, run) = g.observers.get(obs).map(|n| (n.label, n.run.clone()))?;
        g.clear_deps(obs);
        g.running.push(obs);
        Some((label, run))
    }) else {
        return;
    };

    let prev = CURRENT_OBSERVER.with(|c| c.replace(Some(obs)));
    let result = catch_unwind(AssertUnwindSafe(|| run()));
    CURRENT_OBSERVER.with(|c| c.set(prev));

    GRAPH.with(|g| {
        let mut g = g.borrow_mut();
        if let Some(pos) = g.running.iter().rposition(|o| *o == obs) {
            g.running.remove(pos);
        }
    });

    if let Err(payload) = result {
        let message = if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else {
            "unknown panic".to_string()
        };
        report_effect_error(ReactiveError::Panicked { label, message });
    }
}

/// Run `f` without recording any reads against the running observer.
pub fn untrack<R>(f: impl FnOnce() -> R) -> R {
    struct Restore(Option<ObserverId>);
    impl Drop for Restore {
        fn drop(&mut self) {
            CURRENT_OBSERVER.with(|c| c.set(self.0));
        }
    }
    let _restore = Restore(CURRENT_OBSERVER.with(|c| c.replace(None)));
    f()
}

/// Defer observer runs until `f` returns, so several writes cause one flush.
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    struct BatchGuard;
    impl Drop for BatchGuard {
        fn drop(&mut self) {
            let flush_now = GRAPH.with(|g| {
                let mut g = g.borrow_mut();
                g.batch_depth -= 1;
                g.should_flush()
            });
            if flush_now && !std::thread::panicking() {
                flush();
            }
        }
    }
    GRAPH.with(|g| g.borrow_mut().batch_depth += 1);
    let _guard = BatchGuard;
    f()
}
