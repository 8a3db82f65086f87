//! In-memory event host: an element tree with per-element listener lists.
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;

use crate::event::{DispatchOutcome, DomEvent};

new_key_type! {
    /// Opaque handle to an element of an [`EventHost`].
    pub struct ElementId;
    pub struct ListenerId;
}

pub type Listener = Rc<dyn Fn(&DomEvent)>;

/// Where a directive attaches its listeners.
pub trait EventHost {
    /// Returns `None` when `el` does not exist.
    fn add_listener(&self, el: ElementId, event: &str, listener: Listener) -> Option<ListenerId>;
    /// Returns whether a listener was removed.
    fn remove_listener(&self, el: ElementId, event: &str, id: ListenerId) -> bool;
}

struct ElementNode {
    tag: String,
    parent: Option<ElementId>,
    value: Option<String>,
    listeners: HashMap<String, SmallVec<[ListenerId; 2]>>,
}

#[derive(Default)]
struct DomInner {
    elements: SlotMap<ElementId, ElementNode>,
    listeners: SlotMap<ListenerId, Listener>,
}

#[derive(Default)]
pub struct Dom {
    inner: RefCell<DomInner>,
}

impl Dom {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_element(&self, tag: impl Into<String>, parent: Option<ElementId>) -> ElementId {
        self.inner.borrow_mut().elements.insert(ElementNode {
            tag: tag.into(),
            parent,
            value: None,
            listeners: HashMap::new(),
        })
    }

    /// Remove `el` and every listener attached to it. Children keep a dangling
    /// parent and stop bubbling there.
    pub fn remove_element(&self, el: ElementId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let Some(node) = inner.elements.remove(el) else {
            return false;
        };
        let removed: Vec<Listener> = node
            .listeners
            .into_values()
            .flatten()
            .filter_map(|id| inner.listeners.remove(id))
            .collect();
        drop(inner);
        drop(removed);
        true
    }

    pub fn contains(&self, el: ElementId) -> bool {
        self.inner.borrow().elements.contains_key(el)
    }

    pub fn tag(&self, el: ElementId) -> Option<String> {
        self.inner.borrow().elements.get(el).map(|n| n.tag.clone())
    }

    pub fn set_value(&self, el: ElementId, value: impl Into<String>) {
        if let Some(node) = self.inner.borrow_mut().elements.get_mut(el) {
            node.value = Some(value.into());
        }
    }

    pub fn value(&self, el: ElementId) -> Option<String> {
        self.inner.borrow().elements.get(el)?.value.clone()
    }

    pub fn listener_count(&self, el: ElementId, event: &str) -> usize {
        self.inner
            .borrow()
            .elements
            .get(el)
            .and_then(|n| n.listeners.get(event))
            .map_or(0, SmallVec::len)
    }

    /// Deliver `event` to `target`, then to each ancestor until a listener
    /// stops propagation.
    pub fn dispatch(&self, target: ElementId, event: &str) -> DispatchOutcome {
        let ev = DomEvent::new(event, target, self.value(target));
        let mut outcome = DispatchOutcome::default();
        let mut current = Some(target);

        while let Some(el) = current {
            // Cloned out so listeners may add, remove, or dispatch.
            let (listeners, parent) = {
                let inner = self.inner.borrow();
                let Some(node) = inner.elements.get(el) else {
                    break;
                };
                let listeners: SmallVec<[Listener; 4]> = node
                    .listeners
                    .get(event)
                    .into_iter()
                    .flatten()
                    .filter_map(|id| inner.listeners.get(*id).cloned())
                    .collect();
                (listeners, node.parent)
            };

            for listener in listeners {
                listener(&ev);
                outcome.delivered += 1;
            }
            if ev.is_propagation_stopped() {
                break;
            }
            current = parent;
        }

        outcome.default_prevented = ev.is_default_prevented();
        outcome.propagation_stopped = ev.is_propagation_stopped();
        log::trace!("dispatched `{event}` to {target:?}: {outcome:?}");
        outcome
    }
}

impl EventHost for Dom {
    fn add_listener(&self, el: ElementId, event: &str, listener: Listener) -> Option<ListenerId> {
        let mut inner = self.inner.borrow_mut();
        if !inner.elements.contains_key(el) {
            return None;
        }
        let id = inner.listeners.insert(listener);
        inner
            .elements
            .get_mut(el)?
            .listeners
            .entry(event.to_string())
            .or_default()
            .push(id);
        Some(id)
    }

    fn remove_listener(&self, el: ElementId, event: &str, id: ListenerId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let Some(list) = inner
            .elements
            .get_mut(el)
            .and_then(|n| n.listeners.get_mut(event))
        else {
            return false;
        };
        let before = list.len();
        list.retain(|l| *l != id);
        let removed = list.len() != before;
        if list.is_empty()
            && let Some(node) = inner.elements.get_mut(el)
        {
            node.listeners.remove(event);
        }
        let listener = if removed {
            inner.listeners.remove(id)
        } else {
            None
        };
        drop(inner);
        drop(listener);
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn counter(hits: &Rc<Cell<usize>>) -> Listener {
        let hits = hits.clone();
        Rc::new(move |_: &DomEvent| hits.set(hits.get() + 1))
    }

    #[test]
    fn dispatch_bubbles_to_ancestors() {
        let dom = Dom::new();
        let form = dom.create_element("form", None);
        let input = dom.create_element("input", Some(form));
        let hits = Rc::new(Cell::new(0));

        dom.add_listener(input, "click", counter(&hits));
        dom.add_listener(form, "click", counter(&hits));

        let outcome = dom.dispatch(input, "click");
        assert_eq!(outcome.delivered, 2);
        assert_eq!(hits.get(), 2);
        assert!(!outcome.propagation_stopped);
    }

    #[test]
    fn stop_propagation_keeps_event_at_target() {
        let dom = Dom::new();
        let form = dom.create_element("form", None);
        let input = dom.create_element("input", Some(form));
        let hits = Rc::new(Cell::new(0));

        dom.add_listener(input, "click", Rc::new(|e: &DomEvent| e.stop_propagation()));
        dom.add_listener(form, "click", counter(&hits));

        let outcome = dom.dispatch(input, "click");
        assert!(outcome.propagation_stopped);
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn removed_listener_is_not_called() {
        let dom = Dom::new();
        let button = dom.create_element("button", None);
        let hits = Rc::new(Cell::new(0));

        let id = dom.add_listener(button, "click", counter(&hits)).unwrap();
        assert!(dom.remove_listener(button, "click", id));
        assert!(!dom.remove_listener(button, "click", id));

        dom.dispatch(button, "click");
        assert_eq!(hits.get(), 0);
        assert_eq!(dom.listener_count(button, "click"), 0);
    }

    #[test]
    fn unknown_element_rejects_listener() {
        let dom = Dom::new();
        let el = dom.create_element("div", None);
        assert!(dom.remove_element(el));
        assert!(dom.add_listener(el, "click", Rc::new(|_: &DomEvent| {})).is_none());
    }

    #[test]
    fn listener_may_remove_itself_during_dispatch() {
        let dom = Rc::new(Dom::new());
        let button = dom.create_element("button", None);
        let slot: Rc<Cell<Option<ListenerId>>> = Rc::new(Cell::new(None));

        let id = dom
            .add_listener(button, "click", {
                let dom = Rc::downgrade(&dom);
                let slot = slot.clone();
                Rc::new(move |_: &DomEvent| {
                    if let (Some(dom), Some(id)) = (dom.upgrade(), slot.get()) {
                        dom.remove_listener(button, "click", id);
                    }
                })
            })
            .unwrap();
        slot.set(Some(id));

        assert_eq!(dom.dispatch(button, "click").delivered, 1);
        assert_eq!(dom.dispatch(button, "click").delivered, 0);
    }
}
