//! The flow directive: binds a host event to a reactive value.
//!
//! `mounted` attaches a listener that applies the binding's modifiers to each
//! event and writes the result into the bound value. `updated` swaps that
//! listener for one built from the new binding (old one removed first, so an
//! event is never delivered twice). `unmounted` removes it.
//!
//! Per-binding state lives in the directive, keyed by element and by
//! [`BindingKey`], and is created, replaced, and erased by the three hooks.
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use reflow_core::Reactive;

use crate::dom::{ElementId, EventHost, Listener, ListenerId};
use crate::error::BindingError;
use crate::event::{DomEvent, Payload};
use crate::modifiers::{FlowModifiers, Modifiers};

pub type ReactiveTarget = Rc<dyn Reactive<Value = Payload>>;

/// What the host passes to each hook: the bound value, the event argument,
/// and the modifiers.
#[derive(Clone, Default)]
pub struct Binding {
    pub value: Option<ReactiveTarget>,
    pub arg: Option<String>,
    pub modifiers: Modifiers,
}

impl Binding {
    pub fn new(value: impl Reactive<Value = Payload> + 'static, event: impl Into<String>) -> Self {
        Self {
            value: Some(Rc::new(value)),
            arg: Some(event.into()),
            modifiers: Modifiers::empty(),
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// `None` without an event argument.
    pub fn key(&self) -> Option<BindingKey> {
        let event = self.arg.as_deref().filter(|a| !a.is_empty())?;
        Some(BindingKey::new(event, self.modifiers))
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("value", &self.value.as_ref().map(|_| "<reactive>"))
            .field("arg", &self.arg)
            .field("modifiers", &self.modifiers)
            .finish()
    }
}

/// Host metadata about the node the directive is used on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NodeInfo {
    pub is_component: bool,
}

impl NodeInfo {
    pub fn element() -> Self {
        Self {
            is_component: false,
        }
    }

    pub fn component() -> Self {
        Self { is_component: true }
    }
}

/// Identifies one binding among several on the same element.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BindingKey {
    pub event: String,
    pub modifiers: Modifiers,
}

impl BindingKey {
    pub fn new(event: impl Into<String>, modifiers: Modifiers) -> Self {
        Self {
            event: event.into(),
            modifiers,
        }
    }

    /// `event:modifier:...`, modifiers sorted.
    pub fn hash_string(&self) -> String {
        std::iter::once(self.event.as_str())
            .chain(self.modifiers.names().map(|n| n as &str))
            .collect::<Vec<_>>()
            .join(":")
    }
}

impl fmt::Display for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hash_string())
    }
}

struct BindingState {
    key: BindingKey,
    flow: FlowModifiers,
    listener: Option<ListenerId>,
}

pub struct FlowDirective<H: EventHost> {
    host: Rc<H>,
    states: RefCell<HashMap<ElementId, HashMap<BindingKey, BindingState>>>,
}

impl<H: EventHost> FlowDirective<H> {
    pub fn new(host: Rc<H>) -> Self {
        Self {
            host,
            states: RefCell::new(HashMap::new()),
        }
    }

    pub fn host(&self) -> &Rc<H> {
        &self.host
    }

    pub fn mounted(&self, el: ElementId, binding: &Binding, node: NodeInfo) {
        let (target, key) = match validate(binding) {
            Ok(v) => v,
            Err(err) => {
                log::warn!("{err}");
                return;
            }
        };
        log::debug!("flow `{key}` mounted on {el:?} ({node:?})");

        let flow = FlowModifiers::new(key.modifiers, node.is_component);
        let state = self.attach(el, key, flow, target);
        self.store(el, state);
    }

    /// Rebind after the host re-rendered. State left by a failed earlier hook
    /// is rebuilt from scratch.
    pub fn updated(&self, el: ElementId, old: &Binding, new: &Binding, node: NodeInfo) {
        let (target, key) = match validate(new) {
            Ok(v) => v,
            Err(err) => {
                log::warn!("{err}");
                // The old binding is gone from the template; its listener goes too.
                if let Some(prev) = old.key().and_then(|k| self.take(el, &k)) {
                    self.detach(el, &prev);
                }
                return;
            }
        };

        let previous = old.key().and_then(|k| self.take(el, &k));
        let flow = match previous {
            Some(prev) => {
                self.detach(el, &prev);
                if prev.key == key {
                    prev.flow
                } else {
                    FlowModifiers::new(key.modifiers, node.is_component)
                }
            }
            None => {
                log::debug!("flow `{key}` on {el:?} has no state; setting up from scratch");
                FlowModifiers::new(key.modifiers, node.is_component)
            }
        };

        let state = self.attach(el, key, flow, target);
        self.store(el, state);
    }

    pub fn unmounted(&self, el: ElementId, binding: &Binding, _node: NodeInfo) {
        // Nothing was stored if setup failed.
        let Some(state) = binding.key().and_then(|k| self.take(el, &k)) else {
            return;
        };
        self.detach(el, &state);
        log::debug!("flow `{}` unmounted from {el:?}", state.key);
    }

    pub fn is_bound(&self, el: ElementId, key: &BindingKey) -> bool {
        self.states
            .borrow()
            .get(&el)
            .is_some_and(|m| m.contains_key(key))
    }

    pub fn binding_count(&self, el: ElementId) -> usize {
        self.states.borrow().get(&el).map_or(0, HashMap::len)
    }

    fn attach(
        &self,
        el: ElementId,
        key: BindingKey,
        flow: FlowModifiers,
        target: ReactiveTarget,
    ) -> BindingState {
        let listener = if flow.is_native {
            let id = self
                .host
                .add_listener(el, &key.event, make_listener(flow, target));
            if id.is_none() {
                log::warn!("flow `{key}`: element {el:?} is not known to the host");
            }
            id
        } else {
            // TODO: route component-emitted events once hosts expose an emit channel.
            log::debug!("flow `{key}` on component {el:?}: component events are not routed");
            None
        };
        BindingState {
            key,
            flow,
            listener,
        }
    }

    fn detach(&self, el: ElementId, state: &BindingState) {
        if let Some(id) = state.listener {
            self.host.remove_listener(el, &state.key.event, id);
        }
    }

    fn store(&self, el: ElementId, state: BindingState) {
        let displaced = self
            .states
            .borrow_mut()
            .entry(el)
            .or_default()
            .insert(state.key.clone(), state);
        if let Some(displaced) = displaced {
            self.detach(el, &displaced);
        }
    }

    fn take(&self, el: ElementId, key: &BindingKey) -> Option<BindingState> {
        let mut states = self.states.borrow_mut();
        let per_element = states.get_mut(&el)?;
        let state = per_element.remove(key);
        if per_element.is_empty() {
            states.remove(&el);
        }
        state
    }
}

fn validate(binding: &Binding) -> Result<(ReactiveTarget, BindingKey), BindingError> {
    let Some(key) = binding.key() else {
        return Err(BindingError::MissingEvent);
    };
    let target = binding
        .value
        .clone()
        .ok_or_else(|| BindingError::InvalidTarget {
            key: key.hash_string(),
        })?;
    Ok((target, key))
}

fn make_listener(flow: FlowModifiers, target: ReactiveTarget) -> Listener {
    Rc::new(move |event: &DomEvent| {
        flow.modifiers.apply(event);
        let payload = if flow.use_extract {
            Payload::Value(event.target_value.clone().unwrap_or_default())
        } else {
            Payload::Event(event.clone())
        };
        target.set(payload);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Dom;
    use reflow_core::{concat_map, signal, watch_effect};
    use std::cell::Cell;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn setup() -> (Rc<Dom>, FlowDirective<Dom>, ElementId) {
        init_logger();
        let dom = Rc::new(Dom::new());
        let input = dom.create_element("input", None);
        (dom.clone(), FlowDirective::new(dom), input)
    }

    #[test]
    fn mounted_writes_event_into_value() {
        let (dom, flow, input) = setup();
        let value = signal(Payload::Empty);

        flow.mounted(input, &Binding::new(value.clone(), "click"), NodeInfo::element());
        assert_eq!(dom.listener_count(input, "click"), 1);

        dom.dispatch(input, "click");
        let event = value.get().as_event().cloned().expect("event payload");
        assert_eq!(event.name, "click");
        assert_eq!(event.target, input);
    }

    #[test]
    fn every_dispatch_notifies_dependents() {
        let (dom, flow, input) = setup();
        let value = signal(Payload::Empty);
        let runs = Rc::new(Cell::new(0));

        flow.mounted(input, &Binding::new(value.clone(), "click"), NodeInfo::element());
        let _effect = watch_effect({
            let value = value.clone();
            let runs = runs.clone();
            move || {
                value.get();
                runs.set(runs.get() + 1);
            }
        });

        for _ in 0..3 {
            dom.dispatch(input, "click");
        }
        assert_eq!(runs.get(), 4);
    }

    #[test]
    fn unchanged_extracted_value_is_not_rewritten() {
        let (dom, flow, input) = setup();
        let value = signal(Payload::Empty);
        let runs = Rc::new(Cell::new(0));
        let binding = Binding::new(value.clone(), "input").with_modifiers(Modifiers::EXTRACT);

        flow.mounted(input, &binding, NodeInfo::element());
        let _effect = watch_effect({
            let value = value.clone();
            let runs = runs.clone();
            move || {
                value.get();
                runs.set(runs.get() + 1);
            }
        });

        dom.set_value(input, "same");
        dom.dispatch(input, "input");
        dom.dispatch(input, "input");
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn extract_writes_target_value() {
        let (dom, flow, input) = setup();
        let value = signal(Payload::Empty);
        let binding = Binding::new(value.clone(), "input")
            .with_modifiers(Modifiers::EXTRACT | Modifiers::STOP);

        flow.mounted(input, &binding, NodeInfo::element());
        dom.set_value(input, "hello");
        let outcome = dom.dispatch(input, "input");

        assert_eq!(value.get(), Payload::Value("hello".into()));
        assert!(outcome.propagation_stopped);
        assert!(!outcome.default_prevented);
    }

    #[test]
    fn prevent_modifier_marks_event() {
        let (dom, flow, input) = setup();
        let value = signal(Payload::Empty);
        let binding =
            Binding::new(value.clone(), "submit").with_modifiers(Modifiers::PREVENT);

        flow.mounted(input, &binding, NodeInfo::element());
        let outcome = dom.dispatch(input, "submit");

        assert!(outcome.default_prevented);
        assert!(value.get().as_event().unwrap().is_default_prevented());
    }

    #[test]
    fn invalid_bindings_attach_nothing() {
        let (dom, flow, input) = setup();

        let missing_value = Binding {
            value: None,
            arg: Some("click".into()),
            modifiers: Modifiers::empty(),
        };
        flow.mounted(input, &missing_value, NodeInfo::element());

        let missing_event = Binding {
            arg: None,
            ..Binding::new(signal(Payload::Empty), "ignored")
        };
        flow.mounted(input, &missing_event, NodeInfo::element());

        assert_eq!(dom.listener_count(input, "click"), 0);
        assert_eq!(flow.binding_count(input), 0);
        assert!(matches!(validate(&missing_value), Err(BindingError::InvalidTarget { key }) if key == "click"));
        assert_eq!(validate(&missing_event).err(), Some(BindingError::MissingEvent));
    }

    #[test]
    fn updated_swaps_target_without_double_delivery() {
        let (dom, flow, input) = setup();
        let first = signal(Payload::Empty);
        let second = signal(Payload::Empty);
        let old = Binding::new(first.clone(), "input").with_modifiers(Modifiers::EXTRACT);
        let new = Binding::new(second.clone(), "input").with_modifiers(Modifiers::EXTRACT);

        flow.mounted(input, &old, NodeInfo::element());
        flow.updated(input, &old, &new, NodeInfo::element());
        assert_eq!(dom.listener_count(input, "input"), 1);

        dom.set_value(input, "x");
        let outcome = dom.dispatch(input, "input");
        assert_eq!(outcome.delivered, 1);
        assert!(first.get().is_empty());
        assert_eq!(second.get().as_value(), Some("x"));
    }

    #[test]
    fn updated_moves_listener_to_new_event() {
        let (dom, flow, input) = setup();
        let value = signal(Payload::Empty);
        let old = Binding::new(value.clone(), "click");
        let new = Binding::new(value.clone(), "dblclick").with_modifiers(Modifiers::STOP);

        flow.mounted(input, &old, NodeInfo::element());
        flow.updated(input, &old, &new, NodeInfo::element());

        assert_eq!(dom.listener_count(input, "click"), 0);
        assert_eq!(dom.listener_count(input, "dblclick"), 1);
        assert!(!flow.is_bound(input, &old.key().unwrap()));
        assert!(flow.is_bound(input, &BindingKey::new("dblclick", Modifiers::STOP)));
    }

    #[test]
    fn updated_after_failed_mount_sets_up_from_scratch() {
        let (dom, flow, input) = setup();
        let value = signal(Payload::Empty);
        let broken = Binding {
            value: None,
            ..Binding::new(value.clone(), "click")
        };
        let fixed = Binding::new(value.clone(), "click");

        flow.mounted(input, &broken, NodeInfo::element());
        flow.updated(input, &broken, &fixed, NodeInfo::element());

        dom.dispatch(input, "click");
        assert!(value.get().as_event().is_some());
    }

    #[test]
    fn invalid_update_detaches_old_listener() {
        let (dom, flow, input) = setup();
        let first = signal(Payload::Empty);
        let second = signal(Payload::Empty);
        let mounted = Binding::new(first.clone(), "click");
        let no_event = Binding {
            arg: None,
            ..Binding::new(first.clone(), "click")
        };
        let rebound = Binding::new(second.clone(), "dblclick");

        flow.mounted(input, &mounted, NodeInfo::element());
        flow.updated(input, &mounted, &no_event, NodeInfo::element());
        assert_eq!(dom.listener_count(input, "click"), 0);
        assert_eq!(flow.binding_count(input), 0);

        flow.updated(input, &no_event, &rebound, NodeInfo::element());
        flow.unmounted(input, &rebound, NodeInfo::element());
        assert_eq!(dom.listener_count(input, "click"), 0);
        assert_eq!(dom.listener_count(input, "dblclick"), 0);

        dom.dispatch(input, "click");
        assert!(first.get().is_empty());
        assert!(second.get().is_empty());
    }

    #[test]
    fn unmounted_removes_listener_and_state() {
        let (dom, flow, input) = setup();
        let value = signal(Payload::Empty);
        let binding = Binding::new(value.clone(), "click");

        flow.mounted(input, &binding, NodeInfo::element());
        flow.unmounted(input, &binding, NodeInfo::element());
        assert_eq!(dom.listener_count(input, "click"), 0);
        assert_eq!(flow.binding_count(input), 0);

        // second unmount is a no-op
        flow.unmounted(input, &binding, NodeInfo::element());
        dom.dispatch(input, "click");
        assert!(value.get().is_empty());
    }

    #[test]
    fn component_without_native_attaches_nothing() {
        let (dom, flow, input) = setup();
        let value = signal(Payload::Empty);
        let binding = Binding::new(value.clone(), "change");

        flow.mounted(input, &binding, NodeInfo::component());
        assert_eq!(dom.listener_count(input, "change"), 0);
        assert_eq!(flow.binding_count(input), 1);

        let native = Binding::new(value.clone(), "change").with_modifiers(Modifiers::NATIVE);
        flow.mounted(input, &native, NodeInfo::component());
        assert_eq!(dom.listener_count(input, "change"), 1);
    }

    #[test]
    fn several_bindings_on_one_element() {
        let (dom, flow, input) = setup();
        let clicks = signal(Payload::Empty);
        let text = signal(Payload::Empty);
        let click = Binding::new(clicks.clone(), "click");
        let typed = Binding::new(text.clone(), "click").with_modifiers(Modifiers::EXTRACT);

        flow.mounted(input, &click, NodeInfo::element());
        flow.mounted(input, &typed, NodeInfo::element());
        assert_eq!(flow.binding_count(input), 2);

        dom.set_value(input, "v");
        assert_eq!(dom.dispatch(input, "click").delivered, 2);
        assert!(clicks.get().as_event().is_some());
        assert_eq!(text.get().as_value(), Some("v"));

        flow.unmounted(input, &click, NodeInfo::element());
        assert_eq!(dom.listener_count(input, "click"), 1);
    }

    #[test]
    fn remount_with_same_key_replaces_listener() {
        let (dom, flow, input) = setup();
        let value = signal(Payload::Empty);
        let binding = Binding::new(value, "click");

        flow.mounted(input, &binding, NodeInfo::element());
        flow.mounted(input, &binding, NodeInfo::element());
        assert_eq!(dom.listener_count(input, "click"), 1);
    }

    #[test]
    fn writes_trigger_effects_and_ignore_derived_targets() {
        let (dom, flow, input) = setup();
        let value = signal(Payload::Empty);
        let length = concat_map(value.clone(), |p, _| {
            signal(p.as_value().map_or(0, str::len))
        });
        let seen = Rc::new(Cell::new(0));
        let _effect = watch_effect({
            let (length, seen) = (length.clone(), seen.clone());
            move || seen.set(length.get())
        });

        let binding = Binding::new(value, "input").with_modifiers(Modifiers::EXTRACT);
        flow.mounted(input, &binding, NodeInfo::element());
        dom.set_value(input, "reflow");
        dom.dispatch(input, "input");
        assert_eq!(seen.get(), 6);

        // a derived value accepts the write and ignores it
        let echo = concat_map(signal(1), |_, _| signal(Payload::Empty));
        let ignored = Binding::new(echo.clone(), "change").with_modifiers(Modifiers::EXTRACT);
        flow.mounted(input, &ignored, NodeInfo::element());
        dom.dispatch(input, "change");
        assert!(echo.get().is_empty());
    }

    #[test]
    fn binding_key_hash_string() {
        let key = BindingKey::new("click", Modifiers::STOP | Modifiers::PREVENT);
        assert_eq!(key.hash_string(), "click:prevent:stop");
        assert_eq!(BindingKey::new("input", Modifiers::empty()).to_string(), "input");
    }
}
