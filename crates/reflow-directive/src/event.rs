use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::dom::ElementId;

static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// An event travelling from its target up through the target's ancestors.
///
/// Listeners receive it by reference; `stop_propagation` and
/// `prevent_default` flip interior flags that the dispatcher reads back.
///
/// Every event created with [`DomEvent::new`] gets a fresh sequence number,
/// so two clicks on the same element never compare equal. Clones share it.
#[derive(Clone, Debug, PartialEq)]
pub struct DomEvent {
    sequence: u64,
    pub name: String,
    pub target: ElementId,
    /// Value of the target element when the event was created (`input.value`).
    pub target_value: Option<String>,
    propagation_stopped: Cell<bool>,
    default_prevented: Cell<bool>,
}

impl DomEvent {
    pub fn new(name: impl Into<String>, target: ElementId, target_value: Option<String>) -> Self {
        Self {
            sequence: NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            target,
            target_value,
            propagation_stopped: Cell::new(false),
            default_prevented: Cell::new(false),
        }
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }

    pub fn prevent_default(&self) {
        self.default_prevented.set(true);
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped.get()
    }

    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented.get()
    }
}

/// What a flow listener writes into its bound reactive value.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Payload {
    /// Nothing delivered yet.
    #[default]
    Empty,
    Event(DomEvent),
    /// The target's value, written when the `extract` modifier applies.
    Value(String),
}

impl Payload {
    pub fn as_value(&self) -> Option<&str> {
        match self {
            Payload::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_event(&self) -> Option<&DomEvent> {
        match self {
            Payload::Event(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Payload::Empty)
    }
}

/// Result of dispatching one event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Listeners invoked, across the target and its ancestors.
    pub delivered: usize,
    pub default_prevented: bool,
    pub propagation_stopped: bool,
}
