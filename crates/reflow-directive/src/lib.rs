//! # Flow directive
//!
//! Writes host events into reactive values:
//!
//! ```rust
//! use reflow_core::signal;
//! use reflow_directive::*;
//! use std::rc::Rc;
//!
//! let dom = Rc::new(Dom::new());
//! let input = dom.create_element("input", None);
//! let text = signal(Payload::Empty);
//!
//! let flow = FlowDirective::new(dom.clone());
//! let binding = Binding::new(text.clone(), "input").with_modifiers(Modifiers::EXTRACT);
//! flow.mounted(input, &binding, NodeInfo::element());
//!
//! dom.set_value(input, "hello");
//! dom.dispatch(input, "input");
//! assert_eq!(text.get().as_value(), Some("hello"));
//! ```
//!
//! Supported modifiers: `stop`, `prevent`, `native`, `extract`. On component
//! nodes the listener is only attached with `native`; `extract` applies only
//! when the listener is native.

pub mod directive;
pub mod dom;
pub mod error;
pub mod event;
pub mod modifiers;

pub use directive::*;
pub use dom::*;
pub use error::*;
pub use event::*;
pub use modifiers::*;
