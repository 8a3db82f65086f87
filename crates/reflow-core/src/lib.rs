//! # Signals, Effects, and Projections
//!
//! Reflow is a small single-threaded reactive core. There are four pieces:
//!
//! - `Signal<T>`: observable, reactive value.
//! - `watch_effect`: a computation that re-runs when what it read changes.
//! - `custom_ref`: a reactive value whose reads and writes you control.
//! - `concat_map` / `switch_map`: derived values that re-run a projection on
//!   every change of a source.
//!
//! ## Signals
//!
//! `Signal<T>` is a cloneable handle to a piece of state:
//!
//! ```rust
//! use reflow_core::*;
//!
//! let count = signal(0);
//! count.set(1);
//! count.update(|v| *v += 1);
//! assert_eq!(count.get(), 2);
//! ```
//!
//! Reads participate in a dependency graph: when you call `get()` inside an
//! effect, later writes re-run that effect before the write returns. Setting a
//! value equal to the current one notifies nobody; use `force_set` to notify
//! anyway.
//!
//! ## Effects and scopes
//!
//! ```rust
//! use reflow_core::*;
//! use std::{cell::RefCell, rc::Rc};
//!
//! let name = signal("Jane".to_string());
//! let seen = Rc::new(RefCell::new(Vec::new()));
//!
//! let _effect = watch_effect({
//!     let name = name.clone();
//!     let seen = seen.clone();
//!     move || seen.borrow_mut().push(name.get())
//! });
//!
//! name.set("John".to_string());
//! assert_eq!(*seen.borrow(), ["Jane", "John"]);
//! ```
//!
//! The returned `Effect` stops the computation when dropped. Effects created
//! inside `Scope::run` are also stopped when the scope is disposed.
//!
//! ## Projections
//!
//! `concat_map(source, project)` calls `project(value, &mut projection)` now
//! and on every change of `source`, and reads through whatever reactive value
//! the latest call returned. The projection can register one cleanup with
//! `projection.on_cleanup(..)`; it runs right before the next call.
//!
//! ```rust
//! use reflow_core::*;
//!
//! let query = signal("rust".to_string());
//! let results = switch_map(query.clone(), |q, projection| {
//!     log::info!("searching {q}");
//!     projection.on_cleanup(move || log::info!("search superseded"));
//!     signal(q.len())
//! });
//!
//! assert_eq!(results.get(), 4);
//! query.set("reactive".to_string());
//! assert_eq!(results.get(), 8);
//! ```
//!
//! Derived values ignore writes. Failed projections (an `Err` from the
//! `try_*` variants, or a panic) leave the previous value in place and are
//! reported to the handler installed with `set_effect_error_handler`.

pub mod custom;
pub mod derived;
pub mod effects;
pub mod error;
pub mod prelude;
pub mod reactive;
pub mod scope;
pub mod signal;

pub use custom::*;
pub use derived::*;
pub use effects::*;
pub use error::*;
pub use prelude::*;
pub use reactive::{FlushConfig, batch, set_flush_config, untrack};
pub use scope::*;
pub use signal::*;
