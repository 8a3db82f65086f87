use std::cell::RefCell;
use std::rc::Rc;

use thiserror::Error;

use crate::derived::MapPolicy;

pub type BoxError = Box<dyn std::error::Error + 'static>;

/// Failures raised while an observer runs. None of these reach the writer that
/// caused the run; they are handed to the effect error handler instead.
#[derive(Debug, Error)]
pub enum ReactiveError {
    #[error("{policy} projection failed: {source}")]
    Projection {
        policy: MapPolicy,
        #[source]
        source: BoxError,
    },
    #[error("{policy} value has no projection; its first run did not complete")]
    Uninitialized { policy: MapPolicy },
    #[error("effect `{label}` failed: {source}")]
    Effect {
        label: &'static str,
        #[source]
        source: BoxError,
    },
    #[error("observer `{label}` panicked: {message}")]
    Panicked { label: &'static str, message: String },
    #[error("flush aborted after {limit} observer runs; an effect keeps re-triggering")]
    FlushLimit { limit: usize },
}

type Handler = Rc<dyn Fn(&ReactiveError)>;

thread_local! {
    static ERROR_HANDLER: RefCell<Option<Handler>> = const { RefCell::new(None) };
}

/// Install the handler that receives effect and projection failures on this thread.
///
/// Without a handler, failures are logged at error level.
pub fn set_effect_error_handler(handler: impl Fn(&ReactiveError) + 'static) {
    ERROR_HANDLER.with(|h| *h.borrow_mut() = Some(Rc::new(handler)));
}

/// Remove the installed handler, falling back to logging.
pub fn clear_effect_error_handler() {
    ERROR_HANDLER.with(|h| *h.borrow_mut() = None);
}

pub fn report_effect_error(err: ReactiveError) {
    let handler = ERROR_HANDLER
        .try_with(|h| h.borrow().clone())
        .ok()
        .flatten();
    match handler {
        Some(handler) => handler(&err),
        None => log::error!("{err}"),
    }
}
