use thiserror::Error;

/// Reasons a flow binding is not set up. Reported as warnings; never returned
/// to the host.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BindingError {
    #[error("invalid value in flow binding `{key}`: expected a reactive value")]
    InvalidTarget { key: String },
    #[error("missing event argument in flow binding; the directive must be used with an event")]
    MissingEvent,
}
