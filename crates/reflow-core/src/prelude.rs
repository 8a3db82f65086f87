pub use crate::custom::{CustomRef, CustomRefHandler, Track, Trigger, custom_ref, handler_fn};
pub use crate::derived::{
    DerivedReactive, MapPolicy, Projection, concat_map, switch_map, try_concat_map,
    try_switch_map,
};
pub use crate::effects::{Dispose, Effect, try_watch_effect, watch_effect, watch_effect_labeled};
pub use crate::error::{ReactiveError, clear_effect_error_handler, set_effect_error_handler};
pub use crate::reactive::{batch, untrack};
pub use crate::scope::{DisposerId, Scope, current_scope};
pub use crate::signal::{Reactive, Signal, Subscription, signal};
