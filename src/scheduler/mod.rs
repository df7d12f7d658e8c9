//! The debounced, cancellable, main-context-affinitized scheduling core.

pub mod debounce;
pub mod gate;
pub mod main_context;
pub mod subscription;
pub mod work_queue;

pub use debounce::DebounceTimer;
pub use gate::CancellationGate;
pub use main_context::{MainContext, MainJob};
pub use subscription::{SubscriberId, Subscription, SubscriptionRegistry};
pub use work_queue::{AffinityWorkQueue, WorkError, WorkHandle};
