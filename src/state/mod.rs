//! State Module - Reactive state and event dispatch
//!
//! - **Observable** - Value cell with subscriptions and forced re-notify
//! - **Dependency** - Tracking frames that record observable reads
//! - **Effect** - Tracked re-evaluation with subscription diffing
//! - **Deferred** - Coalesced change notifications (`batch`, `DEFER_UPDATES`)
//! - **Events** - DOM-style event dispatch with bubbling

pub mod dependency;
pub mod deferred;
pub mod effect;
pub mod events;
pub mod observable;

pub use deferred::{batch, pending_count, process_deferred_updates, reset_deferred};
pub use effect::{Effect, Trigger};
pub use events::{trigger_event, Event};
pub use observable::{observable, Notification, Observable, ObservableEvent, Subscription};
