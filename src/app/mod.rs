//! App layer - the session & telemetry coordinator
//!
//! `state` and `commands` hold the pure data and its transitions, the
//! `coordinator` handle runs the async operations around them, and the
//! actor feeds it actions and wallet events.

pub mod state;
pub mod commands;
pub mod coordinator;
pub mod subscriptions;
pub mod rituals;
pub mod preview;
pub mod actor;

pub use state::CoordinatorState;
pub use coordinator::{Collaborators, Coordinator, LoadingGuard};
pub use preview::PreviewChannel;
pub use actor::CoordinatorActor;
