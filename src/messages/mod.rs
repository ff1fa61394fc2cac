//! Message types exchanged with the coordinator actor.
//!
//! Front-ends send [`Action`]s in and read [`CoordinatorView`]s out.

pub mod actions;
pub mod view;

pub use actions::Action;
pub use view::CoordinatorView;
