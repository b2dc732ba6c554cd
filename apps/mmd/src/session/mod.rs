pub mod cookies;
pub mod coordinator;
pub mod markers;

pub use coordinator::{CoordinatorState, RenewalOutcome, SessionCoordinator};
