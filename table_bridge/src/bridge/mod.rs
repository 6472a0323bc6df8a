//! Bridge between the hardware session and the round lifecycle.
//!
//! [`plan`] turns a [`SessionEvent`](crate::session::SessionEvent) into the
//! ordered round calls it implies; [`BridgeDriver`] runs them on every
//! environment, asking each environment's lifecycle before sending anything.

pub mod driver;
pub mod planner;

pub use driver::{BridgeDriver, CallOutcome, CallReport};
pub use planner::{PlannedCall, plan};
