//! Round lifecycle: which remote round API calls are legal, and when.
//!
//! One [`RoundLifecycle`] exists per (table, environment) pair. Every outbound
//! call asks it first via [`RoundLifecycle::ensure_allowed`], performs the
//! remote call through a [`RoundApi`], then commits with
//! [`RoundLifecycle::transition`].

pub mod api;
pub mod errors;
pub mod state_machine;

pub use api::{BroadcastNotice, RemoteStatus, RoundApi, StartedRound};
pub use errors::{TransitionError, TransitionResult};
pub use state_machine::{
    ApiCall, BroadcastOutcome, RoundLifecycle, RoundState, SyncOutcome, TransitionRecord,
};
