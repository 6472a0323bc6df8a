//! Round lifecycle error types.

use thiserror::Error;

use super::state_machine::RoundState;

/// Rejections from the round lifecycle state machine.
///
/// All of these are recoverable at the call site: the API call is simply not
/// made, and the state machine is left exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// The mapped target is not reachable from the current state
    #[error("Invalid transition for {api}: {from} -> {to}")]
    InvalidTransition {
        api: &'static str,
        from: RoundState,
        to: RoundState,
    },

    /// The API name is not one of the round lifecycle calls
    #[error("Unknown API name: {0}")]
    UnknownApiName(String),

    /// A broadcast result was handled outside of BROADCAST
    #[error("Not in BROADCAST (current state {0})")]
    NotInBroadcast(RoundState),
}

/// Result type for round lifecycle operations
pub type TransitionResult<T> = Result<T, TransitionError>;
