//! Hardware protocol error types.

use thiserror::Error;

use super::state::{GameState, Watchdog};

/// Errors produced while turning a raw log line into a [`Command`](super::Command).
///
/// Both variants are fatal to the hardware loop: a line the bridge cannot
/// understand means it no longer knows what the device is doing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    /// The line matches none of the known command families
    #[error("Unknown command: {0:?}")]
    UnknownCommand(String),

    /// The line belongs to a known family but its operand is unusable
    #[error("Invalid operand for {family}: {operand:?}")]
    InvalidOperand {
        family: &'static str,
        operand: String,
    },
}

/// Faults raised by the hardware state tracker.
///
/// Every variant ends the current hardware session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolFault {
    /// A transition was repeated more often than its watchdog allows
    #[error("Transition timeout on {0}")]
    TransitionTimeout(Watchdog),

    /// A command arrived that is not reachable from the current state
    #[error("Invalid state: {command} received while {state}")]
    InvalidState { state: GameState, command: String },

    /// The line could not be classified
    #[error("Unknown command: {0}")]
    UnknownCommand(#[from] ClassifyError),

    /// Fault code 1: the device needs maintenance before it can run again
    #[error("Hardware fault reported, maintenance required")]
    MaintenanceRequired,
}

impl ProtocolFault {
    /// Short machine-friendly label used in alarms and broadcast reasons
    pub fn label(&self) -> &'static str {
        match self {
            ProtocolFault::TransitionTimeout(_) => "transition_timeout",
            ProtocolFault::InvalidState { .. } => "invalid_state",
            ProtocolFault::UnknownCommand(_) => "unknown_command",
            ProtocolFault::MaintenanceRequired => "maintenance_required",
        }
    }
}

/// Result type for tracker operations
pub type ProtocolResult<T> = Result<T, ProtocolFault>;
