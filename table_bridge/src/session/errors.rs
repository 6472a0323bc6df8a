//! Session error types.

use std::time::Duration;

use thiserror::Error;

use crate::hardware::ProtocolFault;

/// Errors returned to callers of a [`TrackerHandle`](super::TrackerHandle)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The line was rejected and the session has ended
    #[error("Session terminated: {0}")]
    Fault(#[from] ProtocolFault),

    /// The actor is gone, either closed or ended by an earlier fault
    #[error("Session is closed")]
    Closed,
}

/// Errors from the device link
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Device I/O failed: {0:#}")]
    Io(#[from] anyhow::Error),

    #[error("No acknowledgement within {0:?}")]
    AckTimeout(Duration),

    #[error("Unexpected acknowledgement {got:?} for {sent:?}")]
    UnexpectedAck { sent: String, got: String },
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;
