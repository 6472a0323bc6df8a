//! Tracker actor message types.

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use super::errors::SessionResult;
use crate::hardware::{Command, HardwareEvent, HardwareState, ProtocolFault};

/// Where a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineOrigin {
    /// The device's protocol log
    Log,
    /// An operator typing into the debug console
    Console,
}

impl std::fmt::Display for LineOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LineOrigin::Log => write!(f, "log"),
            LineOrigin::Console => write!(f, "console"),
        }
    }
}

/// Messages that can be sent to a [`TrackerActor`](super::TrackerActor)
#[derive(Debug)]
pub enum TrackerMessage {
    /// Classify and apply one protocol line
    Line {
        line: String,
        origin: LineOrigin,
        response: oneshot::Sender<SessionResult<LineOutcome>>,
    },

    /// Current hardware state
    Snapshot {
        response: oneshot::Sender<HardwareState>,
    },

    /// Subscribe to session events; every event is delivered
    Subscribe {
        subscriber_id: Uuid,
        sender: mpsc::UnboundedSender<SessionEvent>,
    },

    /// Unsubscribe from session events
    Unsubscribe { subscriber_id: Uuid },

    /// Stop the session
    Close { response: oneshot::Sender<()> },
}

/// Result of a processed line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineOutcome {
    pub command: Command,
    pub state: HardwareState,
}

/// Notification pushed to subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Something the tracker observed
    Hardware(HardwareEvent),
    /// The session ended on this fault; no further events follow
    Terminated(ProtocolFault),
}

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub session_id: Uuid,
    pub lines_processed: u64,
    pub fault: Option<ProtocolFault>,
    pub final_state: HardwareState,
}
