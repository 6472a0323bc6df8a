//! Maps hardware session events onto round API calls.

use crate::hardware::{GameState, HardwareEvent};
use crate::round::{ApiCall, BroadcastNotice};
use crate::session::SessionEvent;

/// One remote call the bridge intends to make on every environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedCall {
    Start,
    Deal { result: String },
    BetStop,
    Finish,
    Broadcast { notice: BroadcastNotice },
    Pause { reason: String },
    Cancel,
}

impl PlannedCall {
    pub fn api_call(&self) -> ApiCall {
        match self {
            PlannedCall::Start => ApiCall::Start,
            PlannedCall::Deal { .. } => ApiCall::Deal,
            PlannedCall::BetStop => ApiCall::BetStop,
            PlannedCall::Finish => ApiCall::Finish,
            PlannedCall::Broadcast { .. } => ApiCall::Broadcast,
            PlannedCall::Pause { .. } => ApiCall::Pause,
            PlannedCall::Cancel => ApiCall::Cancel,
        }
    }

    /// Reason recorded in the lifecycle history
    pub fn reason(&self) -> String {
        match self {
            PlannedCall::Start => "betting opened".to_string(),
            PlannedCall::Deal { result } => format!("winning number {result}"),
            PlannedCall::BetStop => "bets closed".to_string(),
            PlannedCall::Finish => "round settled".to_string(),
            PlannedCall::Broadcast { notice } => format!("anomaly: {}", notice.kind),
            PlannedCall::Pause { reason } => reason.clone(),
            PlannedCall::Cancel => "round aborted".to_string(),
        }
    }
}

/// Abort sequence for an anomaly the bridge cannot resolve on its own
fn abort(kind: &str) -> Vec<PlannedCall> {
    vec![
        PlannedCall::Broadcast {
            notice: BroadcastNotice::to_players(kind),
        },
        PlannedCall::Pause {
            reason: kind.to_string(),
        },
        PlannedCall::Cancel,
    ]
}

/// Calls to make in response to `event`, in order. Most events need none.
pub fn plan(event: &SessionEvent) -> Vec<PlannedCall> {
    match event {
        SessionEvent::Hardware(HardwareEvent::StateAdvanced {
            to: GameState::PlaceBet,
            ..
        }) => vec![PlannedCall::Start],

        SessionEvent::Hardware(HardwareEvent::WinningNumber(n)) => vec![
            PlannedCall::Deal {
                result: n.to_string(),
            },
            PlannedCall::BetStop,
            PlannedCall::Finish,
        ],

        SessionEvent::Hardware(HardwareEvent::RoundRestart { .. }) => abort("round_restart"),

        SessionEvent::Hardware(HardwareEvent::TableForceClosed { .. }) => abort("table_closed"),

        SessionEvent::Terminated(fault) => abort(fault.label()),

        SessionEvent::Hardware(
            HardwareEvent::StateAdvanced { .. }
            | HardwareEvent::FaultRaised(_)
            | HardwareEvent::PowerChanged(_),
        ) => Vec::new(),
    }
}
