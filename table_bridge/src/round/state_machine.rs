//! Round lifecycle state machine.
//!
//! Decides which round API calls are legal from the current phase:
//!
//! ```text
//! UNKNOWN -> START -> DEAL -> BET_STOPPED -> FINISHED -> START ...
//!              \        \          \             \
//!               +--------+----------+-------------+--> BROADCAST
//!
//! BROADCAST -> PAUSE -> CANCEL -> START
//! BROADCAST -> DEAL | BET_STOPPED | FINISHED | START   (auto-resolved only)
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::errors::{TransitionError, TransitionResult};

/// Phase of the current round as seen by the remote server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundState {
    Unknown,
    Start,
    Deal,
    BetStopped,
    Finished,
    Broadcast,
    Pause,
    Cancel,
}

impl RoundState {
    /// Map a remote status string, case-insensitively. Anything unrecognised
    /// maps to [`RoundState::Unknown`].
    pub fn from_status(status: &str) -> RoundState {
        match status.trim().to_ascii_lowercase().as_str() {
            "start" => RoundState::Start,
            "deal" => RoundState::Deal,
            "bet-stopped" | "betstopped" => RoundState::BetStopped,
            "finished" => RoundState::Finished,
            "broadcast" => RoundState::Broadcast,
            "pause" => RoundState::Pause,
            "cancel" | "cancelled" => RoundState::Cancel,
            _ => RoundState::Unknown,
        }
    }

    /// Successor in the normal START -> DEAL -> BET_STOPPED -> FINISHED cycle.
    /// States outside the cycle resume at START.
    pub fn normal_successor(self) -> RoundState {
        match self {
            RoundState::Start => RoundState::Deal,
            RoundState::Deal => RoundState::BetStopped,
            RoundState::BetStopped => RoundState::Finished,
            RoundState::Finished
            | RoundState::Unknown
            | RoundState::Broadcast
            | RoundState::Pause
            | RoundState::Cancel => RoundState::Start,
        }
    }

    fn in_normal_cycle(self) -> bool {
        matches!(
            self,
            RoundState::Start | RoundState::Deal | RoundState::BetStopped | RoundState::Finished
        )
    }
}

impl fmt::Display for RoundState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoundState::Unknown => "UNKNOWN",
            RoundState::Start => "START",
            RoundState::Deal => "DEAL",
            RoundState::BetStopped => "BET_STOPPED",
            RoundState::Finished => "FINISHED",
            RoundState::Broadcast => "BROADCAST",
            RoundState::Pause => "PAUSE",
            RoundState::Cancel => "CANCEL",
        };
        write!(f, "{name}")
    }
}

/// Outbound round API calls, each mapped to the state it produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApiCall {
    Start,
    Deal,
    BetStop,
    Finish,
    Broadcast,
    Pause,
    Cancel,
}

impl ApiCall {
    pub fn from_api_name(name: &str) -> Option<ApiCall> {
        match name {
            "start_post" => Some(ApiCall::Start),
            "deal_post" => Some(ApiCall::Deal),
            "bet_stop_post" => Some(ApiCall::BetStop),
            "finish_post" => Some(ApiCall::Finish),
            "broadcast_post" => Some(ApiCall::Broadcast),
            "pause_post" => Some(ApiCall::Pause),
            "cancel_post" => Some(ApiCall::Cancel),
            _ => None,
        }
    }

    pub fn api_name(self) -> &'static str {
        match self {
            ApiCall::Start => "start_post",
            ApiCall::Deal => "deal_post",
            ApiCall::BetStop => "bet_stop_post",
            ApiCall::Finish => "finish_post",
            ApiCall::Broadcast => "broadcast_post",
            ApiCall::Pause => "pause_post",
            ApiCall::Cancel => "cancel_post",
        }
    }

    pub fn target(self) -> RoundState {
        match self {
            ApiCall::Start => RoundState::Start,
            ApiCall::Deal => RoundState::Deal,
            ApiCall::BetStop => RoundState::BetStopped,
            ApiCall::Finish => RoundState::Finished,
            ApiCall::Broadcast => RoundState::Broadcast,
            ApiCall::Pause => RoundState::Pause,
            ApiCall::Cancel => RoundState::Cancel,
        }
    }

    /// Call that produces `state`, if any
    pub fn for_state(state: RoundState) -> Option<ApiCall> {
        match state {
            RoundState::Start => Some(ApiCall::Start),
            RoundState::Deal => Some(ApiCall::Deal),
            RoundState::BetStopped => Some(ApiCall::BetStop),
            RoundState::Finished => Some(ApiCall::Finish),
            RoundState::Broadcast => Some(ApiCall::Broadcast),
            RoundState::Pause => Some(ApiCall::Pause),
            RoundState::Cancel => Some(ApiCall::Cancel),
            RoundState::Unknown => None,
        }
    }
}

/// What the caller should do after a broadcast was answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BroadcastOutcome {
    /// Transition to [`RoundLifecycle::get_next_state_for_normal_flow`]
    ContinueNormalFlow,
    /// Drive PAUSE -> CANCEL -> START explicitly
    Pause,
}

/// Result of reconciling local state with the remote status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Local state was UNKNOWN and adopted the remote one
    Adopted(RoundState),
    InSync,
    /// States differ; nothing was changed
    Desync { local: RoundState, remote: RoundState },
}

/// One entry in the append-only transition history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub timestamp: DateTime<Utc>,
    pub from: RoundState,
    pub to: RoundState,
    pub reason: String,
}

/// Round lifecycle for one (table, environment) pair
#[derive(Debug, Clone)]
pub struct RoundLifecycle {
    /// Used only for log output, e.g. `T1/PRD`
    label: String,
    current_state: RoundState,
    previous_state: RoundState,
    broadcast_auto_resolved: bool,
    transition_count: u64,
    history: Vec<TransitionRecord>,
}

impl RoundLifecycle {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            current_state: RoundState::Unknown,
            previous_state: RoundState::Unknown,
            broadcast_auto_resolved: false,
            transition_count: 0,
            history: Vec::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn current_state(&self) -> RoundState {
        self.current_state
    }

    pub fn previous_state(&self) -> RoundState {
        self.previous_state
    }

    pub fn broadcast_auto_resolved(&self) -> bool {
        self.broadcast_auto_resolved
    }

    pub fn transition_count(&self) -> u64 {
        self.transition_count
    }

    pub fn history(&self) -> &[TransitionRecord] {
        &self.history
    }

    /// Whether `to` is reachable from the current state
    pub fn can_transition_to(&self, to: RoundState) -> bool {
        match self.current_state {
            RoundState::Unknown | RoundState::Cancel => to == RoundState::Start,
            RoundState::Start => matches!(to, RoundState::Deal | RoundState::Broadcast),
            RoundState::Deal => matches!(to, RoundState::BetStopped | RoundState::Broadcast),
            RoundState::BetStopped => matches!(to, RoundState::Finished | RoundState::Broadcast),
            RoundState::Finished => matches!(to, RoundState::Start | RoundState::Broadcast),
            RoundState::Broadcast => {
                to == RoundState::Pause || (self.broadcast_auto_resolved && to.in_normal_cycle())
            }
            RoundState::Pause => to == RoundState::Cancel,
        }
    }

    /// Read-only check made before the remote call goes out
    pub fn ensure_allowed(&self, call: ApiCall) -> TransitionResult<()> {
        let to = call.target();
        if self.can_transition_to(to) {
            Ok(())
        } else {
            Err(TransitionError::InvalidTransition {
                api: call.api_name(),
                from: self.current_state,
                to,
            })
        }
    }

    /// Validate `api_name` against the current state and commit the move.
    ///
    /// `auto_resolved` is only recorded for `broadcast_post`; it decides
    /// whether the round may continue without a pause.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] and leaves every field untouched when the
    /// name is unknown or the target is not legal from the current state.
    pub fn validate_and_transition(
        &mut self,
        api_name: &str,
        reason: &str,
        auto_resolved: Option<bool>,
    ) -> TransitionResult<()> {
        let call = ApiCall::from_api_name(api_name)
            .ok_or_else(|| TransitionError::UnknownApiName(api_name.to_string()))?;
        self.transition(call, reason, auto_resolved)
    }

    /// Typed form of [`validate_and_transition`](Self::validate_and_transition)
    pub fn transition(
        &mut self,
        call: ApiCall,
        reason: &str,
        auto_resolved: Option<bool>,
    ) -> TransitionResult<()> {
        if let Err(e) = self.ensure_allowed(call) {
            warn!("Round {}: rejected {}: {}", self.label, call.api_name(), e);
            return Err(e);
        }

        if call == ApiCall::Broadcast {
            self.broadcast_auto_resolved = auto_resolved.unwrap_or(false);
        }
        self.commit(call.target(), reason);
        Ok(())
    }

    /// Next state of the normal cycle. While in BROADCAST this continues from
    /// the state the broadcast interrupted.
    pub fn get_next_state_for_normal_flow(&self) -> RoundState {
        let base = if self.current_state == RoundState::Broadcast {
            self.previous_state
        } else {
            self.current_state
        };
        base.normal_successor()
    }

    /// Decide how to leave BROADCAST once the anomaly has been answered
    pub fn handle_broadcast_result(
        &mut self,
        auto_resolved: bool,
        reason: &str,
    ) -> TransitionResult<BroadcastOutcome> {
        if self.current_state != RoundState::Broadcast {
            return Err(TransitionError::NotInBroadcast(self.current_state));
        }

        self.broadcast_auto_resolved = auto_resolved;
        if auto_resolved {
            info!(
                "Round {}: broadcast auto-resolved ({}), continuing to {}",
                self.label,
                reason,
                self.get_next_state_for_normal_flow()
            );
            Ok(BroadcastOutcome::ContinueNormalFlow)
        } else {
            info!("Round {}: broadcast unresolved ({}), pausing", self.label, reason);
            Ok(BroadcastOutcome::Pause)
        }
    }

    /// Reconcile with the status reported by the remote server.
    ///
    /// Only an UNKNOWN local state is overwritten. A mismatch is logged and
    /// left for the caller; correcting it here could hide a real bug.
    pub fn sync_from_api_state(&mut self, remote: RoundState) -> SyncOutcome {
        if self.current_state == remote {
            return SyncOutcome::InSync;
        }

        if self.current_state == RoundState::Unknown {
            self.commit(remote, "synced from remote status");
            return SyncOutcome::Adopted(remote);
        }

        warn!(
            "Round {}: desync, local {} but remote reports {}",
            self.label, self.current_state, remote
        );
        SyncOutcome::Desync {
            local: self.current_state,
            remote,
        }
    }

    /// Overwrite the state without validation. Reserved for aligning
    /// non-primary environments.
    pub(crate) fn force_state(&mut self, to: RoundState, reason: &str) {
        warn!(
            "Round {}: forcing {} -> {} ({})",
            self.label, self.current_state, to, reason
        );
        self.commit(to, reason);
    }

    fn commit(&mut self, to: RoundState, reason: &str) {
        let from = self.current_state;
        self.previous_state = from;
        self.current_state = to;
        self.transition_count += 1;
        self.history.push(TransitionRecord {
            timestamp: Utc::now(),
            from,
            to,
            reason: reason.to_string(),
        });
        debug!("Round {}: {} -> {} ({})", self.label, from, to, reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_CALLS: [ApiCall; 7] = [
        ApiCall::Start,
        ApiCall::Deal,
        ApiCall::BetStop,
        ApiCall::Finish,
        ApiCall::Broadcast,
        ApiCall::Pause,
        ApiCall::Cancel,
    ];

    fn lifecycle_in(path: &[&str]) -> RoundLifecycle {
        let mut round = RoundLifecycle::new("T1/PRD");
        for api in path {
            round.validate_and_transition(api, "setup", None).unwrap();
        }
        round
    }

    #[test]
    fn test_unknown_accepts_only_start() {
        for call in ALL_CALLS {
            let mut round = RoundLifecycle::new("T1/PRD");
            let result = round.transition(call, "probe", None);
            if call == ApiCall::Start {
                assert!(result.is_ok());
            } else {
                assert_eq!(
                    result,
                    Err(TransitionError::InvalidTransition {
                        api: call.api_name(),
                        from: RoundState::Unknown,
                        to: call.target(),
                    })
                );
                assert_eq!(round.current_state(), RoundState::Unknown);
                assert_eq!(round.transition_count(), 0);
                assert!(round.history().is_empty());
            }
        }
    }

    #[test]
    fn test_unknown_api_name() {
        let mut round = RoundLifecycle::new("T1/PRD");
        assert_eq!(
            round.validate_and_transition("shuffle_post", "x", None),
            Err(TransitionError::UnknownApiName("shuffle_post".to_string()))
        );
        assert_eq!(round.transition_count(), 0);
    }

    #[test]
    fn test_normal_cycle() {
        let mut round = lifecycle_in(&["start_post", "deal_post", "bet_stop_post", "finish_post"]);
        assert_eq!(round.current_state(), RoundState::Finished);
        assert_eq!(round.previous_state(), RoundState::BetStopped);
        round
            .validate_and_transition("start_post", "next round", None)
            .unwrap();
        assert_eq!(round.current_state(), RoundState::Start);
        assert_eq!(round.transition_count(), 5);
        assert_eq!(round.history().len(), 5);
        assert_eq!(round.history()[4].reason, "next round");
    }

    #[test]
    fn test_cycle_cannot_skip() {
        let mut round = lifecycle_in(&["start_post"]);
        assert!(round.validate_and_transition("finish_post", "skip", None).is_err());
        assert_eq!(round.current_state(), RoundState::Start);
    }

    #[test]
    fn test_broadcast_allowed_from_every_cycle_state() {
        let paths: [&[&str]; 4] = [
            &["start_post"],
            &["start_post", "deal_post"],
            &["start_post", "deal_post", "bet_stop_post"],
            &["start_post", "deal_post", "bet_stop_post", "finish_post"],
        ];
        for path in paths {
            let mut round = lifecycle_in(path);
            round
                .validate_and_transition("broadcast_post", "anomaly", Some(false))
                .unwrap();
            assert_eq!(round.current_state(), RoundState::Broadcast);
        }
    }

    #[test]
    fn test_auto_resolved_broadcast_continues() {
        let mut round = lifecycle_in(&["start_post", "deal_post"]);
        round
            .validate_and_transition("broadcast_post", "late card", Some(true))
            .unwrap();
        assert!(round.broadcast_auto_resolved());

        let outcome = round.handle_broadcast_result(true, "late card").unwrap();
        assert_eq!(outcome, BroadcastOutcome::ContinueNormalFlow);
        assert_eq!(round.get_next_state_for_normal_flow(), RoundState::BetStopped);

        round
            .validate_and_transition("bet_stop_post", "resume", None)
            .unwrap();
        assert_eq!(round.current_state(), RoundState::BetStopped);
    }

    #[test]
    fn test_unresolved_broadcast_requires_pause_cancel_start() {
        let mut round = lifecycle_in(&["start_post", "deal_post", "bet_stop_post"]);
        round
            .validate_and_transition("broadcast_post", "ball removed", Some(false))
            .unwrap();
        assert_eq!(
            round.handle_broadcast_result(false, "ball removed").unwrap(),
            BroadcastOutcome::Pause
        );

        for api in ["finish_post", "deal_post", "start_post", "cancel_post"] {
            assert!(round.validate_and_transition(api, "no", None).is_err());
        }
        round.validate_and_transition("pause_post", "ok", None).unwrap();

        for api in ["start_post", "pause_post", "broadcast_post"] {
            assert!(round.validate_and_transition(api, "no", None).is_err());
        }
        round.validate_and_transition("cancel_post", "ok", None).unwrap();

        for api in ["deal_post", "pause_post", "cancel_post"] {
            assert!(round.validate_and_transition(api, "no", None).is_err());
        }
        round.validate_and_transition("start_post", "ok", None).unwrap();
        assert_eq!(round.current_state(), RoundState::Start);
    }

    #[test]
    fn test_broadcast_not_repeatable() {
        let mut round = lifecycle_in(&["start_post"]);
        round
            .validate_and_transition("broadcast_post", "a", Some(true))
            .unwrap();
        assert!(
            round
                .validate_and_transition("broadcast_post", "b", Some(true))
                .is_err()
        );
    }

    #[test]
    fn test_handle_broadcast_result_outside_broadcast() {
        let mut round = lifecycle_in(&["start_post"]);
        assert_eq!(
            round.handle_broadcast_result(true, "x"),
            Err(TransitionError::NotInBroadcast(RoundState::Start))
        );
    }

    #[test]
    fn test_next_state_outside_broadcast() {
        assert_eq!(
            RoundLifecycle::new("x").get_next_state_for_normal_flow(),
            RoundState::Start
        );
        let round = lifecycle_in(&["start_post", "deal_post", "bet_stop_post", "finish_post"]);
        assert_eq!(round.get_next_state_for_normal_flow(), RoundState::Start);
    }

    #[test]
    fn test_sync_adopts_from_unknown() {
        let mut round = RoundLifecycle::new("T1/UAT");
        assert_eq!(
            round.sync_from_api_state(RoundState::Deal),
            SyncOutcome::Adopted(RoundState::Deal)
        );
        assert_eq!(round.current_state(), RoundState::Deal);
        assert_eq!(round.transition_count(), 1);

        assert_eq!(round.sync_from_api_state(RoundState::Deal), SyncOutcome::InSync);
        assert_eq!(round.transition_count(), 1);
        assert_eq!(round.history().len(), 1);
    }

    #[test]
    fn test_sync_reports_desync_without_change() {
        let mut round = lifecycle_in(&["start_post"]);
        assert_eq!(
            round.sync_from_api_state(RoundState::Finished),
            SyncOutcome::Desync {
                local: RoundState::Start,
                remote: RoundState::Finished,
            }
        );
        assert_eq!(round.current_state(), RoundState::Start);
        assert_eq!(round.transition_count(), 1);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(RoundState::from_status("START"), RoundState::Start);
        assert_eq!(RoundState::from_status("Bet-Stopped"), RoundState::BetStopped);
        assert_eq!(RoundState::from_status("betstopped"), RoundState::BetStopped);
        assert_eq!(RoundState::from_status("cancelled"), RoundState::Cancel);
        assert_eq!(RoundState::from_status(" finished "), RoundState::Finished);
        assert_eq!(RoundState::from_status("settling"), RoundState::Unknown);
        assert_eq!(RoundState::from_status(""), RoundState::Unknown);
    }

    #[test]
    fn test_state_serializes_like_display() {
        for state in [RoundState::Unknown, RoundState::BetStopped, RoundState::Cancel] {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{state}\""));
        }
    }

    #[test]
    fn test_api_names_round_trip() {
        for call in ALL_CALLS {
            assert_eq!(ApiCall::from_api_name(call.api_name()), Some(call));
            assert_eq!(ApiCall::for_state(call.target()), Some(call));
        }
    }
}
