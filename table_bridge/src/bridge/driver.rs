//! Executes planned round calls against every environment.
//!
//! Environments run concurrently; within one environment the lifecycle lock
//! is held for the whole plan so the check, the remote call and the commit
//! cannot interleave with anything else.

use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::task::JoinSet;

use super::planner::{PlannedCall, plan};
use crate::environment::{Environment, EnvironmentAligner};
use crate::round::{ApiCall, RoundLifecycle, RoundState, TransitionError};
use crate::session::SessionEvent;

/// What happened to one planned call on one environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    /// Remote call succeeded and the lifecycle moved to this state
    Committed(RoundState),
    /// The lifecycle refused the call; nothing was sent
    Rejected(TransitionError),
    /// The remote call failed; the lifecycle is unchanged
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallReport {
    pub env: String,
    pub primary: bool,
    pub call: ApiCall,
    pub outcome: CallOutcome,
}

/// Drives round calls for one table across all of its environments
pub struct BridgeDriver {
    aligner: Arc<EnvironmentAligner>,
}

impl BridgeDriver {
    pub fn new(aligner: Arc<EnvironmentAligner>) -> Self {
        Self { aligner }
    }

    pub fn aligner(&self) -> &Arc<EnvironmentAligner> {
        &self.aligner
    }

    /// Round id the next deal on `env` settles
    pub async fn round_id(&self, env: &str) -> Option<String> {
        match self.aligner.environment(env) {
            Ok(env) => env.round_id().await,
            Err(_) => None,
        }
    }

    /// Plan and execute the calls `event` requires
    pub async fn handle_event(&self, event: &SessionEvent) -> Vec<CallReport> {
        let calls = plan(event);
        if calls.is_empty() {
            return Vec::new();
        }
        debug!(
            "Table {}: {:?} -> {} call(s)",
            self.aligner.table(),
            event,
            calls.len()
        );
        self.execute(calls).await
    }

    /// Run `calls` in order on every environment, environments in parallel
    pub async fn execute(&self, calls: Vec<PlannedCall>) -> Vec<CallReport> {
        let calls = Arc::new(calls);
        let mut tasks = JoinSet::new();

        for env in self.aligner.environments() {
            let env = Arc::clone(env);
            let calls = Arc::clone(&calls);
            tasks.spawn(async move { run_plan(&env, &calls).await });
        }

        let mut reports = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(env_reports) => reports.extend(env_reports),
                Err(e) => error!("Table {}: round call task failed: {}", self.aligner.table(), e),
            }
        }

        // Stable: keeps each environment's calls in plan order
        reports.sort_by(|a, b| a.env.cmp(&b.env));
        reports
    }
}

async fn run_plan(env: &Environment, calls: &[PlannedCall]) -> Vec<CallReport> {
    let mut lifecycle = env.lifecycle().lock().await;
    let mut reports = Vec::with_capacity(calls.len());

    for call in calls {
        let api_call = call.api_call();
        let report = |outcome| CallReport {
            env: env.name().to_string(),
            primary: env.is_primary(),
            call: api_call,
            outcome,
        };

        if let Err(e) = lifecycle.ensure_allowed(api_call) {
            warn!(
                "Round {}: not sending {}: {}",
                lifecycle.label(),
                api_call.api_name(),
                e
            );
            reports.push(report(CallOutcome::Rejected(e)));
            break;
        }

        if let Err(e) = invoke(env, call).await {
            error!(
                "Round {}: {} failed: {:#}",
                lifecycle.label(),
                api_call.api_name(),
                e
            );
            reports.push(report(CallOutcome::Failed(format!("{e:#}"))));
            break;
        }

        match commit(&mut lifecycle, call) {
            Ok(state) => {
                info!(
                    "Round {}: {} -> {}",
                    lifecycle.label(),
                    api_call.api_name(),
                    state
                );
                reports.push(report(CallOutcome::Committed(state)));
            }
            Err(e) => {
                reports.push(report(CallOutcome::Rejected(e)));
                break;
            }
        }
    }

    reports
}

async fn invoke(env: &Environment, call: &PlannedCall) -> anyhow::Result<()> {
    let api = env.api();
    match call {
        PlannedCall::Start => {
            let started = api.start().await?;
            debug!(
                "{}: round {} open for {}s",
                env.name(),
                started.round_id,
                started.bet_period
            );
            env.set_round_id(started.round_id).await;
            Ok(())
        }
        PlannedCall::Deal { result } => {
            let Some(round_id) = env.round_id().await else {
                anyhow::bail!("no round id recorded for {}", env.name());
            };
            api.deal(&round_id, result).await
        }
        PlannedCall::BetStop => api.bet_stop().await,
        PlannedCall::Finish => api.finish().await,
        PlannedCall::Broadcast { notice } => api.broadcast(notice).await,
        PlannedCall::Pause { reason } => api.pause(reason).await,
        PlannedCall::Cancel => api.cancel().await,
    }
}

fn commit(lifecycle: &mut RoundLifecycle, call: &PlannedCall) -> Result<RoundState, TransitionError> {
    let api_call = call.api_call();
    let reason = call.reason();

    if api_call == ApiCall::Broadcast {
        lifecycle.validate_and_transition(api_call.api_name(), &reason, Some(false))?;
        lifecycle.handle_broadcast_result(false, &reason)?;
    } else {
        lifecycle.validate_and_transition(api_call.api_name(), &reason, None)?;
    }
    Ok(lifecycle.current_state())
}
