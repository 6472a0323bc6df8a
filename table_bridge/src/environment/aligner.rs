//! Keeps redundant deployment environments aligned with the primary.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use log::{info, warn};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::round::{RoundApi, RoundLifecycle, RoundState, SyncOutcome};

/// Errors from the environment aligner
#[derive(Debug, Error)]
pub enum AlignmentError {
    #[error("Unknown environment: {0}")]
    UnknownEnvironment(String),

    #[error("Duplicate environment: {0}")]
    DuplicateEnvironment(String),

    /// The primary is never corrected automatically
    #[error("Environment {0} is the primary and cannot be corrected")]
    PrimaryNotCorrectable(String),

    #[error("Primary environment {0} is not registered")]
    MissingPrimary(String),

    #[error("Cancel call failed for {env}: {source}")]
    CancelFailed {
        env: String,
        #[source]
        source: anyhow::Error,
    },
}

/// One deployment environment: its state machine and its API
pub struct Environment {
    name: String,
    primary: bool,
    lifecycle: Mutex<RoundLifecycle>,
    /// Round the next deal settles, from `start` or the remote status
    round_id: Mutex<Option<String>>,
    api: Arc<dyn RoundApi>,
}

impl Environment {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    /// Locking the lifecycle serialises transitions for this environment;
    /// hold the guard across the remote call.
    pub fn lifecycle(&self) -> &Mutex<RoundLifecycle> {
        &self.lifecycle
    }

    pub fn api(&self) -> &Arc<dyn RoundApi> {
        &self.api
    }

    pub async fn state(&self) -> RoundState {
        self.lifecycle.lock().await.current_state()
    }

    pub async fn round_id(&self) -> Option<String> {
        self.round_id.lock().await.clone()
    }

    pub async fn set_round_id(&self, round_id: impl Into<String>) {
        *self.round_id.lock().await = Some(round_id.into());
    }
}

/// A non-primary environment whose state differs from the primary's
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Misalignment {
    pub env: String,
    pub state: RoundState,
    pub primary_state: RoundState,
}

/// What [`EnvironmentAligner::handle_misalignment`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MisalignmentAction {
    /// States already match
    Aligned,
    /// Cancelled earlier, waiting for the next START
    AlreadyCancelled,
    /// Cancel issued; the environment moved from this state to CANCEL
    Cancelled { from: RoundState },
}

/// Outcome of the startup sync
#[derive(Debug, Default)]
pub struct AlignmentReport {
    pub synced: Vec<(String, SyncOutcome)>,
    pub unreachable: Vec<String>,
    pub misaligned: Vec<Misalignment>,
}

impl AlignmentReport {
    pub fn is_aligned(&self) -> bool {
        self.unreachable.is_empty() && self.misaligned.is_empty()
    }
}

/// Registry of every environment a table reports to, with exactly one primary
pub struct EnvironmentAligner {
    table: String,
    environments: Vec<Arc<Environment>>,
    primary: usize,
}

impl EnvironmentAligner {
    /// Register environments in order; `primary` must be one of them.
    pub fn new(
        table: impl Into<String>,
        primary: &str,
        environments: Vec<(String, Arc<dyn RoundApi>)>,
    ) -> Result<Self, AlignmentError> {
        let table = table.into();
        let primary = primary.to_ascii_uppercase();
        let mut seen = HashSet::new();
        let mut registered = Vec::with_capacity(environments.len());

        for (name, api) in environments {
            let name = name.to_ascii_uppercase();
            if !seen.insert(name.clone()) {
                return Err(AlignmentError::DuplicateEnvironment(name));
            }
            registered.push(Arc::new(Environment {
                lifecycle: Mutex::new(RoundLifecycle::new(format!("{table}/{name}"))),
                round_id: Mutex::new(None),
                primary: name == primary,
                name,
                api,
            }));
        }

        let primary = registered
            .iter()
            .position(|env| env.primary)
            .ok_or(AlignmentError::MissingPrimary(primary))?;

        Ok(Self {
            table,
            environments: registered,
            primary,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn environments(&self) -> &[Arc<Environment>] {
        &self.environments
    }

    pub fn primary(&self) -> &Arc<Environment> {
        &self.environments[self.primary]
    }

    pub fn environment(&self, name: &str) -> Result<&Arc<Environment>, AlignmentError> {
        self.environments
            .iter()
            .find(|env| env.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| AlignmentError::UnknownEnvironment(name.to_string()))
    }

    /// True when `name` is in the same state as the primary
    pub async fn check_alignment(&self, name: &str) -> Result<bool, AlignmentError> {
        let env = self.environment(name)?;
        if env.primary {
            return Ok(true);
        }
        let primary_state = self.primary().state().await;
        Ok(env.state().await == primary_state)
    }

    /// Snapshot of every non-primary environment that differs from the primary
    pub async fn get_misaligned_environments(&self) -> Vec<Misalignment> {
        let primary_state = self.primary().state().await;
        let mut misaligned = Vec::new();

        for env in self.environments.iter().filter(|env| !env.primary) {
            let state = env.state().await;
            if state != primary_state {
                misaligned.push(Misalignment {
                    env: env.name.clone(),
                    state,
                    primary_state,
                });
            }
        }

        misaligned
    }

    /// Cancel a straggling environment so it rejoins at the next START.
    ///
    /// Issues `cancel_fn` at most once per detection: an environment already
    /// in CANCEL is left alone until it starts a new round.
    pub async fn handle_misalignment<F, Fut>(
        &self,
        name: &str,
        cancel_fn: F,
    ) -> Result<MisalignmentAction, AlignmentError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let env = self.environment(name)?;
        if env.primary {
            return Err(AlignmentError::PrimaryNotCorrectable(env.name.clone()));
        }

        let primary_state = self.primary().state().await;
        let mut lifecycle = env.lifecycle.lock().await;
        let state = lifecycle.current_state();

        if state == primary_state {
            return Ok(MisalignmentAction::Aligned);
        }
        if state == RoundState::Cancel {
            return Ok(MisalignmentAction::AlreadyCancelled);
        }

        warn!(
            "Table {}: {} is {} while primary is {}, cancelling",
            self.table, env.name, state, primary_state
        );
        cancel_fn()
            .await
            .map_err(|source| AlignmentError::CancelFailed {
                env: env.name.clone(),
                source,
            })?;
        lifecycle.force_state(
            RoundState::Cancel,
            &format!("misaligned with primary ({primary_state})"),
        );

        Ok(MisalignmentAction::Cancelled { from: state })
    }

    /// Detect and cancel every misaligned environment through its own API
    pub async fn realign(&self) -> Vec<(String, Result<MisalignmentAction, AlignmentError>)> {
        let mut results = Vec::new();
        for misalignment in self.get_misaligned_environments().await {
            let env = match self.environment(&misalignment.env) {
                Ok(env) => Arc::clone(env),
                Err(e) => {
                    results.push((misalignment.env, Err(e)));
                    continue;
                }
            };
            let api = Arc::clone(&env.api);
            let result = self
                .handle_misalignment(&misalignment.env, || async move { api.cancel().await })
                .await;
            results.push((misalignment.env, result));
        }
        results
    }

    /// Read every environment's remote status, adopt it where the local
    /// state is still UNKNOWN, then report what is out of line.
    pub async fn initialize_and_sync_environments(&self) -> AlignmentReport {
        let mut report = AlignmentReport::default();

        for env in &self.environments {
            match env.api.get_status().await {
                Ok(status) => {
                    let outcome = env
                        .lifecycle
                        .lock()
                        .await
                        .sync_from_api_state(status.state());
                    // An open remote round keeps its id so it can still be settled
                    let resumable = !matches!(outcome, SyncOutcome::Desync { .. });
                    if let Some(round_id) = status.round_id.clone().filter(|_| resumable) {
                        env.set_round_id(round_id).await;
                    }
                    info!(
                        "Table {}: {} remote status {:?} (round {:?}) -> {:?}",
                        self.table, env.name, status.status, status.round_id, outcome
                    );
                    report.synced.push((env.name.clone(), outcome));
                }
                Err(e) => {
                    warn!(
                        "Table {}: failed to fetch {} status: {:#}",
                        self.table, env.name, e
                    );
                    report.unreachable.push(env.name.clone());
                }
            }
        }

        report.misaligned = self.get_misaligned_environments().await;
        for misalignment in &report.misaligned {
            warn!(
                "Table {}: {} starts misaligned ({} vs primary {})",
                self.table, misalignment.env, misalignment.state, misalignment.primary_state
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::round::{BroadcastNotice, RemoteStatus, StartedRound};
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StatusOnly {
        status: Option<&'static str>,
        cancels: AtomicUsize,
    }

    impl StatusOnly {
        fn new(status: Option<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                status,
                cancels: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl RoundApi for StatusOnly {
        async fn start(&self) -> Result<StartedRound> {
            Ok(StartedRound {
                round_id: "r".to_string(),
                bet_period: 15,
            })
        }
        async fn deal(&self, _round_id: &str, _result: &str) -> Result<()> {
            Ok(())
        }
        async fn bet_stop(&self) -> Result<()> {
            Ok(())
        }
        async fn finish(&self) -> Result<()> {
            Ok(())
        }
        async fn broadcast(&self, _notice: &BroadcastNotice) -> Result<()> {
            Ok(())
        }
        async fn pause(&self, _reason: &str) -> Result<()> {
            Ok(())
        }
        async fn cancel(&self) -> Result<()> {
            self.cancels.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn get_status(&self) -> Result<RemoteStatus> {
            match self.status {
                Some(status) => Ok(RemoteStatus {
                    round_id: Some("r".to_string()),
                    status: status.to_string(),
                    bet_period: 0,
                }),
                None => anyhow::bail!("connection refused"),
            }
        }
    }

    fn aligner(prd: Arc<StatusOnly>, uat: Arc<StatusOnly>) -> EnvironmentAligner {
        EnvironmentAligner::new(
            "T1",
            "PRD",
            vec![
                ("PRD".to_string(), prd as Arc<dyn RoundApi>),
                ("UAT".to_string(), uat as Arc<dyn RoundApi>),
            ],
        )
        .unwrap()
    }

    async fn drive(env: &Environment, apis: &[&str]) {
        let mut lifecycle = env.lifecycle().lock().await;
        for api in apis {
            lifecycle.validate_and_transition(api, "test", None).unwrap();
        }
    }

    #[test]
    fn test_new_requires_primary() {
        let result = EnvironmentAligner::new(
            "T1",
            "PRD",
            vec![("UAT".to_string(), StatusOnly::new(None) as Arc<dyn RoundApi>)],
        );
        assert!(matches!(result, Err(AlignmentError::MissingPrimary(_))));
    }

    #[test]
    fn test_new_rejects_duplicates() {
        let result = EnvironmentAligner::new(
            "T1",
            "PRD",
            vec![
                ("PRD".to_string(), StatusOnly::new(None) as Arc<dyn RoundApi>),
                ("prd".to_string(), StatusOnly::new(None) as Arc<dyn RoundApi>),
            ],
        );
        assert!(matches!(
            result,
            Err(AlignmentError::DuplicateEnvironment(_))
        ));
    }

    #[tokio::test]
    async fn test_primary_is_trivially_aligned() {
        let aligner = aligner(StatusOnly::new(None), StatusOnly::new(None));
        drive(aligner.environment("UAT").unwrap(), &["start_post"]).await;
        assert!(aligner.check_alignment("PRD").await.unwrap());
        assert!(!aligner.check_alignment("UAT").await.unwrap());
    }

    #[tokio::test]
    async fn test_primary_never_corrected() {
        let aligner = aligner(StatusOnly::new(None), StatusOnly::new(None));
        let result = aligner.handle_misalignment("PRD", || async { Ok(()) }).await;
        assert!(matches!(
            result,
            Err(AlignmentError::PrimaryNotCorrectable(_))
        ));
    }

    #[tokio::test]
    async fn test_cancel_issued_once_then_resyncs_on_start() {
        let prd = StatusOnly::new(None);
        let uat = StatusOnly::new(None);
        let aligner = aligner(prd, uat.clone());
        let primary = Arc::clone(aligner.primary());
        let secondary = Arc::clone(aligner.environment("UAT").unwrap());

        drive(&primary, &["start_post", "deal_post"]).await;
        drive(&secondary, &["start_post", "deal_post", "bet_stop_post", "finish_post"]).await;

        let misaligned = aligner.get_misaligned_environments().await;
        assert_eq!(
            misaligned,
            vec![Misalignment {
                env: "UAT".to_string(),
                state: RoundState::Finished,
                primary_state: RoundState::Deal,
            }]
        );

        let first = aligner.realign().await;
        assert!(matches!(
            first[0].1,
            Ok(MisalignmentAction::Cancelled {
                from: RoundState::Finished
            })
        ));
        assert_eq!(secondary.state().await, RoundState::Cancel);

        let second = aligner.realign().await;
        assert!(matches!(second[0].1, Ok(MisalignmentAction::AlreadyCancelled)));
        assert_eq!(uat.cancels.load(Ordering::SeqCst), 1);
        assert!(!aligner.check_alignment("UAT").await.unwrap());

        drive(&primary, &["bet_stop_post", "finish_post", "start_post"]).await;
        assert!(!aligner.check_alignment("UAT").await.unwrap());
        drive(&secondary, &["start_post"]).await;
        assert!(aligner.check_alignment("UAT").await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_cancel_leaves_state() {
        let aligner = aligner(StatusOnly::new(None), StatusOnly::new(None));
        drive(aligner.primary(), &["start_post"]).await;

        let uat = aligner.environment("UAT").unwrap();
        let result = aligner
            .handle_misalignment("UAT", || async { Err(anyhow::anyhow!("timeout")) })
            .await;
        assert!(matches!(result, Err(AlignmentError::CancelFailed { .. })));
        assert_eq!(uat.state().await, RoundState::Unknown);
    }

    #[tokio::test]
    async fn test_initialize_and_sync() {
        let aligner = aligner(StatusOnly::new(Some("deal")), StatusOnly::new(Some("Finished")));
        let report = aligner.initialize_and_sync_environments().await;

        assert_eq!(
            report.synced,
            vec![
                ("PRD".to_string(), SyncOutcome::Adopted(RoundState::Deal)),
                ("UAT".to_string(), SyncOutcome::Adopted(RoundState::Finished)),
            ]
        );
        assert_eq!(report.misaligned.len(), 1);
        assert!(!report.is_aligned());

        // A second sync records nothing new
        let again = aligner.initialize_and_sync_environments().await;
        assert!(again.synced.iter().all(|(_, o)| *o == SyncOutcome::InSync));
        assert_eq!(
            aligner.primary().lifecycle().lock().await.transition_count(),
            1
        );
    }

    #[tokio::test]
    async fn test_initialize_keeps_remote_round_id() {
        let aligner = aligner(StatusOnly::new(Some("start")), StatusOnly::new(Some("deal")));
        aligner.initialize_and_sync_environments().await;

        assert_eq!(aligner.primary().round_id().await.as_deref(), Some("r"));
        assert_eq!(
            aligner.environment("UAT").unwrap().round_id().await.as_deref(),
            Some("r")
        );
    }

    #[tokio::test]
    async fn test_initialize_reports_unreachable() {
        let aligner = aligner(StatusOnly::new(Some("start")), StatusOnly::new(None));
        let report = aligner.initialize_and_sync_environments().await;
        assert_eq!(report.unreachable, vec!["UAT".to_string()]);
    }
}
