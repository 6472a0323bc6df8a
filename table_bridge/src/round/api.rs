//! Abstract round API consumed by the bridge.
//!
//! The transport lives outside this crate; `tb_server` provides the HTTP
//! implementation, tests provide in-memory fakes.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::state_machine::RoundState;

/// Response to `start`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartedRound {
    pub round_id: String,
    /// Seconds players have to place bets
    pub bet_period: u32,
}

/// Round status as reported by the remote server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteStatus {
    pub round_id: Option<String>,
    pub status: String,
    pub bet_period: u32,
}

impl RemoteStatus {
    pub fn state(&self) -> RoundState {
        RoundState::from_status(&self.status)
    }
}

/// Out-of-band anomaly report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastNotice {
    pub kind: String,
    pub audience: String,
    pub after_seconds: u32,
}

impl BroadcastNotice {
    /// Notice shown to players straight away
    pub fn to_players(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            audience: "players".to_string(),
            after_seconds: 0,
        }
    }
}

/// Remote round lifecycle operations for one deployment environment
#[async_trait]
pub trait RoundApi: Send + Sync {
    async fn start(&self) -> Result<StartedRound>;

    async fn deal(&self, round_id: &str, result: &str) -> Result<()>;

    async fn bet_stop(&self) -> Result<()>;

    async fn finish(&self) -> Result<()>;

    async fn broadcast(&self, notice: &BroadcastNotice) -> Result<()>;

    async fn pause(&self, reason: &str) -> Result<()>;

    async fn cancel(&self) -> Result<()>;

    async fn get_status(&self) -> Result<RemoteStatus>;
}
