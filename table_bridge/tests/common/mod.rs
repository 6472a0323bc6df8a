//! Shared fakes for integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use table_bridge::round::{BroadcastNotice, RemoteStatus, RoundApi, StartedRound};
use table_bridge::session::DeviceLink;

/// In-memory round API that records every call it receives
#[derive(Default)]
pub struct FakeRoundApi {
    calls: Mutex<Vec<String>>,
    status: Mutex<Option<String>>,
    open_round: Mutex<Option<String>>,
    rounds: Mutex<u32>,
}

impl FakeRoundApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// API whose `get_status` reports `status`
    pub fn with_status(status: &str) -> Arc<Self> {
        let api = Self::default();
        *api.status.lock().unwrap() = Some(status.to_string());
        Arc::new(api)
    }

    /// API reporting `status` for an already open round `round_id`
    pub fn with_open_round(status: &str, round_id: &str) -> Arc<Self> {
        let api = Self::with_status(status);
        *api.open_round.lock().unwrap() = Some(round_id.to_string());
        api
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl RoundApi for FakeRoundApi {
    async fn start(&self) -> Result<StartedRound> {
        let mut rounds = self.rounds.lock().unwrap();
        *rounds += 1;
        let round_id = format!("R-{}", *rounds);
        drop(rounds);

        self.record("start".to_string());
        Ok(StartedRound {
            round_id,
            bet_period: 15,
        })
    }

    async fn deal(&self, round_id: &str, result: &str) -> Result<()> {
        self.record(format!("deal {round_id} {result}"));
        Ok(())
    }

    async fn bet_stop(&self) -> Result<()> {
        self.record("bet_stop".to_string());
        Ok(())
    }

    async fn finish(&self) -> Result<()> {
        self.record("finish".to_string());
        Ok(())
    }

    async fn broadcast(&self, notice: &BroadcastNotice) -> Result<()> {
        self.record(format!("broadcast {}", notice.kind));
        Ok(())
    }

    async fn pause(&self, reason: &str) -> Result<()> {
        self.record(format!("pause {reason}"));
        Ok(())
    }

    async fn cancel(&self) -> Result<()> {
        self.record("cancel".to_string());
        Ok(())
    }

    async fn get_status(&self) -> Result<RemoteStatus> {
        match self.status.lock().unwrap().clone() {
            Some(status) => Ok(RemoteStatus {
                round_id: self.open_round.lock().unwrap().clone(),
                status,
                bet_period: 0,
            }),
            None => anyhow::bail!("status unavailable"),
        }
    }
}

/// Device link that keeps every echoed line
#[derive(Clone, Default)]
pub struct RecordingDevice {
    pub sent: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl DeviceLink for RecordingDevice {
    async fn send(&mut self, line: &str) -> Result<()> {
        self.sent.lock().unwrap().push(line.to_string());
        Ok(())
    }

    async fn recv_ack(&mut self) -> Result<String> {
        Ok("OK".to_string())
    }
}

/// One complete spin ending on `number`, starting from start_game
pub fn spin(number: u8) -> Vec<String> {
    vec![
        "*X;2;085;25".to_string(),
        "*X;3;120;0;0".to_string(),
        "*X;4;120;0;0".to_string(),
        "*X;5;120;0;0".to_string(),
        number.to_string(),
    ]
}
