//! Fault/debug console.
//!
//! Operators type protocol commands by hand to test or unstick a table.
//! Console input goes through the same actor inbox as the protocol log, so
//! it is serialised with the main loop and has no extra privileges.

use std::fmt::Write as _;

use log::info;

use super::{
    actor::TrackerHandle,
    errors::SessionResult,
    messages::{LineOrigin, LineOutcome},
};
use crate::hardware::HardwareState;

/// Operator console bound to one table's tracker
#[derive(Clone)]
pub struct Console {
    handle: TrackerHandle,
}

impl Console {
    pub fn new(handle: TrackerHandle) -> Self {
        Self { handle }
    }

    /// Run one command through the normal pipeline and return the result
    pub async fn submit(&self, line: &str) -> SessionResult<LineOutcome> {
        info!("Table {}: console command {:?}", self.handle.table(), line.trim());
        self.handle
            .process_line(line.trim(), LineOrigin::Console)
            .await
    }

    /// Current hardware state without changing anything
    pub async fn status(&self) -> SessionResult<HardwareState> {
        self.handle.snapshot().await
    }
}

/// Plain-text, multi-line rendering of a hardware snapshot
pub fn render_snapshot(state: &HardwareState) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "game state    : {}", state.game_state);
    let _ = writeln!(out, "protocol mode : {:?}", state.protocol_mode);
    let _ = writeln!(out, "power         : {:?}", state.power_state);
    match state.error_state {
        Some(error) => {
            let _ = writeln!(out, "error         : {} ({:?})", error, error.severity());
        }
        None => {
            let _ = writeln!(out, "error         : none");
        }
    }
    let _ = writeln!(
        out,
        "waits X1..X6  : {:?}  power-off delay: {}",
        state.waits.transitions, state.waits.power_off_delay
    );
    let _ = writeln!(
        out,
        "nmb repeats   : {}  f2 reports: {}",
        state.x4_wait, state.f2_count
    );
    if let Some(n) = state.last_winning_number {
        let _ = writeln!(out, "last number   : {n}");
    }
    out
}
