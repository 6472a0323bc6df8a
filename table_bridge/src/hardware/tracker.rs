//! Hardware protocol state tracker.
//!
//! Consumes classified [`Command`]s one at a time and keeps the game, protocol
//! and power state of the device in sync with what it reports. Every
//! transition has a repeat watchdog; exceeding one ends the session.

use std::collections::VecDeque;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::command::{Command, classify};
use super::errors::{ProtocolFault, ProtocolResult};
use super::state::{
    ErrorState, F2_FORCE_CLOSE_THRESHOLD, GameState, HardwareState, NMB_STUCK_THRESHOLD,
    PowerState, ProtocolMode, WaitCounters, Watchdog,
};
use super::warning::{self, WarningBit};

/// Things the tracker noticed that other parts of the bridge care about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HardwareEvent {
    /// The table moved to a new game phase
    StateAdvanced { from: GameState, to: GameState },
    /// A warning flag forced the table back to `start_game`
    RoundRestart { mask: u8, bits: Vec<WarningBit> },
    FaultRaised(ErrorState),
    /// The table was closed without a `*X;6`
    TableForceClosed { reason: String },
    /// First winning number seen for the current spin
    WinningNumber(u8),
    PowerChanged(PowerState),
}

/// Tracks one hardware session.
///
/// Mutated only through [`advance`](Self::advance); wrap it in a
/// [`TrackerActor`](crate::session::TrackerActor) when more than one
/// producer needs to feed it.
#[derive(Debug)]
pub struct HardwareTracker {
    table: String,
    state: HardwareState,
    events: VecDeque<HardwareEvent>,
}

impl HardwareTracker {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            state: HardwareState::default(),
            events: VecDeque::new(),
        }
    }

    /// Start from a known state, e.g. when resuming after a restart
    pub fn with_state(table: impl Into<String>, state: HardwareState) -> Self {
        Self {
            table: table.into(),
            state,
            events: VecDeque::new(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn state(&self) -> &HardwareState {
        &self.state
    }

    pub fn snapshot(&self) -> HardwareState {
        self.state.clone()
    }

    pub fn drain_events(&mut self) -> VecDeque<HardwareEvent> {
        std::mem::take(&mut self.events)
    }

    /// Classify a raw line and feed it through [`advance`](Self::advance)
    pub fn process_line(&mut self, line: &str) -> ProtocolResult<Command> {
        let command = classify(line)?;
        self.advance(command)?;
        Ok(command)
    }

    /// Apply a single command to the tracked state.
    ///
    /// # Errors
    ///
    /// Any [`ProtocolFault`] means the device can no longer be trusted and
    /// the caller must end the session.
    pub fn advance(&mut self, command: Command) -> ProtocolResult<()> {
        debug!("Table {}: {} while {}", self.table, command, self.state.game_state);

        match command {
            Command::PowerOn => {
                self.power_on();
                Ok(())
            }
            Command::PowerOff => self.power_off(),
            Command::PowerAck => Ok(()),
            Command::GameTransition(n) => self.game_transition(n),
            Command::Fault(code) => self.fault(code),
            Command::WarningFlag(mask) => {
                self.warning_flag(mask);
                Ok(())
            }
            Command::Calibration => {
                self.state.protocol_mode = ProtocolMode::Calibration;
                Ok(())
            }
            Command::Statistics => {
                self.state.protocol_mode = ProtocolMode::Statistics;
                Ok(())
            }
            Command::OperationMode => {
                self.state.protocol_mode = ProtocolMode::Operation;
                Ok(())
            }
            Command::TimingSetting => Ok(()),
            Command::WinningNumber(n) => {
                self.winning_number(n);
                Ok(())
            }
        }
    }

    fn power_on(&mut self) {
        self.reset_fault_counters();

        if self.state.power_state == PowerState::On {
            debug!("Table {}: power-on while already on", self.table);
            return;
        }

        self.state.power_state = PowerState::On;
        self.state.protocol_mode = ProtocolMode::PowerSetting;
        self.reset_waits();
        self.events.push_back(HardwareEvent::PowerChanged(PowerState::On));
        info!("Table {}: powered on", self.table);
    }

    fn power_off(&mut self) -> ProtocolResult<()> {
        self.reset_fault_counters();

        if self.state.power_state == PowerState::Off {
            let delay = self.state.waits.bump(Watchdog::PowerOffDelay);
            if delay > Watchdog::PowerOffDelay.max_wait() {
                warn!("Table {}: power-off delay exceeded ({delay})", self.table);
                return Err(ProtocolFault::TransitionTimeout(Watchdog::PowerOffDelay));
            }
            return Ok(());
        }

        self.state.power_state = PowerState::Off;
        self.state.protocol_mode = ProtocolMode::PowerSetting;
        if self.state.game_state != GameState::TableClosed {
            self.state.game_state = GameState::TableClosed;
            self.events.push_back(HardwareEvent::TableForceClosed {
                reason: "power off".to_string(),
            });
        }
        self.reset_waits();
        self.events.push_back(HardwareEvent::PowerChanged(PowerState::Off));
        info!("Table {}: powered off", self.table);
        Ok(())
    }

    fn game_transition(&mut self, n: u8) -> ProtocolResult<()> {
        let current = self.state.game_state;
        let (Some(target), Some(watchdog)) = (GameState::target_of(n), Watchdog::for_transition(n))
        else {
            return Err(self.invalid(Command::GameTransition(n)));
        };

        if current == target {
            if n == 4 {
                self.track_nmb_repeat();
            }

            let waited = self.state.waits.bump(watchdog);
            if waited > watchdog.max_wait() {
                warn!(
                    "Table {}: {} repeated {} times in {}",
                    self.table, watchdog, waited, current
                );
                return Err(ProtocolFault::TransitionTimeout(watchdog));
            }
            return Ok(());
        }

        if !current.successors().contains(&n) {
            return Err(self.invalid(Command::GameTransition(n)));
        }

        // Opening and closing the table start from a clean fault slate
        if n == 1 || n == 6 {
            self.reset_fault_counters();
        }

        self.state.game_state = target;
        self.state.protocol_mode = ProtocolMode::Game;
        self.reset_waits();
        if target == GameState::PlaceBet {
            self.state.last_winning_number = None;
        }
        self.events.push_back(HardwareEvent::StateAdvanced {
            from: current,
            to: target,
        });
        debug!("Table {}: {} -> {}", self.table, current, target);
        Ok(())
    }

    /// Secondary NMB watchdog, independent of the X4 limit
    fn track_nmb_repeat(&mut self) {
        self.state.x4_wait += 1;
        if self.state.x4_wait >= NMB_STUCK_THRESHOLD
            && self.state.error_state != Some(ErrorState::StuckNmb)
        {
            warn!(
                "Table {}: no-more-bet repeated {} times, wheel looks stuck",
                self.table, self.state.x4_wait
            );
            self.state.error_state = Some(ErrorState::StuckNmb);
            self.events
                .push_back(HardwareEvent::FaultRaised(ErrorState::StuckNmb));
        }
    }

    fn fault(&mut self, code: u8) -> ProtocolResult<()> {
        if code == 2 && self.state.x4_wait >= NMB_STUCK_THRESHOLD {
            self.state.protocol_mode = ProtocolMode::SelfTest;
            self.state.f2_count += 1;
            if self.state.f2_count >= F2_FORCE_CLOSE_THRESHOLD {
                self.force_close("stuck in no-more-bet");
            }
            return Ok(());
        }

        let Some(error) = ErrorState::from_fault_code(code) else {
            return Err(self.invalid(Command::Fault(code)));
        };

        self.state.protocol_mode = ProtocolMode::SelfTest;
        self.state.error_state = Some(error);
        self.events.push_back(HardwareEvent::FaultRaised(error));
        warn!("Table {}: F{} {}", self.table, code, error);

        if error == ErrorState::HardwareFault {
            return Err(ProtocolFault::MaintenanceRequired);
        }
        Ok(())
    }

    fn warning_flag(&mut self, mask: u8) {
        let bits = warning::decompose(mask);
        if bits.is_empty() {
            self.state.protocol_mode = ProtocolMode::WarningFlag;
            return;
        }

        if self.state.power_state == PowerState::Off
            || self.state.game_state == GameState::TableClosed
        {
            self.state.protocol_mode = ProtocolMode::WarningFlag;
            warn!(
                "Table {}: warning flag {} while {} with power {:?}, no round to restart",
                self.table, mask, self.state.game_state, self.state.power_state
            );
            return;
        }

        warn!(
            "Table {}: warning flag {} (ball removed, not sensed), restarting round",
            self.table, mask
        );
        self.reset_waits();
        self.state.game_state = GameState::StartGame;
        self.state.protocol_mode = ProtocolMode::Game;
        self.events
            .push_back(HardwareEvent::RoundRestart { mask, bits });
    }

    fn winning_number(&mut self, n: u8) {
        if !matches!(
            self.state.game_state,
            GameState::NoMoreBet | GameState::WinningNumber
        ) {
            warn!(
                "Table {}: winning number {} ignored while {}",
                self.table, n, self.state.game_state
            );
            return;
        }

        if self.state.last_winning_number.is_none() {
            self.state.last_winning_number = Some(n);
            self.events.push_back(HardwareEvent::WinningNumber(n));
            info!("Table {}: winning number {}", self.table, n);
        }
    }

    fn force_close(&mut self, reason: &str) {
        warn!("Table {}: force-closing table, {}", self.table, reason);
        self.state.game_state = GameState::TableClosed;
        self.reset_waits();
        self.reset_fault_counters();
        self.events.push_back(HardwareEvent::TableForceClosed {
            reason: reason.to_string(),
        });
    }

    fn reset_waits(&mut self) {
        self.state.waits = WaitCounters::default();
    }

    /// Clears the error state and both NMB sub-counters
    pub fn reset_fault_counters(&mut self) {
        self.state.error_state = None;
        self.state.f2_count = 0;
        self.state.x4_wait = 0;
    }

    fn invalid(&self, command: Command) -> ProtocolFault {
        warn!(
            "Table {}: {} is out of sequence while {}",
            self.table, command, self.state.game_state
        );
        ProtocolFault::InvalidState {
            state: self.state.game_state,
            command: command.to_string(),
        }
    }
}
