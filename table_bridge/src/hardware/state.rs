//! Hardware state model: game phases, protocol modes, faults and watchdogs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Maximum repeats per transition before the watchdog fires, tuned from
/// production logs.
pub const X1_MAX_WAITING_TIME: u32 = 17;
pub const X2_MAX_WAITING_TIME: u32 = 21;
pub const X3_MAX_WAITING_TIME: u32 = 16;
pub const X4_MAX_WAITING_TIME: u32 = 43;
pub const X5_MAX_WAITING_TIME: u32 = 4;
pub const X6_MAX_WAITING_TIME: u32 = 100;

/// Repeated `*P 0` tolerated while already powered off
pub const POWER_OFF_MAX_DELAY: u32 = 5;

/// Repeated no-more-bet commands after which the wheel is considered stuck.
///
/// Kept separate from [`X4_MAX_WAITING_TIME`]; the two thresholds disagree
/// and both are honoured (see DESIGN.md).
pub const NMB_STUCK_THRESHOLD: u32 = 20;

/// `*F 2` reports while stuck in NMB before the table is force-closed
pub const F2_FORCE_CLOSE_THRESHOLD: u32 = 5;

/// Game phase reported by `*X;n`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameState {
    TableClosed,
    StartGame,
    PlaceBet,
    BallLaunch,
    NoMoreBet,
    WinningNumber,
}

impl GameState {
    /// State a `*X;n` command moves the table into
    pub fn target_of(transition: u8) -> Option<GameState> {
        match transition {
            1 => Some(GameState::StartGame),
            2 => Some(GameState::PlaceBet),
            3 => Some(GameState::BallLaunch),
            4 => Some(GameState::NoMoreBet),
            5 => Some(GameState::WinningNumber),
            6 => Some(GameState::TableClosed),
            _ => None,
        }
    }

    /// Transitions that legally advance out of this state
    pub fn successors(self) -> &'static [u8] {
        match self {
            GameState::TableClosed => &[1],
            GameState::StartGame => &[2],
            GameState::PlaceBet => &[3],
            GameState::BallLaunch => &[4],
            GameState::NoMoreBet => &[5],
            GameState::WinningNumber => &[2, 6],
        }
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GameState::TableClosed => "table_closed",
            GameState::StartGame => "start_game",
            GameState::PlaceBet => "place_bet",
            GameState::BallLaunch => "ball_launch",
            GameState::NoMoreBet => "no_more_bet",
            GameState::WinningNumber => "winning_number",
        };
        write!(f, "{name}")
    }
}

/// Which command family the device is currently speaking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolMode {
    PowerSetting,
    Game,
    Operation,
    SelfTest,
    Calibration,
    WarningFlag,
    Statistics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerState {
    On,
    Off,
}

/// Operator-facing alarm level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Named error state derived from `*F` codes and the NMB watchdog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorState {
    /// F1, needs maintenance
    HardwareFault,
    /// F2 outside of a stuck NMB phase
    SelfTest,
    /// Too many repeated `*X;4`
    StuckNmb,
    /// F3
    NoWinningNumberDetected,
    /// F4
    InvalidBallDirection,
    /// F5
    MotorDriveIssue,
    /// F6
    EncoderFailure,
    /// F7
    BallNotReachPosition,
    /// F11/12/13/21/22/23
    SensorStuck(u8),
}

impl ErrorState {
    /// Map a `*F` code to its error state. F2 is handled by the tracker since
    /// its meaning depends on the NMB counter.
    pub fn from_fault_code(code: u8) -> Option<ErrorState> {
        match code {
            1 => Some(ErrorState::HardwareFault),
            2 => Some(ErrorState::SelfTest),
            3 => Some(ErrorState::NoWinningNumberDetected),
            4 => Some(ErrorState::InvalidBallDirection),
            5 => Some(ErrorState::MotorDriveIssue),
            6 => Some(ErrorState::EncoderFailure),
            7 => Some(ErrorState::BallNotReachPosition),
            11 | 12 | 13 | 21 | 22 | 23 => Some(ErrorState::SensorStuck(code)),
            _ => None,
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            ErrorState::HardwareFault | ErrorState::MotorDriveIssue | ErrorState::EncoderFailure => {
                Severity::Critical
            }
            ErrorState::StuckNmb
            | ErrorState::NoWinningNumberDetected
            | ErrorState::InvalidBallDirection
            | ErrorState::BallNotReachPosition
            | ErrorState::SensorStuck(_) => Severity::Warning,
            ErrorState::SelfTest => Severity::Info,
        }
    }
}

impl fmt::Display for ErrorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorState::HardwareFault => write!(f, "hardware fault, maintenance required"),
            ErrorState::SelfTest => write!(f, "self-test"),
            ErrorState::StuckNmb => write!(f, "stuck in no-more-bet"),
            ErrorState::NoWinningNumberDetected => write!(f, "no winning number detected"),
            ErrorState::InvalidBallDirection => write!(f, "invalid ball direction"),
            ErrorState::MotorDriveIssue => write!(f, "motor drive issue"),
            ErrorState::EncoderFailure => write!(f, "encoder failure"),
            ErrorState::BallNotReachPosition => write!(f, "ball did not reach position"),
            ErrorState::SensorStuck(code) => write!(f, "sensor stuck (F{code})"),
        }
    }
}

/// Per-transition watchdog that can time out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Watchdog {
    X1,
    X2,
    X3,
    X4,
    X5,
    X6,
    PowerOffDelay,
}

impl Watchdog {
    /// Watchdog guarding the state that `*X;n` targets
    pub fn for_transition(transition: u8) -> Option<Watchdog> {
        match transition {
            1 => Some(Watchdog::X1),
            2 => Some(Watchdog::X2),
            3 => Some(Watchdog::X3),
            4 => Some(Watchdog::X4),
            5 => Some(Watchdog::X5),
            6 => Some(Watchdog::X6),
            _ => None,
        }
    }

    pub fn max_wait(self) -> u32 {
        match self {
            Watchdog::X1 => X1_MAX_WAITING_TIME,
            Watchdog::X2 => X2_MAX_WAITING_TIME,
            Watchdog::X3 => X3_MAX_WAITING_TIME,
            Watchdog::X4 => X4_MAX_WAITING_TIME,
            Watchdog::X5 => X5_MAX_WAITING_TIME,
            Watchdog::X6 => X6_MAX_WAITING_TIME,
            Watchdog::PowerOffDelay => POWER_OFF_MAX_DELAY,
        }
    }
}

impl fmt::Display for Watchdog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Watchdog::PowerOffDelay => write!(f, "power-off delay"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Repeat counters for the six game transitions plus the power-off delay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitCounters {
    pub transitions: [u32; 6],
    pub power_off_delay: u32,
}

impl WaitCounters {
    pub fn get(&self, watchdog: Watchdog) -> u32 {
        match watchdog.slot() {
            Some(idx) => self.transitions[idx],
            None => self.power_off_delay,
        }
    }

    /// Bump a counter and return its new value
    pub(crate) fn bump(&mut self, watchdog: Watchdog) -> u32 {
        let slot = match watchdog.slot() {
            Some(idx) => &mut self.transitions[idx],
            None => &mut self.power_off_delay,
        };
        *slot += 1;
        *slot
    }

    pub fn is_clear(&self) -> bool {
        *self == WaitCounters::default()
    }
}

impl Watchdog {
    /// Index into [`WaitCounters::transitions`]; `None` for the power-off delay
    fn slot(self) -> Option<usize> {
        match self {
            Watchdog::X1 => Some(0),
            Watchdog::X2 => Some(1),
            Watchdog::X3 => Some(2),
            Watchdog::X4 => Some(3),
            Watchdog::X5 => Some(4),
            Watchdog::X6 => Some(5),
            Watchdog::PowerOffDelay => None,
        }
    }
}

/// Snapshot of everything the tracker knows about the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareState {
    pub game_state: GameState,
    pub protocol_mode: ProtocolMode,
    pub power_state: PowerState,
    pub error_state: Option<ErrorState>,
    pub waits: WaitCounters,
    /// Repeated `*X;4` since the last fault-counter reset
    pub x4_wait: u32,
    /// `*F 2` reports received while stuck in NMB
    pub f2_count: u32,
    pub last_winning_number: Option<u8>,
}

impl Default for HardwareState {
    fn default() -> Self {
        Self {
            game_state: GameState::TableClosed,
            protocol_mode: ProtocolMode::Game,
            power_state: PowerState::On,
            error_state: None,
            waits: WaitCounters::default(),
            x4_wait: 0,
            f2_count: 0,
            last_winning_number: None,
        }
    }
}
