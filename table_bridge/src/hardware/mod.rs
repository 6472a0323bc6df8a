//! SS2 hardware protocol: line classification and state tracking.
//!
//! Data flows one way through this module:
//!
//! ```text
//! log line --classify()--> Command --HardwareTracker::advance()--> HardwareState
//!                                                        \--> HardwareEvent queue
//! ```
//!
//! Classification errors and tracker faults are both fatal to the hardware
//! session; callers stop their loop on the first `Err`.

pub mod command;
pub mod errors;
pub mod state;
pub mod tracker;
pub mod warning;

pub use command::{Command, classify};
pub use errors::{ClassifyError, ProtocolFault, ProtocolResult};
pub use state::{
    ErrorState, GameState, HardwareState, PowerState, ProtocolMode, Severity, WaitCounters,
    Watchdog,
};
pub use tracker::{HardwareEvent, HardwareTracker};
pub use warning::WarningBit;
