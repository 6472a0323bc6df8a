//! # Table Bridge
//!
//! Connects an unattended electromechanical table (roulette wheel, sicbo
//! shaker) to the round lifecycle API of a remote game server.
//!
//! The device speaks a line-oriented serial protocol; the server speaks a
//! strict round lifecycle. This crate tracks both sides and translates
//! between them without ever sending a call the server would reject.
//!
//! ## Architecture
//!
//! ```text
//! protocol log --LineSource--> TrackerActor (HardwareTracker) --SessionEvent--+
//! operator ------Console-----/                                                |
//!                                                                             v
//!              EnvironmentAligner <--- BridgeDriver <--- plan() <-------------+
//!              (RoundLifecycle + RoundApi per environment)
//! ```
//!
//! ## Core Modules
//!
//! - [`hardware`]: Command classifier and hardware protocol state tracker
//! - [`session`]: Tracker actor, debug console, line sources, device link
//! - [`round`]: Round lifecycle state machine and the abstract round API
//! - [`environment`]: Multi-environment configuration and alignment
//! - [`bridge`]: Maps hardware events onto round calls
//!
//! ## Example
//!
//! ```
//! use table_bridge::hardware::{GameState, HardwareTracker};
//!
//! let mut tracker = HardwareTracker::new("ARO-001");
//! tracker.process_line("*X;1").unwrap();
//! tracker.process_line("*X;2").unwrap();
//! assert_eq!(tracker.state().game_state, GameState::PlaceBet);
//! ```

/// Round-call planning and execution.
pub mod bridge;
pub use bridge::{BridgeDriver, PlannedCall};

/// Deployment environments and alignment.
pub mod environment;
pub use environment::{EnvironmentAligner, EnvironmentConfig};

/// Hardware protocol classification and state tracking.
pub mod hardware;
pub use hardware::{Command, HardwareState, HardwareTracker, ProtocolFault, classify};

/// Round lifecycle state machine.
pub mod round;
pub use round::{RoundApi, RoundLifecycle, RoundState, TransitionError};

/// Per-table hardware session.
pub mod session;
pub use session::{Console, TrackerActor, TrackerHandle};
