//! Hardware session: one actor per table applying protocol lines in order.
//!
//! ## Architecture
//!
//! A [`TrackerActor`] owns the table's [`HardwareTracker`](crate::hardware::HardwareTracker)
//! and runs in its own Tokio task with an mpsc inbox. Log lines arrive from a
//! [`LineSource`] through [`pump`]; operator commands arrive through the
//! [`Console`]. Both use a cloneable [`TrackerHandle`]. Every processed line
//! is echoed to the [`DeviceLink`], and tracker events are pushed to
//! subscribers as [`SessionEvent`]s. The first protocol fault ends the
//! session.

pub mod actor;
pub mod console;
pub mod device;
pub mod errors;
pub mod messages;
pub mod source;

pub use actor::{TrackerActor, TrackerHandle};
pub use console::{Console, render_snapshot};
pub use device::{DEFAULT_ACK_TIMEOUT, DeviceLink, LoggingDevice, echo_with_ack};
pub use errors::{DeviceError, SessionError, SessionResult};
pub use messages::{LineOrigin, LineOutcome, SessionEvent, SessionOutcome, TrackerMessage};
pub use source::{
    DEFAULT_POLL_INTERVAL, FileTail, LineSource, PumpReport, PumpStop, ReplaySource, pump,
};
