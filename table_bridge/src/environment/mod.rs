//! Multi-environment alignment.
//!
//! A table reports every round to several deployments at once. The primary
//! drives the game; the others follow, and any that fall out of step are
//! cancelled so they rejoin at the next START.

pub mod aligner;
pub mod config;

pub use aligner::{
    AlignmentError, AlignmentReport, Environment, EnvironmentAligner, Misalignment,
    MisalignmentAction,
};
pub use config::EnvironmentConfig;
