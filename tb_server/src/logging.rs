//! Structured logging configuration.
//!
//! The library logs through the `log` facade; `tracing-subscriber` picks
//! those records up through its `tracing-log` bridge, so one filter covers
//! both.

use table_bridge::bridge::{CallOutcome, CallReport};
use table_bridge::hardware::{ErrorState, Severity};
use table_bridge::session::SessionOutcome;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging
///
/// Log levels are configurable via the `RUST_LOG` env var.
///
/// # Example
///
/// ```ignore
/// logging::init();
/// tracing::info!("Bridge starting");
/// ```
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn,hyper=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log a hardware alarm at the level matching its severity
pub fn log_hardware_alarm(table: &str, error: ErrorState) {
    let severity = error.severity();
    match severity {
        Severity::Critical => tracing::error!(
            table = table,
            severity = ?severity,
            "ALARM: {}",
            error
        ),
        Severity::Warning => tracing::warn!(
            table = table,
            severity = ?severity,
            "ALARM: {}",
            error
        ),
        Severity::Info => tracing::info!(
            table = table,
            severity = ?severity,
            "Hardware notice: {}",
            error
        ),
    }
}

/// Log the result of one round call on one environment
pub fn log_round_call(table: &str, report: &CallReport) {
    let api = report.call.api_name();
    match &report.outcome {
        CallOutcome::Committed(state) => tracing::info!(
            table = table,
            env = %report.env,
            primary = report.primary,
            api = api,
            state = %state,
            "Round call committed"
        ),
        CallOutcome::Rejected(reason) => tracing::warn!(
            table = table,
            env = %report.env,
            primary = report.primary,
            api = api,
            "Round call rejected: {}",
            reason
        ),
        CallOutcome::Failed(reason) => tracing::error!(
            table = table,
            env = %report.env,
            primary = report.primary,
            api = api,
            "Round call failed: {}",
            reason
        ),
    }
}

/// Log how a hardware session ended
pub fn log_session_outcome(table: &str, outcome: &SessionOutcome) {
    match &outcome.fault {
        Some(fault) => tracing::error!(
            table = table,
            session_id = %outcome.session_id,
            lines = outcome.lines_processed,
            fault = fault.label(),
            "Hardware session terminated: {}",
            fault
        ),
        None => tracing::info!(
            table = table,
            session_id = %outcome.session_id,
            lines = outcome.lines_processed,
            game_state = %outcome.final_state.game_state,
            "Hardware session closed"
        ),
    }
}
