//! Unattended table bridge.
//!
//! Follows the device's protocol log through a TrackerActor, turns hardware
//! events into round API calls on every configured environment, and keeps
//! the non-primary environments aligned with the primary.

mod config;
mod console;
mod logging;
mod round_client;

use std::sync::Arc;

use anyhow::{Context, Error};
use ctrlc::set_handler;
use log::{error, info, warn};
use pico_args::Arguments;
use table_bridge::{
    bridge::BridgeDriver,
    environment::EnvironmentAligner,
    hardware::HardwareEvent,
    round::RoundApi,
    session::{Console, FileTail, LoggingDevice, SessionEvent, TrackerActor, pump},
};

use config::{BridgeConfig, CliOverrides};
use round_client::HttpRoundClient;

const HELP: &str = "\
Bridge an unattended table's hardware protocol to the round API

USAGE:
  tb_server [OPTIONS]

OPTIONS:
  --table      ID          Table identifier            [default: env BRIDGE_TABLE]
  --log        PATH        Device protocol log         [default: env BRIDGE_LOG_PATH]

FLAGS:
  --from-start             Replay the existing log before following it
  --console                Read operator commands from stdin
  -h, --help               Print help information

ENVIRONMENT:
  BRIDGE_ENVIRONMENTS      Comma-separated environments (e.g., PRD,UAT)
  BRIDGE_PRIMARY           Environment that drives the game [default: PRD]
  BRIDGE_<ENV>_BASE_URL    Round API base URL per environment
  BRIDGE_<ENV>_TOKEN       Round API bearer token per environment
  (See .env file for all configuration options)
";

struct Args {
    overrides: CliOverrides,
    console: bool,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let args = Args {
        overrides: CliOverrides {
            table: pargs.opt_value_from_str("--table")?,
            log_path: pargs.opt_value_from_str("--log")?,
            from_start: pargs.contains("--from-start"),
        },
        console: pargs.contains("--console"),
    };

    // Catching signals for exit.
    set_handler(|| std::process::exit(0))?;

    logging::init();

    let config = BridgeConfig::from_env(args.overrides)?;
    config.validate()?;
    info!(
        "Starting bridge for table {} ({} environment(s), primary {})",
        config.table,
        config.environments.len(),
        config.primary
    );

    let mut apis: Vec<(String, Arc<dyn RoundApi>)> = Vec::with_capacity(config.environments.len());
    for env in &config.environments {
        info!("Environment {:?}", env);
        let client = HttpRoundClient::new(env)
            .with_context(|| format!("Failed to create round client for {}", env.name))?;
        let client: Arc<dyn RoundApi> = Arc::new(client);
        apis.push((env.name.clone(), client));
    }

    let aligner = Arc::new(EnvironmentAligner::new(&config.table, &config.primary, apis)?);
    let report = aligner.initialize_and_sync_environments().await;
    if report.is_aligned() {
        info!("All environments reachable and aligned");
    } else {
        warn!(
            "Startup sync: {} unreachable, {} misaligned",
            report.unreachable.len(),
            report.misaligned.len()
        );
    }

    // Hardware session
    let (actor, handle) =
        TrackerActor::new(&config.table, Box::new(LoggingDevice::new()), config.ack_timeout);
    let (_, mut events) = handle.subscribe().await?;
    let session = tokio::spawn(actor.run());

    // Hardware events -> round calls
    let driver = BridgeDriver::new(Arc::clone(&aligner));
    let table = config.table.clone();
    let bridge = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if let SessionEvent::Hardware(HardwareEvent::FaultRaised(error)) = &event {
                logging::log_hardware_alarm(&table, *error);
                eprintln!("{}", console::alarm_line(&table, *error));
            }
            for report in driver.handle_event(&event).await {
                logging::log_round_call(&table, &report);
            }
        }
    });

    // Periodic alignment of non-primary environments
    let align_interval = config.align_interval;
    let aligner_task = Arc::clone(&aligner);
    let alignment = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(align_interval);
        loop {
            ticker.tick().await;
            for (env, result) in aligner_task.realign().await {
                match result {
                    Ok(action) => info!("Alignment {}: {:?}", env, action),
                    Err(e) => error!("Alignment {}: {}", env, e),
                }
            }
        }
    });

    // Protocol log -> hardware session
    let source = FileTail::open(&config.log_path, config.from_start, config.tick)
        .await
        .with_context(|| format!("Failed to follow {}", config.log_path.display()))?;
    let pump_handle = handle.clone();
    let pump_task = tokio::spawn(async move {
        match pump(source, pump_handle).await {
            Ok(report) => info!(
                "Log pump stopped after {} line(s): {:?}",
                report.forwarded, report.stop
            ),
            Err(e) => error!("Log pump failed: {:#}", e),
        }
    });

    if args.console {
        let operator = Console::new(handle.clone());
        tokio::spawn(async move {
            if let Err(e) = console::run_stdin(operator).await {
                error!("Console failed: {:#}", e);
            }
        });
    }
    drop(handle);

    let outcome = session.await.context("Hardware session task failed")?;
    logging::log_session_outcome(&config.table, &outcome);

    // Let the bridge finish the abort sequence for a faulted session
    if let Err(e) = bridge.await {
        error!("Bridge task failed: {}", e);
    }
    alignment.abort();
    pump_task.abort();

    match outcome.fault {
        Some(fault) => Err(anyhow::anyhow!("Hardware session terminated: {}", fault)),
        None => Ok(()),
    }
}
