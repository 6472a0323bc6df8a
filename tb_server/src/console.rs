//! Interactive operator console on stdin.

use crossterm::style::Stylize;
use table_bridge::hardware::{ErrorState, Severity};
use table_bridge::session::{Console, SessionError, render_snapshot};
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "\
Console commands:
  status        Show the current hardware state
  help          Show this message
  quit          Leave the console (the bridge keeps running)
  <line>        Any protocol line, e.g. *X;2 or *F 3
";

/// One-line alarm, colored by severity
pub fn alarm_line(table: &str, error: ErrorState) -> String {
    let text = format!("[{table}] {error}");
    match error.severity() {
        Severity::Critical => text.red().bold().to_string(),
        Severity::Warning => text.yellow().to_string(),
        Severity::Info => text.cyan().to_string(),
    }
}

/// Read operator commands from stdin until EOF, `quit` or the session ends
pub async fn run_stdin(console: Console) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{}", "Debug console ready, type 'help' for commands".dark_grey());

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => continue,
            "quit" | "exit" => break,
            "help" => print!("{HELP}"),
            "status" => match console.status().await {
                Ok(state) => print!("{}", render_snapshot(&state)),
                Err(e) => {
                    println!("{}", e.to_string().red());
                    break;
                }
            },
            command => match console.submit(command).await {
                Ok(outcome) => {
                    println!("{} {}", "ok".green(), outcome.command);
                    print!("{}", render_snapshot(&outcome.state));
                }
                Err(SessionError::Fault(fault)) => {
                    println!("{} {}", "session terminated:".red().bold(), fault);
                    break;
                }
                Err(SessionError::Closed) => {
                    println!("{}", "session is closed".red());
                    break;
                }
            },
        }
    }

    Ok(())
}
