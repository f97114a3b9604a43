//! `tabula` command-line entry point.
//!
//! Usage:
//!   tabula sync
//!   tabula browse <table> [key=value ...]
//!
//! Results are printed to stdout as JSON; logs go to stderr.

use tabula_api::telemetry::{init_tracing, TelemetryConfig};
use tabula_api::{ApiError, ApiResult, Tabula};
use tabula_core::BrowseRequest;
use tabula_storage::with_deadline;
use tokio::sync::watch;

const USAGE: &str = "Usage: tabula sync | tabula browse <table> [key=value ...]";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Sync,
    Browse(BrowseRequest),
}

fn parse_command(args: &[String]) -> ApiResult<Command> {
    match args.split_first() {
        Some((cmd, rest)) if cmd == "sync" && rest.is_empty() => Ok(Command::Sync),
        Some((cmd, rest)) if cmd == "browse" => {
            let (table, pairs) = rest
                .split_first()
                .ok_or_else(|| ApiError::missing_field("table"))?;

            let mut params = vec![("table".to_string(), table.clone())];
            for pair in pairs {
                let (key, value) = pair.split_once('=').ok_or_else(|| {
                    ApiError::invalid_input(format!("Expected key=value, got: {}", pair))
                })?;
                params.push((key.to_string(), value.to_string()));
            }
            Ok(Command::Browse(BrowseRequest::from_params(params)?))
        }
        _ => Err(ApiError::invalid_input(USAGE)),
    }
}

/// Raise the shutdown flag on Ctrl-C.
fn shutdown_signal() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            let _ = tx.send(true);
        }
    });
    rx
}

async fn run(command: Command) -> ApiResult<()> {
    let tabula = Tabula::from_env()?;
    tabula.store.ensure_schema().await?;
    let shutdown = shutdown_signal();

    let output = match command {
        Command::Sync => {
            let sync = tabula.schema_sync();
            let report = with_deadline(
                "schema sync",
                sync.run_cancellable(shutdown),
                tabula.config.sync_timeout,
            )
            .await?;
            serde_json::to_string_pretty(&report)?
        }
        Command::Browse(request) => {
            let response = tabula
                .browse_service()
                .execute(&request, Some(shutdown))
                .await?;
            serde_json::to_string_pretty(&response)?
        }
    };

    println!("{}", output);
    Ok(())
}

#[tokio::main]
async fn main() {
    let telemetry_config = TelemetryConfig::default();
    if let Err(e) = init_tracing(&telemetry_config) {
        eprintln!("{}", e);
        std::process::exit(e.code.exit_code());
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let outcome = match parse_command(&args) {
        Ok(command) => run(command).await,
        Err(e) => Err(e),
    };

    if let Err(e) = outcome {
        tracing::debug!(code = %e.code, "Command failed");
        eprintln!(
            "{}",
            serde_json::to_string(&e).unwrap_or_else(|_| e.to_string())
        );
        std::process::exit(e.code.exit_code());
    }
}
