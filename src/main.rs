//! toolhost - discover and run packaged tools
//!
//! This is the main entry point for the toolhost binary.

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::process::ExitCode;
use toolhost::cli::{Args, Command};
use toolhost::config::Config;
use toolhost::error::{DispatchError, ErrorKind, ErrorResponse};
use toolhost::logging::init_logging;
use toolhost::tools::Parameters;
use toolhost::ToolHost;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration; logging is not up yet, so keep the error for later
    let (mut config, config_error) = match Config::load(args.config.as_deref()) {
        Ok(cfg) => (cfg, None),
        Err(e) => (Config::default(), Some(e)),
    };

    init_logging(&config.logging, args.debug);
    info!("Starting toolhost v{}", env!("CARGO_PKG_VERSION"));

    if let Some(e) = config_error {
        error!("Failed to load configuration: {}", e);
    }

    if let Some(dir) = args.tools_dir {
        config.tools.directory = dir;
    }
    config.validate().context("invalid configuration")?;

    let host = ToolHost::bootstrap(&config.tools);
    for skipped in host.skipped() {
        info!("Skipped package {:?}: {}", skipped.path, skipped.reason);
    }

    match args.command {
        Command::List => print_json(&host.list())?,
        Command::Show { id } => match host.detail(&id) {
            Some(detail) => print_json(&detail)?,
            None => return report(DispatchError::NotFound(id).to_response()),
        },
        Command::Run { id, params, param } => {
            let mut parameters: Parameters = params.unwrap_or_default();
            parameters.extend(param);

            match host.execute(&id, parameters).await {
                Ok(value) => print_json(&value)?,
                Err(e) => return report(e.to_response()),
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{}", text);
    Ok(())
}

/// Print an error response on stderr and pick the exit code for its kind
fn report(response: ErrorResponse) -> Result<ExitCode> {
    let text = serde_json::to_string(&response).context("failed to serialize error")?;
    eprintln!("{}", text);
    Ok(match response.kind {
        ErrorKind::NotFound => ExitCode::from(2),
        ErrorKind::LoadError | ErrorKind::ExecutionError => ExitCode::from(1),
    })
}
