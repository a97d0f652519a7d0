use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use logship_daemon::cli::DaemonCli;
use logship_daemon::logging;
use logship_daemon::orchestrator::{Orchestrator, SIGNAL_EXIT_CODE};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "logship-daemon failed");
            eprintln!("logship-daemon: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ExitCode> {
    let cli = DaemonCli::parse();
    let (config, origin) = cli.load_config().await?;

    if cli.validate {
        println!("configuration OK ({origin})");
        return Ok(ExitCode::SUCCESS);
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %origin,
        "logship-daemon starting"
    );

    let mut orchestrator = Orchestrator::build_from_config(config)?;
    let signal = orchestrator.run().await?;

    tracing::info!(signal, "logship-daemon exiting");
    Ok(ExitCode::from(SIGNAL_EXIT_CODE))
}
