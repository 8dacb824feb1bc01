//! Project Deployer - Entry Point
//!
//! `submit` creates a project's job in the cluster; `run` is what that job
//! executes. A failed run exits non-zero so the job is marked failed.

use std::process::ExitCode;

use clap::Parser;
use project_deployer::app::cli::{Cli, Command};
use project_deployer::app::run::{run, submit};
use project_deployer::app::settings::Settings;
use project_deployer::logs::{init_logging, LogOptions};
use project_deployer::utils::version_info;

use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Command::Version = cli.command {
        return match serde_json::to_string_pretty(&version_info()) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Failed to render version info: {e}");
                ExitCode::FAILURE
            }
        };
    }

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Invalid settings: {e}");
            return ExitCode::FAILURE;
        }
    };

    let log_options = LogOptions {
        log_level: settings.log_level,
        json_format: settings.log_json,
    };
    if let Err(e) = init_logging(log_options) {
        eprintln!("Failed to initialize logging: {e}");
    }

    info!(
        "project-deployer {} ({} environment)",
        version_info().version,
        settings.environment
    );

    let result = match cli.command {
        Command::Run(args) => run(settings, args).await.map(|state| {
            info!("Workflow finished: {:?}", state);
        }),
        Command::Submit(args) => submit(settings, args).await.map(|_| ()),
        Command::Version => Ok(()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
