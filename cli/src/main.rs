//! Coconut launcher - binary entry point.
//!
//! ```text
//! main() -> enter_app_dir -> init_tracing -> LauncherConfig::resolve
//!                                                   |
//!                                                   v
//!                     Bootstrap::run | Bootstrap::prepare | print URL
//! ```
//!
//! The launcher exits as soon as the server process is spawned. It does not
//! wait for the server, restart it, or report on its health.

mod args;
mod logging;

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Result, anyhow};
use clap::Parser;

use coconut_config::LauncherConfig;
use coconut_core::{Bootstrap, BootstrapReport, EnvironmentStatus, SystemToolchain, enter_app_dir};
use coconut_types::Phase;

use args::{Cli, Command};
use logging::{Verbosity, init_tracing};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let verbosity = Verbosity::from_flags(cli.verbose, cli.quiet);

    let app_dir = enter_app_dir(cli.app_dir.as_deref());
    init_tracing(app_dir.as_deref().ok(), verbosity);

    let app_dir = match app_dir {
        Ok(dir) => dir,
        Err(err) => {
            tracing::error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    match run(&cli, &app_dir, verbosity).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli, app_dir: &Path, verbosity: Verbosity) -> Result<()> {
    let resolved = LauncherConfig::resolve(
        app_dir,
        cli.config.as_deref(),
        &cli.overrides.to_overrides(),
    )
    .map_err(|e| anyhow!("configuration: {e}"))?;

    if let Some(source) = &resolved.source {
        tracing::info!(path = %source.display(), "Loaded launcher config");
    }
    for warning in &resolved.warnings {
        tracing::warn!("configuration: {warning}");
    }

    let config = resolved.config;
    let url = config.address.display_url();
    let announce = verbosity != Verbosity::Quiet;

    if cli.action() == Command::Url {
        println!("{url}");
        return Ok(());
    }

    let title = config.title.clone();
    let mut bootstrap = Bootstrap::new(SystemToolchain, app_dir, config);
    if announce {
        bootstrap = bootstrap.on_phase(move |phase| println!("{}", announcement(phase, &title)));
    }

    match cli.action() {
        Command::Setup => {
            let report = bootstrap.prepare().await?;
            if announce {
                print_summary(&report);
            }
            println!("Environment ready at {}", bootstrap.layout().root().display());
        }
        Command::Run | Command::Url => {
            let report = bootstrap.run().await?;
            if announce {
                print_summary(&report);
            }
            println!("Open {url} in your browser");
        }
    }

    Ok(())
}

fn announcement(phase: Phase, title: &str) -> String {
    match phase {
        Phase::EnvironmentSetup => "Checking Python environment...".to_string(),
        Phase::InstallerUpgrade => "Upgrading pip...".to_string(),
        Phase::DependencyInstall => "Installing dependencies...".to_string(),
        Phase::Launch => format!("Starting {title}..."),
    }
}

fn print_summary(report: &BootstrapReport) {
    match report.environment {
        EnvironmentStatus::Created => println!("Created new environment"),
        EnvironmentStatus::Reused => println!("Using existing environment"),
    }
    if let Some(source) = &report.dependencies {
        println!("Dependencies from {}", source.describe());
    }
    if !report.warnings.is_empty() {
        println!(
            "Finished with {} warning(s); see messages above",
            report.warnings.len()
        );
    }
    if let Some(pid) = report.pid {
        println!("Server process started (pid {pid})");
    }
}
