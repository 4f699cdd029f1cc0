use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use coconut_config::Overrides;

#[derive(Debug, Parser)]
#[command(name = "coconut-launch", version)]
#[command(about = "Set up the Coconut Billing environment and start the server in the background")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Application directory (defaults to the directory holding this executable)
    #[arg(long, global = true, env = "COCONUT_APP_DIR")]
    pub app_dir: Option<PathBuf>,

    /// Config file, relative to the application directory (default: launcher.toml if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log debug output to the console
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only print the URL and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(flatten)]
    pub overrides: OverrideArgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Prepare the environment and start the server (default)
    Run,
    /// Prepare the environment and install dependencies without starting the server
    Setup,
    /// Print the URL the server will be reachable at
    Url,
}

#[derive(Debug, Default, Args)]
pub struct OverrideArgs {
    /// Host the server binds to
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Port the server listens on
    #[arg(long, global = true, value_parser = clap::value_parser!(u16).range(1..))]
    pub port: Option<u16>,

    /// Interpreter used to create the environment
    #[arg(long, global = true)]
    pub python: Option<String>,

    /// Environment folder, relative to the application directory
    #[arg(long, global = true)]
    pub venv_dir: Option<PathBuf>,

    /// Dependency manifest, relative to the application directory
    #[arg(long, global = true)]
    pub manifest: Option<PathBuf>,

    /// Application entry point, relative to the application directory
    #[arg(long, global = true)]
    pub entry_point: Option<PathBuf>,

    /// Abort if dependency installation fails
    #[arg(long, global = true, conflicts_with = "skip_install")]
    pub strict_install: bool,

    /// Do not run pip at all
    #[arg(long, global = true)]
    pub skip_install: bool,

    /// Always launch with the console interpreter
    #[arg(long, global = true)]
    pub no_windowless: bool,
}

impl Cli {
    #[must_use]
    pub fn action(&self) -> Command {
        self.command.unwrap_or(Command::Run)
    }
}

impl OverrideArgs {
    #[must_use]
    pub fn to_overrides(&self) -> Overrides {
        Overrides {
            host: self.host.clone(),
            port: self.port,
            python: self.python.clone(),
            venv_dir: self.venv_dir.clone(),
            manifest: self.manifest.clone(),
            entry_point: self.entry_point.clone(),
            strict_install: self.strict_install,
            skip_install: self.skip_install,
            no_windowless: self.no_windowless,
        }
    }
}
