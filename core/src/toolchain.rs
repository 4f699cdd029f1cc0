//! The seam between the bootstrap sequence and the operating system.
//!
//! [`Bootstrap`](crate::Bootstrap) never spawns processes itself; it describes
//! commands as [`ToolCommand`]s and hands them to a [`Toolchain`]. The real
//! implementation is [`SystemToolchain`](crate::SystemToolchain).

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use crate::error::ToolError;

/// Tool execution future type alias.
pub type ToolFut<'a, T> = Pin<Box<dyn Future<Output = Result<T, ToolError>> + Send + 'a>>;

/// What a captured command is for. Used for logging and by test toolchains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    CreateEnvironment,
    UpgradeInstaller,
    InstallDependencies,
}

/// A command run to completion with its output captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub kind: CommandKind,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub timeout: Duration,
}

impl ToolCommand {
    #[must_use]
    pub fn program_name(&self) -> String {
        self.program.display().to_string()
    }
}

/// Captured output of a successful command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// A process to start detached. The launcher never waits on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub program: PathBuf,
    pub entry_point: PathBuf,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
    /// Start without a console window where the platform supports it.
    pub windowless: bool,
    pub title: String,
}

pub trait Toolchain: Send + Sync {
    /// Run `command` to completion, capturing output.
    ///
    /// A non-zero exit is reported as [`ToolError::Failed`] with the captured stderr.
    fn run<'a>(&'a self, command: &'a ToolCommand) -> ToolFut<'a, CommandOutput>;

    /// Start `request` as a detached process and return its PID without waiting.
    fn spawn_detached(&self, request: &LaunchRequest) -> Result<u32, ToolError>;
}

impl<T: Toolchain + ?Sized> Toolchain for &T {
    fn run<'a>(&'a self, command: &'a ToolCommand) -> ToolFut<'a, CommandOutput> {
        (**self).run(command)
    }

    fn spawn_detached(&self, request: &LaunchRequest) -> Result<u32, ToolError> {
        (**self).spawn_detached(request)
    }
}
