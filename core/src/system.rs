use crate::error::ToolError;
use crate::process;
use crate::toolchain::{CommandOutput, LaunchRequest, ToolCommand, ToolFut, Toolchain};

/// [`Toolchain`] backed by real subprocesses.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemToolchain;

impl Toolchain for SystemToolchain {
    fn run<'a>(&'a self, command: &'a ToolCommand) -> ToolFut<'a, CommandOutput> {
        Box::pin(process::run_captured(command))
    }

    fn spawn_detached(&self, request: &LaunchRequest) -> Result<u32, ToolError> {
        process::spawn_detached(request)
    }
}
