//! Shared test utilities and fixtures
//!
//! A recording [`Toolchain`] that never starts real processes.

#![allow(dead_code)]

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use coconut_config::LauncherConfig;
use coconut_core::{
    Bootstrap, CommandKind, CommandOutput, LaunchRequest, ToolCommand, ToolError, ToolFut,
    Toolchain,
};
use coconut_types::{EnvironmentLayout, Platform};

pub const FAKE_PID: u32 = 4242;

#[derive(Default)]
pub struct FakeToolchain {
    pub commands: Mutex<Vec<ToolCommand>>,
    pub spawns: Mutex<Vec<LaunchRequest>>,
    failing: Mutex<HashSet<CommandKind>>,
    fail_spawn: Mutex<bool>,
    /// When set, a "successful" venv creation leaves no interpreter behind.
    skip_interpreter: Mutex<bool>,
    install_stderr: Mutex<String>,
}

impl FakeToolchain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, kind: CommandKind) {
        self.failing.lock().unwrap().insert(kind);
    }

    pub fn fail_spawn(&self) {
        *self.fail_spawn.lock().unwrap() = true;
    }

    pub fn skip_interpreter(&self) {
        *self.skip_interpreter.lock().unwrap() = true;
    }

    /// Stderr returned by an otherwise successful dependency install.
    pub fn install_stderr(&self, text: &str) {
        *self.install_stderr.lock().unwrap() = text.to_string();
    }

    pub fn commands(&self) -> Vec<ToolCommand> {
        self.commands.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<CommandKind> {
        self.commands().iter().map(|c| c.kind).collect()
    }

    pub fn spawns(&self) -> Vec<LaunchRequest> {
        self.spawns.lock().unwrap().clone()
    }

    pub fn command_of(&self, kind: CommandKind) -> Option<ToolCommand> {
        self.commands().into_iter().find(|c| c.kind == kind)
    }

    fn execute(&self, command: &ToolCommand) -> Result<CommandOutput, ToolError> {
        self.commands.lock().unwrap().push(command.clone());

        if self.failing.lock().unwrap().contains(&command.kind) {
            return Err(ToolError::Failed {
                program: command.program_name(),
                status: Some(1),
                stderr: format!("simulated {:?} failure", command.kind),
            });
        }

        if command.kind == CommandKind::CreateEnvironment && !*self.skip_interpreter.lock().unwrap()
        {
            let env_dir = PathBuf::from(command.args.last().expect("venv dir argument"));
            touch(&EnvironmentLayout::for_current_platform(env_dir).interpreter());
        }

        let stderr = if command.kind == CommandKind::InstallDependencies {
            self.install_stderr.lock().unwrap().clone()
        } else {
            String::new()
        };

        Ok(CommandOutput {
            stdout: "Successfully installed\n".to_string(),
            stderr,
        })
    }
}

impl Toolchain for FakeToolchain {
    fn run<'a>(&'a self, command: &'a ToolCommand) -> ToolFut<'a, CommandOutput> {
        let result = self.execute(command);
        Box::pin(async move { result })
    }

    fn spawn_detached(&self, request: &LaunchRequest) -> Result<u32, ToolError> {
        self.spawns.lock().unwrap().push(request.clone());
        if *self.fail_spawn.lock().unwrap() {
            return Err(ToolError::Spawn {
                program: request.program.display().to_string(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            });
        }
        Ok(FAKE_PID)
    }
}

pub fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, "").unwrap();
}

/// An application directory with an entry point and nothing else.
pub fn app_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("wsgi.py"), "print('serving')\n").unwrap();
    dir
}

pub fn bootstrap<'a>(
    toolchain: &'a FakeToolchain,
    dir: &Path,
    config: LauncherConfig,
) -> Bootstrap<&'a FakeToolchain> {
    Bootstrap::new(toolchain, dir, config)
}

/// Pre-create an environment in the Windows layout, optionally with `pythonw.exe`.
pub fn windows_env(dir: &Path, with_windowless: bool) -> EnvironmentLayout {
    let layout = EnvironmentLayout::new(dir.join(".venv"), Platform::Windows);
    touch(&layout.interpreter());
    if with_windowless && let Some(windowless) = layout.windowless_interpreter() {
        touch(&windowless);
    }
    layout
}
