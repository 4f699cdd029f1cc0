//! Subprocess helpers: captured runs with a deadline, and detached launches.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use crate::error::ToolError;
use crate::toolchain::{CommandOutput, LaunchRequest, ToolCommand};

#[cfg(windows)]
const CREATE_NEW_CONSOLE: u32 = 0x0000_0010;
#[cfg(windows)]
const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
#[cfg(windows)]
const DETACHED_PROCESS: u32 = 0x0000_0008;
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Resolve a bare program name through PATH. Paths are returned unchanged.
pub fn resolve_program(program: &Path) -> Result<PathBuf, ToolError> {
    if program.components().count() > 1 || program.is_absolute() {
        return Ok(program.to_path_buf());
    }
    which::which(program).map_err(|_| ToolError::NotFound {
        program: program.display().to_string(),
    })
}

/// Run `command` to completion with stdout/stderr captured.
///
/// On Unix the child leads its own process group. If it outlives
/// `command.timeout`, that group is killed, including anything the command
/// started in the background.
pub async fn run_captured(command: &ToolCommand) -> Result<CommandOutput, ToolError> {
    let name = command.program_name();
    let program = resolve_program(&command.program)?;

    let mut cmd = tokio::process::Command::new(&program);
    cmd.args(&command.args)
        .current_dir(&command.cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    new_session(cmd.as_std_mut());
    #[cfg(windows)]
    cmd.creation_flags(CREATE_NO_WINDOW);

    tracing::debug!(
        kind = ?command.kind,
        program = %program.display(),
        args = ?command.args,
        "Running command"
    );

    let child = cmd.spawn().map_err(|source| ToolError::Spawn {
        program: name.clone(),
        source,
    })?;
    let mut group = ProcessGroupGuard::new(child.id());

    // Dropping the wait future on timeout drops the child, which kills it;
    // the guard then takes down anything the installer started.
    let output = match tokio::time::timeout(command.timeout, child.wait_with_output()).await {
        Ok(result) => {
            group.disarm();
            result.map_err(|source| ToolError::Spawn {
                program: name.clone(),
                source,
            })?
        }
        Err(_) => {
            tracing::warn!(
                program = %name,
                after_secs = command.timeout.as_secs(),
                "Command timed out; killing its process group"
            );
            return Err(ToolError::TimedOut {
                program: name,
                after: command.timeout,
            });
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        return Err(ToolError::Failed {
            program: name,
            status: output.status.code(),
            stderr,
        });
    }

    Ok(CommandOutput { stdout, stderr })
}

/// Start `request` detached from the launcher and return the child's PID.
///
/// Standard streams go to null, and the child gets its own session (Unix) or
/// process group (Windows) so it survives the launcher exiting.
#[allow(clippy::zombie_processes)] // the child is deliberately never waited on
pub fn spawn_detached(request: &LaunchRequest) -> Result<u32, ToolError> {
    let name = request.program.display().to_string();

    let mut cmd = std::process::Command::new(&request.program);
    cmd.arg(&request.entry_point)
        .current_dir(&request.cwd)
        .envs(request.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    detach(&mut cmd, request.windowless);

    let child = cmd
        .spawn()
        .map_err(|source| ToolError::Spawn { program: name, source })?;
    Ok(child.id())
}

/// Put the child process in its own session so terminal hangups and
/// signals aimed at the launcher's process group do not reach it.
#[cfg(unix)]
fn detach(cmd: &mut std::process::Command, _windowless: bool) {
    new_session(cmd);
}

/// Run the child as the leader of a new session (and process group), so the
/// whole group can be signalled with `killpg`.
#[cfg(unix)]
fn new_session(cmd: &mut std::process::Command) {
    use std::os::unix::process::CommandExt;
    unsafe {
        cmd.pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

/// Kills the process group led by a captured command unless disarmed.
///
/// On Windows the direct child is still killed by `kill_on_drop`.
struct ProcessGroupGuard {
    pid: Option<u32>,
}

impl ProcessGroupGuard {
    fn new(pid: Option<u32>) -> Self {
        Self { pid }
    }

    fn disarm(&mut self) {
        self.pid = None;
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        let Some(pid) = self.pid.take() else {
            return;
        };
        #[cfg(unix)]
        if let Ok(pgid) = libc::pid_t::try_from(pid) {
            unsafe {
                if libc::killpg(pgid, libc::SIGKILL) == -1 {
                    tracing::debug!(
                        pid,
                        error = %std::io::Error::last_os_error(),
                        "Process group already gone"
                    );
                }
            }
        }
        #[cfg(not(unix))]
        let _ = pid;
    }
}

/// Windowless interpreters run fully detached; console interpreters get a
/// console of their own instead of sharing the launcher's.
#[cfg(windows)]
fn detach(cmd: &mut std::process::Command, windowless: bool) {
    use std::os::windows::process::CommandExt;
    let flags = if windowless {
        DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP
    } else {
        CREATE_NEW_CONSOLE | CREATE_NEW_PROCESS_GROUP
    };
    cmd.creation_flags(flags);
}

#[cfg(not(any(unix, windows)))]
fn detach(_cmd: &mut std::process::Command, _windowless: bool) {}
