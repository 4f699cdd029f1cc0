//! Error taxonomy for the bootstrap sequence.

use std::path::PathBuf;
use std::time::Duration;

use coconut_types::Phase;
use thiserror::Error;

/// Failure of a single external command (venv creation, pip, spawn).
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("`{program}` was not found on PATH")]
    NotFound { program: String },
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("`{program}` exited with {}{}", describe_status(*status), describe_stderr(stderr))]
    Failed {
        program: String,
        status: Option<i32>,
        stderr: String,
    },
    #[error("`{program}` did not finish within {}s", after.as_secs())]
    TimedOut { program: String, after: Duration },
}

fn describe_status(status: Option<i32>) -> String {
    match status {
        Some(code) => format!("status {code}"),
        None => "no status (terminated by signal)".to_string(),
    }
}

fn describe_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {}", last_lines(trimmed, 5))
    }
}

/// Keep the tail of installer output; pip puts the useful line last.
fn last_lines(text: &str, max: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(max);
    lines[start..].join("\n")
}

/// Fatal failure of the bootstrap sequence. Each variant belongs to one [`Phase`].
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("environment setup: application directory {} is not usable: {source}", path.display())]
    AppDirectory {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("environment setup: could not create {}: {source}", env_dir.display())]
    EnvironmentCreation { env_dir: PathBuf, source: ToolError },
    #[error(
        "environment setup: `{python} -m venv` succeeded but {} is missing",
        interpreter.display()
    )]
    InterpreterMissing { interpreter: PathBuf, python: String },
    #[error("dependency install: {source}")]
    DependencyInstall { source: ToolError },
    #[error("launch: entry point {} does not exist", path.display())]
    EntryPointMissing { path: PathBuf },
    #[error("launch: failed to start {}: {source}", interpreter.display())]
    Spawn {
        interpreter: PathBuf,
        source: ToolError,
    },
}

impl BootstrapError {
    #[must_use]
    pub const fn phase(&self) -> Phase {
        match self {
            Self::AppDirectory { .. }
            | Self::EnvironmentCreation { .. }
            | Self::InterpreterMissing { .. } => Phase::EnvironmentSetup,
            Self::DependencyInstall { .. } => Phase::DependencyInstall,
            Self::EntryPointMissing { .. } | Self::Spawn { .. } => Phase::Launch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BootstrapError, ToolError};
    use coconut_types::Phase;
    use std::path::PathBuf;

    #[test]
    fn failed_tool_keeps_stderr_tail() {
        let stderr = (1..=8)
            .map(|n| format!("line {n}"))
            .collect::<Vec<_>>()
            .join("\n");
        let err = ToolError::Failed {
            program: "pip".to_string(),
            status: Some(1),
            stderr,
        };
        let msg = err.to_string();
        assert!(msg.starts_with("`pip` exited with status 1: line 4"));
        assert!(msg.ends_with("line 8"));
        assert!(!msg.contains("line 3"));
    }

    #[test]
    fn failed_tool_without_stderr() {
        let err = ToolError::Failed {
            program: "python".to_string(),
            status: None,
            stderr: "  \n".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "`python` exited with no status (terminated by signal)"
        );
    }

    #[test]
    fn errors_name_their_phase() {
        let setup = BootstrapError::EnvironmentCreation {
            env_dir: PathBuf::from(".venv"),
            source: ToolError::NotFound {
                program: "python3".to_string(),
            },
        };
        assert_eq!(setup.phase(), Phase::EnvironmentSetup);
        assert!(setup.to_string().starts_with("environment setup: "));

        let launch = BootstrapError::EntryPointMissing {
            path: PathBuf::from("wsgi.py"),
        };
        assert_eq!(launch.phase(), Phase::Launch);
        assert!(launch.to_string().starts_with("launch: "));

        let deps = BootstrapError::DependencyInstall {
            source: ToolError::TimedOut {
                program: "python".to_string(),
                after: std::time::Duration::from_secs(3),
            },
        };
        assert_eq!(deps.phase(), Phase::DependencyInstall);
        assert_eq!(
            deps.to_string(),
            "dependency install: `python` did not finish within 3s"
        );
    }
}
