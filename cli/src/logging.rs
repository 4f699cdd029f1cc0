use std::fs::{self, OpenOptions};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

impl Verbosity {
    #[must_use]
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        match (verbose, quiet) {
            (true, _) => Self::Verbose,
            (false, true) => Self::Quiet,
            (false, false) => Self::Normal,
        }
    }

    /// Console threshold. Phase announcements are printed separately, so the
    /// console only shows problems unless asked for more.
    fn console_level(self) -> LevelFilter {
        match self {
            Self::Quiet => LevelFilter::ERROR,
            Self::Normal => LevelFilter::WARN,
            Self::Verbose => LevelFilter::DEBUG,
        }
    }

    fn file_default(self) -> &'static str {
        match self {
            Self::Verbose => "debug",
            Self::Quiet | Self::Normal => "info",
        }
    }
}

/// Console logging on stderr plus, when one can be opened, an append-only log file.
///
/// `app_dir` is `None` when the application directory could not be resolved;
/// only the home-directory log location is tried then.
pub fn init_tracing(app_dir: Option<&Path>, verbosity: Verbosity) {
    let file_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(verbosity.file_default()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let (log_file, init_warnings) = open_log_file(app_dir);

    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .without_time()
        .with_target(false)
        .with_filter(verbosity.console_level());

    let log_path = log_file.as_ref().map(|(path, _)| path.clone());
    let file_layer = log_file.map(|(_, file)| {
        fmt::layer()
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .with_filter(file_filter)
    });

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .init();

    if let Some(path) = log_path {
        tracing::info!(path = %path.display(), "Logging initialized");
    }
    for warning in init_warnings {
        tracing::warn!("{warning}");
    }
}

fn open_log_file(app_dir: Option<&Path>) -> (Option<(PathBuf, fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates(app_dir) {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates(app_dir: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: <app dir>/.coconut/logs/launcher.log
    if let Some(dir) = app_dir {
        candidates.push(dir.join(".coconut").join("logs").join("launcher.log"));
    }

    // Fallback: ~/.coconut/logs/launcher.log (read-only install directories)
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".coconut").join("logs").join("launcher.log"));
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::{Verbosity, log_file_candidates, open_log_file};

    #[test]
    fn verbose_wins_over_quiet() {
        assert_eq!(Verbosity::from_flags(true, true), Verbosity::Verbose);
        assert_eq!(Verbosity::from_flags(false, true), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(false, false), Verbosity::Normal);
    }

    #[test]
    fn app_dir_log_is_tried_first() {
        let dir = tempfile::tempdir().unwrap();
        let candidates = log_file_candidates(Some(dir.path()));
        assert_eq!(
            candidates[0],
            dir.path().join(".coconut").join("logs").join("launcher.log")
        );
    }

    #[test]
    fn log_file_is_created_under_app_dir() {
        let dir = tempfile::tempdir().unwrap();
        let (file, warnings) = open_log_file(Some(dir.path()));
        let (path, _) = file.unwrap();
        assert!(warnings.is_empty());
        assert!(path.starts_with(dir.path()));
        assert!(path.exists());
    }
}
