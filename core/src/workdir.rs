//! Application directory resolution.
//!
//! Every relative path the launcher touches (environment folder, manifest,
//! entry point, config file) is resolved against one directory, independent
//! of where the operator invoked the launcher from.

use std::env;
use std::path::{Path, PathBuf};

use crate::error::BootstrapError;

/// Resolve the application directory without changing the process state.
///
/// Uses `explicit` when given, otherwise the directory holding the launcher
/// executable. The result is absolute and must be an existing directory.
pub fn resolve_app_dir(explicit: Option<&Path>) -> Result<PathBuf, BootstrapError> {
    let candidate = match explicit {
        Some(path) => path.to_path_buf(),
        None => launcher_dir()?,
    };

    let absolute = std::path::absolute(&candidate).map_err(|source| {
        BootstrapError::AppDirectory {
            path: candidate.clone(),
            source,
        }
    })?;

    if !absolute.is_dir() {
        return Err(BootstrapError::AppDirectory {
            path: absolute,
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
        });
    }

    Ok(absolute)
}

/// Resolve the application directory and make it the current directory.
pub fn enter_app_dir(explicit: Option<&Path>) -> Result<PathBuf, BootstrapError> {
    let dir = resolve_app_dir(explicit)?;
    env::set_current_dir(&dir).map_err(|source| BootstrapError::AppDirectory {
        path: dir.clone(),
        source,
    })?;
    tracing::debug!(path = %dir.display(), "Entered application directory");
    Ok(dir)
}

fn launcher_dir() -> Result<PathBuf, BootstrapError> {
    let exe = env::current_exe().map_err(|source| BootstrapError::AppDirectory {
        path: PathBuf::from("."),
        source,
    })?;
    match exe.parent() {
        Some(parent) => Ok(parent.to_path_buf()),
        None => Err(BootstrapError::AppDirectory {
            path: exe.clone(),
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "launcher executable has no parent directory",
            ),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::resolve_app_dir;
    use crate::error::BootstrapError;
    use coconut_types::Phase;

    #[test]
    fn explicit_directory_is_made_absolute() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = resolve_app_dir(Some(dir.path())).unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.is_dir());
    }

    #[test]
    fn missing_directory_is_environment_setup_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let err = resolve_app_dir(Some(&missing)).unwrap_err();
        assert!(matches!(err, BootstrapError::AppDirectory { .. }));
        assert_eq!(err.phase(), Phase::EnvironmentSetup);
    }

    #[test]
    fn file_is_not_an_app_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("wsgi.py");
        std::fs::write(&file, "").unwrap();
        assert!(resolve_app_dir(Some(&file)).is_err());
    }

    #[test]
    fn default_is_launcher_executable_directory() {
        let resolved = resolve_app_dir(None).unwrap();
        let exe = std::env::current_exe().unwrap();
        assert_eq!(Some(resolved.as_path()), exe.parent());
    }
}
