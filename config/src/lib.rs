//! Launcher configuration.
//!
//! Values are resolved from four layers, lowest precedence first:
//!
//! 1. Built-in defaults (`127.0.0.1:8000`, `.venv`, `requirements.txt`, `wsgi.py`)
//! 2. `launcher.toml` in the application directory (or an explicit `--config` path)
//! 3. Environment variables (`HOST`, `PORT`, `COCONUT_PYTHON`, `COCONUT_VENV_DIR`)
//! 4. Command-line [`Overrides`]
//!
//! String values read from the file may reference environment variables as `${VAR}`.

use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use coconut_types::{Platform, ServerAddress};
use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "launcher.toml";

pub const DEFAULT_VENV_DIR: &str = ".venv";
pub const DEFAULT_MANIFEST: &str = "requirements.txt";
pub const DEFAULT_ENTRY_POINT: &str = "wsgi.py";
pub const DEFAULT_TITLE: &str = "Coconut Billing";
pub const DEFAULT_INSTALL_TIMEOUT_SECS: u64 = 600;

/// Packages installed when the application directory has no manifest.
pub const FALLBACK_PACKAGES: [&str; 2] = ["Flask>=3.0,<4.0", "waitress"];

pub const ENV_HOST: &str = "HOST";
pub const ENV_PORT: &str = "PORT";
pub const ENV_PYTHON: &str = "COCONUT_PYTHON";
pub const ENV_VENV_DIR: &str = "COCONUT_VENV_DIR";

// Default value function for serde (bool::default() is false, so only true needs a fn)
const fn default_true() -> bool {
    true
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => Some(path),
            ConfigError::Invalid(_) => None,
        }
    }
}

/// On-disk shape of `launcher.toml`. Every section and field is optional.
#[derive(Debug, Default, Deserialize)]
pub struct LauncherFile {
    pub server: Option<ServerSection>,
    pub environment: Option<EnvironmentSection>,
    pub dependencies: Option<DependenciesSection>,
    pub launch: Option<LaunchSection>,
}

/// ```toml
/// [server]
/// host = "127.0.0.1"
/// port = 8000
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct ServerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// ```toml
/// [environment]
/// dir = ".venv"
/// python = "python3"
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct EnvironmentSection {
    /// Environment folder, relative to the application directory.
    pub dir: Option<String>,
    /// Base interpreter used to create the environment.
    pub python: Option<String>,
}

/// ```toml
/// [dependencies]
/// manifest = "requirements.txt"
/// fallback = ["Flask>=3.0,<4.0", "waitress"]
/// strict = false
/// skip = false
/// timeout_secs = 600
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct DependenciesSection {
    pub manifest: Option<String>,
    pub fallback: Option<Vec<String>>,
    /// Treat a failed dependency install as fatal.
    #[serde(default)]
    pub strict: bool,
    #[serde(default)]
    pub skip: bool,
    pub timeout_secs: Option<u64>,
}

/// ```toml
/// [launch]
/// entry_point = "wsgi.py"
/// title = "Coconut Billing"
/// prefer_windowless = true
/// ```
#[derive(Debug, Deserialize)]
pub struct LaunchSection {
    pub entry_point: Option<String>,
    pub title: Option<String>,
    #[serde(default = "default_true")]
    pub prefer_windowless: bool,
}

impl Default for LaunchSection {
    fn default() -> Self {
        Self {
            entry_point: None,
            title: None,
            prefer_windowless: true,
        }
    }
}

/// Values supplied on the command line. `None` leaves the lower layers in place.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub python: Option<String>,
    pub venv_dir: Option<PathBuf>,
    pub manifest: Option<PathBuf>,
    pub entry_point: Option<PathBuf>,
    pub strict_install: bool,
    pub skip_install: bool,
    pub no_windowless: bool,
}

/// Fully resolved launcher settings.
///
/// Relative paths are relative to the application directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherConfig {
    pub address: ServerAddress,
    pub venv_dir: PathBuf,
    pub base_python: String,
    pub manifest: PathBuf,
    pub fallback_packages: Vec<String>,
    pub strict_install: bool,
    pub skip_install: bool,
    pub install_timeout: Duration,
    pub entry_point: PathBuf,
    pub title: String,
    pub prefer_windowless: bool,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            address: ServerAddress::default(),
            venv_dir: PathBuf::from(DEFAULT_VENV_DIR),
            base_python: Platform::current().default_base_python().to_string(),
            manifest: PathBuf::from(DEFAULT_MANIFEST),
            fallback_packages: FALLBACK_PACKAGES.iter().map(ToString::to_string).collect(),
            strict_install: false,
            skip_install: false,
            install_timeout: Duration::from_secs(DEFAULT_INSTALL_TIMEOUT_SECS),
            entry_point: PathBuf::from(DEFAULT_ENTRY_POINT),
            title: DEFAULT_TITLE.to_string(),
            prefer_windowless: true,
        }
    }
}

/// Result of [`LauncherConfig::resolve`].
#[derive(Debug)]
pub struct ResolvedConfig {
    pub config: LauncherConfig,
    /// The config file that was applied, if any.
    pub source: Option<PathBuf>,
    /// Non-fatal problems found while resolving (e.g. an unparsable `PORT`).
    pub warnings: Vec<String>,
}

impl LauncherConfig {
    /// Resolve all layers against the process environment.
    pub fn resolve(
        app_dir: &Path,
        explicit: Option<&Path>,
        overrides: &Overrides,
    ) -> Result<ResolvedConfig, ConfigError> {
        Self::resolve_with(app_dir, explicit, overrides, |key| env::var(key).ok())
    }

    /// Resolve all layers with a caller-supplied environment lookup.
    pub fn resolve_with<F>(
        app_dir: &Path,
        explicit: Option<&Path>,
        overrides: &Overrides,
        lookup: F,
    ) -> Result<ResolvedConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        let source = match explicit {
            Some(path) => {
                let path = app_dir.join(path);
                let file = load_file(&path)?;
                config.apply_file(file, &lookup);
                Some(path)
            }
            None => {
                let path = app_dir.join(CONFIG_FILE_NAME);
                if path.exists() {
                    let file = load_file(&path)?;
                    config.apply_file(file, &lookup);
                    Some(path)
                } else {
                    None
                }
            }
        };

        let warnings = config.apply_env(&lookup);
        config.apply_overrides(overrides);
        config.validate()?;

        Ok(ResolvedConfig {
            config,
            source,
            warnings,
        })
    }

    pub fn apply_file<F>(&mut self, file: LauncherFile, lookup: &F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let expand = |value: String| expand_env_vars(&value, lookup);

        if let Some(server) = file.server {
            if let Some(host) = server.host {
                self.address.host = expand(host);
            }
            if let Some(port) = server.port {
                self.address.port = port;
            }
        }

        if let Some(environment) = file.environment {
            if let Some(dir) = environment.dir {
                self.venv_dir = PathBuf::from(expand(dir));
            }
            if let Some(python) = environment.python {
                self.base_python = expand(python);
            }
        }

        if let Some(deps) = file.dependencies {
            if let Some(manifest) = deps.manifest {
                self.manifest = PathBuf::from(expand(manifest));
            }
            if let Some(fallback) = deps.fallback {
                self.fallback_packages = fallback;
            }
            self.strict_install = deps.strict;
            self.skip_install = deps.skip;
            if let Some(secs) = deps.timeout_secs {
                self.install_timeout = Duration::from_secs(secs);
            }
        }

        if let Some(launch) = file.launch {
            if let Some(entry_point) = launch.entry_point {
                self.entry_point = PathBuf::from(expand(entry_point));
            }
            if let Some(title) = launch.title {
                self.title = title;
            }
            self.prefer_windowless = launch.prefer_windowless;
        }
    }

    /// Apply environment variable overrides, returning warnings for values that were ignored.
    ///
    /// Warnings are not logged here; the caller reports them once.
    pub fn apply_env<F>(&mut self, lookup: &F) -> Vec<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut warnings = Vec::new();

        if let Some(host) = non_empty(lookup(ENV_HOST)) {
            self.address.host = host;
        }

        if let Some(raw) = non_empty(lookup(ENV_PORT)) {
            match raw.parse::<u16>() {
                Ok(port) if port != 0 => self.address.port = port,
                _ => {
                    warnings.push(format!(
                        "ignoring invalid {ENV_PORT}={raw:?}; using port {}",
                        self.address.port
                    ));
                }
            }
        }

        if let Some(python) = non_empty(lookup(ENV_PYTHON)) {
            self.base_python = python;
        }

        if let Some(dir) = non_empty(lookup(ENV_VENV_DIR)) {
            self.venv_dir = PathBuf::from(dir);
        }

        warnings
    }

    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(host) = &overrides.host {
            self.address.host.clone_from(host);
        }
        if let Some(port) = overrides.port {
            self.address.port = port;
        }
        if let Some(python) = &overrides.python {
            self.base_python.clone_from(python);
        }
        if let Some(dir) = &overrides.venv_dir {
            self.venv_dir.clone_from(dir);
        }
        if let Some(manifest) = &overrides.manifest {
            self.manifest.clone_from(manifest);
        }
        if let Some(entry_point) = &overrides.entry_point {
            self.entry_point.clone_from(entry_point);
        }
        if overrides.strict_install {
            self.strict_install = true;
        }
        if overrides.skip_install {
            self.skip_install = true;
        }
        if overrides.no_windowless {
            self.prefer_windowless = false;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.address.host.trim().is_empty() {
            return Err(ConfigError::Invalid("server host is empty".to_string()));
        }
        if self.address.port == 0 {
            return Err(ConfigError::Invalid("server port must be non-zero".to_string()));
        }
        if self.base_python.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "base interpreter name is empty".to_string(),
            ));
        }
        if self.fallback_packages.is_empty() {
            return Err(ConfigError::Invalid(
                "fallback package list is empty".to_string(),
            ));
        }
        if self.fallback_packages.iter().any(|p| p.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "fallback package list contains a blank entry".to_string(),
            ));
        }
        if self.entry_point.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("entry point is empty".to_string()));
        }
        if self.install_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "dependency install timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn load_file(path: &Path) -> Result<LauncherFile, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            tracing::warn!("Failed to read config at {:?}: {}", path, err);
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source: err,
            });
        }
    };

    match toml::from_str(&content) {
        Ok(file) => Ok(file),
        Err(err) => {
            tracing::warn!("Failed to parse config at {:?}: {}", path, err);
            Err(ConfigError::Parse {
                path: path.to_path_buf(),
                source: err,
            })
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Replace `${VAR}` references using `lookup`. Unset variables expand to "".
pub fn expand_env_vars<F>(value: &str, lookup: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(value.len());
    let mut i = 0;

    while i < value.len() {
        if value[i..].starts_with("${") {
            let start = i + 2;
            if let Some(end_rel) = value[start..].find('}') {
                let end = start + end_rel;
                let var = &value[start..end];
                if !var.is_empty() {
                    out.push_str(&lookup(var).unwrap_or_default());
                }
                i = end + 1;
                continue;
            }
        }

        let Some(ch) = value[i..].chars().next() else {
            break;
        };
        out.push(ch);
        i += ch.len_utf8();
    }

    out
}
