//! The bootstrap sequence.
//!
//! ```text
//! ensure_environment -> ensure_dependencies -> select_interpreter -> launch
//!        |                     |                                      |
//!   fatal on error     warn (fatal if strict)                  fatal on error
//! ```
//!
//! Each step is idempotent: an existing environment is reused and pip is
//! asked for packages it may already have. The launcher is not a supervisor;
//! once [`Bootstrap::launch`] returns a PID, the process belongs to the OS.

use std::path::PathBuf;

use coconut_config::LauncherConfig;
use coconut_types::{
    DependencySource, EnvironmentLayout, InterpreterChoice, Phase, Platform, Warning,
};

use crate::error::BootstrapError;
use crate::toolchain::{CommandKind, LaunchRequest, ToolCommand, Toolchain};

/// Environment variables the launched application reads.
pub const CHILD_ENV_HOST: &str = "HOST";
pub const CHILD_ENV_PORT: &str = "PORT";
pub const CHILD_ENV_BROWSER_URL: &str = "BROWSER_URL";

const PIP_QUIET_ARGS: [&str; 2] = ["--quiet", "--disable-pip-version-check"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentStatus {
    Created,
    Reused,
}

/// What a bootstrap run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    pub environment: EnvironmentStatus,
    /// `None` when dependency installation was skipped.
    pub dependencies: Option<DependencySource>,
    pub warnings: Vec<Warning>,
    /// `None` when the run stopped after setup.
    pub interpreter: Option<InterpreterChoice>,
    pub pid: Option<u32>,
    pub url: String,
}

type PhaseObserver = Box<dyn Fn(Phase) + Send + Sync>;

pub struct Bootstrap<T> {
    toolchain: T,
    app_dir: PathBuf,
    config: LauncherConfig,
    layout: EnvironmentLayout,
    observer: Option<PhaseObserver>,
}

impl<T: Toolchain> Bootstrap<T> {
    /// `app_dir` must be absolute; relative config paths are joined onto it.
    pub fn new(toolchain: T, app_dir: impl Into<PathBuf>, config: LauncherConfig) -> Self {
        let app_dir = app_dir.into();
        let layout = EnvironmentLayout::for_current_platform(app_dir.join(&config.venv_dir));
        Self {
            toolchain,
            app_dir,
            config,
            layout,
            observer: None,
        }
    }

    /// Override the platform used for the environment layout.
    #[must_use]
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.layout = EnvironmentLayout::new(self.layout.root().to_path_buf(), platform);
        self
    }

    /// Call `observer` when each phase starts.
    #[must_use]
    pub fn on_phase<F>(mut self, observer: F) -> Self
    where
        F: Fn(Phase) + Send + Sync + 'static,
    {
        self.observer = Some(Box::new(observer));
        self
    }

    #[must_use]
    pub fn layout(&self) -> &EnvironmentLayout {
        &self.layout
    }

    fn enter(&self, phase: Phase) {
        tracing::info!(phase = %phase, "Starting phase");
        if let Some(observer) = &self.observer {
            observer(phase);
        }
    }

    fn command(&self, kind: CommandKind, program: PathBuf, args: Vec<String>) -> ToolCommand {
        ToolCommand {
            kind,
            program,
            args,
            cwd: self.app_dir.clone(),
            timeout: self.config.install_timeout,
        }
    }

    /// Create the isolated environment unless its interpreter already exists.
    pub async fn ensure_environment(&self) -> Result<EnvironmentStatus, BootstrapError> {
        self.enter(Phase::EnvironmentSetup);

        let interpreter = self.layout.interpreter();
        if interpreter.is_file() {
            tracing::info!(path = %interpreter.display(), "Reusing existing environment");
            return Ok(EnvironmentStatus::Reused);
        }

        let env_dir = self.layout.root().to_path_buf();
        tracing::info!(
            path = %env_dir.display(),
            python = %self.config.base_python,
            "Creating environment"
        );

        let command = self.command(
            CommandKind::CreateEnvironment,
            PathBuf::from(&self.config.base_python),
            vec![
                "-m".to_string(),
                "venv".to_string(),
                env_dir.display().to_string(),
            ],
        );
        self.toolchain
            .run(&command)
            .await
            .map_err(|source| BootstrapError::EnvironmentCreation {
                env_dir: env_dir.clone(),
                source,
            })?;

        if !interpreter.is_file() {
            return Err(BootstrapError::InterpreterMissing {
                interpreter,
                python: self.config.base_python.clone(),
            });
        }

        Ok(EnvironmentStatus::Created)
    }

    /// The manifest if it exists in the application directory, else the fallback set.
    #[must_use]
    pub fn dependency_source(&self) -> DependencySource {
        let manifest = self.app_dir.join(&self.config.manifest);
        if manifest.is_file() {
            DependencySource::Manifest(manifest)
        } else {
            DependencySource::Fallback(self.config.fallback_packages.clone())
        }
    }

    /// Upgrade pip, then install the dependency source.
    ///
    /// Failures and any stderr from a successful install are pushed onto
    /// `warnings`, except a failed install in strict mode, which is returned
    /// as an error. Returns `None` if installation is
    /// disabled.
    pub async fn ensure_dependencies(
        &self,
        warnings: &mut Vec<Warning>,
    ) -> Result<Option<DependencySource>, BootstrapError> {
        if self.config.skip_install {
            tracing::info!("Dependency installation skipped");
            return Ok(None);
        }

        let interpreter = self.layout.interpreter();

        self.enter(Phase::InstallerUpgrade);
        let mut upgrade_args = pip_install_args();
        upgrade_args.extend(["--upgrade".to_string(), "pip".to_string()]);
        let upgrade = self.command(CommandKind::UpgradeInstaller, interpreter.clone(), upgrade_args);
        if let Err(err) = self.toolchain.run(&upgrade).await {
            tracing::warn!(phase = %Phase::InstallerUpgrade, error = %err, "Continuing with existing pip");
            warnings.push(Warning {
                phase: Phase::InstallerUpgrade,
                message: err.to_string(),
            });
        }

        self.enter(Phase::DependencyInstall);
        let source = self.dependency_source();
        tracing::info!(source = %source.describe(), "Installing dependencies");

        let mut install_args = pip_install_args();
        install_args.extend(source.install_args());
        let install = self.command(CommandKind::InstallDependencies, interpreter, install_args);
        match self.toolchain.run(&install).await {
            Ok(output) => {
                if !output.stdout.trim().is_empty() {
                    tracing::debug!(output = %output.stdout.trim(), "pip output");
                }
                // pip reports resolver conflicts and deprecations on stderr even on success.
                let stderr = output.stderr.trim();
                if !stderr.is_empty() {
                    tracing::warn!(
                        phase = %Phase::DependencyInstall,
                        output = %stderr,
                        "pip reported warnings"
                    );
                    warnings.push(Warning {
                        phase: Phase::DependencyInstall,
                        message: format!("pip reported: {stderr}"),
                    });
                }
            }
            Err(err) if self.config.strict_install => {
                return Err(BootstrapError::DependencyInstall { source: err });
            }
            Err(err) => {
                tracing::warn!(
                    phase = %Phase::DependencyInstall,
                    error = %err,
                    "Continuing; dependencies from an earlier run may still satisfy the application"
                );
                warnings.push(Warning {
                    phase: Phase::DependencyInstall,
                    message: err.to_string(),
                });
            }
        }

        Ok(Some(source))
    }

    /// Prefer the windowless interpreter when it exists, else the standard one.
    #[must_use]
    pub fn select_interpreter(&self) -> InterpreterChoice {
        if self.config.prefer_windowless
            && let Some(windowless) = self.layout.windowless_interpreter()
            && windowless.is_file()
        {
            return InterpreterChoice {
                path: windowless,
                windowless: true,
            };
        }

        InterpreterChoice {
            path: self.layout.interpreter(),
            windowless: false,
        }
    }

    /// Start the entry point detached and return its PID.
    pub fn launch(&self, choice: &InterpreterChoice) -> Result<u32, BootstrapError> {
        self.enter(Phase::Launch);

        let entry_point = self.app_dir.join(&self.config.entry_point);
        if !entry_point.is_file() {
            return Err(BootstrapError::EntryPointMissing { path: entry_point });
        }

        let address = &self.config.address;
        let request = LaunchRequest {
            program: choice.path.clone(),
            entry_point,
            cwd: self.app_dir.clone(),
            env: vec![
                (CHILD_ENV_HOST.to_string(), address.host.clone()),
                (CHILD_ENV_PORT.to_string(), address.port.to_string()),
                (CHILD_ENV_BROWSER_URL.to_string(), address.display_url()),
            ],
            windowless: choice.windowless,
            title: self.config.title.clone(),
        };

        let pid = self
            .toolchain
            .spawn_detached(&request)
            .map_err(|source| BootstrapError::Spawn {
                interpreter: choice.path.clone(),
                source,
            })?;

        tracing::info!(
            pid,
            title = %request.title,
            interpreter = %choice.path.display(),
            url = %address.display_url(),
            "Application started"
        );
        Ok(pid)
    }

    /// Environment and dependencies only.
    pub async fn prepare(&self) -> Result<BootstrapReport, BootstrapError> {
        let environment = self.ensure_environment().await?;
        let mut warnings = Vec::new();
        let dependencies = self.ensure_dependencies(&mut warnings).await?;

        Ok(BootstrapReport {
            environment,
            dependencies,
            warnings,
            interpreter: None,
            pid: None,
            url: self.config.address.display_url(),
        })
    }

    /// The full sequence: prepare, then launch.
    pub async fn run(&self) -> Result<BootstrapReport, BootstrapError> {
        let mut report = self.prepare().await?;
        let choice = self.select_interpreter();
        let pid = self.launch(&choice)?;
        report.interpreter = Some(choice);
        report.pid = Some(pid);
        Ok(report)
    }
}

fn pip_install_args() -> Vec<String> {
    let mut args = vec!["-m".to_string(), "pip".to_string(), "install".to_string()];
    args.extend(PIP_QUIET_ARGS.iter().map(ToString::to_string));
    args
}
