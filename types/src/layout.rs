//! Virtual environment layout per platform.

use std::path::{Path, PathBuf};

/// Target platform family for environment layout and launch flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Unix,
}

impl Platform {
    #[must_use]
    pub const fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Unix
        }
    }

    /// Whether the platform offers a windowless interpreter variant.
    #[must_use]
    pub const fn has_windowless_launch(self) -> bool {
        matches!(self, Self::Windows)
    }

    /// Interpreter name used to create environments when none is configured.
    #[must_use]
    pub const fn default_base_python(self) -> &'static str {
        match self {
            Self::Windows => "python",
            Self::Unix => "python3",
        }
    }
}

/// Fixed relative paths inside an isolated environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentLayout {
    root: PathBuf,
    platform: Platform,
}

impl EnvironmentLayout {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, platform: Platform) -> Self {
        Self {
            root: root.into(),
            platform,
        }
    }

    #[must_use]
    pub fn for_current_platform(root: impl Into<PathBuf>) -> Self {
        Self::new(root, Platform::current())
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn scripts_dir(&self) -> PathBuf {
        match self.platform {
            Platform::Windows => self.root.join("Scripts"),
            Platform::Unix => self.root.join("bin"),
        }
    }

    /// The standard interpreter. Its presence marks the environment as created.
    #[must_use]
    pub fn interpreter(&self) -> PathBuf {
        match self.platform {
            Platform::Windows => self.scripts_dir().join("python.exe"),
            Platform::Unix => self.scripts_dir().join("python"),
        }
    }

    /// The no-console interpreter, when the platform has one.
    #[must_use]
    pub fn windowless_interpreter(&self) -> Option<PathBuf> {
        self.platform
            .has_windowless_launch()
            .then(|| self.scripts_dir().join("pythonw.exe"))
    }
}

/// The executable chosen to run the entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterChoice {
    pub path: PathBuf,
    pub windowless: bool,
}
