//! Domain types for the Coconut launcher.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the launcher.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

mod address;
mod layout;

pub use address::{DEFAULT_HOST, DEFAULT_PORT, ServerAddress};
pub use layout::{EnvironmentLayout, InterpreterChoice, Platform};

use std::fmt;
use std::path::PathBuf;

// ============================================================================
// Phases
// ============================================================================

/// A step of the bootstrap sequence.
///
/// Every warning and error the launcher reports names the phase it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    EnvironmentSetup,
    InstallerUpgrade,
    DependencyInstall,
    Launch,
}

impl Phase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EnvironmentSetup => "environment setup",
            Self::InstallerUpgrade => "installer upgrade",
            Self::DependencyInstall => "dependency install",
            Self::Launch => "launch",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Dependencies
// ============================================================================

/// Where the package list for `pip install` comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencySource {
    /// A requirements file consumed verbatim via `-r`.
    Manifest(PathBuf),
    /// Package specifiers used when no manifest exists.
    Fallback(Vec<String>),
}

impl DependencySource {
    /// Arguments appended after `pip install`.
    #[must_use]
    pub fn install_args(&self) -> Vec<String> {
        match self {
            Self::Manifest(path) => vec!["-r".to_string(), path.display().to_string()],
            Self::Fallback(packages) => packages.clone(),
        }
    }

    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Manifest(path) => format!("manifest {}", path.display()),
            Self::Fallback(packages) => format!("fallback set [{}]", packages.join(", ")),
        }
    }
}

/// A non-fatal problem recorded while bootstrapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub phase: Phase,
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.phase, self.message)
    }
}
