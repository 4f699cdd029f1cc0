//! Environment bootstrap and detached launch for the Coconut Billing server.
//!
//! - **`bootstrap`**: the linear setup sequence and its report
//! - **`toolchain`**: the trait seam between the sequence and the OS
//! - **`process`**: captured subprocess runs and detached spawning
//! - **`workdir`**: application directory resolution

mod bootstrap;
pub mod error;
pub mod process;
mod system;
pub mod toolchain;
pub mod workdir;

pub use bootstrap::{
    Bootstrap, BootstrapReport, CHILD_ENV_BROWSER_URL, CHILD_ENV_HOST, CHILD_ENV_PORT,
    EnvironmentStatus,
};
pub use error::{BootstrapError, ToolError};
pub use system::SystemToolchain;
pub use toolchain::{CommandKind, CommandOutput, LaunchRequest, ToolCommand, ToolFut, Toolchain};
pub use workdir::{enter_app_dir, resolve_app_dir};
