//! Launches the local engine backend and serves the bundled web UI in front of it.

pub mod browser;
pub mod config;
pub mod error;
pub mod launcher;
pub mod logging;
pub mod platform;
pub mod server;
pub mod shutdown;
pub mod signals;
pub mod state;
pub mod supervisor;

pub use config::LauncherConfig;
pub use error::{LauncherError, Result};
pub use launcher::{BackendStatus, Launcher, Running};
pub use shutdown::{ShutdownCoordinator, ShutdownReason, ShutdownTrigger, Teardown};
pub use state::LauncherState;
