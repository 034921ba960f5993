use std::path::PathBuf;

use thiserror::Error;

use crate::state::LauncherState;

#[derive(Error, Debug)]
pub enum LauncherError {
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("failed to spawn backend {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to terminate backend (pid {pid}): {reason}")]
    Terminate { pid: u32, reason: String },

    #[error("failed to bind web host on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("web host did not shut down cleanly: {0}")]
    Server(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid lifecycle transition {from:?} -> {to:?}")]
    InvalidTransition {
        from: LauncherState,
        to: LauncherState,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LauncherError {
    /// Process exit status for errors that abort startup. Every fatal error exits 1.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

pub type Result<T> = std::result::Result<T, LauncherError>;
