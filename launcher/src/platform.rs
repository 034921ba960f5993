//! Host platform detection and the per-platform spawn/termination table.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{LauncherError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
}

/// How the backend child is stopped at shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// `taskkill /pid <pid> /f /t`, run as an external command.
    TreeKill,
    /// SIGTERM delivered to the child pid.
    Signal,
}

/// Everything the supervisor needs to know about launching on one platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnStrategy {
    pub executable_suffix: &'static str,
    pub hide_console: bool,
    pub termination: Termination,
}

const WINDOWS: SpawnStrategy = SpawnStrategy {
    executable_suffix: ".exe",
    hide_console: true,
    termination: Termination::TreeKill,
};

const UNIX: SpawnStrategy = SpawnStrategy {
    executable_suffix: "",
    hide_console: false,
    termination: Termination::Signal,
};

impl Platform {
    /// The platform this binary is running on.
    pub fn current() -> Result<Self> {
        Self::from_os(std::env::consts::OS)
    }

    /// Accepts both Rust (`macos`, `windows`) and Node-style (`darwin`, `win32`) identifiers.
    pub fn from_os(os: &str) -> Result<Self> {
        match os.trim().to_ascii_lowercase().as_str() {
            "windows" | "win32" => Ok(Platform::Windows),
            "macos" | "darwin" => Ok(Platform::MacOs),
            "linux" => Ok(Platform::Linux),
            other => Err(LauncherError::UnsupportedPlatform(other.to_string())),
        }
    }

    pub fn strategy(self) -> SpawnStrategy {
        match self {
            Platform::Windows => WINDOWS,
            Platform::MacOs | Platform::Linux => UNIX,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Windows => f.write_str("windows"),
            Platform::MacOs => f.write_str("macos"),
            Platform::Linux => f.write_str("linux"),
        }
    }
}

impl SpawnStrategy {
    /// Appends the platform suffix to a configured base path, unless it is already there.
    pub fn executable_for(&self, base: &Path) -> PathBuf {
        if self.executable_suffix.is_empty() {
            return base.to_path_buf();
        }
        let raw = base.as_os_str().to_string_lossy();
        if raw.to_ascii_lowercase().ends_with(self.executable_suffix) {
            base.to_path_buf()
        } else {
            PathBuf::from(format!("{}{}", raw, self.executable_suffix))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_table() {
        let base = Path::new("api/akio-local-engine");
        let table = [
            ("win32", WINDOWS, "api/akio-local-engine.exe"),
            ("windows", WINDOWS, "api/akio-local-engine.exe"),
            ("darwin", UNIX, "api/akio-local-engine"),
            ("macos", UNIX, "api/akio-local-engine"),
            ("linux", UNIX, "api/akio-local-engine"),
        ];
        for (id, expected, program) in table {
            let strategy = Platform::from_os(id).unwrap().strategy();
            assert_eq!(strategy, expected, "strategy for {}", id);
            assert_eq!(strategy.executable_for(base), PathBuf::from(program), "program for {}", id);
        }
    }

    #[test]
    fn test_from_os_identifiers() {
        assert_eq!(Platform::from_os("win32").unwrap(), Platform::Windows);
        assert_eq!(Platform::from_os("windows").unwrap(), Platform::Windows);
        assert_eq!(Platform::from_os("darwin").unwrap(), Platform::MacOs);
        assert_eq!(Platform::from_os("macos").unwrap(), Platform::MacOs);
        assert_eq!(Platform::from_os("Linux").unwrap(), Platform::Linux);
    }

    #[test]
    fn test_unsupported_platform() {
        let err = Platform::from_os("plan9").unwrap_err();
        assert!(matches!(err, LauncherError::UnsupportedPlatform(ref os) if os == "plan9"));
        assert_ne!(err.exit_code(), 0);
    }

    #[test]
    fn test_windows_uses_tree_kill_and_hidden_console() {
        let strategy = Platform::Windows.strategy();
        assert_eq!(strategy.termination, Termination::TreeKill);
        assert!(strategy.hide_console);

        let unix = Platform::MacOs.strategy();
        assert_eq!(unix.termination, Termination::Signal);
        assert!(!unix.hide_console);
    }

    #[test]
    fn test_executable_suffix() {
        let base = Path::new("api/akio-local-engine");
        assert_eq!(
            Platform::Windows.strategy().executable_for(base),
            PathBuf::from("api/akio-local-engine.exe")
        );
        assert_eq!(
            Platform::Windows
                .strategy()
                .executable_for(Path::new("api/engine.EXE")),
            PathBuf::from("api/engine.EXE")
        );
        assert_eq!(Platform::Linux.strategy().executable_for(base), base);
    }
}
