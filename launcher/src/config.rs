use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{LauncherError, Result};

pub const DEFAULT_CONFIG_FILE: &str = "launcher.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
    pub static_dir: PathBuf,
    pub entry_document: String,
    pub open_browser: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Executable path without the platform suffix (`.exe` is appended on Windows).
    pub executable: PathBuf,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub settle_delay_ms: u64,
    /// When set, settling polls this local port instead of sleeping for `settle_delay_ms`.
    pub ready_port: Option<u16>,
    pub ready_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    pub listener_timeout_ms: u64,
    pub backend_timeout_ms: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    pub web: WebConfig,
    pub backend: BackendConfig,
    pub shutdown: ShutdownConfig,
}

impl Default for WebConfig {
    fn default() -> Self {
        WebConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
            static_dir: PathBuf::from("build"),
            entry_document: "index.html".to_string(),
            open_browser: true,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            executable: PathBuf::from("api/akio-local-engine"),
            args: Vec::new(),
            working_dir: None,
            settle_delay_ms: 1000,
            ready_port: None,
            ready_timeout_ms: 10_000,
        }
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        ShutdownConfig {
            listener_timeout_ms: 5000,
            backend_timeout_ms: 5000,
        }
    }
}

impl WebConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn entry_path(&self) -> PathBuf {
        self.static_dir.join(&self.entry_document)
    }
}

impl BackendConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }
}

impl ShutdownConfig {
    pub fn listener_timeout(&self) -> Duration {
        Duration::from_millis(self.listener_timeout_ms)
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_millis(self.backend_timeout_ms)
    }
}

impl LauncherConfig {
    /// Loads the config file (if any) and applies environment overrides.
    ///
    /// An explicitly requested file must exist; the default `launcher.toml` is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load_from_file(default_path)?
                } else {
                    LauncherConfig::default()
                }
            }
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            LauncherError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml(&content)
            .map_err(|e| LauncherError::Config(format!("{}: {}", path.display(), e)))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Applies `PORT`, `HOST`, `STATIC_DIR`, `BACKEND_PATH`, `BACKEND_READY_PORT` and
    /// `OPEN_BROWSER` from `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT").filter(|v| !v.trim().is_empty()) {
            self.web.port = parse_port("PORT", &port)?;
        }
        if let Some(host) = lookup("HOST").filter(|v| !v.trim().is_empty()) {
            self.web.host = host.trim().to_string();
        }
        if let Some(dir) = lookup("STATIC_DIR").filter(|v| !v.trim().is_empty()) {
            self.web.static_dir = PathBuf::from(dir);
        }
        if let Some(path) = lookup("BACKEND_PATH").filter(|v| !v.trim().is_empty()) {
            self.backend.executable = PathBuf::from(path);
        }
        if let Some(port) = lookup("BACKEND_READY_PORT").filter(|v| !v.trim().is_empty()) {
            self.backend.ready_port = Some(parse_port("BACKEND_READY_PORT", &port)?);
        }
        if let Some(flag) = lookup("OPEN_BROWSER") {
            match parse_flag(&flag) {
                Some(enabled) => self.web.open_browser = enabled,
                None => warn!("Ignoring OPEN_BROWSER={:?}: expected true/false", flag),
            }
        }
        Ok(())
    }
}

fn parse_port(name: &str, value: &str) -> Result<u16> {
    value
        .trim()
        .parse::<u16>()
        .map_err(|e| LauncherError::Config(format!("{}={:?} is not a valid port: {}", name, value, e)))
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = LauncherConfig::default();
        assert_eq!(config.web.port, 3000);
        assert_eq!(config.web.entry_path(), PathBuf::from("build/index.html"));
        assert_eq!(config.backend.settle_delay(), Duration::from_secs(1));
        assert!(config.backend.ready_port.is_none());
        assert!(config.web.open_browser);
    }

    #[test]
    fn test_port_env_override() {
        let mut config = LauncherConfig::default();
        config.apply_env_overrides(env(&[("PORT", "4123")])).unwrap();
        assert_eq!(config.web.port, 4123);
        assert_eq!(config.web.bind_addr(), "127.0.0.1:4123");
    }

    #[test]
    fn test_empty_port_keeps_default() {
        let mut config = LauncherConfig::default();
        config.apply_env_overrides(env(&[("PORT", "  ")])).unwrap();
        assert_eq!(config.web.port, 3000);
    }

    #[test]
    fn test_invalid_port_is_config_error() {
        let mut config = LauncherConfig::default();
        let err = config
            .apply_env_overrides(env(&[("PORT", "http")]))
            .unwrap_err();
        assert!(matches!(err, LauncherError::Config(_)));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_backend_and_browser_overrides() {
        let mut config = LauncherConfig::default();
        config
            .apply_env_overrides(env(&[
                ("BACKEND_PATH", "/opt/engine/bin/engine"),
                ("BACKEND_READY_PORT", "8080"),
                ("OPEN_BROWSER", "off"),
                ("STATIC_DIR", "dist"),
            ]))
            .unwrap();
        assert_eq!(config.backend.executable, PathBuf::from("/opt/engine/bin/engine"));
        assert_eq!(config.backend.ready_port, Some(8080));
        assert!(!config.web.open_browser);
        assert_eq!(config.web.entry_path(), PathBuf::from("dist/index.html"));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = LauncherConfig::from_toml(
            r#"
            [web]
            port = 8088

            [backend]
            args = ["--quiet"]
            ready_port = 9000
            "#,
        )
        .unwrap();
        assert_eq!(config.web.port, 8088);
        assert_eq!(config.web.host, "127.0.0.1");
        assert_eq!(config.backend.args, vec!["--quiet".to_string()]);
        assert_eq!(config.backend.ready_port, Some(9000));
        assert_eq!(config.shutdown.backend_timeout_ms, 5000);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let err = LauncherConfig::load(Some(Path::new("/nonexistent/launcher.toml"))).unwrap_err();
        assert!(matches!(err, LauncherError::Config(_)));
    }
}
