//! Startup sequence: spawn the backend, settle, start the web host, open the browser.

use tracing::{error, info, warn};

use crate::browser;
use crate::config::LauncherConfig;
use crate::error::Result;
use crate::platform::Platform;
use crate::server::{ServerHandle, WebHost};
use crate::shutdown::{ProcessTeardown, ShutdownCoordinator};
use crate::state::{LauncherState, StateCell};
use crate::supervisor::{Readiness, Supervisor};

/// Whether the backend came up alongside the web host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendStatus {
    Running { pid: u32, readiness: Readiness },
    /// Serving static assets only.
    Degraded { reason: String },
}

pub struct Launcher {
    config: LauncherConfig,
    platform: Platform,
    state: StateCell,
}

/// Everything that is live once the launcher is serving.
pub struct Running {
    pub supervisor: Supervisor,
    pub server: ServerHandle,
    pub url: String,
    pub backend: BackendStatus,
}

impl Launcher {
    /// Fails with `UnsupportedPlatform` before anything is spawned.
    pub fn new(config: LauncherConfig, os: &str) -> Result<Self> {
        let platform = Platform::from_os(os)?;
        Ok(Self {
            config,
            platform,
            state: StateCell::new(),
        })
    }

    pub fn for_current_platform(config: LauncherConfig) -> Result<Self> {
        Self::new(config, std::env::consts::OS)
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    pub fn state(&self) -> &StateCell {
        &self.state
    }

    pub async fn start(&self) -> Result<Running> {
        self.state.advance(LauncherState::SpawningBackend)?;
        info!("Launching on {}", self.platform);

        let mut supervisor = Supervisor::new(self.platform, &self.config.backend);
        let backend = match supervisor.start() {
            Ok(pid) => match supervisor.settle(&self.config.backend).await {
                Readiness::Exited => BackendStatus::Degraded {
                    reason: "backend exited during startup".to_string(),
                },
                readiness => BackendStatus::Running { pid, readiness },
            },
            Err(e) => {
                error!("{}", e);
                BackendStatus::Degraded {
                    reason: e.to_string(),
                }
            }
        };
        if let BackendStatus::Degraded { reason } = &backend {
            warn!("Serving the web UI without a backend: {}", reason);
        }

        let host = match WebHost::bind(&self.config.web).await {
            Ok(host) => host,
            Err(e) => {
                // nothing will ever shut the backend down, so do it now
                if let Err(term) = supervisor
                    .terminate(self.config.shutdown.backend_timeout())
                    .await
                {
                    error!("{}", term);
                }
                return Err(e);
            }
        };

        let url = host.url();
        let server = host.serve();
        self.state.advance(LauncherState::Serving)?;
        info!("✅ Application running at {}", url);

        if self.config.web.open_browser {
            browser::open(self.platform, &url);
        }

        Ok(Running {
            supervisor,
            server,
            url,
            backend,
        })
    }
}

impl Running {
    pub fn is_degraded(&self) -> bool {
        matches!(self.backend, BackendStatus::Degraded { .. })
    }

    /// Hands the live web host and backend to a shutdown coordinator.
    pub fn into_coordinator(
        self,
        launcher: &Launcher,
    ) -> ShutdownCoordinator<ProcessTeardown> {
        let teardown = ProcessTeardown::new(self.server, self.supervisor, &launcher.config.shutdown);
        ShutdownCoordinator::new(teardown, launcher.state.clone())
    }
}

impl std::fmt::Debug for Launcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Launcher")
            .field("platform", &self.platform)
            .field("state", &self.state.current())
            .finish()
    }
}
