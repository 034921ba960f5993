//! Backend Process Supervisor
//!
//! Owns the backend child process: spawning it with inherited stdio, waiting for it to
//! settle, and terminating it with the platform's termination strategy.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, error, info, warn};

use crate::config::BackendConfig;
use crate::error::{LauncherError, Result};
use crate::platform::{Platform, SpawnStrategy, Termination};

const READY_POLL_INTERVAL: Duration = Duration::from_millis(200);

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Liveness of the backend child as last observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Liveness {
    NotSpawned,
    Running { pid: u32 },
    /// `code` is `None` when the child was ended by a signal.
    Exited { code: Option<i32> },
    Failed(String),
}

/// Outcome of the settle step between spawn and serving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Fixed delay elapsed; nothing was probed.
    Settled,
    /// The configured ready port accepted a connection.
    Ready,
    TimedOut,
    /// The child exited before settling finished.
    Exited,
}

pub struct Supervisor {
    platform: Platform,
    strategy: SpawnStrategy,
    program: PathBuf,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    child: Option<Child>,
    pid: Option<u32>,
    liveness: Liveness,
}

impl Supervisor {
    pub fn new(platform: Platform, config: &BackendConfig) -> Self {
        let strategy = platform.strategy();
        let program = strategy.executable_for(&config.executable);

        Self {
            platform,
            strategy,
            program,
            args: config.args.clone(),
            working_dir: config.working_dir.clone(),
            child: None,
            pid: None,
            liveness: Liveness::NotSpawned,
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Spawns the backend with inherited stdio. A second call while running is a no-op.
    ///
    /// The child is killed if the supervisor is dropped while it still runs.
    pub fn start(&mut self) -> Result<u32> {
        if let Liveness::Running { pid } = self.liveness() {
            info!("Backend already running (pid {})", pid);
            return Ok(pid);
        }

        info!(
            "Starting backend: {} {}",
            self.program.display(),
            self.args.join(" ")
        );

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        if self.strategy.hide_console {
            hide_console_window(&mut cmd);
        }

        match cmd.spawn() {
            Ok(child) => {
                let pid = child.id().unwrap_or_default();
                info!("Backend started (pid {})", pid);
                self.pid = Some(pid);
                self.child = Some(child);
                self.liveness = Liveness::Running { pid };
                Ok(pid)
            }
            Err(source) => {
                self.liveness = Liveness::Failed(source.to_string());
                Err(LauncherError::Spawn {
                    path: self.program.clone(),
                    source,
                })
            }
        }
    }

    /// Refreshes and returns the child's liveness without blocking.
    pub fn liveness(&mut self) -> Liveness {
        if let Some(child) = self.child.as_mut() {
            match child.try_wait() {
                Ok(Some(status)) => {
                    self.liveness = Liveness::Exited {
                        code: status.code(),
                    };
                }
                Ok(None) => {}
                Err(e) => warn!("Could not poll backend status: {}", e),
            }
        }
        self.liveness.clone()
    }

    /// Gives the backend time to come up before the browser is pointed at the UI.
    ///
    /// With a `ready_port` this polls a local TCP connect until the timeout; otherwise it
    /// sleeps for the fixed settle delay.
    pub async fn settle(&mut self, config: &BackendConfig) -> Readiness {
        let outcome = match config.ready_port {
            Some(port) => self.wait_for_port(port, config.ready_timeout()).await,
            None => {
                debug!("Waiting {:?} for backend to settle", config.settle_delay());
                sleep(config.settle_delay()).await;
                Readiness::Settled
            }
        };

        if let Liveness::Exited { code } = self.liveness() {
            error!("Backend exited during startup (code {:?})", code);
            return Readiness::Exited;
        }
        outcome
    }

    async fn wait_for_port(&mut self, port: u16, limit: Duration) -> Readiness {
        let deadline = Instant::now() + limit;
        loop {
            if TcpStream::connect(("127.0.0.1", port)).await.is_ok() {
                info!("Backend is accepting connections on port {}", port);
                return Readiness::Ready;
            }
            if matches!(self.liveness(), Liveness::Exited { .. }) {
                return Readiness::Exited;
            }
            if Instant::now() >= deadline {
                warn!(
                    "Backend did not open port {} within {:?}; continuing anyway",
                    port, limit
                );
                return Readiness::TimedOut;
            }
            sleep(READY_POLL_INTERVAL).await;
        }
    }

    /// Stops the backend. Waits up to `grace` for it to exit, then force-kills it.
    pub async fn terminate(&mut self, grace: Duration) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            debug!("No backend process to terminate");
            return Ok(());
        };
        let pid = self.pid.unwrap_or_default();

        if let Ok(Some(status)) = child.try_wait() {
            info!("Backend already exited ({})", status);
            self.liveness = Liveness::Exited {
                code: status.code(),
            };
            return Ok(());
        }

        let requested = match self.strategy.termination {
            Termination::TreeKill => tree_kill(pid).await,
            Termination::Signal => send_terminate(&mut child, pid),
        };
        if let Err(e) = &requested {
            error!("{}", e);
        }

        match timeout(grace, child.wait()).await {
            Ok(Ok(status)) => {
                info!("Backend stopped ({})", status);
                self.liveness = Liveness::Exited {
                    code: status.code(),
                };
                requested
            }
            Ok(Err(e)) => {
                self.liveness = Liveness::Failed(e.to_string());
                Err(LauncherError::Terminate {
                    pid,
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                warn!(
                    "Backend (pid {}) still running after {:?}, killing it",
                    pid, grace
                );
                child.kill().await.map_err(|e| LauncherError::Terminate {
                    pid,
                    reason: e.to_string(),
                })?;
                self.liveness = Liveness::Exited { code: None };
                Ok(())
            }
        }
    }
}

pub(crate) fn hide_console_window(cmd: &mut Command) {
    #[cfg(windows)]
    {
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
    #[cfg(not(windows))]
    {
        let _ = cmd;
    }
}

/// `taskkill /pid <pid> /f /t`: force-kills the backend and every process it started.
pub(crate) fn tree_kill_command(pid: u32) -> (&'static str, Vec<String>) {
    (
        "taskkill",
        vec![
            "/pid".to_string(),
            pid.to_string(),
            "/f".to_string(),
            "/t".to_string(),
        ],
    )
}

async fn tree_kill(pid: u32) -> Result<()> {
    let (program, args) = tree_kill_command(pid);
    let mut cmd = Command::new(program);
    cmd.args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    hide_console_window(&mut cmd);

    let status = cmd.status().await.map_err(|e| LauncherError::Terminate {
        pid,
        reason: format!("taskkill could not run: {}", e),
    })?;
    if status.success() {
        Ok(())
    } else {
        Err(LauncherError::Terminate {
            pid,
            reason: format!("taskkill exited with {}", status),
        })
    }
}

#[cfg(unix)]
fn send_terminate(_child: &mut Child, pid: u32) -> Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    // pid 0 would signal our whole process group
    if pid == 0 {
        return Err(LauncherError::Terminate {
            pid,
            reason: "backend pid unknown".to_string(),
        });
    }
    kill(Pid::from_raw(pid as i32), Signal::SIGTERM).map_err(|e| LauncherError::Terminate {
        pid,
        reason: format!("SIGTERM failed: {}", e),
    })
}

#[cfg(not(unix))]
fn send_terminate(child: &mut Child, pid: u32) -> Result<()> {
    child.start_kill().map_err(|e| LauncherError::Terminate {
        pid,
        reason: e.to_string(),
    })
}
