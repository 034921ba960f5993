//! Shutdown coordination.
//!
//! Every shutdown source (signals, panics) fires one [`ShutdownTrigger`]; the first reason
//! wins. [`ShutdownCoordinator`] then runs the teardown once: close the web host, stop the
//! backend, exit.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

use crate::config::ShutdownConfig;
use crate::error::Result;
use crate::server::ServerHandle;
use crate::state::{LauncherState, StateCell};
use crate::supervisor::Supervisor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    Interrupt,
    Terminate,
    Break,
    Fault,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShutdownReason::Interrupt => "interrupt",
            ShutdownReason::Terminate => "terminate signal",
            ShutdownReason::Break => "ctrl-break",
            ShutdownReason::Fault => "uncaught fault",
        };
        f.write_str(name)
    }
}

/// Single-use latch that records the first shutdown reason.
#[derive(Clone)]
pub struct ShutdownTrigger {
    tx: Arc<watch::Sender<Option<ShutdownReason>>>,
}

impl Default for ShutdownTrigger {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }
}

impl ShutdownTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` only for the call that actually requested shutdown.
    pub fn fire(&self, reason: ShutdownReason) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason);
                true
            } else {
                false
            }
        })
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        *self.tx.borrow()
    }

    /// Resolves once shutdown has been requested, with the first reason.
    pub async fn wait(&self) -> ShutdownReason {
        let mut rx = self.tx.subscribe();
        // the sender lives in `self`, so the channel cannot close while we wait;
        // the borrowed `Ref` must drop before `rx`
        let reason = match rx.wait_for(|reason| reason.is_some()).await {
            Ok(reason) => (*reason).unwrap_or(ShutdownReason::Fault),
            Err(_) => ShutdownReason::Fault,
        };
        reason
    }
}

/// The side effects of a shutdown, in the order they run.
#[async_trait]
pub trait Teardown: Send + Sync {
    async fn close_listener(&self) -> Result<()>;
    async fn terminate_backend(&self) -> Result<()>;
    fn exit(&self, code: i32);
}

pub struct ShutdownCoordinator<T: Teardown> {
    teardown: T,
    state: StateCell,
    started: AtomicBool,
}

impl<T: Teardown> ShutdownCoordinator<T> {
    pub fn new(teardown: T, state: StateCell) -> Self {
        Self {
            teardown,
            state,
            started: AtomicBool::new(false),
        }
    }

    pub fn teardown(&self) -> &T {
        &self.teardown
    }

    /// Runs the teardown sequence. Only the first call does anything; it returns `true`.
    ///
    /// Failures are logged; the process still exits with status 0.
    pub async fn shutdown(&self, reason: ShutdownReason) -> bool {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("Shutdown already in progress, ignoring {}", reason);
            return false;
        }

        info!("🛑 Shutting down ({})", reason);
        if let Err(e) = self.state.advance(LauncherState::ShuttingDown) {
            warn!("{}", e);
        }

        match self.teardown.close_listener().await {
            Ok(()) => info!("Web host closed"),
            Err(e) => error!("Web host close failed: {}", e),
        }

        match self.teardown.terminate_backend().await {
            Ok(()) => info!("Backend terminated"),
            Err(e) => error!("Backend termination failed: {}", e),
        }

        if let Err(e) = self.state.advance(LauncherState::Terminated) {
            warn!("{}", e);
        }
        self.teardown.exit(0);
        true
    }
}

/// Teardown of the real web host and backend process.
pub struct ProcessTeardown {
    server: Mutex<Option<ServerHandle>>,
    supervisor: Mutex<Supervisor>,
    listener_timeout: Duration,
    backend_timeout: Duration,
}

impl ProcessTeardown {
    pub fn new(server: ServerHandle, supervisor: Supervisor, config: &ShutdownConfig) -> Self {
        Self {
            server: Mutex::new(Some(server)),
            supervisor: Mutex::new(supervisor),
            listener_timeout: config.listener_timeout(),
            backend_timeout: config.backend_timeout(),
        }
    }
}

#[async_trait]
impl Teardown for ProcessTeardown {
    async fn close_listener(&self) -> Result<()> {
        match self.server.lock().await.take() {
            Some(server) => server.close(self.listener_timeout).await,
            None => Ok(()),
        }
    }

    async fn terminate_backend(&self) -> Result<()> {
        self.supervisor
            .lock()
            .await
            .terminate(self.backend_timeout)
            .await
    }

    fn exit(&self, code: i32) {
        std::process::exit(code);
    }
}
