//! Static Web Host: serves the bundled web UI and falls back to the entry document so
//! client-side routes resolve.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{middleware, Router};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tower_http::services::{ServeDir, ServeFile};
use tracing::{info, warn};

use crate::config::WebConfig;
use crate::error::{LauncherError, Result};
use crate::logging::access_log_middleware;

pub fn build_router(config: &WebConfig) -> Router {
    let entry_document = ServeFile::new(config.entry_path());
    let static_files = ServeDir::new(&config.static_dir)
        .append_index_html_on_directories(true)
        .fallback(entry_document);

    Router::new()
        .fallback_service(static_files)
        .layer(middleware::from_fn(access_log_middleware))
}

/// Warns about a missing asset directory or entry document. Serving continues either way.
pub fn check_static_dir(config: &WebConfig) -> bool {
    if !config.static_dir.is_dir() {
        warn!(
            "Static directory {} does not exist; every request will 404",
            config.static_dir.display()
        );
        return false;
    }
    if !config.entry_path().is_file() {
        warn!(
            "Entry document {} is missing; unknown routes will 404",
            config.entry_path().display()
        );
        return false;
    }
    true
}

/// A bound, not yet serving, web host.
pub struct WebHost {
    listener: TcpListener,
    router: Router,
    local_addr: SocketAddr,
}

impl WebHost {
    pub async fn bind(config: &WebConfig) -> Result<Self> {
        check_static_dir(config);

        let addr = config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| LauncherError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        info!(
            "Web host bound to {} (serving {})",
            local_addr,
            config.static_dir.display()
        );

        Ok(Self {
            listener,
            router: build_router(config),
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Address to show the user and hand to the browser.
    pub fn url(&self) -> String {
        let ip = self.local_addr.ip();
        if ip.is_loopback() || ip.is_unspecified() {
            format!("http://localhost:{}", self.local_addr.port())
        } else {
            format!("http://{}", self.local_addr)
        }
    }

    /// Starts accepting connections on a background task.
    pub fn serve(self) -> ServerHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let local_addr = self.local_addr;

        let task = tokio::spawn(async move {
            axum::serve(
                self.listener,
                self.router
                    .into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
        });

        ServerHandle {
            local_addr,
            shutdown: Some(shutdown_tx),
            task,
        }
    }
}

/// Handle to a running web host, used by shutdown to stop it.
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<std::io::Result<()>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops accepting connections and waits for in-flight ones, aborting after `limit`.
    pub async fn close(mut self, limit: Duration) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }

        match timeout(limit, &mut self.task).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(e))) => Err(LauncherError::Server(e.to_string())),
            Ok(Err(join_err)) => Err(LauncherError::Server(join_err.to_string())),
            Err(_) => {
                self.task.abort();
                Err(LauncherError::Server(format!(
                    "connections still open after {:?}, aborted",
                    limit
                )))
            }
        }
    }
}
