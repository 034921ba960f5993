use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use app_launcher::{logging, signals, Launcher, LauncherConfig, LauncherError, ShutdownTrigger};

#[derive(Parser, Debug)]
#[command(name = "app-launcher", version, about = "Starts the local engine and serves the web UI")]
struct Cli {
    /// Configuration file (defaults to ./launcher.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Web UI port, overrides PORT
    #[arg(long)]
    port: Option<u16>,

    /// Don't open a browser tab
    #[arg(long)]
    no_browser: bool,
}

fn fail(err: LauncherError) -> ! {
    error!("❌ {}", err);
    std::process::exit(err.exit_code());
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_tracing()?;
    info!("🚀 app-launcher {}", env!("CARGO_PKG_VERSION"));

    let mut config = LauncherConfig::load(cli.config.as_deref()).unwrap_or_else(|e| fail(e));
    if let Some(port) = cli.port {
        config.web.port = port;
    }
    if cli.no_browser {
        config.web.open_browser = false;
    }

    let launcher = Launcher::for_current_platform(config).unwrap_or_else(|e| fail(e));

    let trigger = ShutdownTrigger::new();
    signals::install_panic_hook(&trigger);
    signals::install_signal_handlers(&trigger)?;

    // a panic in startup or teardown drops the supervisor, which kills the child
    let launcher = Arc::new(launcher);
    let startup = {
        let launcher = Arc::clone(&launcher);
        tokio::spawn(async move { launcher.start().await })
    };
    let running = match startup.await {
        Ok(Ok(running)) => running,
        Ok(Err(e)) => fail(e),
        Err(e) => {
            error!("❌ Startup aborted: {}", e);
            std::process::exit(1);
        }
    };
    info!("Press Ctrl+C to stop");

    let reason = trigger.wait().await;
    let coordinator = running.into_coordinator(&launcher);
    if let Err(e) = tokio::spawn(async move { coordinator.shutdown(reason).await }).await {
        error!("Shutdown aborted: {}", e);
        std::process::exit(0);
    }

    Ok(())
}
