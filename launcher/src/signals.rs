//! Routes OS termination signals and panics into the shutdown trigger.

use tracing::{error, info};

use crate::error::Result;
use crate::shutdown::{ShutdownReason, ShutdownTrigger};

/// Spawns one listener task per signal source. Must be called inside the tokio runtime.
pub fn install_signal_handlers(trigger: &ShutdownTrigger) -> Result<()> {
    {
        let trigger = trigger.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => request(&trigger, ShutdownReason::Interrupt),
                Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
            }
        });
    }

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate())?;
        let trigger = trigger.clone();
        tokio::spawn(async move {
            if terminate.recv().await.is_some() {
                request(&trigger, ShutdownReason::Terminate);
            }
        });
    }

    #[cfg(windows)]
    {
        use tokio::signal::windows::{ctrl_break, ctrl_close};

        let mut brk = ctrl_break()?;
        let break_trigger = trigger.clone();
        tokio::spawn(async move {
            if brk.recv().await.is_some() {
                request(&break_trigger, ShutdownReason::Break);
            }
        });

        let mut close = ctrl_close()?;
        let close_trigger = trigger.clone();
        tokio::spawn(async move {
            if close.recv().await.is_some() {
                request(&close_trigger, ShutdownReason::Terminate);
            }
        });
    }

    Ok(())
}

/// Chains onto the existing panic hook so a panic on any thread starts shutdown.
pub fn install_panic_hook(trigger: &ShutdownTrigger) {
    let trigger = trigger.clone();
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        error!("Uncaught fault: {}", panic_info);
        previous(panic_info);
        trigger.fire(ShutdownReason::Fault);
    }));
}

fn request(trigger: &ShutdownTrigger, reason: ShutdownReason) {
    if trigger.fire(reason) {
        info!("Received {}, shutting down...", reason);
    } else {
        info!("Received {} again, shutdown already underway", reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_in_thread_fires_trigger() {
        let trigger = ShutdownTrigger::new();
        install_panic_hook(&trigger);

        let result = std::thread::spawn(|| panic!("engine glue exploded")).join();
        assert!(result.is_err());
        assert_eq!(trigger.reason(), Some(ShutdownReason::Fault));

        let _ = std::panic::take_hook();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_sigterm_reaches_trigger() {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;
        use std::time::Duration;

        let trigger = ShutdownTrigger::new();
        install_signal_handlers(&trigger).unwrap();

        kill(Pid::this(), Signal::SIGTERM).unwrap();
        let reason = tokio::time::timeout(Duration::from_secs(2), trigger.wait())
            .await
            .expect("SIGTERM should fire the trigger");
        assert_eq!(reason, ShutdownReason::Terminate);
    }
}
