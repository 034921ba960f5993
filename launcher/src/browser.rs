//! Best-effort "open this URL in the default browser".

use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::platform::Platform;
use crate::supervisor::hide_console_window;

/// Program and arguments used to hand a URL to the OS.
pub fn open_command(platform: Platform, url: &str) -> (&'static str, Vec<String>) {
    match platform {
        // the empty string is `start`'s window title argument
        Platform::Windows => (
            "cmd",
            vec!["/C".into(), "start".into(), "".into(), url.to_string()],
        ),
        Platform::MacOs => ("open", vec![url.to_string()]),
        Platform::Linux => ("xdg-open", vec![url.to_string()]),
    }
}

/// Fire-and-forget: failures are logged and never reach the caller.
pub fn open(platform: Platform, url: &str) {
    let (program, args) = open_command(platform, url);
    let url = url.to_string();

    let mut cmd = Command::new(program);
    cmd.args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    hide_console_window(&mut cmd);

    match cmd.spawn() {
        Ok(mut child) => {
            tokio::spawn(async move {
                match child.wait().await {
                    Ok(status) if status.success() => debug!("Opened browser at {}", url),
                    Ok(status) => warn!("Browser opener exited with {} for {}", status, url),
                    Err(e) => warn!("Browser opener failed for {}: {}", url, e),
                }
            });
        }
        Err(e) => warn!("Could not open browser ({}): {}. Visit {} manually", program, e, url),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_command_per_platform() {
        let url = "http://localhost:3000";

        let (program, args) = open_command(Platform::Windows, url);
        assert_eq!(program, "cmd");
        assert_eq!(args, vec!["/C", "start", "", url]);

        let (program, args) = open_command(Platform::MacOs, url);
        assert_eq!(program, "open");
        assert_eq!(args, vec![url]);

        let (program, _) = open_command(Platform::Linux, url);
        assert_eq!(program, "xdg-open");
    }
}
