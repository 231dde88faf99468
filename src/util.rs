//! Small shared helpers.

use std::process::Command;

use log::{debug, warn};

/// Open a URL in the platform's default browser.
///
/// Fire-and-forget: the spawned process is never waited on and launch
/// failures are only logged. Callers must not treat this as part of any
/// delivery outcome.
pub fn open_url(url: &str) {
    let result = if cfg!(target_os = "macos") {
        Command::new("open").arg(url).spawn()
    } else if cfg!(target_os = "windows") {
        Command::new("cmd").args(["/C", "start", "", url]).spawn()
    } else {
        Command::new("xdg-open").arg(url).spawn()
    };

    match result {
        Ok(child) => debug!("opened {} in browser (pid {:?})", url, child.id()),
        Err(err) => warn!("could not open {} in browser: {}", url, err),
    }
}
