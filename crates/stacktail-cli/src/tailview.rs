//! Companion tail view.
//!
//! The follower always runs in the invoking process. When a view is
//! wanted, a *sibling* process is spawned instead: a detached tmux session
//! running `tail -f` on the log file. The two share nothing but the log
//! path, which is safe for one writer and any number of readers.

use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{info, warn};

/// Whether a tail view can be spawned: a `tmux` binary answers and the
/// process is not already inside a tmux session.
#[must_use]
pub fn tmux_usable() -> bool {
    if std::env::var_os("TMUX").is_some() {
        return false;
    }
    Command::new("tmux")
        .arg("-V")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Spawns the detached tail-view session and logs how to attach to it.
///
/// Failure to spawn is never fatal; the follower keeps running without the
/// view.
pub fn spawn(session: &str, log_file: &Path, tail_lines: u32) {
    let command = format!("tail -n {tail_lines} -f '{}'", log_file.display());
    let result = Command::new("tmux")
        .args(["new-session", "-d", "-s", session])
        .arg(command)
        .status();

    match result {
        Ok(status) if status.success() => {
            info!("tail view running; attach with: tmux attach -t {session}");
        }
        Ok(status) => {
            warn!("tmux exited with {status}; continuing without tail view");
        }
        Err(err) => {
            warn!("failed to spawn tmux: {err}; continuing without tail view");
        }
    }
}

/// Session name for a stack's tail view.
#[must_use]
pub fn session_name(stack_short_name: &str) -> String {
    // tmux rejects '.' and ':' in session names.
    let sanitized: String = stack_short_name
        .chars()
        .map(|c| if c == '.' || c == ':' { '-' } else { c })
        .collect();
    format!("stacktail-{sanitized}")
}
