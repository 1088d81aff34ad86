//! End-of-session actions for the production binary.

use glowup_env::{EnvError, SessionAction};
use std::process::Command;
use tracing::{info, warn};

/// AppleScript that presses the system "Lock Screen" shortcut.
const LOCK_SCRIPT: &str =
    "tell application \"System Events\" to keystroke \"q\" using {control down, command down}";

/// Locks the screen through the OS.
///
/// On macOS this sends the lock shortcut with `osascript` and, if that
/// fails, puts the display to sleep with `pmset displaysleepnow`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LockScreenSession;

impl SessionAction for LockScreenSession {
    fn name(&self) -> &str {
        "lock-screen"
    }

    #[cfg(target_os = "macos")]
    fn end_session(&self) -> Result<(), EnvError> {
        match run("osascript", &["-e", LOCK_SCRIPT]) {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(error = %e, "Lock shortcut failed, sleeping the display instead");
                run("pmset", &["displaysleepnow"])
            }
        }
    }

    #[cfg(not(target_os = "macos"))]
    fn end_session(&self) -> Result<(), EnvError> {
        warn!(script = LOCK_SCRIPT, "Session locking needs macOS");
        Err(EnvError::Unsupported(std::env::consts::OS.to_string()))
    }
}

/// Logs instead of locking. Selected by `--no-lock`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunSession;

impl SessionAction for DryRunSession {
    fn name(&self) -> &str {
        "dry-run"
    }

    fn end_session(&self) -> Result<(), EnvError> {
        info!("Dry run, leaving the session unlocked");
        Ok(())
    }
}

/// Runs a command to completion, mapping spawn errors and non-zero exits.
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn run(program: &str, args: &[&str]) -> Result<(), EnvError> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| EnvError::command(program, e))?;

    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let reason = match stderr.trim() {
        "" => output.status.to_string(),
        text => text.to_string(),
    };
    Err(EnvError::command(program, reason))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dry_run_never_fails() {
        assert!(DryRunSession.end_session().is_ok());
        assert_eq!(DryRunSession.name(), "dry-run");
    }

    #[test]
    fn test_missing_program_is_command_error() {
        let program = "glowup-definitely-not-installed";
        let err = run(program, &[]).unwrap_err();
        assert!(matches!(err, EnvError::CommandFailed { ref command, .. } if command == program));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit_is_command_error() {
        let err = run("false", &[]).unwrap_err();
        assert!(err.to_string().starts_with("Command `false` failed"));
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn test_lock_unsupported_off_macos() {
        assert!(matches!(
            LockScreenSession.end_session(),
            Err(EnvError::Unsupported(_))
        ));
    }
}
