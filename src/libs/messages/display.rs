//! Display implementation for pennerbot messages.
//!
//! All user-facing text lives in this one `match`, so wording stays
//! consistent between the CLI, the watcher and the configuration wizard.
//! Parameters are interpolated here; callers never format message text
//! themselves.

use super::types::Message;
use std::fmt::{Display, Formatter, Result};

impl Display for Message {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let text = match self {
            // === CONFIGURATION MESSAGES ===
            Message::ConfigSaved => "Configuration saved successfully".to_string(),
            Message::ConfigDeleted => "Configuration deleted".to_string(),
            Message::ConfirmDeleteConfig => "Delete the configuration file?".to_string(),
            Message::ConfigModuleServer => "Game server".to_string(),
            Message::ConfigModuleActivity(kind) => format!("Activity: {}", kind),
            Message::PromptBaseUrl => "Game URL".to_string(),
            Message::PromptSessionCookie => "Session cookie (copy the Cookie header of a logged-in browser)".to_string(),
            Message::PromptPlayer => "Player name (key for the local records)".to_string(),
            Message::PromptAutoRepeat => "Select activities to repeat automatically".to_string(),
            Message::PromptDefaultDuration(allowed) => format!("Default duration in minutes ({})", allowed),
            Message::InvalidDurationInput(allowed) => format!("Duration must be one of: {}", allowed),
            Message::PromptPauseMinutes => "Pause between runs in minutes".to_string(),
            Message::PromptAutosell => "Sell bottles automatically after collecting?".to_string(),
            Message::PromptMinPrice(min, max) => format!("Minimum bottle price in cents ({}-{})", min, max),
            Message::SessionCookieMissing => "No session cookie configured. Run `pennerbot init` first".to_string(),

            // === ACTIVITY MESSAGES ===
            Message::ActivityRunning(kind, end) => format!("{} running until {}", kind, end),
            Message::ActivityPending(kind, end) => {
                format!("{} requested, expected to end at {} (waiting for the game to confirm)", kind, end)
            }
            Message::ActivityCancelled(kind) => format!("{} cancelled", kind),
            Message::ActivityFailed(error) => error.to_string(),
            Message::ManualVerificationNeeded(kind) => {
                format!("Check {} on the game page before retrying; the cancel may or may not have gone through", kind)
            }
            Message::RetryLater => "Temporary failure, try again in a moment".to_string(),
            Message::StatusHeader => "Activities".to_string(),
            Message::StatusRefreshFailed(error) => format!("Could not refresh from the game: {}", error),
            Message::StatusUnconfirmedHint => "* remaining time predicted locally, not confirmed by the game".to_string(),

            // === WATCHER MESSAGES ===
            Message::WatcherStarted(pid) => format!("Watcher started in background (PID: {})", pid),
            Message::WatcherStopped(pid) => format!("Watcher stopped (PID: {})", pid),
            Message::WatcherRunningForeground => "Watcher running in foreground, press Ctrl+C to stop".to_string(),
            Message::WatcherNotRunning => "Watcher is not running".to_string(),
            Message::WatcherNotRunningPidNotFound => "Watcher is not running (PID file not found)".to_string(),
            Message::WatcherStoppingExisting(pid) => format!("Stopping existing watcher (PID: {})", pid),
            Message::WatcherFailedToStopExisting(error) => format!("Failed to stop existing watcher: {}", error),
            Message::WatcherFailedToStop(pid) => format!("Failed to stop watcher (PID: {})", pid),
            Message::WatcherReceivedSigterm => "Received SIGTERM, shutting down".to_string(),
            Message::WatcherReceivedSigint => "Received SIGINT, shutting down".to_string(),
            Message::WatcherReceivedCtrlC => "Received Ctrl+C, shutting down".to_string(),
            Message::WatcherCtrlCListenFailed(error) => format!("Failed to listen for Ctrl+C: {}", error),
            Message::WatcherSignalHandlingNotSupported => "Signal handling is not supported on this platform".to_string(),
            Message::WatcherEvent(event) => event.to_string(),
            Message::SchedulerExitedNormally => "Scheduler exited".to_string(),
            Message::SchedulerError(error) => format!("Scheduler error: {}", error),
            Message::SchedulerTaskPanicked(error) => format!("Scheduler task panicked: {}", error),
            Message::SchedulerShuttingDown => "Shutting down scheduler".to_string(),
            Message::InvalidPidFileContent => "Invalid PID file content".to_string(),
            Message::FailedToCreateSigtermHandler => "Failed to create SIGTERM handler".to_string(),
            Message::FailedToCreateSigintHandler => "Failed to create SIGINT handler".to_string(),
            Message::FailedToGetCurrentExecutable => "Failed to get current executable path".to_string(),
            Message::DaemonModeNotSupported => "Background mode is not supported on this platform".to_string(),
            Message::FailedToOpenProcess(code) => format!("Failed to open process (error code {})", code),
            Message::FailedToTerminateProcess(code) => format!("Failed to terminate process (error code {})", code),
            Message::ProcessTerminationNotSupported => "Process termination is not supported on this platform".to_string(),

            // === MIGRATION MESSAGES ===
            Message::MigrationFailed(version, error) => format!("✗ Migration v{} failed: {}", version, error),
        };

        write!(f, "{}", text)
    }
}
