#[derive(Debug, Clone)]
pub enum Message {
    // === CONFIGURATION MESSAGES ===
    ConfigSaved,
    ConfigDeleted,
    ConfirmDeleteConfig,
    ConfigModuleServer,
    ConfigModuleActivity(String), // kind
    PromptBaseUrl,
    PromptSessionCookie,
    PromptPlayer,
    PromptAutoRepeat,
    PromptDefaultDuration(String), // allowed durations
    InvalidDurationInput(String),  // allowed durations
    PromptPauseMinutes,
    PromptAutosell,
    PromptMinPrice(u32, u32), // min, max cents
    SessionCookieMissing,

    // === ACTIVITY MESSAGES ===
    ActivityRunning(String, String), // kind, expected end
    ActivityPending(String, String), // kind, expected end
    ActivityCancelled(String),
    ActivityFailed(String),
    ManualVerificationNeeded(String),
    RetryLater,
    StatusHeader,
    StatusRefreshFailed(String),
    StatusUnconfirmedHint,

    // === WATCHER MESSAGES ===
    WatcherStarted(u32),
    WatcherStopped(u32),
    WatcherRunningForeground,
    WatcherNotRunning,
    WatcherNotRunningPidNotFound,
    WatcherStoppingExisting(String),
    WatcherFailedToStopExisting(String),
    WatcherFailedToStop(u32),
    WatcherReceivedSigterm,
    WatcherReceivedSigint,
    WatcherReceivedCtrlC,
    WatcherCtrlCListenFailed(String),
    WatcherSignalHandlingNotSupported,
    WatcherEvent(String),
    SchedulerExitedNormally,
    SchedulerError(String),
    SchedulerTaskPanicked(String),
    SchedulerShuttingDown,
    InvalidPidFileContent,
    FailedToCreateSigtermHandler,
    FailedToCreateSigintHandler,
    FailedToGetCurrentExecutable,
    DaemonModeNotSupported,
    FailedToOpenProcess(u32),
    FailedToTerminateProcess(u32),
    ProcessTerminationNotSupported,

    // === MIGRATION MESSAGES ===
    MigrationFailed(u32, String), // version, error
}
