//! Lifecycle of the background watcher.
//!
//! The watcher runs the [`Scheduler`] until SIGINT/SIGTERM (Ctrl+C on
//! Windows). `watch --background` re-executes the binary with the hidden
//! `--daemon-run` flag in a new session and records its PID so
//! `watch --stop` can find it again.

use crate::libs::config::Config;
use crate::libs::coordinator::Coordinator;
use crate::libs::data_storage::DataStorage;
use crate::libs::event::BroadcastPublisher;
use crate::libs::messages::Message;
use crate::libs::scheduler::Scheduler;
use crate::{msg_bail_anyhow, msg_error, msg_error_anyhow, msg_info, msg_warning};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

pub const PID_FILE: &str = "pennerbot-watch.pid";

/// Runs the scheduler until it fails or a shutdown signal arrives.
pub async fn run_with_signal_handling() -> Result<()> {
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    #[cfg(unix)]
    {
        tokio::spawn(async move {
            use tokio::signal::unix::{signal, SignalKind};

            let Ok(mut sigterm) = signal(SignalKind::terminate()) else {
                msg_error!(Message::FailedToCreateSigtermHandler);
                let _ = shutdown_tx.send(());
                return;
            };
            let Ok(mut sigint) = signal(SignalKind::interrupt()) else {
                msg_error!(Message::FailedToCreateSigintHandler);
                let _ = shutdown_tx.send(());
                return;
            };

            tokio::select! {
                _ = sigterm.recv() => {
                    msg_info!(Message::WatcherReceivedSigterm);
                }
                _ = sigint.recv() => {
                    msg_info!(Message::WatcherReceivedSigint);
                }
            }

            let _ = shutdown_tx.send(());
        });
    }

    #[cfg(windows)]
    {
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    msg_info!(Message::WatcherReceivedCtrlC);
                }
                Err(e) => {
                    msg_error!(Message::WatcherCtrlCListenFailed(e.to_string()));
                }
            }

            let _ = shutdown_tx.send(());
        });
    }

    #[cfg(not(any(unix, windows)))]
    {
        drop(shutdown_tx);
        msg_warning!(Message::WatcherSignalHandlingNotSupported);
    }

    let scheduler_handle = tokio::spawn(async move { run_scheduler().await.map_err(|e| e.to_string()) });

    tokio::select! {
        result = scheduler_handle => {
            match result {
                Ok(Ok(())) => msg_info!(Message::SchedulerExitedNormally),
                Ok(Err(e)) => msg_error!(Message::SchedulerError(e)),
                Err(e) => msg_error!(Message::SchedulerTaskPanicked(e.to_string())),
            }
        }
        _ = shutdown_rx => {
            msg_info!(Message::SchedulerShuttingDown);
        }
    }

    let pid_path = DataStorage::new().get_path(PID_FILE)?;
    if pid_path.exists() {
        let _ = std::fs::remove_file(&pid_path);
    }

    Ok(())
}

/// Builds the coordinator from the saved config and drives it forever.
async fn run_scheduler() -> Result<()> {
    let config = Config::read()?;
    if config.server.session_cookie.is_empty() {
        msg_bail_anyhow!(Message::SessionCookieMissing);
    }

    let publisher = Arc::new(BroadcastPublisher::new());
    let mut events = publisher.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => msg_info!(Message::WatcherEvent(event.to_string())),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    let coordinator = Arc::new(Coordinator::open(config, publisher)?);
    Scheduler::new(coordinator).run().await
}

/// Starts the watcher as a detached process, replacing a running one.
pub fn spawn() -> Result<()> {
    let pid_path = DataStorage::new().get_path(PID_FILE)?;

    if pid_path.exists() {
        if let Ok(pid_str) = std::fs::read_to_string(&pid_path) {
            msg_info!(Message::WatcherStoppingExisting(pid_str.trim().to_string()));
            if let Err(e) = stop_internal() {
                msg_warning!(Message::WatcherFailedToStopExisting(e.to_string()));
                let _ = std::fs::remove_file(&pid_path);
            }
            std::thread::sleep(Duration::from_millis(1000));
        }
    }

    let current_exe = std::env::current_exe().map_err(|_| msg_error_anyhow!(Message::FailedToGetCurrentExecutable))?;

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        let mut command = std::process::Command::new(current_exe);
        command.arg("--daemon-run");
        // SAFETY: setsid is async-signal-safe and touches no parent state.
        unsafe {
            command.pre_exec(|| {
                nix::unistd::setsid().map_err(std::io::Error::from)?;
                Ok(())
            });
        }
        let child = command.spawn()?;
        let pid = child.id();
        std::fs::write(pid_path, pid.to_string())?;
        msg_info!(Message::WatcherStarted(pid));
    }

    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const CREATE_NO_WINDOW: u32 = 0x08000000;
        let child = std::process::Command::new(current_exe)
            .arg("--daemon-run")
            .creation_flags(CREATE_NO_WINDOW)
            .spawn()?;
        let pid = child.id();
        std::fs::write(pid_path, pid.to_string())?;
        msg_info!(Message::WatcherStarted(pid));
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = (current_exe, pid_path);
        msg_bail_anyhow!(Message::DaemonModeNotSupported);
    }

    Ok(())
}

/// Stops the background watcher; a missing one is not an error.
pub fn stop() -> Result<()> {
    let pid_path = DataStorage::new().get_path(PID_FILE)?;
    if !pid_path.exists() {
        msg_info!(Message::WatcherNotRunning);
        return Ok(());
    }
    stop_internal()
}

fn stop_internal() -> Result<()> {
    let pid_path = DataStorage::new().get_path(PID_FILE)?;
    if !pid_path.exists() {
        msg_bail_anyhow!(Message::WatcherNotRunningPidNotFound);
    }

    let pid_str = std::fs::read_to_string(&pid_path)?;
    let pid: u32 = pid_str.trim().parse().map_err(|_| msg_error_anyhow!(Message::InvalidPidFileContent))?;

    let killed = kill_process(pid)?;
    std::fs::remove_file(pid_path)?;

    if killed {
        msg_info!(Message::WatcherStopped(pid));
        Ok(())
    } else {
        msg_info!(Message::WatcherNotRunning);
        Ok(())
    }
}

#[cfg(windows)]
fn kill_process(pid: u32) -> Result<bool> {
    use winapi::um::errhandlingapi::GetLastError;
    use winapi::um::handleapi::CloseHandle;
    use winapi::um::processthreadsapi::{OpenProcess, TerminateProcess};
    use winapi::um::winnt::PROCESS_TERMINATE;

    unsafe {
        let handle = OpenProcess(PROCESS_TERMINATE, 0, pid);
        if handle.is_null() {
            let error = GetLastError();
            // ERROR_INVALID_PARAMETER: no such process
            if error == 87 {
                return Ok(false);
            }
            msg_bail_anyhow!(Message::FailedToOpenProcess(error));
        }

        let result = TerminateProcess(handle, 0);
        CloseHandle(handle);

        if result == 0 {
            msg_bail_anyhow!(Message::FailedToTerminateProcess(GetLastError()));
        }
        std::thread::sleep(Duration::from_millis(100));
        Ok(true)
    }
}

#[cfg(unix)]
fn kill_process(pid: u32) -> Result<bool> {
    use std::process::Command;

    let alive = |pid: u32| -> Result<bool> { Ok(Command::new("ps").arg("-p").arg(pid.to_string()).output()?.status.success()) };

    if !alive(pid)? {
        return Ok(false);
    }

    Command::new("kill").arg("-TERM").arg(pid.to_string()).output()?;
    for _ in 0..10 {
        std::thread::sleep(Duration::from_millis(100));
        if !alive(pid)? {
            return Ok(true);
        }
    }

    Command::new("kill").arg("-9").arg(pid.to_string()).output()?;
    std::thread::sleep(Duration::from_millis(100));
    if alive(pid)? {
        msg_bail_anyhow!(Message::WatcherFailedToStop(pid));
    }
    Ok(true)
}

#[cfg(not(any(unix, windows)))]
fn kill_process(_pid: u32) -> Result<bool> {
    msg_bail_anyhow!(Message::ProcessTerminationNotSupported);
}
