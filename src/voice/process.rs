//! Subprocess control shared by recorders, players and the local voice

use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

use crate::{Error, Result};

/// How long a process may take to exit after being interrupted
const GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Deliver SIGINT so the process can flush and finalize its output
#[cfg(unix)]
#[allow(unsafe_code)]
fn interrupt(child: &Child) -> std::io::Result<()> {
    let pid = child
        .id()
        .ok_or_else(|| std::io::Error::other("process already exited"))?;
    let pid = libc::pid_t::try_from(pid).map_err(std::io::Error::other)?;

    // SAFETY: kill(2) has no memory-safety preconditions; pid is a child we own
    let rc = unsafe { libc::kill(pid, libc::SIGINT) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn interrupt(_child: &Child) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "interrupt signals are not supported on this platform",
    ))
}

/// Stop a running process: interrupt first, kill if that fails or it lingers
///
/// # Errors
///
/// Returns error if the process can neither be signalled nor waited on
pub async fn stop(child: &mut Child) -> Result<ExitStatus> {
    match interrupt(child) {
        Ok(()) => {
            if let Ok(status) = tokio::time::timeout(GRACE_PERIOD, child.wait()).await {
                return Ok(status?);
            }
            tracing::warn!("process ignored interrupt, killing");
        }
        Err(e) => {
            tracing::debug!(error = %e, "interrupt failed, killing");
        }
    }

    child.start_kill()?;
    Ok(child.wait().await?)
}

/// Spawn `cmd` and wait for it, stopping it early if `cancel` fires
///
/// # Errors
///
/// Returns `Error::Cancelled` on cancellation, or an IO error if the
/// process cannot be spawned or waited on
pub async fn run(mut cmd: Command, cancel: &CancellationToken) -> Result<ExitStatus> {
    cmd.kill_on_drop(true);
    let mut child = cmd.spawn()?;

    tokio::select! {
        status = child.wait() => Ok(status?),
        () = cancel.cancelled() => {
            if let Err(e) = stop(&mut child).await {
                tracing::warn!(error = %e, "failed to stop process on cancel");
            }
            Err(Error::Cancelled)
        }
    }
}
