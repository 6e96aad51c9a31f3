use libc::c_int;
use nix::errno::Errno;
use nix::unistd::Pid;
use tracing::debug;
use tsh_types::TshResult;

use super::job::JobTable;
use super::signal::SignalDeferral;

/// What happened to a reaped child.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ChildEvent {
    Exited(c_int),
    Signaled(c_int),
    Stopped(c_int),
}

impl ChildEvent {
    fn from_status(status: c_int) -> Option<Self> {
        if libc::WIFEXITED(status) {
            Some(ChildEvent::Exited(libc::WEXITSTATUS(status)))
        } else if libc::WIFSIGNALED(status) {
            Some(ChildEvent::Signaled(libc::WTERMSIG(status)))
        } else if libc::WIFSTOPPED(status) {
            Some(ChildEvent::Stopped(libc::WSTOPSIG(status)))
        } else {
            None
        }
    }
}

/// Collects one pending status change from any child without blocking.
///
/// Returns `Ok(None)` once no child has anything left to report. The raw
/// status is decoded here rather than through `nix::sys::wait::WaitStatus`,
/// which fails on signal numbers it has no name for and would lose the pid
/// of a child that has already been reaped. Safe to call from a handler.
pub fn reap_any() -> Result<Option<(Pid, ChildEvent)>, Errno> {
    loop {
        let mut status: c_int = 0;
        let pid = unsafe { libc::waitpid(-1, &mut status, libc::WNOHANG | libc::WUNTRACED) };
        match pid {
            -1 => return Err(Errno::last()),
            0 => return Ok(None),
            pid => {
                if let Some(event) = ChildEvent::from_status(status) {
                    return Ok(Some((Pid::from_raw(pid), event)));
                }
                // a continue notification; keep draining
            }
        }
    }
}

/// Blocks until `pid` is no longer the foreground job.
///
/// The child-status handler does all reaping; this only sleeps between
/// notifications and re-checks the table. SIGCHLD stays blocked between the
/// check and the sleep, so a notification that lands in between is held
/// back until `sigsuspend` opens the mask and cannot be missed.
pub fn wait_for_foreground(table: &JobTable, pid: Pid) -> TshResult<()> {
    let deferral = SignalDeferral::child_status()?;
    debug!("waiting for foreground job {}", pid);
    while table.with(|jobs| jobs.foreground_pid())? == Some(pid) {
        deferral.suspend();
    }
    debug!("process {} left the foreground", pid);
    Ok(())
}
