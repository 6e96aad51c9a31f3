use libc::c_int;
use nix::errno::Errno;
use nix::sys::signal::{
    SaFlags, SigAction, SigHandler, SigSet, SigmaskHow, Signal, killpg, pthread_sigmask, sigaction,
};
use nix::unistd::{Pid, getpgid};
use std::marker::PhantomData;
use tracing::{debug, error, warn};
use tsh_types::{JobState, TshError, TshResult};

use super::io as sio;
use super::io::ErrnoGuard;
use super::job::{JOBS, Jobs};
use super::wait::{ChildEvent, reap_any};

/// Signals whose handlers touch the job table.
pub const JOB_CONTROL_SIGNALS: [Signal; 3] = [Signal::SIGCHLD, Signal::SIGINT, Signal::SIGTSTP];

/// Signals the shell installs handlers for.
const HANDLED_SIGNALS: [Signal; 4] = [
    Signal::SIGINT,
    Signal::SIGTSTP,
    Signal::SIGCHLD,
    Signal::SIGQUIT,
];

/// Blocks a set of signals for as long as it lives, then restores the mask
/// that was in effect before.
///
/// Deferrals nest: each one remembers the mask it replaced, so dropping them
/// in reverse order unwinds correctly.
pub struct SignalDeferral {
    saved: SigSet,
    // the mask is per-thread
    _not_send: PhantomData<*const ()>,
}

impl SignalDeferral {
    pub fn block(signals: &[Signal]) -> TshResult<Self> {
        let mut set = SigSet::empty();
        for signal in signals {
            set.add(*signal);
        }
        let mut saved = SigSet::empty();
        pthread_sigmask(SigmaskHow::SIG_BLOCK, Some(&set), Some(&mut saved))
            .map_err(|errno| TshError::os("sigprocmask error", errno))?;
        Ok(SignalDeferral {
            saved,
            _not_send: PhantomData,
        })
    }

    /// Defers every handler that touches the job table.
    pub fn job_control() -> TshResult<Self> {
        Self::block(&JOB_CONTROL_SIGNALS)
    }

    /// Defers child-status notifications only.
    pub fn child_status() -> TshResult<Self> {
        Self::block(&[Signal::SIGCHLD])
    }

    /// Atomically installs the saved mask minus SIGCHLD and sleeps until a
    /// handler has run, then puts the current mask back.
    pub fn suspend(&self) {
        let mut mask = self.saved;
        mask.remove(Signal::SIGCHLD);
        // always returns -1 with EINTR
        unsafe {
            libc::sigsuspend(mask.as_ref());
        }
    }

    /// In a freshly forked child: reinstates the mask the parent had before
    /// this deferral, without running the destructor.
    pub fn restore_in_child(&self) -> nix::Result<()> {
        pthread_sigmask(SigmaskHow::SIG_SETMASK, Some(&self.saved), None)
    }
}

impl Drop for SignalDeferral {
    fn drop(&mut self) {
        if let Err(errno) = pthread_sigmask(SigmaskHow::SIG_SETMASK, Some(&self.saved), None) {
            error!("failed to restore signal mask: {}", errno.desc());
        }
    }
}

/// Installs the shell's handlers. Each job-control handler runs with the
/// other two job-control signals blocked.
pub fn install_handlers() -> TshResult<()> {
    install(
        Signal::SIGINT,
        handle_sigint,
        &[Signal::SIGCHLD, Signal::SIGTSTP],
    )?;
    install(
        Signal::SIGTSTP,
        handle_sigtstp,
        &[Signal::SIGCHLD, Signal::SIGINT],
    )?;
    install(
        Signal::SIGCHLD,
        handle_sigchld,
        &[Signal::SIGINT, Signal::SIGTSTP],
    )?;
    install(Signal::SIGQUIT, handle_sigquit, &[])?;
    Ok(())
}

fn install(signal: Signal, handler: extern "C" fn(c_int), mask: &[Signal]) -> TshResult<()> {
    let mut set = SigSet::empty();
    for blocked in mask {
        set.add(*blocked);
    }
    let action = SigAction::new(SigHandler::Handler(handler), SaFlags::SA_RESTART, set);
    unsafe { sigaction(signal, &action) }.map_err(|errno| TshError::os("Signal error", errno))?;
    debug!("installed handler for {}", signal);
    Ok(())
}

/// Puts every signal the shell handles back to its default disposition.
/// Called in the child between fork and exec.
pub fn reset_to_default() -> nix::Result<()> {
    let action = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
    for signal in HANDLED_SIGNALS {
        unsafe { sigaction(signal, &action) }?;
    }
    Ok(())
}

/// Sends `signal` to the process group led by `pid`. A group that is already
/// gone is not an error.
pub fn send_signal(pid: Pid, signal: Signal) -> TshResult<()> {
    debug!("sending {} to process group {}", signal, pid);
    match killpg(pid, signal) {
        Ok(()) => Ok(()),
        Err(Errno::ESRCH) => {
            warn!("process group {} vanished before {}", pid, signal);
            Ok(())
        }
        Err(errno) => {
            error!("failed to send {} to {}: {}", signal, pid, errno.desc());
            Err(TshError::os("kill error", errno))
        }
    }
}

extern "C" fn handle_sigint(_: c_int) {
    forward_to_foreground(Signal::SIGINT);
}

extern "C" fn handle_sigtstp(_: c_int) {
    forward_to_foreground(Signal::SIGTSTP);
}

/// Relays a keyboard signal to the foreground job's whole process group.
/// With no foreground job the signal is dropped.
fn forward_to_foreground(signal: Signal) {
    let _errno = ErrnoGuard::save();
    // SAFETY: called from the SIGINT/SIGTSTP handlers, installed with the
    // other job-control signals masked.
    let Some(pid) = (unsafe { JOBS.with_in_handler(|jobs| jobs.foreground_pid()) }) else {
        return;
    };
    let pgid = match getpgid(Some(pid)) {
        Ok(pgid) => pgid,
        Err(_) => return,
    };
    match killpg(pgid, signal) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(_) => sio::error("kill error"),
    }
}

/// Reaps every child with a pending status change and brings the job table
/// in line with it.
extern "C" fn handle_sigchld(_: c_int) {
    let _errno = ErrnoGuard::save();
    loop {
        match reap_any() {
            Ok(Some((pid, event))) => {
                // SAFETY: SIGCHLD handler, SIGINT and SIGTSTP masked.
                unsafe { JOBS.with_in_handler(|jobs| record_child_event(jobs, pid, event)) };
            }
            Ok(None) | Err(Errno::ECHILD) => break,
            Err(Errno::EINTR) => continue,
            Err(_) => sio::error("waitpid error"),
        }
    }
}

fn record_child_event(jobs: &mut Jobs, pid: Pid, event: ChildEvent) {
    match event {
        ChildEvent::Stopped(signo) => {
            if let Some(job) = jobs.get_by_pid_mut(pid) {
                job.state = JobState::Stopped;
                report_job(job.job_id, pid, "stopped", signo);
            }
        }
        ChildEvent::Signaled(signo) => {
            if let Some(job) = jobs.get_by_pid(pid) {
                report_job(job.job_id, pid, "terminated", signo);
            }
            jobs.remove(pid);
        }
        ChildEvent::Exited(_) => {
            jobs.remove(pid);
        }
    }
}

/// `Job [<job_id>] (<pid>) <what> by signal <SIGNAME>`
fn report_job(job_id: usize, pid: Pid, what: &str, signo: c_int) {
    sio::puts("Job [");
    sio::putl(job_id as i64);
    sio::puts("] (");
    sio::putl(pid.as_raw() as i64);
    sio::puts(") ");
    sio::puts(what);
    sio::puts(" by signal ");
    match Signal::try_from(signo) {
        Ok(signal) => {
            sio::puts(signal.as_str());
        }
        Err(_) => {
            sio::puts("SIG");
            sio::putl(signo as i64);
        }
    }
    sio::puts("\n");
}

extern "C" fn handle_sigquit(_: c_int) {
    sio::puts("Terminating after receipt of SIGQUIT signal\n");
    unsafe { libc::_exit(1) }
}
