use nix::unistd::{ForkResult, Pid, execv, fork, setpgid};
use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use tracing::{debug, warn};
use tsh_types::{Context, JobState, TshError, TshResult};

use super::io as sio;
use super::job::JobTable;
use super::signal::{SignalDeferral, reset_to_default};
use crate::environment::SearchPath;

/// An external command, converted to C strings up front so the child has
/// nothing left to allocate between fork and exec.
#[derive(Debug)]
pub struct Program {
    name: String,
    argv: Vec<CString>,
    candidates: Vec<CString>,
}

impl Program {
    /// Fails with the offending argument when one contains a NUL byte.
    pub fn new(argv: &[String], search_path: &SearchPath) -> Result<Self, String> {
        let name = argv.first().cloned().unwrap_or_default();
        let argv = argv
            .iter()
            .map(|arg| CString::new(arg.as_bytes()).map_err(|_| arg.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        let candidates = search_path
            .candidates(&name)
            .into_iter()
            .map(|path| CString::new(path.as_os_str().as_bytes()).map_err(|_| name.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Program {
            name,
            argv,
            candidates,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Forks a child that runs `program` in a new process group of its own.
///
/// Taking the deferral proves SIGCHLD is blocked, so the child cannot be
/// reaped before the caller has registered it.
pub fn fork_process(program: &Program, deferral: &SignalDeferral) -> TshResult<Pid> {
    debug!("forking for {}", program.name);
    match unsafe { fork() }.map_err(|errno| TshError::os("fork error", errno))? {
        ForkResult::Parent { child } => {
            // the child does the same; whichever runs first wins the race
            let _ = setpgid(child, child);
            debug!("forked {} as {}", program.name, child);
            Ok(child)
        }
        ForkResult::Child => exec_child(program, deferral),
    }
}

/// Runs in the child. Only async-signal-safe calls from here on.
fn exec_child(program: &Program, deferral: &SignalDeferral) -> ! {
    if setpgid(Pid::from_raw(0), Pid::from_raw(0)).is_err() {
        sio::error("setpgid error");
    }
    if reset_to_default().is_err() {
        sio::error("Signal error");
    }
    if deferral.restore_in_child().is_err() {
        sio::error("sigprocmask error");
    }
    for candidate in &program.candidates {
        // returns only on failure
        let _ = execv(candidate, &program.argv);
    }
    sio::puts(&program.name);
    sio::puts(": Command not found\n");
    unsafe { libc::_exit(1) }
}

/// A child that has been forked and entered into the job table.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Launched {
    pub job_id: usize,
    pub pid: Pid,
}

/// Forks `program` and registers it under `state`.
///
/// The job is in the table before SIGCHLD can be delivered for it; the caller
/// keeps `deferral` alive until it is done announcing the job. A full table
/// leaves the child running untracked and reports
/// [`TshError::JobTableFull`].
pub fn launch(
    ctx: &Context,
    table: &JobTable,
    program: &Program,
    cmdline: &str,
    state: JobState,
    deferral: &SignalDeferral,
) -> TshResult<Launched> {
    let pid = fork_process(program, deferral)?;
    let job_id = match table.with(|jobs| jobs.add(pid, state, cmdline))? {
        Ok(job_id) => job_id,
        Err(err) => {
            warn!("could not track {} ({}): {}", program.name, pid, err);
            return Err(err);
        }
    };
    debug!("added job [{}] {} as {:?}", job_id, pid, state);
    if ctx.verbose
        && ctx
            .write_raw(&format!("Added job [{job_id}] {pid} {cmdline}"))
            .is_err()
    {
        warn!("lost verbose echo for job [{}]", job_id);
    }
    Ok(Launched { job_id, pid })
}
