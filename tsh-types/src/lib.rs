use libc::STDOUT_FILENO;
use nix::errno::Errno;
use nix::unistd::Pid;
use std::fmt::Debug;
use std::fs::File;
use std::io::Write;
use std::mem::ManuallyDrop;
use std::os::unix::io::{FromRawFd, RawFd};
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

/// tsh specific error types
#[derive(Error, Debug)]
pub enum TshError {
    #[error("{cmd} command requires PID or %jobid argument")]
    MissingJobArgument { cmd: String },

    #[error("{cmd}: argument must be a PID or %jobid")]
    BadJobArgument { cmd: String },

    #[error("({0}) No such process")]
    NoSuchProcess(i32),

    #[error("%{0} No such job")]
    NoSuchJob(usize),

    #[error("{cmd}: job [{job_id}] ({pid}) is already {state}")]
    AlreadyInState {
        cmd: String,
        job_id: usize,
        pid: i32,
        state: JobState,
    },

    #[error("{0}: Not a built-in command")]
    UnknownBuiltin(String),

    #[error("Tried to create too many jobs")]
    JobTableFull,

    #[error("{context}: {}", .errno.desc())]
    Os { context: &'static str, errno: Errno },

    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("job table entered twice from the same context")]
    JobTableBusy,
}

impl TshError {
    pub fn os(context: &'static str, errno: Errno) -> Self {
        TshError::Os { context, errno }
    }

    /// Fatal errors end the shell with status 1; everything else is reported
    /// and the read loop carries on.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TshError::Os { .. } | TshError::Io(_) | TshError::JobTableBusy
        )
    }
}

pub type TshResult<T> = std::result::Result<T, TshError>;

/// Where a job currently runs. At most one job is `Foreground` at a time.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum JobState {
    Foreground,
    Background,
    Stopped,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            JobState::Foreground => f.write_str("Foreground"),
            JobState::Background => f.write_str("Running"),
            JobState::Stopped => f.write_str("Stopped"),
        }
    }
}

/// What `fg`/`bg` do when the target already is in the requested state.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum ResumePolicy {
    /// Deliver SIGCONT again and carry on as for any other resume.
    #[default]
    Resend,
    /// Do nothing, silently.
    Ignore,
    /// Report the job as already being in that state.
    Reject,
}

impl FromStr for ResumePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "resend" => Ok(ResumePolicy::Resend),
            "ignore" => Ok(ResumePolicy::Ignore),
            "reject" => Ok(ResumePolicy::Reject),
            other => Err(format!("unknown resume policy: {other}")),
        }
    }
}

impl std::fmt::Display for ResumePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ResumePolicy::Resend => f.write_str("resend"),
            ResumePolicy::Ignore => f.write_str("ignore"),
            ResumePolicy::Reject => f.write_str("reject"),
        }
    }
}

#[derive(Clone)]
pub struct Context {
    pub shell_pid: Pid,
    pub shell_pgid: Pid,
    pub verbose: bool,
    pub emit_prompt: bool,
    pub resume_policy: ResumePolicy,
    pub outfile: RawFd,
}

impl Context {
    pub fn new(shell_pid: Pid, shell_pgid: Pid) -> Self {
        Context {
            shell_pid,
            shell_pgid,
            verbose: false,
            emit_prompt: true,
            resume_policy: ResumePolicy::default(),
            outfile: STDOUT_FILENO,
        }
    }
}

impl Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::result::Result<(), std::fmt::Error> {
        f.debug_struct("Context")
            .field("shell_pid", &self.shell_pid)
            .field("shell_pgid", &self.shell_pgid)
            .field("verbose", &self.verbose)
            .field("emit_prompt", &self.emit_prompt)
            .field("resume_policy", &self.resume_policy)
            .field("outfile", &self.outfile)
            .finish()
    }
}

impl Context {
    /// Writes straight to the descriptor. Nothing is buffered in-process, so
    /// text printed here never reorders against what the signal handlers
    /// write to the same descriptor.
    pub fn write_raw(&self, msg: &str) -> TshResult<()> {
        write_fd(self.outfile, msg)
    }

    pub fn write_stdout(&self, msg: &str) -> TshResult<()> {
        write_fd(self.outfile, &format!("{msg}\n"))
    }
}

fn write_fd(fd: RawFd, msg: &str) -> TshResult<()> {
    // The descriptor belongs to the process, not to this temporary File.
    let mut file = ManuallyDrop::new(unsafe { File::from_raw_fd(fd) });
    if let Err(err) = file.write_all(msg.as_bytes()) {
        warn!("write to fd {} failed: {}", fd, err);
        return Err(err.into());
    }
    Ok(())
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ExitStatus {
    ExitedWith(i32),
    Running(Pid),
}
