pub mod eval;
pub mod job;

use anyhow::Result;
use nix::unistd::{Pid, getpgrp, getpid};
use tracing::debug;
use tsh_types::{Context, ExitStatus, TshResult};

use crate::environment::SearchPath;
use crate::process::{JOBS, JobTable};
use crate::process::signal;

pub const APP_NAME: &str = "tsh";
pub const PROMPT: &str = "tsh> ";

pub struct Shell {
    pub search_path: SearchPath,
    pub exited: Option<ExitStatus>,
    pub pid: Pid,
    pub pgid: Pid,
    pub(crate) jobs: &'static JobTable,
}

impl std::fmt::Debug for Shell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shell")
            .field("pid", &self.pid)
            .field("pgid", &self.pgid)
            .field("search_path", &self.search_path)
            .finish()
    }
}

impl Shell {
    pub fn new(search_path: SearchPath) -> Self {
        Shell {
            search_path,
            exited: None,
            pid: getpid(),
            pgid: getpgrp(),
            jobs: &JOBS,
        }
    }

    /// Installs the job-control handlers. Until this runs, children are
    /// never reaped.
    pub fn set_signals(&mut self) -> TshResult<()> {
        signal::install_handlers()?;
        debug!("signal handlers installed");
        Ok(())
    }

    /// Runs one input line. User mistakes are reported on the way and come
    /// back as a non-zero status; only fatal errors are returned as `Err`.
    pub fn eval_str(&mut self, ctx: &Context, input: &str) -> Result<ExitStatus> {
        eval::eval_str(self, ctx, input)
    }

    pub fn exit(&mut self) {
        self.exited = Some(ExitStatus::ExitedWith(0));
    }
}
