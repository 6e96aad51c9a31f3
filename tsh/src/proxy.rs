use crate::shell::{Shell, job};
use anyhow::Result;
use tracing::debug;
use tsh_builtin::ShellProxy;
use tsh_types::{Context, JobState, TshError};

impl ShellProxy for Shell {
    fn exit_shell(&mut self) {
        self.exit();
    }

    fn dispatch(&mut self, ctx: &Context, cmd: &str, argv: Vec<String>) -> Result<()> {
        debug!("dispatch {} {:?}", cmd, argv);
        match cmd {
            "jobs" => {
                job::list_jobs(self, ctx)?;
            }
            "fg" => {
                job::resume_job(self, ctx, &argv, JobState::Foreground)?;
            }
            "bg" => {
                job::resume_job(self, ctx, &argv, JobState::Background)?;
            }
            _ => {
                return Err(TshError::UnknownBuiltin(cmd.to_string()).into());
            }
        }
        Ok(())
    }
}
