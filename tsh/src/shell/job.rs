use anyhow::Result;
use nix::sys::signal::Signal;
use nix::unistd::Pid;
use tracing::{debug, info};
use tsh_types::{Context, JobState, ResumePolicy, TshError, TshResult};

use crate::process::signal::send_signal;
use crate::process::{Job, Jobs, wait_for_foreground};
use crate::shell::Shell;

/// How `fg` and `bg` name their target: `%<job id>` or a bare pid.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum JobSpec {
    Pid(Pid),
    JobId(usize),
}

impl JobSpec {
    pub fn parse(cmd: &str, arg: Option<&str>) -> TshResult<Self> {
        let Some(arg) = arg else {
            return Err(TshError::MissingJobArgument {
                cmd: cmd.to_string(),
            });
        };
        let bad = || TshError::BadJobArgument {
            cmd: cmd.to_string(),
        };
        match arg.strip_prefix('%') {
            Some(job_id) => match job_id.parse::<usize>() {
                Ok(job_id) if job_id > 0 => Ok(JobSpec::JobId(job_id)),
                _ => Err(bad()),
            },
            None => match arg.parse::<i32>() {
                Ok(pid) if pid > 0 => Ok(JobSpec::Pid(Pid::from_raw(pid))),
                _ => Err(bad()),
            },
        }
    }

    fn find<'a>(&self, jobs: &'a mut Jobs) -> TshResult<&'a mut Job> {
        match *self {
            JobSpec::Pid(pid) => jobs
                .get_by_pid_mut(pid)
                .ok_or(TshError::NoSuchProcess(pid.as_raw())),
            JobSpec::JobId(job_id) => jobs
                .get_by_job_id_mut(job_id)
                .ok_or(TshError::NoSuchJob(job_id)),
        }
    }
}

/// Prints every live job, one `[<job id>] (<pid>) <State> <command>` per line.
pub fn list_jobs(shell: &Shell, ctx: &Context) -> Result<()> {
    for job in shell.jobs.list()? {
        ctx.write_raw(&job.to_string())?;
    }
    Ok(())
}

/// `fg` and `bg`: moves the named job to `target` and continues its process
/// group. `fg` then waits for the job to leave the foreground.
pub fn resume_job(shell: &mut Shell, ctx: &Context, argv: &[String], target: JobState) -> Result<()> {
    let cmd = argv.first().map(String::as_str).unwrap_or(match target {
        JobState::Foreground => "fg",
        _ => "bg",
    });
    let spec = JobSpec::parse(cmd, argv.get(1).map(String::as_str))?;

    let policy = ctx.resume_policy;
    let resumed = shell.jobs.with(|jobs| -> TshResult<Option<Job>> {
        let job = spec.find(jobs)?;
        if job.state == target {
            match policy {
                ResumePolicy::Resend => {}
                ResumePolicy::Ignore => return Ok(None),
                ResumePolicy::Reject => {
                    return Err(TshError::AlreadyInState {
                        cmd: cmd.to_string(),
                        job_id: job.job_id,
                        pid: job.pid.as_raw(),
                        state: job.state,
                    });
                }
            }
        }
        job.state = target;
        Ok(Some(*job))
    })??;

    let Some(job) = resumed else {
        debug!("{}: {:?} already {}, nothing to do", cmd, spec, target);
        return Ok(());
    };
    info!("{}: resuming job [{}] ({})", cmd, job.job_id, job.pid);

    if target == JobState::Background {
        ctx.write_raw(&format!("[{}] ({}) {}", job.job_id, job.pid, job.cmd()))?;
    }
    send_signal(job.pid, Signal::SIGCONT)?;
    if target == JobState::Foreground {
        wait_for_foreground(shell.jobs, job.pid)?;
    }
    Ok(())
}
