use anyhow::Result;
use tracing::{debug, info};
use tsh_builtin::get_command;
use tsh_types::{Context, ExitStatus, JobState, TshError};

use crate::parser::{ParsedLine, parse_line};
use crate::process::fork::{self, Launched, Program};
use crate::process::{SignalDeferral, wait_for_foreground};
use crate::shell::Shell;

pub fn eval_str(shell: &mut Shell, ctx: &Context, input: &str) -> Result<ExitStatus> {
    let parsed = parse_line(input);
    let Some(cmd) = parsed.command() else {
        return Ok(ExitStatus::ExitedWith(0));
    };

    if let Some(builtin) = get_command(cmd) {
        debug!("builtin {}", cmd);
        return builtin(ctx, parsed.argv.clone(), shell);
    }
    launch_external(shell, ctx, &parsed, input)
}

/// Forks and registers an external command, then either waits for it or
/// announces it as a background job.
fn launch_external(
    shell: &mut Shell,
    ctx: &Context,
    parsed: &ParsedLine,
    input: &str,
) -> Result<ExitStatus> {
    let program = match Program::new(&parsed.argv, &shell.search_path) {
        Ok(program) => program,
        Err(arg) => {
            ctx.write_stdout(&format!("{arg}: Command not found"))?;
            return Ok(ExitStatus::ExitedWith(1));
        }
    };
    let state = if parsed.background {
        JobState::Background
    } else {
        JobState::Foreground
    };

    // SIGCHLD stays blocked until the job is both registered and announced.
    let deferral = SignalDeferral::child_status()?;
    let Launched { job_id, pid } =
        match fork::launch(ctx, shell.jobs, &program, input, state, &deferral) {
            Ok(launched) => launched,
            Err(err @ TshError::JobTableFull) => {
                ctx.write_stdout(&err.to_string())?;
                return Ok(ExitStatus::ExitedWith(1));
            }
            Err(err) => return Err(err.into()),
        };
    info!("launched {} as job [{}] ({})", program.name(), job_id, pid);

    if parsed.background {
        ctx.write_raw(&format!("[{job_id}] ({pid}) {input}"))?;
        drop(deferral);
        return Ok(ExitStatus::Running(pid));
    }

    drop(deferral);
    wait_for_foreground(shell.jobs, pid)?;
    Ok(ExitStatus::ExitedWith(0))
}
