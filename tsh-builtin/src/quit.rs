use super::ShellProxy;
use anyhow::Result;
use tracing::debug;
use tsh_types::{Context, ExitStatus};

/// Built-in quit command implementation.
/// Remaining jobs are left alone; the shell simply stops reading input.
pub fn command(
    _ctx: &Context,
    _argv: Vec<String>,
    proxy: &mut dyn ShellProxy,
) -> Result<ExitStatus> {
    debug!("quit command called - initiating normal shell exit");
    proxy.exit_shell();
    Ok(ExitStatus::ExitedWith(0))
}
