use super::{ShellProxy, report};
use anyhow::Result;
use tsh_types::{Context, ExitStatus};

pub fn command(
    ctx: &Context,
    argv: Vec<String>,
    proxy: &mut dyn ShellProxy,
) -> Result<ExitStatus> {
    report(ctx, proxy.dispatch(ctx, "jobs", argv))
}
