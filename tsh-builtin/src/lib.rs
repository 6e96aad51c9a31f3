use anyhow::Result;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use tsh_types::{Context, ExitStatus};

// Builtin command modules
mod bg;
mod fg;
mod jobs;
mod quit;

/// Interface through which builtin commands reach the shell's job table
/// without depending on the shell crate.
pub trait ShellProxy {
    /// Ends the read loop; the shell exits with status 0.
    fn exit_shell(&mut self);

    /// Dispatches a builtin to the shell's job-control logic.
    fn dispatch(&mut self, ctx: &Context, cmd: &str, argv: Vec<String>) -> Result<()>;
}

/// Type alias for builtin command function signature.
/// User errors are printed by the builtin itself; only fatal errors come back as `Err`.
pub type BuiltinCommand =
    fn(ctx: &Context, argv: Vec<String>, proxy: &mut dyn ShellProxy) -> Result<ExitStatus>;

/// Registry of all builtin commands, keyed by name.
pub static BUILTIN_COMMAND: Lazy<HashMap<&'static str, BuiltinCommand>> = Lazy::new(|| {
    let mut builtin = HashMap::new();

    builtin.insert("quit", quit::command as BuiltinCommand);

    // Job control commands
    builtin.insert("jobs", jobs::command as BuiltinCommand);
    builtin.insert("fg", fg::command as BuiltinCommand);
    builtin.insert("bg", bg::command as BuiltinCommand);

    builtin
});

/// Retrieves a builtin command function by name
/// Returns None if the command is not found
pub fn get_command(name: &str) -> Option<BuiltinCommand> {
    BUILTIN_COMMAND.get(name).copied()
}

/// Reports a failed dispatch on the shell's output and maps it to a status.
/// Fatal errors are passed back up instead of being printed here.
fn report(ctx: &Context, result: Result<()>) -> Result<ExitStatus> {
    match result {
        Ok(()) => Ok(ExitStatus::ExitedWith(0)),
        Err(err) => {
            if let Some(tsh_err) = err.downcast_ref::<tsh_types::TshError>() {
                if tsh_err.is_fatal() {
                    return Err(err);
                }
            }
            ctx.write_stdout(&format!("{err}"))?;
            Ok(ExitStatus::ExitedWith(1))
        }
    }
}
