use crate::shell::{PROMPT, Shell};
use anyhow::Context as _;
use anyhow::Result;
use std::io::{self, BufRead};
use tracing::{debug, info};
use tsh_types::Context;

pub struct Repl<'a> {
    pub shell: &'a mut Shell,
}

impl<'a> Repl<'a> {
    pub fn new(shell: &'a mut Shell) -> Self {
        Repl { shell }
    }

    /// Reads and evaluates lines until `quit` or end of input. Returns `Err`
    /// only for failures that should end the shell with status 1.
    pub fn run(&mut self, ctx: &Context) -> Result<()> {
        let stdin = io::stdin();
        let mut reader = stdin.lock();
        let mut buf = Vec::new();

        loop {
            if ctx.emit_prompt {
                ctx.write_raw(PROMPT)?;
            }

            buf.clear();
            let read = reader.read_until(b'\n', &mut buf).context("fgets error")?;
            if read == 0 {
                info!("end of input");
                return Ok(());
            }
            let line = String::from_utf8_lossy(&buf);

            let status = self.shell.eval_str(ctx, &line)?;
            debug!("{:?} -> {:?}", line.trim_end(), status);

            if let Some(status) = self.shell.exited {
                info!("exit requested: {:?}", status);
                return Ok(());
            }
        }
    }
}
