use crate::config::{Cli, Config, USAGE};
use crate::environment::SearchPath;
use crate::repl::Repl;
use crate::shell::{APP_NAME, Shell};
use anyhow::{Context as _, Result};
use clap::Parser;
use libc::{STDERR_FILENO, STDOUT_FILENO};
use nix::unistd::dup2;
use std::process::ExitCode;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

pub mod config;
pub mod environment;
pub mod errors;
pub mod parser;
pub mod process;
pub mod proxy;
pub mod repl;
pub mod shell;

use crate::errors::display_user_error;

pub fn lib_main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) if !cli.help => cli,
        _ => {
            print!("{USAGE}");
            return ExitCode::FAILURE;
        }
    };

    // one pipe carries everything a driver reads
    if let Err(errno) = dup2(STDOUT_FILENO, STDERR_FILENO) {
        println!("dup2 error: {}", errno.desc());
        return ExitCode::FAILURE;
    }

    let config = Config::load(&cli);
    if let Err(err) = init_tracing(&config) {
        eprintln!("Failed to initialize tracing: {err:#}");
    }

    setup_panic_handler();

    match run_shell(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            display_user_error(&err);
            ExitCode::FAILURE
        }
    }
}

pub fn run_shell(config: &Config) -> Result<()> {
    let mut shell = Shell::new(SearchPath::from_env()?);
    let ctx = config.context(shell.pid, shell.pgid);
    info!("start shell {:?}", ctx);

    shell.set_signals()?;

    if ctx.verbose {
        for dir in shell.search_path.dirs() {
            ctx.write_stdout(&dir.display().to_string())?;
        }
    }

    Repl::new(&mut shell).run(&ctx)
}

/// Logs go to a file, and only when `TSH_LOG` asks for them, so nothing
/// extra ever reaches the shell's own output.
pub fn init_tracing(config: &Config) -> Result<()> {
    let Some(filter) = config.log_filter.as_deref() else {
        return Ok(());
    };
    let filter = EnvFilter::try_new(filter).context("invalid TSH_LOG filter")?;
    let log_file = std::sync::Arc::new(
        std::fs::File::create(&config.log_file)
            .with_context(|| format!("cannot create {}", config.log_file.display()))?,
    );
    tracing_subscriber::fmt()
        .with_ansi(false)
        .with_env_filter(filter)
        .with_file(true)
        .with_line_number(true)
        .with_writer(log_file)
        .init();
    debug!("tracing to {}", config.log_file.display());
    Ok(())
}

pub fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|panic_info| {
        let payload = panic_info.payload().downcast_ref::<&str>().map_or_else(
            || {
                if let Some(s) = panic_info.payload().downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic payload".to_string()
                }
            },
            |s| (*s).to_string(),
        );

        let location = panic_info.location().map_or_else(
            || "Unknown location".to_string(),
            |location| {
                format!(
                    "{}:{}:{}",
                    location.file(),
                    location.line(),
                    location.column()
                )
            },
        );

        let backtrace = std::backtrace::Backtrace::capture();
        let backtrace_str = match backtrace.status() {
            std::backtrace::BacktraceStatus::Captured => format!("\nBacktrace:\n{backtrace}"),
            _ => String::new(),
        };

        error!("panic at {}: {}{}", location, payload, backtrace_str);
        eprintln!("{APP_NAME}: panic at {location}: {payload}{backtrace_str}");
    }));
}
