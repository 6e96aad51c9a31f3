use clap::Parser;
use nix::unistd::Pid;
use std::env;
use std::path::PathBuf;
use tracing::warn;
use tsh_types::{Context, ResumePolicy};

pub const USAGE: &str = "\
Usage: shell [-hvp]
   -h   print this message
   -v   print additional diagnostic information
   -p   do not emit a command prompt
";

pub const RESUME_POLICY_ENV: &str = "TSH_RESUME_POLICY";
pub const LOG_FILTER_ENV: &str = "TSH_LOG";
pub const LOG_FILE_ENV: &str = "TSH_LOG_FILE";
pub const DEFAULT_LOG_FILE: &str = "./tsh-debug.log";

#[derive(Parser, Debug, Default, Clone, PartialEq, Eq)]
#[command(name = "tsh", disable_help_flag = true, disable_version_flag = true)]
pub struct Cli {
    /// print this message
    #[arg(short = 'h')]
    pub help: bool,

    /// print additional diagnostic information
    #[arg(short = 'v')]
    pub verbose: bool,

    /// do not emit a command prompt
    #[arg(short = 'p')]
    pub no_prompt: bool,
}

/// Everything the shell is configured with, fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub verbose: bool,
    pub emit_prompt: bool,
    pub resume_policy: ResumePolicy,
    pub log_filter: Option<String>,
    pub log_file: PathBuf,
}

impl Config {
    pub fn load(cli: &Cli) -> Self {
        Self::from_lookup(cli, |key| env::var(key).ok())
    }

    fn from_lookup(cli: &Cli, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let resume_policy = match lookup(RESUME_POLICY_ENV) {
            Some(value) => value.parse::<ResumePolicy>().unwrap_or_else(|err| {
                warn!("{}: {}, using {}", RESUME_POLICY_ENV, err, ResumePolicy::default());
                ResumePolicy::default()
            }),
            None => ResumePolicy::default(),
        };
        let log_filter = lookup(LOG_FILTER_ENV).filter(|filter| !filter.trim().is_empty());
        let log_file = lookup(LOG_FILE_ENV)
            .filter(|path| !path.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE));

        Config {
            verbose: cli.verbose,
            emit_prompt: !cli.no_prompt,
            resume_policy,
            log_filter,
            log_file,
        }
    }

    pub fn context(&self, shell_pid: Pid, shell_pgid: Pid) -> Context {
        let mut ctx = Context::new(shell_pid, shell_pgid);
        ctx.verbose = self.verbose;
        ctx.emit_prompt = self.emit_prompt;
        ctx.resume_policy = self.resume_policy;
        ctx
    }
}
