#![allow(dead_code)]

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Output, Stdio};

pub fn tsh(args: &[&str]) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_tsh"));
    cmd.args(args)
        .env_remove("TSH_LOG")
        .env_remove("TSH_RESUME_POLICY")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    cmd
}

/// Feeds `script` to a fresh shell, closes its input and collects the output.
pub fn run_script(args: &[&str], script: &str) -> Output {
    let child = tsh(args).spawn().expect("failed to execute tsh");
    feed(child, script)
}

pub fn feed(mut child: Child, script: &str) -> Output {
    if let Some(mut stdin) = child.stdin.take() {
        // the shell may quit before reading everything
        stdin.write_all(script.as_bytes()).ok();
    }
    child.wait_with_output().expect("failed to wait for tsh")
}

pub fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn lines_of(output: &Output) -> Vec<String> {
    stdout_of(output).lines().map(str::to_string).collect()
}

/// The pid inside the first `(...)` of a job line.
pub fn pid_in(line: &str) -> i32 {
    let start = line.find('(').expect("no pid in line") + 1;
    let end = start + line[start..].find(')').expect("unclosed pid");
    line[start..end].parse().expect("pid is not a number")
}

/// A shell driven one line at a time.
pub struct Session {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
}

impl Session {
    pub fn start(args: &[&str]) -> Self {
        let mut child = tsh(args).spawn().expect("failed to execute tsh");
        let stdin = child.stdin.take();
        let stdout = BufReader::new(child.stdout.take().expect("stdout is piped"));
        Session {
            child,
            stdin,
            stdout,
        }
    }

    pub fn pid(&self) -> Pid {
        Pid::from_raw(self.child.id() as i32)
    }

    pub fn send(&mut self, line: &str) {
        let stdin = self.stdin.as_mut().expect("input already closed");
        stdin.write_all(line.as_bytes()).expect("write to tsh");
        stdin.flush().expect("flush to tsh");
    }

    pub fn read_line(&mut self) -> String {
        let mut line = String::new();
        self.stdout.read_line(&mut line).expect("read from tsh");
        line.trim_end_matches('\n').to_string()
    }

    pub fn signal(&self, signal: Signal) {
        kill(self.pid(), signal).expect("signal tsh");
    }

    /// Closes the shell's input and returns how it exited along with
    /// whatever it printed after the last line read.
    pub fn finish(mut self) -> (ExitStatus, String) {
        drop(self.stdin.take());
        let mut rest = String::new();
        self.stdout.read_to_string(&mut rest).expect("read from tsh");
        let status = self.child.wait().expect("wait for tsh");
        (status, rest)
    }
}
