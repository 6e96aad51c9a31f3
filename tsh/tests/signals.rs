mod common;

use common::{Session, pid_in};
use nix::sys::signal::Signal;
use std::thread;
use std::time::Duration;

const LONG_JOB: &str = "/bin/sh -c 'echo started; exec /bin/sleep 10'";

/// Starts `LONG_JOB` in the foreground and returns once it is running.
fn start_long_job(session: &mut Session) {
    session.send(&format!("{LONG_JOB}\n"));
    assert_eq!(session.read_line(), "started");
    thread::sleep(Duration::from_millis(200));
}

#[test]
fn interrupt_terminates_the_foreground_job_only() {
    let mut session = Session::start(&["-p"]);
    start_long_job(&mut session);

    session.signal(Signal::SIGINT);
    let line = session.read_line();
    let pid = pid_in(&line);
    assert_eq!(line, format!("Job [1] ({pid}) terminated by signal SIGINT"));

    session.send("/bin/echo alive\n");
    assert_eq!(session.read_line(), "alive");

    let (status, rest) = session.finish();
    assert!(status.success());
    assert_eq!(rest, "");
}

#[test]
fn suspend_stops_the_foreground_job_and_fg_resumes_it() {
    let mut session = Session::start(&["-p"]);
    start_long_job(&mut session);

    session.signal(Signal::SIGTSTP);
    let line = session.read_line();
    let pid = pid_in(&line);
    assert_eq!(line, format!("Job [1] ({pid}) stopped by signal SIGTSTP"));

    session.send("jobs\n");
    assert_eq!(session.read_line(), format!("[1] ({pid}) Stopped {LONG_JOB}"));

    session.send("fg %1\n");
    thread::sleep(Duration::from_millis(200));
    session.signal(Signal::SIGINT);
    assert_eq!(
        session.read_line(),
        format!("Job [1] ({pid}) terminated by signal SIGINT")
    );

    let (status, rest) = session.finish();
    assert!(status.success());
    assert_eq!(rest, "");
}

#[test]
fn keyboard_signals_without_foreground_job_are_dropped() {
    let mut session = Session::start(&["-p"]);
    session.send("/bin/echo ready\n");
    assert_eq!(session.read_line(), "ready");

    session.signal(Signal::SIGINT);
    session.signal(Signal::SIGTSTP);
    thread::sleep(Duration::from_millis(100));

    session.send("/bin/echo alive\n");
    assert_eq!(session.read_line(), "alive");
    let (status, rest) = session.finish();
    assert!(status.success());
    assert_eq!(rest, "");
}

#[test]
fn background_jobs_ignore_keyboard_signals() {
    let mut session = Session::start(&["-p"]);
    session.send("/bin/sleep 1 &\n");
    let announced = session.read_line();
    let pid = pid_in(&announced);

    session.signal(Signal::SIGINT);
    thread::sleep(Duration::from_millis(100));

    session.send("jobs\n");
    assert_eq!(
        session.read_line(),
        format!("[1] ({pid}) Running /bin/sleep 1 &")
    );
    let (status, _) = session.finish();
    assert!(status.success());
}

#[test]
fn quit_signal_terminates_the_shell() {
    let mut session = Session::start(&["-p"]);
    session.send("/bin/echo ready\n");
    assert_eq!(session.read_line(), "ready");

    session.signal(Signal::SIGQUIT);
    let (status, rest) = session.finish();
    assert_eq!(status.code(), Some(1));
    assert_eq!(rest, "Terminating after receipt of SIGQUIT signal\n");
}
