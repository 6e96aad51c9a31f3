use nix::unistd::Pid;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;
use tsh_types::{JobState, TshError, TshResult};

use super::signal::SignalDeferral;

/// Max jobs at any point in time.
pub const MAXJOBS: usize = 16;
/// Max bytes of command line kept per job.
pub const MAXLINE: usize = 1024;
/// Job ids roll over to 1 after this one.
pub const MAX_JOB_ID: usize = 1 << 16;

/// The command line a job was started from, trailing newline included.
///
/// Stored inline so that clearing a slot from the child-status handler never
/// frees memory.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CommandLine {
    len: usize,
    bytes: [u8; MAXLINE],
}

impl CommandLine {
    pub fn new(line: &str) -> Self {
        let mut len = line.len().min(MAXLINE);
        while !line.is_char_boundary(len) {
            len -= 1;
        }
        let mut bytes = [0u8; MAXLINE];
        bytes[..len].copy_from_slice(&line.as_bytes()[..len]);
        CommandLine { len, bytes }
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.bytes[..self.len]).unwrap_or_default()
    }
}

impl std::fmt::Debug for CommandLine {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        std::fmt::Debug::fmt(self.as_str(), f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Job {
    pub pid: Pid,
    pub job_id: usize,
    pub state: JobState,
    pub cmd: CommandLine,
}

impl Job {
    pub fn cmd(&self) -> &str {
        self.cmd.as_str()
    }
}

/// `[<job_id>] (<pid>) <State> <command_line>`, as printed by `jobs`.
impl std::fmt::Display for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "[{}] ({}) {} {}",
            self.job_id,
            self.pid,
            self.state,
            self.cmd()
        )
    }
}

/// Fixed-capacity job list. Plain data; see [`JobTable`] for how it is shared
/// with the signal handlers.
#[derive(Debug)]
pub struct Jobs {
    slots: [Option<Job>; MAXJOBS],
    next_job_id: usize,
}

impl Default for Jobs {
    fn default() -> Self {
        Self::new()
    }
}

impl Jobs {
    pub const fn new() -> Self {
        Jobs {
            slots: [None; MAXJOBS],
            next_job_id: 1,
        }
    }

    /// Registers a job in the first free slot and returns its job id.
    pub fn add(&mut self, pid: Pid, state: JobState, cmd: &str) -> TshResult<usize> {
        if pid.as_raw() < 1 {
            return Err(TshError::NoSuchProcess(pid.as_raw()));
        }
        let Some(index) = self.slots.iter().position(Option::is_none) else {
            return Err(TshError::JobTableFull);
        };

        let job_id = self.allocate_job_id();
        self.slots[index] = Some(Job {
            pid,
            job_id,
            state,
            cmd: CommandLine::new(cmd),
        });
        Ok(job_id)
    }

    /// Takes the counter's id, skipping ids still held after a rollover.
    fn allocate_job_id(&mut self) -> usize {
        let mut job_id = self.next_job_id;
        while self.get_by_job_id(job_id).is_some() {
            job_id = if job_id >= MAX_JOB_ID { 1 } else { job_id + 1 };
        }
        self.next_job_id = if job_id >= MAX_JOB_ID { 1 } else { job_id + 1 };
        job_id
    }

    /// Clears the slot owning `pid`. Allocation-free, so it may run inside
    /// the child-status handler.
    pub fn remove(&mut self, pid: Pid) -> bool {
        if pid.as_raw() < 1 {
            return false;
        }
        match self.slots.iter_mut().find(|slot| matches!(slot, Some(job) if job.pid == pid)) {
            Some(slot) => {
                *slot = None;
                let next = self.max_job_id() + 1;
                self.next_job_id = if next > MAX_JOB_ID { 1 } else { next };
                true
            }
            None => false,
        }
    }

    pub fn max_job_id(&self) -> usize {
        self.iter().map(|job| job.job_id).max().unwrap_or(0)
    }

    pub fn next_job_id(&self) -> usize {
        self.next_job_id
    }

    pub fn get_by_pid(&self, pid: Pid) -> Option<&Job> {
        if pid.as_raw() < 1 {
            return None;
        }
        self.iter().find(|job| job.pid == pid)
    }

    pub fn get_by_pid_mut(&mut self, pid: Pid) -> Option<&mut Job> {
        if pid.as_raw() < 1 {
            return None;
        }
        self.iter_mut().find(|job| job.pid == pid)
    }

    pub fn get_by_job_id(&self, job_id: usize) -> Option<&Job> {
        if job_id < 1 {
            return None;
        }
        self.iter().find(|job| job.job_id == job_id)
    }

    pub fn get_by_job_id_mut(&mut self, job_id: usize) -> Option<&mut Job> {
        if job_id < 1 {
            return None;
        }
        self.iter_mut().find(|job| job.job_id == job_id)
    }

    /// Pid of the job in the `Foreground` state, if any.
    pub fn foreground_pid(&self) -> Option<Pid> {
        self.iter()
            .find(|job| job.state == JobState::Foreground)
            .map(|job| job.pid)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.slots.iter().flatten()
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = &mut Job> {
        self.slots.iter_mut().flatten()
    }

    /// Snapshot of the live jobs in slot order.
    pub fn list(&self) -> Vec<Job> {
        self.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

/// The job list shared between the read loop and the signal handlers.
///
/// There is no lock. The main thread only touches the list inside
/// [`JobTable::with`], which blocks SIGCHLD, SIGINT and SIGTSTP for the
/// duration, and each of those handlers is installed with the other two in
/// its mask. At most one context therefore holds the list at any moment.
pub struct JobTable {
    jobs: UnsafeCell<Jobs>,
    busy: AtomicBool,
}

// SAFETY: access is serialised by signal masking as described above; the
// shell never touches the table from a second thread.
unsafe impl Sync for JobTable {}

/// The shell's one job table.
pub static JOBS: JobTable = JobTable::new();

impl Default for JobTable {
    fn default() -> Self {
        Self::new()
    }
}

impl JobTable {
    pub const fn new() -> Self {
        JobTable {
            jobs: UnsafeCell::new(Jobs::new()),
            busy: AtomicBool::new(false),
        }
    }

    /// Runs `f` with exclusive access to the jobs, job-control signals deferred.
    pub fn with<R>(&self, f: impl FnOnce(&mut Jobs) -> R) -> TshResult<R> {
        let _deferral = SignalDeferral::job_control()?;
        if self.busy.swap(true, Ordering::Acquire) {
            return Err(TshError::JobTableBusy);
        }
        // SAFETY: the handlers that touch the table are blocked and `busy`
        // rules out a nested borrow from this thread.
        let result = f(unsafe { &mut *self.jobs.get() });
        self.busy.store(false, Ordering::Release);
        Ok(result)
    }

    /// Access from inside a signal handler.
    ///
    /// # Safety
    ///
    /// The caller must be one of the job-control handlers, running with the
    /// other job-control signals masked. The main thread can then not be
    /// inside [`JobTable::with`], because that blocks this handler's signal.
    pub unsafe fn with_in_handler<R>(&self, f: impl FnOnce(&mut Jobs) -> R) -> R {
        f(unsafe { &mut *self.jobs.get() })
    }

    pub fn foreground_pid(&self) -> TshResult<Option<Pid>> {
        self.with(|jobs| jobs.foreground_pid())
    }

    pub fn list(&self) -> TshResult<Vec<Job>> {
        let jobs = self.with(|jobs| jobs.list())?;
        debug!("job table snapshot: {} jobs", jobs.len());
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(raw: i32) -> Pid {
        Pid::from_raw(raw)
    }

    #[test]
    fn add_assigns_sequential_job_ids() {
        let mut jobs = Jobs::new();
        assert_eq!(jobs.add(pid(100), JobState::Background, "sleep 1 &\n").unwrap(), 1);
        assert_eq!(jobs.add(pid(101), JobState::Background, "sleep 2 &\n").unwrap(), 2);
        assert_eq!(jobs.add(pid(102), JobState::Foreground, "sleep 3\n").unwrap(), 3);
        assert_eq!(jobs.len(), 3);
        assert_eq!(jobs.get_by_pid(pid(101)).unwrap().job_id, 2);
        assert_eq!(jobs.get_by_job_id(3).unwrap().pid, pid(102));
        assert_eq!(jobs.get_by_job_id(3).unwrap().cmd(), "sleep 3\n");
    }

    #[test]
    fn add_rejects_non_positive_pid() {
        let mut jobs = Jobs::new();
        assert!(jobs.add(pid(0), JobState::Background, "x\n").is_err());
        assert!(jobs.add(pid(-4), JobState::Background, "x\n").is_err());
        assert!(jobs.is_empty());
        assert_eq!(jobs.next_job_id(), 1);
    }

    #[test]
    fn full_table_fails_without_side_effects() {
        let mut jobs = Jobs::new();
        for i in 0..MAXJOBS as i32 {
            jobs.add(pid(200 + i), JobState::Background, "sleep 9 &\n").unwrap();
        }
        let next = jobs.next_job_id();
        let err = jobs
            .add(pid(999), JobState::Background, "one too many &\n")
            .unwrap_err();
        assert!(matches!(err, TshError::JobTableFull));
        assert_eq!(jobs.len(), MAXJOBS);
        assert_eq!(jobs.next_job_id(), next);
        assert!(jobs.get_by_pid(pid(999)).is_none());
    }

    #[test]
    fn remove_recomputes_counter_from_max() {
        let mut jobs = Jobs::new();
        jobs.add(pid(10), JobState::Background, "a &\n").unwrap();
        jobs.add(pid(11), JobState::Background, "b &\n").unwrap();
        jobs.add(pid(12), JobState::Background, "c &\n").unwrap();

        assert!(jobs.remove(pid(12)));
        assert_eq!(jobs.next_job_id(), 3);
        assert_eq!(jobs.add(pid(13), JobState::Background, "d &\n").unwrap(), 3);

        assert!(jobs.remove(pid(11)));
        // 3 is still the highest id in use
        assert_eq!(jobs.next_job_id(), 4);
        assert!(!jobs.remove(pid(11)));
        assert!(!jobs.remove(pid(0)));
    }

    #[test]
    fn emptied_table_restarts_ids_at_one() {
        let mut jobs = Jobs::new();
        let pids: Vec<Pid> = (300..305).map(pid).collect();
        for p in &pids {
            jobs.add(*p, JobState::Background, "sleep 1 &\n").unwrap();
        }
        for p in &pids {
            assert!(jobs.remove(*p));
        }
        assert!(jobs.is_empty());
        assert_eq!(jobs.next_job_id(), 1);
        assert_eq!(jobs.add(pid(400), JobState::Background, "x &\n").unwrap(), 1);
        assert_eq!(jobs.add(pid(401), JobState::Background, "y &\n").unwrap(), 2);
    }

    #[test]
    fn rollover_skips_ids_still_in_use() {
        let mut jobs = Jobs::new();
        jobs.add(pid(1), JobState::Background, "keeper &\n").unwrap();
        jobs.next_job_id = MAX_JOB_ID;
        assert_eq!(
            jobs.add(pid(2), JobState::Background, "last &\n").unwrap(),
            MAX_JOB_ID
        );
        // counter wraps to 1, which `keeper` still owns
        assert_eq!(jobs.add(pid(3), JobState::Background, "wrapped &\n").unwrap(), 2);
    }

    #[test]
    fn remove_keeps_counter_within_bound() {
        let mut jobs = Jobs::new();
        jobs.add(pid(1), JobState::Background, "first &\n").unwrap();
        jobs.next_job_id = MAX_JOB_ID;
        jobs.add(pid(2), JobState::Background, "last &\n").unwrap();

        // MAX_JOB_ID is still the highest id in use
        assert!(jobs.remove(pid(1)));
        assert_eq!(jobs.next_job_id(), 1);
        assert_eq!(jobs.add(pid(3), JobState::Background, "again &\n").unwrap(), 1);
        assert!(jobs.iter().all(|job| job.job_id <= MAX_JOB_ID));
    }

    #[test]
    fn foreground_pid_finds_the_foreground_job() {
        let mut jobs = Jobs::new();
        assert_eq!(jobs.foreground_pid(), None);
        jobs.add(pid(20), JobState::Background, "bg &\n").unwrap();
        jobs.add(pid(21), JobState::Foreground, "fg\n").unwrap();
        assert_eq!(jobs.foreground_pid(), Some(pid(21)));

        jobs.get_by_pid_mut(pid(21)).unwrap().state = JobState::Stopped;
        assert_eq!(jobs.foreground_pid(), None);
        assert_eq!(
            jobs.iter()
                .filter(|job| job.state == JobState::Foreground)
                .count(),
            0
        );
    }

    #[test]
    fn list_follows_slot_order() {
        let mut jobs = Jobs::new();
        jobs.add(pid(30), JobState::Background, "first &\n").unwrap();
        jobs.add(pid(31), JobState::Stopped, "second\n").unwrap();
        jobs.add(pid(32), JobState::Background, "third &\n").unwrap();
        jobs.remove(pid(30));
        // slot 0 is reused, so the newest job is listed first
        jobs.add(pid(33), JobState::Background, "fourth &\n").unwrap();

        let listed: Vec<i32> = jobs.list().iter().map(|job| job.pid.as_raw()).collect();
        assert_eq!(listed, vec![33, 31, 32]);
    }

    #[test]
    fn display_matches_jobs_output() {
        let mut jobs = Jobs::new();
        jobs.add(pid(4242), JobState::Background, "sleep 100 &\n").unwrap();
        jobs.add(pid(4243), JobState::Stopped, "sleep 200\n").unwrap();
        let lines: Vec<String> = jobs.list().iter().map(Job::to_string).collect();
        assert_eq!(lines[0], "[1] (4242) Running sleep 100 &\n");
        assert_eq!(lines[1], "[2] (4243) Stopped sleep 200\n");
    }

    #[test]
    fn command_line_is_truncated_on_char_boundary() {
        let long = "é".repeat(MAXLINE);
        let cmd = CommandLine::new(&long);
        assert!(cmd.as_str().len() <= MAXLINE);
        assert_eq!(cmd.as_str().len() % 2, 0);
        assert!(cmd.as_str().chars().all(|c| c == 'é'));
    }

    #[test]
    fn table_with_gives_exclusive_access() {
        let table = JobTable::new();
        let job_id = table
            .with(|jobs| jobs.add(pid(77), JobState::Foreground, "sleep 5\n"))
            .unwrap()
            .unwrap();
        assert_eq!(job_id, 1);
        assert_eq!(table.foreground_pid().unwrap(), Some(pid(77)));

        let nested = table.with(|_| table.with(|jobs| jobs.len()));
        assert!(matches!(nested, Ok(Err(TshError::JobTableBusy))));
        // the outer borrow released the table again
        assert_eq!(table.list().unwrap().len(), 1);
    }
}
