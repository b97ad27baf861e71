//! Job control: launching commands into process groups, arbitrating the
//! controlling terminal between the shell and its jobs, and tracking each
//! child until it is reaped.

pub mod error;
pub mod launcher;
pub mod process;
mod session;
pub mod signals;
mod switcher;
pub mod table;
pub mod terminal;

pub use error::{JobControlError, Result};
pub use launcher::{LaunchSpec, StreamBinding};
pub use process::{ProcessRecord, ProcessStatus, StreamTarget};
pub use table::{ProcessTable, RecordKey};

use log::debug;
use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::Pid;
use std::fmt;
use terminal::TerminalController;

/// Snapshot of one tracked process, as shown by `jobs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInfo {
    pub pid: Pid,
    pub name: String,
    pub status: ProcessStatus,
    pub stopped: bool,
    pub background: bool,
}

impl JobInfo {
    fn from_record(record: &ProcessRecord) -> Self {
        JobInfo {
            pid: record.pid(),
            name: record.argv().join(" "),
            status: record.status(),
            stopped: record.is_stopped(),
            background: record.is_background(),
        }
    }
}

impl fmt::Display for JobInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {:<16} {}", self.pid, self.status.to_string(), self.name)?;
        if self.background && !self.status.is_terminated() {
            f.write_str(" &")?;
        }
        Ok(())
    }
}

/// The shell's job-control session: terminal ownership plus the table of
/// every process the shell has launched.
#[derive(Debug)]
pub struct JobControl {
    terminal: TerminalController,
    table: ProcessTable,
}

impl JobControl {
    fn with_terminal(terminal: TerminalController) -> Self {
        JobControl {
            terminal,
            table: ProcessTable::new(),
        }
    }

    pub fn is_interactive(&self) -> bool {
        self.terminal.is_interactive()
    }

    pub fn shell_pgid(&self) -> Pid {
        self.terminal.shell_pgid()
    }

    /// Process group currently in the foreground of the terminal.
    pub fn terminal_owner(&self) -> Result<Pid> {
        self.terminal.foreground_group()
    }

    pub fn table(&self) -> &ProcessTable {
        &self.table
    }

    /// Forks the process described by `spec` and records it.
    fn launch(&mut self, spec: LaunchSpec, background: bool) -> Result<RecordKey> {
        let argv = spec.argv.clone();
        let (stdin, stdout, stderr) = (spec.stdin.target(), spec.stdout.target(), spec.stderr.target());
        let requested_pgid = spec.pgid;

        let pid = launcher::spawn(spec, &self.terminal)?;

        let mut record = ProcessRecord::new(argv, pid, requested_pgid.unwrap_or(pid), background);
        record.stdin = stdin;
        record.stdout = stdout;
        record.stderr = stderr;
        Ok(self.table.insert(record))
    }

    /// Runs a command in the foreground and returns once it exits or stops.
    pub fn create_foreground_job(&mut self, mut spec: LaunchSpec) -> Result<ProcessStatus> {
        spec.foreground = true;
        let key = self.launch(spec, false)?;
        let pgid = self.record(key).pgid();
        self.foreground_group(pgid, false, None)
    }

    /// Starts a command in the background and returns its pid right away.
    pub fn create_background_job(&mut self, mut spec: LaunchSpec) -> Result<Pid> {
        spec.foreground = false;
        let key = self.launch(spec, true)?;
        let record = self.record(key);
        let (pid, pgid) = (record.pid(), record.pgid());
        self.background_group(pgid, false);
        Ok(pid)
    }

    fn record(&self, key: RecordKey) -> &ProcessRecord {
        self.table
            .get(key)
            .expect("a record just inserted is present in the table")
    }

    /// Lazily lists every tracked process in launch order.
    pub fn list_jobs(&self) -> impl Iterator<Item = JobInfo> + '_ {
        self.table.iter().map(|(_, record)| JobInfo::from_record(record))
    }

    /// Resumes the job containing `pid` in the foreground with the terminal
    /// modes it had when it stopped.
    pub fn bring_to_foreground(&mut self, pid: Pid) -> Result<ProcessStatus> {
        let key = self.table.find_by_pid(pid).ok_or(JobControlError::NoSuchProcess(pid))?;
        let record = self.record(key);
        if record.is_completed() {
            return Err(JobControlError::NoSuchProcess(pid));
        }
        let pgid = record.pgid();
        let modes = record.saved_modes().cloned();
        self.foreground_group(pgid, true, modes.as_ref())
    }

    /// Resumes the job containing `pid` in the background.
    pub fn continue_in_background(&mut self, pid: Pid) -> Result<()> {
        let key = self.table.find_by_pid(pid).ok_or(JobControlError::NoSuchProcess(pid))?;
        let record = self.record(key);
        if record.is_completed() {
            return Err(JobControlError::NoSuchProcess(pid));
        }
        let pgid = record.pgid();
        self.background_group(pgid, true);
        Ok(())
    }

    /// Background jobs that finished since the last call. Each is returned
    /// once and then becomes eligible for cleanup.
    pub fn take_finished_jobs(&mut self) -> Vec<JobInfo> {
        let finished: Vec<RecordKey> = self
            .table
            .iter()
            .filter(|(_, record)| record.is_completed() && !record.is_reported())
            .map(|(key, _)| key)
            .collect();
        finished
            .into_iter()
            .filter_map(|key| {
                let record = self.table.get_mut(key)?;
                record.mark_reported();
                Some(JobInfo::from_record(record))
            })
            .collect()
    }

    /// Forgets completed processes whose status has been reported.
    pub fn cleanup_completed_jobs(&mut self) {
        let removed = self.table.remove_reported();
        if removed > 0 {
            debug!("removed {} completed processes", removed);
        }
    }

    /// Signals a job's process group, or the single process when there is
    /// no job control and the job shares the shell's group.
    fn signal_group(&self, pgid: Pid, signal: Signal) -> nix::Result<()> {
        if self.is_interactive() {
            killpg(pgid, signal)
        } else {
            kill(pgid, signal)
        }
    }
}

impl Drop for JobControl {
    fn drop(&mut self) {
        // Hang up whatever is left so stopped jobs don't linger.
        let groups: Vec<(Pid, bool)> = self
            .table
            .iter()
            .filter(|(_, record)| !record.is_completed())
            .map(|(_, record)| (record.pgid(), record.is_stopped()))
            .collect();
        for (pgid, stopped) in groups {
            let _ = self.signal_group(pgid, Signal::SIGHUP);
            if stopped {
                let _ = self.signal_group(pgid, Signal::SIGCONT);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use nix::pty::openpty;
    use nix::sys::termios::{tcgetattr, LocalFlags, Termios};
    use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
    use nix::unistd::{close, fork, setsid, ForkResult};
    use std::fs::{self, File, OpenOptions};
    use std::io::Write;
    use std::os::unix::io::RawFd;
    use std::path::Path;
    use std::time::{Duration, Instant};

    fn job_control() -> JobControl {
        JobControl::non_interactive(-1)
    }

    fn spec(argv: &[&str]) -> LaunchSpec {
        LaunchSpec::new(argv.iter().map(|s| s.to_string()).collect())
    }

    fn output_to(path: &Path) -> StreamBinding {
        StreamBinding::File {
            file: OpenOptions::new().write(true).create(true).truncate(true).open(path).unwrap(),
            path: path.to_path_buf(),
        }
    }

    fn wait_until(job_control: &mut JobControl, pid: Pid, done: impl Fn(&ProcessRecord) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            job_control.poll_status();
            let key = job_control.table().find_by_pid(pid).unwrap();
            if done(job_control.table().get(key).unwrap()) {
                return;
            }
            assert!(Instant::now() < deadline, "timed out waiting for pid {}", pid);
            std::thread::sleep(Duration::from_millis(20));
        }
    }

    fn assert_invariants(job_control: &JobControl) {
        for (_, record) in job_control.table().iter() {
            assert!(!(record.is_stopped() && record.is_completed()));
        }
    }

    #[test]
    fn test_foreground_echo_completes() {
        let mut job_control = job_control();
        let status = job_control.create_foreground_job(spec(&["echo", "hi"])).unwrap();
        assert_eq!(status, ProcessStatus::Exited(0));

        let jobs: Vec<JobInfo> = job_control.list_jobs().collect();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].name, "echo hi");
        assert!(!jobs[0].background);
        assert!(!jobs[0].stopped);
        assert_eq!(job_control.terminal_owner().unwrap(), job_control.shell_pgid());
        assert_invariants(&job_control);
    }

    #[test]
    fn test_foreground_echo_output_reaches_stdout_binding() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.txt");
        let mut job_control = job_control();
        let mut spec = spec(&["echo", "hi"]);
        spec.stdout = output_to(&out);

        assert_eq!(job_control.create_foreground_job(spec).unwrap(), ProcessStatus::Exited(0));
        assert_eq!(fs::read_to_string(&out).unwrap(), "hi\n");
        let (_, record) = job_control.table().iter().next().unwrap();
        assert_eq!(record.stdout, StreamTarget::File(out));
    }

    #[test]
    fn test_input_redirection_is_read_without_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.txt");
        let out = dir.path().join("out.txt");
        File::create(&input).unwrap().write_all(b"X\n").unwrap();

        let mut job_control = job_control();
        let mut spec = spec(&["cat"]);
        spec.stdin = StreamBinding::File {
            file: File::open(&input).unwrap(),
            path: input.clone(),
        };
        spec.stdout = output_to(&out);

        assert_eq!(job_control.create_foreground_job(spec).unwrap(), ProcessStatus::Exited(0));
        assert_eq!(fs::read_to_string(&out).unwrap(), "X\n");
    }

    #[test]
    fn test_background_job_returns_immediately() {
        let mut job_control = job_control();
        let started = Instant::now();
        let pid = job_control.create_background_job(spec(&["sleep", "5"])).unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(job_control.terminal_owner().unwrap(), job_control.shell_pgid());

        let job = job_control.list_jobs().find(|job| job.pid == pid).unwrap();
        assert!(job.background);
        assert_eq!(job.status, ProcessStatus::Running);
        // dropping the session hangs the job up
    }

    #[test]
    fn test_background_without_resume_changes_nothing() {
        let mut job_control = job_control();
        let pid = job_control.create_background_job(spec(&["sleep", "5"])).unwrap();
        let before: Vec<JobInfo> = job_control.list_jobs().collect();
        job_control.background_group(pid, false);
        job_control.poll_status();
        let after: Vec<JobInfo> = job_control.list_jobs().collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_finished_background_job_is_reported_once_then_cleaned() {
        let mut job_control = job_control();
        let pid = job_control.create_background_job(spec(&["false"])).unwrap();
        wait_until(&mut job_control, pid, ProcessRecord::is_completed);

        let finished = job_control.take_finished_jobs();
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].pid, pid);
        assert_eq!(finished[0].status, ProcessStatus::Exited(1));
        assert!(job_control.take_finished_jobs().is_empty());

        job_control.cleanup_completed_jobs();
        assert!(job_control.table().is_empty());
    }

    #[test]
    fn test_stopped_job_resumes_in_foreground() {
        let mut job_control = job_control();
        let status = job_control
            .create_foreground_job(spec(&["sh", "-c", "kill -STOP $$; exit 4"]))
            .unwrap();
        assert_eq!(status, ProcessStatus::Stopped(Signal::SIGSTOP));
        assert_eq!(job_control.terminal_owner().unwrap(), job_control.shell_pgid());

        let job = job_control.list_jobs().next().unwrap();
        assert!(job.stopped);
        assert_invariants(&job_control);

        let status = job_control.bring_to_foreground(job.pid).unwrap();
        assert_eq!(status, ProcessStatus::Exited(4));
        assert_eq!(job_control.terminal_owner().unwrap(), job_control.shell_pgid());
        assert_invariants(&job_control);
    }

    #[test]
    fn test_stopped_background_job_continues_in_background() {
        let mut job_control = job_control();
        let pid = job_control.create_background_job(spec(&["sleep", "0.2"])).unwrap();
        kill(pid, Signal::SIGSTOP).unwrap();
        wait_until(&mut job_control, pid, ProcessRecord::is_stopped);

        job_control.continue_in_background(pid).unwrap();
        wait_until(&mut job_control, pid, ProcessRecord::is_completed);
        let job = job_control.list_jobs().next().unwrap();
        assert_eq!(job.status, ProcessStatus::Exited(0));
        assert!(job.background);
    }

    #[test]
    fn test_missing_executable_completes_with_failure() {
        let mut job_control = job_control();
        let status = job_control
            .create_foreground_job(spec(&["jobsh-definitely-not-a-command"]))
            .unwrap();
        assert_eq!(status, ProcessStatus::Exited(launcher::EXIT_NOT_FOUND));

        let (_, record) = job_control.table().iter().next().unwrap();
        assert!(record.is_completed());
        assert!(record.is_reported());
    }

    #[test]
    fn test_sequential_foreground_jobs_leave_terminal_with_shell() {
        let mut job_control = job_control();
        job_control.create_foreground_job(spec(&["true"])).unwrap();
        assert_eq!(job_control.terminal_owner().unwrap(), job_control.shell_pgid());
        job_control.create_foreground_job(spec(&["false"])).unwrap();
        assert_eq!(job_control.terminal_owner().unwrap(), job_control.shell_pgid());
        assert_eq!(job_control.table().len(), 2);
    }

    #[test]
    fn test_unknown_pid_is_rejected() {
        let mut job_control = job_control();
        assert_matches!(
            job_control.bring_to_foreground(Pid::from_raw(999_999)),
            Err(JobControlError::NoSuchProcess(_))
        );
        assert_matches!(
            job_control.continue_in_background(Pid::from_raw(999_999)),
            Err(JobControlError::NoSuchProcess(_))
        );
    }

    #[test]
    fn test_job_info_display() {
        let info = JobInfo {
            pid: Pid::from_raw(12),
            name: "sleep 5".into(),
            status: ProcessStatus::Running,
            stopped: false,
            background: true,
        };
        assert_eq!(info.to_string(), "[12] Running          sleep 5 &");
    }

    /// Runs in a new session whose controlling terminal is `tty` and
    /// returns a bit for every check that failed.
    fn check_interactive_session(tty: RawFd) -> i32 {
        let mut job_control = match JobControl::initialize(tty) {
            Ok(job_control) if job_control.is_interactive() => job_control,
            _ => return 0x80,
        };
        let shell_owns_terminal = |job_control: &JobControl| {
            job_control.terminal_owner().ok() == Some(job_control.shell_pgid())
        };
        let echo = |modes: &Termios| modes.local_flags.contains(LocalFlags::ECHO);
        let mut failures = 0;

        // Turns echo off, stops, and after resuming exits 5 only if echo is
        // still off.
        let script = "stty -echo < /dev/tty; kill -STOP $$; \
                      stty -a < /dev/tty | grep -qw -- -echo && exit 5; exit 6";
        let status = job_control.create_foreground_job(spec(&["sh", "-c", script]));
        if !matches!(status, Ok(ProcessStatus::Stopped(Signal::SIGSTOP))) {
            failures |= 0x01;
        }
        if !shell_owns_terminal(&job_control) {
            failures |= 0x02;
        }
        if !tcgetattr(tty).map(|modes| echo(&modes)).unwrap_or(false) {
            failures |= 0x04;
        }
        let Some((_, record)) = job_control.table().iter().next() else {
            return failures | 0x08;
        };
        if record.saved_modes().map(echo) != Some(false) {
            failures |= 0x08;
        }

        let pid = record.pid();
        if !matches!(job_control.bring_to_foreground(pid), Ok(ProcessStatus::Exited(5))) {
            failures |= 0x10;
        }
        if !shell_owns_terminal(&job_control) {
            failures |= 0x20;
        }

        let status = job_control.create_foreground_job(spec(&["true"]));
        if !matches!(status, Ok(ProcessStatus::Exited(0))) || !shell_owns_terminal(&job_control) {
            failures |= 0x40;
        }
        failures
    }

    #[test]
    fn test_interactive_session_hands_terminal_back_and_forth() {
        let pty = openpty(None, None).unwrap();
        match unsafe { fork() }.unwrap() {
            ForkResult::Child => {
                let _ = close(pty.master);
                let code = if setsid().is_ok() && unsafe { libc::ioctl(pty.slave, libc::TIOCSCTTY as _, 0) } == 0 {
                    check_interactive_session(pty.slave)
                } else {
                    0xff
                };
                unsafe { libc::_exit(code) }
            }
            ForkResult::Parent { child } => {
                close(pty.slave).unwrap();
                let deadline = Instant::now() + Duration::from_secs(10);
                let status = loop {
                    match waitpid(child, Some(WaitPidFlag::WNOHANG)).unwrap() {
                        WaitStatus::StillAlive => {}
                        status => break status,
                    }
                    if Instant::now() >= deadline {
                        let _ = kill(child, Signal::SIGKILL);
                        panic!("interactive session did not finish");
                    }
                    std::thread::sleep(Duration::from_millis(20));
                };
                close(pty.master).unwrap();
                assert_eq!(status, WaitStatus::Exited(child, 0));
            }
        }
    }
}
