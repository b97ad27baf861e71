use nix::sys::signal::Signal;
use nix::sys::termios::Termios;
use nix::sys::wait::WaitStatus;
use nix::unistd::Pid;
use std::fmt;
use std::path::PathBuf;

/// Last observed state of a child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Running,
    Exited(i32),
    Signaled(Signal),
    Stopped(Signal),
}

impl ProcessStatus {
    /// Translates a wait result into the pid it concerns and its new status.
    ///
    /// Returns `None` for results that carry no state change (`StillAlive`,
    /// ptrace events).
    pub fn from_wait_status(status: WaitStatus) -> Option<(Pid, ProcessStatus)> {
        match status {
            WaitStatus::Exited(pid, code) => Some((pid, ProcessStatus::Exited(code))),
            WaitStatus::Signaled(pid, signal, _) => Some((pid, ProcessStatus::Signaled(signal))),
            WaitStatus::Stopped(pid, signal) => Some((pid, ProcessStatus::Stopped(signal))),
            WaitStatus::Continued(pid) => Some((pid, ProcessStatus::Running)),
            _ => None,
        }
    }

    pub fn is_terminated(self) -> bool {
        matches!(self, ProcessStatus::Exited(_) | ProcessStatus::Signaled(_))
    }

    /// Exit code in the usual shell convention (128 + signal number for
    /// signals).
    pub fn exit_code(self) -> i32 {
        match self {
            ProcessStatus::Running => 0,
            ProcessStatus::Exited(code) => code,
            ProcessStatus::Signaled(signal) | ProcessStatus::Stopped(signal) => 128 + signal as i32,
        }
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessStatus::Running => f.write_str("Running"),
            ProcessStatus::Exited(0) => f.write_str("Done"),
            ProcessStatus::Exited(code) => write!(f, "Exit {}", code),
            ProcessStatus::Signaled(signal) => write!(f, "Killed ({})", signal.as_str()),
            ProcessStatus::Stopped(signal) => write!(f, "Stopped ({})", signal.as_str()),
        }
    }
}

/// Where one of the standard streams of a launched process points.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StreamTarget {
    /// Inherited from the shell.
    #[default]
    Inherit,
    File(PathBuf),
}

/// One OS process spawned by the shell.
#[derive(Debug, Clone)]
pub struct ProcessRecord {
    argv: Vec<String>,
    pid: Pid,
    pgid: Pid,
    status: ProcessStatus,
    background: bool,
    reported: bool,
    saved_modes: Option<Termios>,
    pub stdin: StreamTarget,
    pub stdout: StreamTarget,
    pub stderr: StreamTarget,
}

impl ProcessRecord {
    pub fn new(argv: Vec<String>, pid: Pid, pgid: Pid, background: bool) -> Self {
        debug_assert!(!argv.is_empty());
        ProcessRecord {
            argv,
            pid,
            pgid,
            status: ProcessStatus::Running,
            background,
            reported: false,
            saved_modes: None,
            stdin: StreamTarget::Inherit,
            stdout: StreamTarget::Inherit,
            stderr: StreamTarget::Inherit,
        }
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn name(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or_default()
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Process group the record was launched into. In a non-interactive
    /// session this is only a job identity; the OS group is the shell's.
    pub fn pgid(&self) -> Pid {
        self.pgid
    }

    pub fn status(&self) -> ProcessStatus {
        self.status
    }

    pub fn is_completed(&self) -> bool {
        self.status.is_terminated()
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self.status, ProcessStatus::Stopped(_))
    }

    pub fn is_background(&self) -> bool {
        self.background
    }

    pub fn set_background(&mut self, background: bool) {
        self.background = background;
    }

    pub fn is_reported(&self) -> bool {
        self.reported
    }

    pub fn mark_reported(&mut self) {
        self.reported = true;
    }

    pub fn saved_modes(&self) -> Option<&Termios> {
        self.saved_modes.as_ref()
    }

    pub fn set_saved_modes(&mut self, modes: Option<Termios>) {
        self.saved_modes = modes;
    }

    /// Applies a newly observed status. Completed records are final, so
    /// any later update is ignored and `false` is returned.
    pub fn update_status(&mut self, status: ProcessStatus) -> bool {
        if self.is_completed() {
            return false;
        }
        self.status = status;
        true
    }
}
