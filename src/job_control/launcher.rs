//! Fork/exec of a single command into its process group.
//!
//! Everything the child needs is prepared in the parent before `fork`, so
//! the child only performs async-signal-safe system calls between `fork`
//! and `exec`.

use super::error::{JobControlError, Result};
use super::process::StreamTarget;
use super::signals::SignalHandler;
use super::terminal::TerminalController;
use log::debug;
use nix::errno::Errno;
use nix::unistd::{self, close, dup2, execvp, fork, getpid, setpgid, tcsetpgrp, ForkResult, Pid};
use std::ffi::CString;
use std::fs::File;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};

/// Exit status of a child whose program could not be found.
pub const EXIT_NOT_FOUND: i32 = 127;
/// Exit status of a child whose program was found but could not run.
pub const EXIT_NOT_EXECUTABLE: i32 = 126;

/// What one standard stream of the child should be bound to.
#[derive(Debug, Default)]
pub enum StreamBinding {
    #[default]
    Inherit,
    File { file: File, path: PathBuf },
}

impl StreamBinding {
    fn raw_fd(&self) -> Option<RawFd> {
        match self {
            StreamBinding::Inherit => None,
            StreamBinding::File { file, .. } => Some(file.as_raw_fd()),
        }
    }

    pub fn target(&self) -> StreamTarget {
        match self {
            StreamBinding::Inherit => StreamTarget::Inherit,
            StreamBinding::File { path, .. } => StreamTarget::File(path.clone()),
        }
    }
}

/// Everything needed to start one process.
#[derive(Debug, Default)]
pub struct LaunchSpec {
    pub argv: Vec<String>,
    /// Resolved executable. When `None`, `argv[0]` is searched in `PATH`
    /// at exec time.
    pub program: Option<PathBuf>,
    /// Group to join; `None` makes the new process the leader of its own.
    pub pgid: Option<Pid>,
    pub stdin: StreamBinding,
    pub stdout: StreamBinding,
    pub stderr: StreamBinding,
    pub foreground: bool,
}

impl LaunchSpec {
    pub fn new(argv: Vec<String>) -> Self {
        LaunchSpec {
            argv,
            ..Default::default()
        }
    }
}

/// Data handed to the child side of the fork.
struct ChildPlan {
    program: CString,
    args: Vec<CString>,
    error_prefix: Vec<u8>,
    interactive: bool,
    terminal_fd: RawFd,
    pgid: Option<Pid>,
    foreground: bool,
    redirects: [(Option<RawFd>, RawFd); 3],
}

fn to_cstring(value: &str) -> Result<CString> {
    CString::new(value).map_err(|_| JobControlError::InvalidArgument(value.to_string()))
}

/// Paths are passed to exec byte for byte, whatever their encoding.
fn path_to_cstring(path: &Path) -> Result<CString> {
    CString::new(path.as_os_str().as_bytes())
        .map_err(|_| JobControlError::InvalidArgument(path.display().to_string()))
}

/// Starts the process described by `spec` and returns its pid.
///
/// In an interactive session the parent also places the child in its group,
/// so the group exists no matter which side runs first after the fork.
/// The parent's copies of redirected files are closed when `spec` is dropped
/// at the end of this call.
pub fn spawn(spec: LaunchSpec, terminal: &TerminalController) -> Result<Pid> {
    let name = spec
        .argv
        .first()
        .ok_or_else(|| JobControlError::InvalidArgument(String::new()))?;
    let program = match &spec.program {
        Some(path) => path_to_cstring(path)?,
        None => to_cstring(name)?,
    };
    let args = spec
        .argv
        .iter()
        .map(|arg| to_cstring(arg))
        .collect::<Result<Vec<_>>>()?;

    let plan = ChildPlan {
        program,
        args,
        error_prefix: format!("{}: ", name).into_bytes(),
        interactive: terminal.is_interactive(),
        terminal_fd: terminal.fd(),
        pgid: spec.pgid,
        foreground: spec.foreground,
        redirects: [
            (spec.stdin.raw_fd(), libc::STDIN_FILENO),
            (spec.stdout.raw_fd(), libc::STDOUT_FILENO),
            (spec.stderr.raw_fd(), libc::STDERR_FILENO),
        ],
    };

    debug!(
        "launch: argv:{:?} program:{:?} pgid:{:?} foreground:{}",
        spec.argv, spec.program, spec.pgid, spec.foreground
    );

    match unsafe { fork() }.map_err(JobControlError::Fork)? {
        ForkResult::Child => exec_child(&plan),
        ForkResult::Parent { child } => {
            if plan.interactive {
                let pgid = plan.pgid.unwrap_or(child);
                // The child may already have exec'd, in which case it did
                // this itself and the call fails with EACCES.
                if let Err(errno) = setpgid(child, pgid) {
                    debug!("parent setpgid({}, {}) failed: {}", child, pgid, errno);
                }
            }
            debug!("launched {} as pid {}", name, child);
            Ok(child)
        }
    }
}

fn exec_child(plan: &ChildPlan) -> ! {
    if plan.interactive {
        let pid = getpid();
        let pgid = plan.pgid.unwrap_or(pid);
        if let Err(errno) = setpgid(pid, pgid) {
            child_fail(plan, b"setpgid: ", errno, EXIT_NOT_EXECUTABLE);
        }
        if plan.foreground {
            if let Err(errno) = tcsetpgrp(plan.terminal_fd, pgid) {
                child_fail(plan, b"tcsetpgrp: ", errno, EXIT_NOT_EXECUTABLE);
            }
        }
    }

    if let Err(errno) = SignalHandler::restore_default_signals() {
        child_fail(plan, b"sigaction: ", errno, EXIT_NOT_EXECUTABLE);
    }

    for &(fd, target) in &plan.redirects {
        if let Some(fd) = fd {
            if fd != target {
                if let Err(errno) = dup2(fd, target) {
                    child_fail(plan, b"dup2: ", errno, EXIT_NOT_EXECUTABLE);
                }
                let _ = close(fd);
            }
        }
    }

    let errno = match execvp(&plan.program, &plan.args) {
        Ok(never) => match never {},
        Err(errno) => errno,
    };
    let code = match errno {
        Errno::ENOENT | Errno::ENOTDIR => EXIT_NOT_FOUND,
        _ => EXIT_NOT_EXECUTABLE,
    };
    child_fail(plan, b"", errno, code)
}

/// Reports a failure on the child's stderr and exits without running any
/// of the parent's atexit handlers or destructors.
fn child_fail(plan: &ChildPlan, step: &[u8], errno: Errno, code: i32) -> ! {
    let stderr = libc::STDERR_FILENO;
    let _ = unistd::write(stderr, &plan.error_prefix);
    let _ = unistd::write(stderr, step);
    let _ = unistd::write(stderr, errno.desc().as_bytes());
    let _ = unistd::write(stderr, b"\n");
    unsafe { libc::_exit(code) }
}
