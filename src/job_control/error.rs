use nix::errno::Errno;
use nix::unistd::Pid;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the job-control core on the shell side of a fork.
///
/// Failures inside a forked child never show up here; they surface only as
/// the child's exit status.
#[derive(Debug, Error)]
pub enum JobControlError {
    #[error("terminal: {context}: {errno}")]
    Terminal { context: &'static str, errno: Errno },

    #[error("couldn't put the shell in its own process group: {0}")]
    ProcessGroup(Errno),

    #[error("couldn't set job control signal dispositions: {0}")]
    Signal(Errno),

    #[error("fork failed: {0}")]
    Fork(Errno),

    #[error("waiting for process group {pgid} failed: {errno}")]
    Wait { pgid: Pid, errno: Errno },

    #[error("{}: {source}", .path.display())]
    Redirection {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no such process: {0}")]
    NoSuchProcess(Pid),

    #[error("argument contains a NUL byte: {0:?}")]
    InvalidArgument(String),
}

impl JobControlError {
    pub(crate) fn terminal(context: &'static str) -> impl FnOnce(Errno) -> Self {
        move |errno| JobControlError::Terminal { context, errno }
    }
}

pub type Result<T> = std::result::Result<T, JobControlError>;
