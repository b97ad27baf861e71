use super::error::{JobControlError, Result};
use super::signals::SignalHandler;
use super::terminal::TerminalController;
use super::JobControl;
use log::{debug, info};
use nix::sys::signal::{killpg, Signal};
use nix::sys::termios::tcgetattr;
use nix::unistd::{getpgrp, getpid, isatty, setpgid, tcgetpgrp, tcsetpgrp};
use std::os::unix::io::RawFd;

impl JobControl {
    /// One-time, process-wide setup of the shell session.
    ///
    /// If `terminal_fd` is a terminal the shell waits until it is in the
    /// foreground, ignores the job-control signals, becomes the leader of
    /// its own process group, takes the terminal and records the terminal
    /// modes to restore after each job. Any failure on that path is fatal
    /// for the session.
    pub fn initialize(terminal_fd: RawFd) -> Result<Self> {
        let interactive = isatty(terminal_fd).unwrap_or(false);
        if !interactive {
            info!("fd {} is not a terminal; job control disabled", terminal_fd);
            return Ok(Self::non_interactive(terminal_fd));
        }

        // Started in the background: stop until someone foregrounds us.
        // An inherited ignore would turn the SIGTTIN below into a busy loop.
        SignalHandler::reset_to_default(Signal::SIGTTIN).map_err(JobControlError::Signal)?;
        loop {
            let pgrp = getpgrp();
            let owner = tcgetpgrp(terminal_fd).map_err(JobControlError::terminal("tcgetpgrp"))?;
            if owner == pgrp {
                break;
            }
            debug!("terminal owned by {}, shell group is {}; stopping", owner, pgrp);
            killpg(pgrp, Signal::SIGTTIN).map_err(JobControlError::Signal)?;
        }

        SignalHandler::ignore_job_control_signals().map_err(JobControlError::Signal)?;

        let shell_pgid = getpid();
        // A session leader already leads its group and may not call setpgid.
        if getpgrp() != shell_pgid {
            setpgid(shell_pgid, shell_pgid).map_err(JobControlError::ProcessGroup)?;
        }
        tcsetpgrp(terminal_fd, shell_pgid).map_err(JobControlError::terminal("tcsetpgrp"))?;
        let shell_modes = tcgetattr(terminal_fd).map_err(JobControlError::terminal("tcgetattr"))?;

        info!("interactive session on fd {} with process group {}", terminal_fd, shell_pgid);
        Ok(Self::with_terminal(TerminalController::interactive(
            terminal_fd,
            shell_pgid,
            shell_modes,
        )))
    }

    /// Session without a controlling terminal: jobs stay in the shell's
    /// process group and no terminal ownership is ever transferred.
    pub fn non_interactive(terminal_fd: RawFd) -> Self {
        Self::with_terminal(TerminalController::detached(terminal_fd, getpgrp()))
    }
}
