use super::error::{JobControlError, Result};
use log::debug;
use nix::sys::termios::{tcgetattr, tcsetattr, SetArg, Termios};
use nix::unistd::{tcgetpgrp, tcsetpgrp, Pid};
use std::os::unix::io::RawFd;

/// Owner of the controlling terminal's foreground process group and of the
/// shell's own line-discipline settings.
///
/// In a non-interactive session there is no terminal to arbitrate and
/// every operation is a no-op.
#[derive(Debug)]
pub struct TerminalController {
    fd: RawFd,
    shell_pgid: Pid,
    shell_modes: Option<Termios>,
}

impl TerminalController {
    pub fn interactive(fd: RawFd, shell_pgid: Pid, shell_modes: Termios) -> Self {
        TerminalController {
            fd,
            shell_pgid,
            shell_modes: Some(shell_modes),
        }
    }

    pub fn detached(fd: RawFd, shell_pgid: Pid) -> Self {
        TerminalController {
            fd,
            shell_pgid,
            shell_modes: None,
        }
    }

    pub fn is_interactive(&self) -> bool {
        self.shell_modes.is_some()
    }

    pub fn fd(&self) -> RawFd {
        self.fd
    }

    pub fn shell_pgid(&self) -> Pid {
        self.shell_pgid
    }

    /// Current foreground process group of the terminal. Without a terminal
    /// the shell counts as the owner.
    pub fn foreground_group(&self) -> Result<Pid> {
        if !self.is_interactive() {
            return Ok(self.shell_pgid);
        }
        tcgetpgrp(self.fd).map_err(JobControlError::terminal("tcgetpgrp"))
    }

    pub fn give_to(&self, pgid: Pid) -> Result<()> {
        if !self.is_interactive() {
            return Ok(());
        }
        debug!("Giving terminal to process group {}", pgid);
        tcsetpgrp(self.fd, pgid).map_err(JobControlError::terminal("tcsetpgrp"))
    }

    pub fn apply_modes(&self, modes: &Termios) -> Result<()> {
        if !self.is_interactive() {
            return Ok(());
        }
        tcsetattr(self.fd, SetArg::TCSADRAIN, modes).map_err(JobControlError::terminal("tcsetattr"))
    }

    /// Takes the terminal back for the shell's group and restores the
    /// shell's modes. Returns the modes the terminal had just before, which
    /// belong to the job that was in the foreground.
    ///
    /// Every step is attempted even if an earlier one fails; the first error
    /// is returned.
    pub fn reclaim(&self) -> Result<Option<Termios>> {
        let Some(shell_modes) = &self.shell_modes else {
            return Ok(None);
        };
        debug!("Reclaiming terminal for shell group {}", self.shell_pgid);
        let regained = tcsetpgrp(self.fd, self.shell_pgid).map_err(JobControlError::terminal("tcsetpgrp"));
        let captured = tcgetattr(self.fd).map_err(JobControlError::terminal("tcgetattr"));
        let restored = tcsetattr(self.fd, SetArg::TCSADRAIN, shell_modes)
            .map_err(JobControlError::terminal("tcsetattr"));
        regained?;
        restored?;
        captured.map(Some)
    }
}
