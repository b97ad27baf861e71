use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use log::debug;

/// Signals the interactive shell ignores so that only the foreground job
/// receives them.
pub const SHELL_IGNORED: [Signal; 5] = [
    Signal::SIGINT,
    Signal::SIGQUIT,
    Signal::SIGTSTP,
    Signal::SIGTTIN,
    Signal::SIGTTOU,
];

/// Signals a child resets to default before exec. SIGCHLD is included so
/// a child never inherits anything the shell may have installed for it.
pub const CHILD_RESET: [Signal; 6] = [
    Signal::SIGINT,
    Signal::SIGQUIT,
    Signal::SIGTSTP,
    Signal::SIGTTIN,
    Signal::SIGTTOU,
    Signal::SIGCHLD,
];

pub struct SignalHandler;

impl SignalHandler {
    /// Makes the shell immune to the job-control signals.
    pub fn ignore_job_control_signals() -> Result<(), nix::Error> {
        debug!("Ignoring job control signals in the shell");
        let ignore = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());
        for &sig in &SHELL_IGNORED {
            unsafe { signal::sigaction(sig, &ignore)? };
        }
        Ok(())
    }

    /// Restores default dispositions. Runs in a freshly forked child, so it
    /// must stay async-signal-safe: no logging, no allocation.
    pub fn restore_default_signals() -> Result<(), nix::Error> {
        for &sig in &CHILD_RESET {
            Self::reset_to_default(sig)?;
        }
        Ok(())
    }

    /// Gives one signal its default disposition, whatever the shell
    /// inherited for it.
    pub fn reset_to_default(sig: Signal) -> Result<(), nix::Error> {
        let default = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
        unsafe { signal::sigaction(sig, &default)? };
        Ok(())
    }
}
