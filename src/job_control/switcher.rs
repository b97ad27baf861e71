use super::error::{JobControlError, Result};
use super::process::ProcessStatus;
use super::table::RecordKey;
use super::JobControl;
use log::{debug, warn};
use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::sys::termios::Termios;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

impl JobControl {
    /// Puts a process group in the foreground and blocks until every member
    /// has exited or one of them stops.
    ///
    /// `saved_modes` are applied to the terminal before the group runs.
    /// Whatever happens, the terminal belongs to the shell again when this
    /// returns; if the group stopped, the terminal modes it left behind are
    /// saved on its stopped records.
    pub fn foreground_group(
        &mut self,
        pgid: Pid,
        resume: bool,
        saved_modes: Option<&Termios>,
    ) -> Result<ProcessStatus> {
        debug!("foreground group {} (resume: {})", pgid, resume);
        for key in self.table.group_members(pgid) {
            if let Some(record) = self.table.get_mut(key) {
                record.set_background(false);
            }
        }

        let waited = self.run_in_foreground(pgid, resume, saved_modes);
        let captured = self.terminal.reclaim();
        waited?;
        let captured = captured?;

        for key in self.table.group_members(pgid) {
            let Some(record) = self.table.get_mut(key) else { continue };
            if record.is_stopped() {
                if let Some(modes) = &captured {
                    record.set_saved_modes(Some(modes.clone()));
                }
            } else if record.is_completed() {
                record.mark_reported();
            }
        }
        Ok(self.group_status(pgid))
    }

    fn run_in_foreground(&mut self, pgid: Pid, resume: bool, saved_modes: Option<&Termios>) -> Result<()> {
        self.terminal.give_to(pgid)?;
        if let Some(modes) = saved_modes {
            self.terminal.apply_modes(modes)?;
        }
        if resume {
            self.continue_group(pgid);
        }
        self.wait_for_group(pgid)
    }

    /// Lets a process group run without the terminal. Never blocks.
    pub fn background_group(&mut self, pgid: Pid, resume: bool) {
        debug!("background group {} (resume: {})", pgid, resume);
        for key in self.table.group_members(pgid) {
            if let Some(record) = self.table.get_mut(key) {
                record.set_background(true);
            }
        }
        if resume {
            self.continue_group(pgid);
        }
    }

    /// Sends SIGCONT to the group. A failure is only a warning: the group
    /// may be running already or gone.
    fn continue_group(&mut self, pgid: Pid) {
        if let Err(errno) = self.signal_group(pgid, Signal::SIGCONT) {
            warn!("kill (SIGCONT) to group {}: {}", pgid, errno);
            return;
        }
        for key in self.table.group_members(pgid) {
            if let Some(record) = self.table.get_mut(key) {
                if record.is_stopped() {
                    record.update_status(ProcessStatus::Running);
                }
            }
        }
    }

    /// Blocks until no member of the group is running.
    fn wait_for_group(&mut self, pgid: Pid) -> Result<()> {
        loop {
            let running: Vec<RecordKey> = self
                .table
                .group_members(pgid)
                .into_iter()
                .filter(|&key| {
                    self.table
                        .get(key)
                        .map_or(false, |record| !record.is_completed() && !record.is_stopped())
                })
                .collect();
            let Some(&first) = running.first() else {
                return Ok(());
            };

            // Without job control the members share the shell's group, so
            // they are waited for one at a time.
            let target = if self.is_interactive() {
                Pid::from_raw(-pgid.as_raw())
            } else {
                match self.table.get(first) {
                    Some(record) => record.pid(),
                    None => return Ok(()),
                }
            };

            match waitpid(target, Some(WaitPidFlag::WUNTRACED)) {
                Ok(status) => {
                    self.apply_wait_status(status);
                }
                Err(Errno::EINTR) => continue,
                Err(errno) => return Err(JobControlError::Wait { pgid, errno }),
            }
        }
    }

    /// Collects pending status changes of every live record without
    /// blocking. Returns the number of records that changed.
    pub fn poll_status(&mut self) -> usize {
        let live: Vec<Pid> = self
            .table
            .iter()
            .filter(|(_, record)| !record.is_completed())
            .map(|(_, record)| record.pid())
            .collect();

        let flags = WaitPidFlag::WNOHANG | WaitPidFlag::WUNTRACED | WaitPidFlag::WCONTINUED;
        let mut changed = 0;
        for pid in live {
            loop {
                match waitpid(pid, Some(flags)) {
                    Ok(WaitStatus::StillAlive) => break,
                    Ok(status) => {
                        if self.apply_wait_status(status).is_some() {
                            changed += 1;
                        }
                        if !matches!(status, WaitStatus::Stopped(..) | WaitStatus::Continued(_)) {
                            break;
                        }
                    }
                    Err(Errno::EINTR) => continue,
                    Err(errno) => {
                        debug!("waitpid({}) during poll: {}", pid, errno);
                        break;
                    }
                }
            }
        }
        changed
    }

    fn apply_wait_status(&mut self, status: WaitStatus) -> Option<RecordKey> {
        let (pid, status) = ProcessStatus::from_wait_status(status)?;
        let Some(key) = self.table.find_by_pid(pid) else {
            debug!("status {:?} for untracked child {}", status, pid);
            return None;
        };
        debug!("pid {}: {}", pid, status);
        let record = self.table.get_mut(key)?;
        record.update_status(status).then_some(key)
    }

    /// Status of a group: the stop signal if any member stopped, otherwise
    /// the status of the most recently launched member.
    pub fn group_status(&self, pgid: Pid) -> ProcessStatus {
        let members = self.table.group_members(pgid);
        let statuses = members.iter().filter_map(|&key| self.table.get(key).map(|r| r.status()));
        let mut last = ProcessStatus::Running;
        for status in statuses {
            if let ProcessStatus::Stopped(_) = status {
                return status;
            }
            last = status;
        }
        last
    }
}
