// src/shell/builtins.rs
use crate::job_control::{JobControl, ProcessStatus};
use anyhow::{anyhow, Context, Result};
use nix::unistd::Pid;
use std::io::Write;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Help,
    Quit,
    Pwd,
    Cd,
    Jobs,
    Fg,
    Bg,
}

/// What the main loop should do after a built-in ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue(i32),
    Exit(i32),
}

const BUILTINS: &[(&str, Builtin, &str)] = &[
    ("help", Builtin::Help, "show this help menu"),
    ("quit", Builtin::Quit, "quit the command shell"),
    ("exit", Builtin::Quit, "quit the command shell"),
    ("pwd", Builtin::Pwd, "print the current working directory"),
    ("cd", Builtin::Cd, "change the current directory"),
    ("jobs", Builtin::Jobs, "list the processes started by this shell"),
    ("fg", Builtin::Fg, "resume a job in the foreground: fg [pid]"),
    ("bg", Builtin::Bg, "resume a stopped job in the background: bg [pid]"),
];

pub fn lookup(name: &str) -> Option<Builtin> {
    BUILTINS
        .iter()
        .find(|(builtin_name, _, _)| *builtin_name == name)
        .map(|&(_, builtin, _)| builtin)
}

pub fn run(builtin: Builtin, args: &[String], job_control: &mut JobControl, out: &mut dyn Write) -> Result<Flow> {
    match builtin {
        Builtin::Help => {
            for (name, _, doc) in BUILTINS {
                writeln!(out, "{} - {}", name, doc)?;
            }
        }
        Builtin::Quit => {
            writeln!(out, "Bye")?;
            return Ok(Flow::Exit(0));
        }
        Builtin::Pwd => {
            let cwd = std::env::current_dir().context("pwd")?;
            writeln!(out, "{}", cwd.display())?;
        }
        Builtin::Cd => {
            let target = match args.first() {
                Some(dir) => PathBuf::from(dir),
                None => dirs::home_dir().ok_or_else(|| anyhow!("cd: HOME not set"))?,
            };
            std::env::set_current_dir(&target).with_context(|| format!("cd: {}", target.display()))?;
        }
        Builtin::Jobs => {
            for job in job_control.list_jobs().filter(|job| !job.status.is_terminated()) {
                writeln!(out, "{}", job)?;
            }
        }
        Builtin::Fg => {
            let pid = target_pid("fg", args, job_control)?;
            let status = job_control.bring_to_foreground(pid).context("fg")?;
            if let ProcessStatus::Stopped(_) = status {
                if let Some(job) = job_control.list_jobs().find(|job| job.pid == pid) {
                    writeln!(out, "\n{}", job)?;
                }
            }
            return Ok(Flow::Continue(status.exit_code()));
        }
        Builtin::Bg => {
            let pid = target_pid("bg", args, job_control)?;
            job_control.continue_in_background(pid).context("bg")?;
            if let Some(job) = job_control.list_jobs().find(|job| job.pid == pid) {
                writeln!(out, "{}", job)?;
            }
        }
    }
    Ok(Flow::Continue(0))
}

/// Pid named on the command line, or the most recently launched live job.
fn target_pid(name: &str, args: &[String], job_control: &JobControl) -> Result<Pid> {
    match args.first() {
        Some(arg) => {
            let raw: i32 = arg
                .parse()
                .with_context(|| format!("{}: invalid process id: {}", name, arg))?;
            Ok(Pid::from_raw(raw))
        }
        None => job_control
            .list_jobs()
            .filter(|job| !job.status.is_terminated())
            .last()
            .map(|job| job.pid)
            .ok_or_else(|| anyhow!("{}: no current job", name)),
    }
}
