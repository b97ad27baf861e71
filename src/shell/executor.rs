// src/shell/executor.rs
use crate::job_control::{JobControl, JobControlError, LaunchSpec, ProcessStatus, StreamBinding};
use crate::shell::command_parser::{Direction, ParsedCommand};
use crate::utils::path_utils;
use anyhow::{Context, Result};
use log::debug;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;

/// Permissions for files created by `>`.
const OUTPUT_MODE: u32 = 0o644;

pub struct Executor;

impl Executor {
    /// Launches an external command. Foreground commands block until they
    /// exit or stop and yield their exit code; background commands yield 0
    /// as soon as they are started. Job notices go to `out`.
    pub fn execute(command: &ParsedCommand, job_control: &mut JobControl, out: &mut dyn Write) -> Result<i32> {
        let spec = Self::create_spec(command)?;
        let name = &command.argv[0];

        if command.background {
            let pid = job_control
                .create_background_job(spec)
                .with_context(|| format!("Failed to start {}", name))?;
            writeln!(out, "[{}] {}", pid, command.argv.join(" "))?;
            Ok(0)
        } else {
            let status = job_control
                .create_foreground_job(spec)
                .with_context(|| format!("Failed to run {}", name))?;
            if let ProcessStatus::Stopped(_) = status {
                if let Some(job) = job_control.list_jobs().filter(|job| job.stopped).last() {
                    writeln!(out, "\n{}", job)?;
                }
            }
            Ok(status.exit_code())
        }
    }

    /// Builds the launch description, opening redirection targets now so a
    /// bad file name stops the command before anything is forked.
    pub fn create_spec(command: &ParsedCommand) -> Result<LaunchSpec> {
        let name = &command.argv[0];
        let mut spec = LaunchSpec::new(command.argv.clone());

        // The child falls back to a PATH search and reports the failure
        // itself when nothing is found here.
        spec.program = path_utils::find_executable(name, &path_utils::search_path());
        debug!("resolved {} to {:?}", name, spec.program);

        if let Some(redirection) = command.redirection(Direction::Input) {
            spec.stdin = Self::open_input(&redirection.path)?;
        }
        if let Some(redirection) = command.redirection(Direction::Output) {
            spec.stdout = Self::open_output(&redirection.path)?;
        }
        Ok(spec)
    }

    fn open_input(path: &str) -> Result<StreamBinding> {
        let file = File::open(path).map_err(|source| JobControlError::Redirection {
            path: PathBuf::from(path),
            source,
        })?;
        Ok(StreamBinding::File {
            file,
            path: PathBuf::from(path),
        })
    }

    fn open_output(path: &str) -> Result<StreamBinding> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(OUTPUT_MODE)
            .open(path)
            .map_err(|source| JobControlError::Redirection {
                path: PathBuf::from(path),
                source,
            })?;
        Ok(StreamBinding::File {
            file,
            path: PathBuf::from(path),
        })
    }
}
