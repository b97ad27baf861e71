pub mod builtins;
pub mod command_parser;
pub mod executor;

use crate::config::Config;
use crate::job_control::JobControl;
use crate::terminal::Terminal;
use anyhow::{Context, Result};
use builtins::Flow;
use command_parser::CommandParser;
use executor::Executor;
use log::debug;
use std::io::{self, Write};

pub struct Shell {
    terminal: Terminal,
    job_control: JobControl,
}

impl Shell {
    /// Sets up the job-control session first: the shell must own the
    /// terminal before it starts reading from it.
    pub fn new(config: &Config) -> Result<Self> {
        let job_control =
            JobControl::initialize(config.terminal_fd).context("Failed to initialize job control")?;
        let terminal = Terminal::new(config).context("Failed to initialize line editor")?;
        Ok(Shell {
            terminal,
            job_control,
        })
    }

    /// Reads and runs commands until `quit` or end of input. Returns the
    /// shell's exit status.
    pub fn run(&mut self) -> Result<i32> {
        loop {
            report_finished_jobs(&mut self.job_control, &mut io::stdout())?;

            let Some(line) = self.terminal.read_line()? else {
                return Ok(0);
            };

            match execute_line(&line, &mut self.job_control, &mut io::stdout()) {
                Ok(Flow::Exit(code)) => return Ok(code),
                Ok(Flow::Continue(code)) => debug!("exit status {}", code),
                Err(e) => eprintln!("Error: {:#}", e),
            }
        }
    }
}

/// Parses one input line and runs it as a built-in or an external command.
pub fn execute_line(line: &str, job_control: &mut JobControl, out: &mut dyn Write) -> Result<Flow> {
    let Some(command) = CommandParser::parse(line)? else {
        return Ok(Flow::Continue(0));
    };

    if let Some(builtin) = builtins::lookup(&command.argv[0]) {
        return builtins::run(builtin, &command.argv[1..], job_control, out);
    }

    out.flush()?;
    Executor::execute(&command, job_control, out).map(Flow::Continue)
}

/// Prints background jobs that finished since the last prompt and forgets
/// everything already reported.
pub fn report_finished_jobs(job_control: &mut JobControl, out: &mut dyn Write) -> Result<()> {
    job_control.poll_status();
    for job in job_control.take_finished_jobs() {
        writeln!(out, "{}", job)?;
    }
    job_control.cleanup_completed_jobs();
    Ok(())
}
