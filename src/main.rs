mod config;
mod job_control;
mod shell;
mod terminal;
mod utils;

use crate::config::Config;
use crate::shell::Shell;
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    dotenv::dotenv().ok();

    let config = Config::from_env();

    let mut shell = match Shell::new(&config) {
        Ok(shell) => shell,
        Err(e) => {
            eprintln!("jobsh: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match shell.run() {
        Ok(code) => ExitCode::from(code.clamp(0, 255) as u8),
        Err(e) => {
            eprintln!("jobsh: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
