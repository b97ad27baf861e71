use log::warn;
use std::env;
use std::os::unix::io::RawFd;
use std::path::PathBuf;

const DEFAULT_HISTORY_SIZE: usize = 1000;
const HISTORY_FILE_NAME: &str = ".jobsh_history";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub history_file: Option<PathBuf>,
    pub history_size: usize,
    /// Descriptor checked for a controlling terminal at startup.
    pub terminal_fd: RawFd,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            history_file: dirs::home_dir().map(|home| home.join(HISTORY_FILE_NAME)),
            history_size: DEFAULT_HISTORY_SIZE,
            terminal_fd: libc::STDIN_FILENO,
        }
    }
}

impl Config {
    /// Reads `JOBSH_*` variables from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Config::default();
        if let Some(path) = lookup("JOBSH_HISTORY_FILE") {
            config.history_file = Some(PathBuf::from(path));
        }
        if let Some(size) = parse_var(&lookup, "JOBSH_HISTORY_SIZE") {
            config.history_size = size;
        }
        if let Some(fd) = parse_var(&lookup, "JOBSH_TERMINAL_FD") {
            config.terminal_fd = fd;
        }
        config
    }
}

fn parse_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let value = lookup(key)?;
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!("ignoring {}={:?}: not a number", key, value);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.history_size, 1000);
        assert_eq!(config.terminal_fd, 0);
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("JOBSH_HISTORY_FILE", "/tmp/hist"),
            ("JOBSH_HISTORY_SIZE", " 50 "),
            ("JOBSH_TERMINAL_FD", "3"),
        ]);
        assert_eq!(config.history_file, Some(PathBuf::from("/tmp/hist")));
        assert_eq!(config.history_size, 50);
        assert_eq!(config.terminal_fd, 3);
    }

    #[test]
    fn test_malformed_numbers_fall_back() {
        let config = config_from(&[("JOBSH_HISTORY_SIZE", "lots"), ("JOBSH_TERMINAL_FD", "")]);
        assert_eq!(config.history_size, 1000);
        assert_eq!(config.terminal_fd, 0);
    }
}
