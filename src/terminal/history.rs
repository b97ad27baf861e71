use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

/// Command history, persisted one entry per line when a file is configured.
pub struct History {
    history_file: Option<PathBuf>,
    max_history_size: usize,
    entries: Vec<String>,
}

impl History {
    pub fn new(history_file: Option<PathBuf>, max_history_size: usize) -> Self {
        History {
            history_file,
            max_history_size,
            entries: Vec::new(),
        }
    }

    pub fn load(&mut self) -> Result<()> {
        let Some(path) = &self.history_file else {
            return Ok(());
        };
        if !path.exists() {
            return Ok(());
        }

        let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        self.entries = BufReader::new(file)
            .lines()
            .map_while(|line| line.ok())
            .filter(|entry| !entry.trim().is_empty())
            .collect();
        self.trim();
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.history_file else {
            return Ok(());
        };
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        for entry in &self.entries {
            writeln!(file, "{}", entry)?;
        }
        Ok(())
    }

    /// Appends an entry unless it is blank or repeats the previous one.
    /// Returns whether it was added.
    pub fn add(&mut self, entry: &str) -> bool {
        let entry = entry.trim();
        if entry.is_empty() || self.entries.last().map(String::as_str) == Some(entry) {
            return false;
        }
        self.entries.push(entry.to_string());
        self.trim();
        true
    }

    fn trim(&mut self) {
        if self.entries.len() > self.max_history_size {
            let excess = self.entries.len() - self.max_history_size;
            self.entries.drain(..excess);
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}
