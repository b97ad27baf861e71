mod history;

use self::history::History;
use crate::config::Config;
use anyhow::Result;
use colored::*;
use log::warn;
use rustyline::error::ReadlineError;
use rustyline::{Config as EditorConfig, DefaultEditor, EditMode};
use std::env;
use std::path::Path;

/// Interactive line input with prompt and history.
pub struct Terminal {
    editor: DefaultEditor,
    history: History,
    line_number: usize,
    user: String,
    host: String,
}

impl Terminal {
    pub fn new(config: &Config) -> Result<Self> {
        let editor_config = EditorConfig::builder()
            .edit_mode(EditMode::Emacs)
            .auto_add_history(false)
            .build();
        let mut editor = DefaultEditor::with_config(editor_config)?;

        let mut history = History::new(config.history_file.clone(), config.history_size);
        if let Err(e) = history.load() {
            warn!("Failed to load history: {:#}", e);
        }
        for entry in history.entries() {
            editor.add_history_entry(entry.as_str())?;
        }

        Ok(Terminal {
            editor,
            history,
            line_number: 0,
            user: env::var("USER").unwrap_or_else(|_| "user".to_string()),
            host: hostname::get()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "localhost".to_string()),
        })
    }

    /// Reads one line. `None` means end of input; an interrupted read
    /// yields an empty line.
    pub fn read_line(&mut self) -> Result<Option<String>> {
        let prompt = self.create_prompt();
        self.line_number += 1;

        let line = match self.editor.readline(&prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => return Ok(Some(String::new())),
            Err(ReadlineError::Eof) => return Ok(None),
            Err(err) => return Err(anyhow::anyhow!("Error reading input: {}", err)),
        };

        if self.history.add(&line) {
            self.editor.add_history_entry(line.trim())?;
        }
        Ok(Some(line))
    }

    fn create_prompt(&self) -> String {
        let cwd = env::current_dir().unwrap_or_default();
        let path = shorten_path(&cwd, dirs::home_dir().as_deref());
        format!(
            "{}{}{} {}{}",
            self.user.bright_green(),
            "@".bright_blue(),
            self.host.bright_cyan(),
            format!("{} {}", self.line_number, path).yellow(),
            "# ".yellow(),
        )
    }
}

fn shorten_path(path: &Path, home: Option<&Path>) -> String {
    match home.and_then(|home| path.strip_prefix(home).ok()) {
        Some(rest) if rest.as_os_str().is_empty() => "~".to_string(),
        Some(rest) => format!("~/{}", rest.display()),
        None => path.display().to_string(),
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        if let Err(e) = self.history.save() {
            warn!("Failed to save history: {:#}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shorten_path() {
        let home = Path::new("/home/ada");
        assert_eq!(shorten_path(Path::new("/home/ada"), Some(home)), "~");
        assert_eq!(shorten_path(Path::new("/home/ada/src"), Some(home)), "~/src");
        assert_eq!(shorten_path(Path::new("/tmp"), Some(home)), "/tmp");
        assert_eq!(shorten_path(Path::new("/tmp"), None), "/tmp");
    }
}
