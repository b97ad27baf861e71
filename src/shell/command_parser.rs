// src/shell/command_parser.rs
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,  // <
    Output, // >
}

impl Direction {
    fn from_marker(c: char) -> Option<Self> {
        match c {
            '<' => Some(Direction::Input),
            '>' => Some(Direction::Output),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirection {
    pub direction: Direction,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub argv: Vec<String>,
    pub redirections: Vec<Redirection>,
    pub background: bool,
}

impl ParsedCommand {
    /// The last redirection given for a direction wins.
    pub fn redirection(&self, direction: Direction) -> Option<&Redirection> {
        self.redirections.iter().rev().find(|r| r.direction == direction)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unbalanced quotes")]
    UnbalancedQuotes,
    #[error("syntax error: `{0}` needs a file name")]
    MissingTarget(char),
    #[error("syntax error near `{0}`")]
    UnexpectedMarker(String),
    #[error("syntax error: missing command")]
    EmptyCommand,
}

/// One whitespace-separated word of the input with its quoting intact.
#[derive(Debug)]
struct RawWord {
    text: String,
    /// The word ends in an `&` that is neither quoted nor escaped.
    trailing_amp: bool,
}

impl RawWord {
    /// Redirection marker at the start of the word. A quoted or escaped
    /// `<`/`>` starts with a quote or backslash instead and never matches.
    fn marker(&self) -> Option<Direction> {
        self.text.chars().next().and_then(Direction::from_marker)
    }
}

/// Splits on unquoted whitespace, keeping quotes and escapes in each word
/// so shell syntax can be told apart from literal text.
fn split_raw(input: &str) -> Result<Vec<RawWord>, ParseError> {
    let mut words = Vec::new();
    let mut text = String::new();
    let mut in_word = false;
    let mut trailing_amp = false;
    let mut quote: Option<char> = None;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        if quote.is_none() && c.is_whitespace() {
            if in_word {
                words.push(RawWord {
                    text: std::mem::take(&mut text),
                    trailing_amp,
                });
                in_word = false;
            }
            continue;
        }

        in_word = true;
        trailing_amp = false;
        text.push(c);
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some('"'), '\\') | (None, '\\') => text.extend(chars.next()),
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, c) => trailing_amp = c == '&',
        }
    }

    if quote.is_some() {
        return Err(ParseError::UnbalancedQuotes);
    }
    if in_word {
        words.push(RawWord { text, trailing_amp });
    }
    Ok(words)
}

/// Removes quotes and escapes from a single raw word.
fn unquote(raw: &str) -> Result<String, ParseError> {
    let words = shellwords::split(raw).map_err(|_| ParseError::UnbalancedQuotes)?;
    Ok(words.concat())
}

pub struct CommandParser;

impl CommandParser {
    /// Splits a line into arguments, `<`/`>` redirections and a trailing
    /// `&`. Quoted or escaped `<`, `>` and `&` are ordinary characters.
    /// A blank line parses to `None`.
    pub fn parse(input: &str) -> Result<Option<ParsedCommand>, ParseError> {
        let mut words = split_raw(input)?;
        if words.is_empty() {
            return Ok(None);
        }

        let mut background = false;
        if let Some(last) = words.last_mut() {
            if last.text == "&" {
                background = true;
                words.pop();
            } else if last.trailing_amp {
                background = true;
                last.text.pop();
            }
        }

        let mut argv = Vec::new();
        let mut redirections = Vec::new();
        let mut words = words.into_iter();

        while let Some(word) = words.next() {
            let Some(direction) = word.marker() else {
                argv.push(unquote(&word.text)?);
                continue;
            };
            let marker = if direction == Direction::Input { '<' } else { '>' };

            // `< file` or `<file`
            let attached = &word.text[1..];
            let target = if attached.is_empty() {
                words.next().ok_or(ParseError::MissingTarget(marker))?.text
            } else {
                attached.to_string()
            };
            if target.starts_with('<') || target.starts_with('>') {
                return Err(ParseError::UnexpectedMarker(unquote(&target)?));
            }
            redirections.push(Redirection {
                direction,
                path: unquote(&target)?,
            });
        }

        if argv.is_empty() {
            return Err(ParseError::EmptyCommand);
        }

        Ok(Some(ParsedCommand {
            argv,
            redirections,
            background,
        }))
    }
}
