//! Command prefix recognition for chat messages.
//!
//! A message is a command only when it starts with one of the configured
//! prefixes (`.` and `。` by default). Everything after the prefix is handed to
//! the dispatcher untouched apart from trimming.
use log::trace;

/// What a raw chat line turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedMessage {
    /// Text after the prefix, trimmed.
    Command(String),
    /// A bare prefix with nothing after it.
    Empty,
    /// Ordinary conversation.
    Chat,
}

/// Prefix-based command parser
#[derive(Debug, Clone)]
pub struct CommandParser {
    prefixes: Vec<String>,
}

impl CommandParser {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut prefixes: Vec<String> = prefixes
            .into_iter()
            .map(Into::into)
            .filter(|p: &String| !p.is_empty())
            .collect();
        // longest first so "!!" wins over "!"
        prefixes.sort_by(|a, b| b.len().cmp(&a.len()));
        Self { prefixes }
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    pub fn parse(&self, raw: &str) -> ParsedMessage {
        let trimmed = raw.trim_start();
        let Some(prefix) = self.prefixes.iter().find(|p| trimmed.starts_with(p.as_str())) else {
            return ParsedMessage::Chat;
        };
        let body = trimmed[prefix.len()..].trim();
        if body.is_empty() {
            trace!("Bare prefix '{}' in '{}'", prefix, raw);
            return ParsedMessage::Empty;
        }
        trace!("Parsed command '{}' from '{}'", body, raw);
        ParsedMessage::Command(body.to_string())
    }
}

impl Default for CommandParser {
    fn default() -> Self {
        Self::new([".", "。"])
    }
}
