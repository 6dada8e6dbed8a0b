//! Command parser - Splits prefixed chat lines into command name and arguments

/// A chat line that addressed the command prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub name: String,
    pub args: Vec<String>,
}

/// Parses chat text into commands
#[derive(Debug, Clone)]
pub struct CommandParser {
    command_prefix: String,
}

impl CommandParser {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            command_prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.command_prefix
    }

    /// Parse a command line. Returns `None` for plain chat or a bare prefix.
    pub fn parse(&self, text: &str) -> Option<ParsedCommand> {
        let text = text.trim();
        let rest = text.strip_prefix(self.command_prefix.as_str())?;
        if self.command_prefix.is_empty() {
            return None;
        }

        let mut parts = rest.split_whitespace();
        let name = parts.next()?.to_lowercase();
        let args = parts.map(str::to_string).collect();

        Some(ParsedCommand { name, args })
    }
}

const ADDRESS_PUNCTUATION: &[char] = &[',', ':', ';', '.', '!', '?'];

/// True when `text` addresses or mentions `nick` as a whole word.
///
/// Matches the bare nick, `nick:` / `nick,` style addressing, `@nick`, and the
/// nick anywhere in the line as a separate word. Case-insensitive.
pub fn contains_nick(nick: &str, text: &str) -> bool {
    if nick.is_empty() {
        return false;
    }
    let nick = nick.to_lowercase();
    let text = text.to_lowercase();

    if text.trim() == nick {
        return true;
    }

    text.split_whitespace().any(|word| {
        let word = word.strip_prefix('@').unwrap_or(word);
        word.trim_end_matches(ADDRESS_PUNCTUATION) == nick
    })
}
