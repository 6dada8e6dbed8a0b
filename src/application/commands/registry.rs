//! Command table - Built-in command definitions and lookup by name or alias

use std::collections::BTreeMap;

use super::CommandContext;
use crate::application::errors::CommandError;
use crate::domain::entities::PermissionLevel;

/// Represents a built-in bot command
pub struct Command {
    pub name: String,
    pub description: Option<String>,
    pub aliases: Vec<String>,
    pub usage: Option<String>,
    pub required_level: PermissionLevel,
    pub handler: Option<CommandHandler>,
}

/// Command handler function type. The returned text is sent back line by line.
pub type CommandHandler =
    Box<dyn Fn(&CommandContext<'_>) -> Result<String, CommandError> + Send + Sync>;

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            aliases: Vec::new(),
            usage: None,
            required_level: PermissionLevel::Regular,
            handler: None,
        }
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn with_aliases(mut self, aliases: Vec<String>) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn with_usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = Some(usage.into());
        self
    }

    pub fn with_level(mut self, level: PermissionLevel) -> Self {
        self.required_level = level;
        self
    }

    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&CommandContext<'_>) -> Result<String, CommandError> + Send + Sync + 'static,
    {
        self.handler = Some(Box::new(handler));
        self
    }

    pub fn matches(&self, input: &str) -> bool {
        let input_lower = input.to_lowercase();
        self.name.to_lowercase() == input_lower
            || self.aliases.iter().any(|a| a.to_lowercase() == input_lower)
    }

    pub fn execute(&self, ctx: &CommandContext<'_>) -> Result<String, CommandError> {
        match &self.handler {
            Some(handler) => handler(ctx),
            None => Err(CommandError::ExecutionFailed(format!(
                "Command {} is not implemented",
                self.name
            ))),
        }
    }
}

/// Command registry for managing available commands.
///
/// Built once at startup and shared read-only afterwards.
#[derive(Default)]
pub struct CommandRegistry {
    commands: BTreeMap<String, Command>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, command: Command) {
        self.commands.insert(command.name.to_lowercase(), command);
    }

    pub fn get(&self, name: &str) -> Option<&Command> {
        self.commands.get(&name.to_lowercase())
    }

    pub fn find(&self, input: &str) -> Option<&Command> {
        self.get(input)
            .or_else(|| self.commands.values().find(|c| c.matches(input)))
    }

    /// Commands in name order
    pub fn all(&self) -> impl Iterator<Item = &Command> {
        self.commands.values()
    }
}
