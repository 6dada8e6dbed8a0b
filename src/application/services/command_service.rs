//! Command router - Decides whether and how a prefixed chat line runs

use std::sync::Arc;

use super::{Flood, Verdict};
use crate::application::commands::{register_defaults, CommandContext, CommandRegistry, Services};
use crate::application::errors::CommandError;
use crate::application::messaging::CommandParser;
use crate::domain::entities::{is_channel_name, nick_of, Message, PermissionLevel};
use crate::domain::traits::ClientHandle;

/// How a chat line was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// No prefix or no user sender
    NotCommand,
    /// Sender is Ignored; nothing was sent
    Ignored,
    /// Sender crossed the warning threshold and is now Ignored
    Demoted,
    /// Channel policy rejects the command; nothing was sent
    Dropped,
    /// Level too low; a denial was sent
    Denied,
    Executed,
    /// Handler returned an error, which was sent as the reply
    Failed,
    /// A loaded module took the command
    Module,
    Unknown,
}

/// Routes commands through flood control, channel policy and permissions
pub struct CommandRouter {
    parser: CommandParser,
    commands: CommandRegistry,
    services: Arc<Services>,
}

fn reply(client: &ClientHandle, target: &str, text: &str) {
    if let Err(e) = client.privmsg(target, text) {
        tracing::warn!("Failed to reply to {}: {}", target, e);
    }
}

impl CommandRouter {
    /// Router with the built-in commands registered
    pub fn new(prefix: impl Into<String>, services: Arc<Services>) -> Self {
        let mut commands = CommandRegistry::new();
        register_defaults(&mut commands);
        Self::with_commands(prefix, commands, services)
    }

    pub fn with_commands(prefix: impl Into<String>, commands: CommandRegistry, services: Arc<Services>) -> Self {
        Self {
            parser: CommandParser::new(prefix),
            commands,
            services,
        }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Handle one PRIVMSG that may carry a command
    pub fn route(&self, client: &ClientHandle, msg: &Message) -> RouteOutcome {
        let Some(parsed) = self.parser.parse(msg.trailing()) else {
            return RouteOutcome::NotCommand;
        };
        let Some(hostmask) = msg.source_hostmask() else {
            return RouteOutcome::NotCommand;
        };
        let nick = msg.source_nick();
        let channel = msg.param(0).filter(|t| is_channel_name(t));
        let reply_to = channel.unwrap_or(nick);

        let permissions = &self.services.permissions;
        let level = permissions.level_of(&hostmask);
        if level == PermissionLevel::Ignored {
            tracing::debug!(%hostmask, command = %parsed.name, "Dropping command from ignored sender");
            return RouteOutcome::Ignored;
        }

        let (verdict, flood) = self
            .services
            .rate_limiter
            .check_command_line(&hostmask, &parsed.name);
        if self.enforce(client, &hostmask, reply_to, verdict, flood) {
            return RouteOutcome::Demoted;
        }

        let Some(command) = self.commands.find(&parsed.name) else {
            if let Some(channel) = channel {
                if !self.services.channels.allows(channel, &parsed.name) {
                    tracing::debug!(channel, command = %parsed.name, "Module command disabled in channel");
                    return RouteOutcome::Dropped;
                }
            }
            if self
                .services
                .modules
                .handle_command(client.as_ref(), msg, &parsed.name, &parsed.args)
            {
                return RouteOutcome::Module;
            }
            tracing::debug!(command = %parsed.name, "Unknown command");
            return RouteOutcome::Unknown;
        };

        if let Some(channel) = channel {
            if !self.services.channels.allows(channel, &command.name) {
                tracing::debug!(channel, command = %command.name, "Command disabled in channel");
                return RouteOutcome::Dropped;
            }
        }

        if !permissions.has_permission(&hostmask, command.required_level) {
            let denied = CommandError::PermissionDenied {
                command: command.name.clone(),
                required: command.required_level,
                current: level,
            };
            tracing::info!(%hostmask, command = %command.name, "Permission denied");
            reply(client, reply_to, &denied.to_string());
            return RouteOutcome::Denied;
        }

        let ctx = CommandContext {
            nick,
            hostmask: &hostmask,
            level,
            reply_to,
            channel,
            args: &parsed.args,
            prefix: self.parser.prefix(),
            client,
            services: &self.services,
            commands: &self.commands,
        };

        tracing::info!(%hostmask, command = %command.name, "Executing command");
        match command.execute(&ctx) {
            Ok(text) => {
                if !text.is_empty() {
                    reply(client, reply_to, &text);
                }
                RouteOutcome::Executed
            }
            Err(e) => {
                tracing::warn!(command = %command.name, "Command failed: {}", e);
                reply(client, reply_to, &e.to_string());
                RouteOutcome::Failed
            }
        }
    }

    /// Flood check for a plain chat line. Returns true when the sender was demoted.
    pub fn check_message_flood(&self, client: &ClientHandle, msg: &Message) -> bool {
        let Some(hostmask) = msg.source_hostmask() else {
            return false;
        };
        let reply_to = msg.param(0).filter(|t| is_channel_name(t)).unwrap_or(msg.source_nick());
        let verdict = self.services.rate_limiter.check_message(&hostmask);
        self.enforce(client, &hostmask, reply_to, verdict, Flood::Messages)
    }

    /// Warn or demote per the verdict. Returns true when the sender was demoted.
    fn enforce(&self, client: &ClientHandle, hostmask: &str, reply_to: &str, verdict: Verdict, flood: Flood) -> bool {
        match verdict {
            Verdict::Allowed => false,
            Verdict::Warned { warnings, threshold, count } => {
                tracing::warn!(%hostmask, count, warnings, "Rate limit exceeded ({})", flood.as_str());
                let nick = nick_of(hostmask);
                let warning = format!(
                    "Warning {}/{}: you sent {} {} too quickly. Slow down or you will be ignored.",
                    warnings,
                    threshold,
                    count,
                    flood.as_str()
                );
                if let Err(e) = client.notice(nick, &warning) {
                    tracing::warn!("Failed to warn {}: {}", nick, e);
                }
                false
            }
            Verdict::Demote { count } => {
                self.demote(client, hostmask, reply_to, &format!("{} {}", count, flood.as_str()));
                true
            }
        }
    }

    /// Ignore exactly this hostmask. A failed save keeps the in-memory demotion.
    fn demote(&self, client: &ClientHandle, hostmask: &str, reply_to: &str, what: &str) {
        if let Err(e) = self
            .services
            .permissions
            .set_level(hostmask, PermissionLevel::Ignored)
        {
            tracing::error!(%hostmask, "Failed to persist automatic ignore: {}", e);
        }
        self.services.rate_limiter.reset_user(hostmask);
        tracing::warn!(%hostmask, "Automatically ignored for flooding ({})", what);

        let nick = nick_of(hostmask);
        reply(
            client,
            reply_to,
            &format!("{} has been ignored for flooding ({} within the rate limit window)", nick, what),
        );
    }
}
