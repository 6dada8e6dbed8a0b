//! Per-channel command policy

use super::{Command, CommandContext, CommandRegistry};
use crate::application::errors::CommandError;
use crate::domain::entities::{normalize_channel, PermissionLevel};

const USAGE: &str = "channel list | info [#channel] | enable <#channel> <command> | disable <#channel> <command> | set <#channel> <key> <value> | save";

pub fn register(registry: &mut CommandRegistry) {
    registry.register(
        Command::new("channel")
            .with_description("Manage per-channel command settings")
            .with_usage(USAGE)
            .with_level(PermissionLevel::Admin)
            .with_handler(channel),
    );
}

fn usage(ctx: &CommandContext<'_>) -> CommandError {
    CommandError::InvalidArgs(format!("Usage: {}", ctx.prefixed(USAGE)))
}

/// Channel named at `index`, or the one the command was sent from
fn target_channel(ctx: &CommandContext<'_>, index: usize) -> Result<String, CommandError> {
    match ctx.arg(index) {
        Some(name) => Ok(normalize_channel(name)),
        None => ctx.channel.map(str::to_string).ok_or_else(|| usage(ctx)),
    }
}

fn channel(ctx: &CommandContext<'_>) -> Result<String, CommandError> {
    let policies = &ctx.services.channels;
    match ctx.arg(0) {
        Some("list") => {
            let channels = policies.channels();
            if channels.is_empty() {
                Ok("No channel settings configured".to_string())
            } else {
                Ok(format!("Configured channels: {}", channels.join(", ")))
            }
        }
        Some("info") => {
            let name = target_channel(ctx, 1)?;
            match policies.get(&name) {
                Some(policy) => Ok(policy.describe(&name).join("\n")),
                None => Ok(format!("No settings for {}", name)),
            }
        }
        Some(action @ ("enable" | "disable")) => {
            let (Some(name), Some(command)) = (ctx.arg(1), ctx.arg(2)) else {
                return Err(usage(ctx));
            };
            let command = command.trim_start_matches(ctx.prefix).to_lowercase();
            // Policies hold canonical names; the router checks those
            let command = ctx
                .commands
                .find(&command)
                .map(|found| found.name.clone())
                .unwrap_or(command);
            let channel = normalize_channel(name);
            if action == "enable" {
                policies.enable(&channel, &command)?;
            } else {
                policies.disable(&channel, &command)?;
            }
            Ok(format!("Command {} {}d in {}", command, action, channel))
        }
        Some("set") => {
            let (Some(name), Some(key)) = (ctx.arg(1), ctx.arg(2)) else {
                return Err(usage(ctx));
            };
            let value = ctx.rest(3);
            if value.is_empty() {
                return Err(usage(ctx));
            }
            let channel = normalize_channel(name);
            policies.set(&channel, key, &value)?;
            Ok(format!("Set {}={} in {}", key, value, channel))
        }
        Some("save") => {
            policies.save()?;
            Ok("Channel settings saved".to_string())
        }
        _ => Err(usage(ctx)),
    }
}
