//! Identity and flood-control administration

use super::{Command, CommandContext, CommandRegistry};
use crate::application::errors::CommandError;
use crate::application::services::RateLimitParam;
use crate::domain::entities::{nick_of, PermissionLevel};

pub fn register(registry: &mut CommandRegistry) {
    registry.register(
        Command::new("setlevel")
            .with_description("Set the permission level of a nick or hostmask")
            .with_usage("setlevel <nick|hostmask> <owner|admin|regular|badboy|ignored>")
            .with_level(PermissionLevel::Owner)
            .with_handler(setlevel),
    );

    registry.register(
        Command::new("ignore")
            .with_description("Ignore every message from a nick")
            .with_usage("ignore <nick>")
            .with_level(PermissionLevel::Admin)
            .with_handler(ignore),
    );

    registry.register(
        Command::new("unignore")
            .with_description("Stop ignoring a nick")
            .with_usage("unignore <nick>")
            .with_level(PermissionLevel::Admin)
            .with_handler(unignore),
    );

    registry.register(
        Command::new("ratelimit")
            .with_description("Show or change flood protection")
            .with_usage("ratelimit info | set <msg-window|msg-max|cmd-window|cmd-max|warning|warning-decay> <value> | reset <nick>")
            .with_level(PermissionLevel::Admin)
            .with_handler(ratelimit),
    );
}

fn usage_error(ctx: &CommandContext<'_>, name: &str) -> CommandError {
    let usage = ctx
        .commands
        .get(name)
        .and_then(|c| c.usage.clone())
        .unwrap_or_else(|| name.to_string());
    CommandError::InvalidArgs(format!("Usage: {}", ctx.prefixed(&usage)))
}

/// True when `nick` is known to belong to the verified owner
fn is_owner_nick(ctx: &CommandContext<'_>, nick: &str) -> bool {
    ctx.services
        .permissions
        .owner_hostmask()
        .map(|owner| nick_of(&owner).eq_ignore_ascii_case(nick))
        .unwrap_or(false)
}

fn setlevel(ctx: &CommandContext<'_>) -> Result<String, CommandError> {
    let (Some(target), Some(level)) = (ctx.arg(0), ctx.arg(1)) else {
        return Err(usage_error(ctx, "setlevel"));
    };
    let level: PermissionLevel = level.parse().map_err(CommandError::InvalidArgs)?;
    let permissions = &ctx.services.permissions;

    if target.contains('!') {
        if permissions.is_verified_owner(target) {
            return Err(CommandError::ExecutionFailed(
                "The owner's level cannot be changed".to_string(),
            ));
        }
        let previous = permissions.level_of(target);
        permissions.set_level(target, level)?;
        return Ok(format!(
            "Set level for {} to {} (was {})",
            target, level, previous
        ));
    }

    if is_owner_nick(ctx, target) {
        return Err(CommandError::ExecutionFailed(
            "The owner's level cannot be changed".to_string(),
        ));
    }
    let change = permissions.set_level_by_nick(target, level)?;
    let mut reply = format!("Set level for {} to {} (was {})", target, level, change.previous);
    if change.wildcard_only {
        reply.push_str(&format!("\nNo hostmask seen yet for {}; the level applies to {}!*@*", target, target));
    } else {
        reply.push_str(&format!("\nUpdated: {}", change.updated.join(", ")));
    }
    Ok(reply)
}

fn ignore(ctx: &CommandContext<'_>) -> Result<String, CommandError> {
    let Some(nick) = ctx.arg(0) else {
        return Err(usage_error(ctx, "ignore"));
    };
    if nick.eq_ignore_ascii_case(ctx.nick) {
        return Err(CommandError::ExecutionFailed("You cannot ignore yourself".to_string()));
    }
    if is_owner_nick(ctx, nick) {
        return Err(CommandError::ExecutionFailed("The owner cannot be ignored".to_string()));
    }
    let permissions = &ctx.services.permissions;
    if permissions.nick_level(nick) >= ctx.level && ctx.level < PermissionLevel::Owner {
        return Err(CommandError::ExecutionFailed(format!(
            "{} has the same or a higher level than you",
            nick
        )));
    }

    permissions.set_level_by_nick(nick, PermissionLevel::Ignored)?;
    Ok(format!("Now ignoring {}", nick))
}

fn unignore(ctx: &CommandContext<'_>) -> Result<String, CommandError> {
    let Some(nick) = ctx.arg(0) else {
        return Err(usage_error(ctx, "unignore"));
    };
    let permissions = &ctx.services.permissions;
    let ignored = permissions
        .hostmasks()
        .into_iter()
        .any(|(hostmask, level)| level == PermissionLevel::Ignored && nick_of(&hostmask).eq_ignore_ascii_case(nick));
    if !ignored {
        return Ok(format!("{} is not ignored", nick));
    }

    permissions.set_level_by_nick(nick, PermissionLevel::Regular)?;
    ctx.services.rate_limiter.reset_nick(nick);
    Ok(format!("No longer ignoring {}", nick))
}

fn ratelimit(ctx: &CommandContext<'_>) -> Result<String, CommandError> {
    let limiter = &ctx.services.rate_limiter;
    match ctx.arg(0).unwrap_or("info") {
        "info" => {
            let settings = limiter.settings();
            Ok(format!(
                "Rate limits:\n  Messages: {} per {}s (msg-max, msg-window)\n  Commands: {} per {}s (cmd-max, cmd-window)\n  Warnings before ignore: {} (warning)\n  Warnings forgotten after {}s quiet (warning-decay)\n  Tracked identities: {}",
                settings.max_messages,
                settings.message_window.as_secs(),
                settings.max_commands,
                settings.command_window.as_secs(),
                settings.warning_threshold,
                settings.warning_decay.as_secs(),
                limiter.tracked()
            ))
        }
        "set" => {
            let (Some(param), Some(value)) = (ctx.arg(1), ctx.arg(2)) else {
                return Err(usage_error(ctx, "ratelimit"));
            };
            let parsed: RateLimitParam = param.parse().map_err(CommandError::InvalidArgs)?;
            let value: u64 = value
                .parse()
                .map_err(|_| CommandError::InvalidArgs(format!("Invalid value: {}", value)))?;
            limiter.update(parsed, value).map_err(CommandError::InvalidArgs)?;
            Ok(format!("Rate limit {} set to {}", param, value))
        }
        "reset" => {
            let Some(nick) = ctx.arg(1) else {
                return Err(usage_error(ctx, "ratelimit"));
            };
            let cleared = limiter.reset_nick(nick);
            Ok(format!("Rate limit records reset for {} ({} cleared)", nick, cleared))
        }
        _ => Err(usage_error(ctx, "ratelimit")),
    }
}
