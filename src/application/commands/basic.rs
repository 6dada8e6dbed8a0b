//! help and say

use super::{Command, CommandContext, CommandRegistry};
use crate::application::errors::CommandError;
use crate::domain::entities::PermissionLevel;

pub fn register(registry: &mut CommandRegistry) {
    registry.register(
        Command::new("help")
            .with_description("List the commands you can use")
            .with_usage("help [command]")
            .with_handler(help),
    );

    registry.register(
        Command::new("say")
            .with_description("Repeat the given text")
            .with_usage("say <text>")
            .with_level(PermissionLevel::Regular)
            .with_handler(say),
    );
}

fn help(ctx: &CommandContext<'_>) -> Result<String, CommandError> {
    let permissions = &ctx.services.permissions;

    if let Some(name) = ctx.arg(0) {
        let name = name.trim_start_matches(ctx.prefix);
        if let Some(cmd) = ctx.commands.find(name) {
            let mut help = format!(
                "{} - {} ({})",
                ctx.prefixed(&cmd.name),
                cmd.description.as_deref().unwrap_or("No description"),
                cmd.required_level
            );
            if let Some(usage) = &cmd.usage {
                help.push_str(&format!("\nUsage: {}", ctx.prefixed(usage)));
            }
            return Ok(help);
        }
        if let Some((module, _)) = ctx
            .services
            .modules
            .module_commands()
            .into_iter()
            .find(|(_, commands)| commands.iter().any(|c| c.eq_ignore_ascii_case(name)))
        {
            return Ok(format!("{} is provided by module {}", ctx.prefixed(name), module));
        }
        return Ok(format!("Command {} not found", ctx.prefixed(name)));
    }

    let mut help = "Available commands:".to_string();
    for cmd in ctx.commands.all() {
        if !permissions.has_permission(ctx.hostmask, cmd.required_level) {
            continue;
        }
        help.push_str(&format!(
            "\n  {} - {} ({})",
            ctx.prefixed(&cmd.name),
            cmd.description.as_deref().unwrap_or(""),
            cmd.required_level
        ));
    }

    let module_commands = ctx.services.modules.module_commands();
    if !module_commands.is_empty() {
        help.push_str("\nModule commands:");
        for (module, commands) in module_commands {
            let names: Vec<String> = commands.iter().map(|c| ctx.prefixed(c)).collect();
            help.push_str(&format!("\n  {} ({})", names.join(", "), module));
        }
    }
    Ok(help)
}

fn say(ctx: &CommandContext<'_>) -> Result<String, CommandError> {
    let text = ctx.rest(0);
    if text.is_empty() {
        return Err(CommandError::InvalidArgs(format!("Usage: {}", ctx.prefixed("say <text>"))));
    }
    Ok(text)
}
