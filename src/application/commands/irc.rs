//! Channel operator and connection control
//!
//! Channel commands act on a leading `#channel` argument when one is given,
//! otherwise on the channel the command was sent from. Most of them only queue
//! protocol lines and reply with nothing; the server's answer arrives as an
//! ordinary event.

use super::{Command, CommandContext, CommandRegistry};
use crate::application::errors::CommandError;
use crate::domain::entities::{cmd, is_channel_name, normalize_channel, PermissionLevel};

/// Member mode commands: name, mode change, description, whether the target is a ban mask
const MEMBER_MODES: &[(&str, &str, &str, bool)] = &[
    ("op", "+o", "Give channel operator status", false),
    ("deop", "-o", "Take channel operator status", false),
    ("voice", "+v", "Give voice", false),
    ("devoice", "-v", "Take voice", false),
    ("ban", "+b", "Ban a nick or mask", true),
    ("unban", "-b", "Lift a ban", true),
    ("mute", "+q", "Quiet a nick or mask", true),
    ("unmute", "-q", "Lift a quiet", true),
];

pub fn register(registry: &mut CommandRegistry) {
    for &(name, mode, description, as_mask) in MEMBER_MODES {
        registry.register(
            Command::new(name)
                .with_description(description)
                .with_usage(member_usage(name, as_mask))
                .with_level(PermissionLevel::Admin)
                .with_handler(move |ctx| member_mode(ctx, name, mode, as_mask)),
        );
    }

    registry.register(
        Command::new("kick")
            .with_description("Kick a nick from the channel")
            .with_usage("kick [#channel] <nick> [reason]")
            .with_level(PermissionLevel::Admin)
            .with_handler(kick),
    );
    registry.register(
        Command::new("invite")
            .with_description("Invite a nick to a channel")
            .with_usage("invite <nick> [#channel]")
            .with_level(PermissionLevel::Admin)
            .with_handler(invite),
    );
    registry.register(
        Command::new("topic")
            .with_description("Show or change the channel topic")
            .with_usage("topic [#channel] [text]")
            .with_level(PermissionLevel::Admin)
            .with_handler(topic),
    );
    registry.register(
        Command::new("mode")
            .with_description("Send a raw mode change")
            .with_usage("mode <target> [modes] [args]")
            .with_level(PermissionLevel::Admin)
            .with_handler(mode),
    );
    registry.register(
        Command::new("join")
            .with_description("Join a channel")
            .with_usage("join <#channel> [key]")
            .with_level(PermissionLevel::Admin)
            .with_handler(join),
    );
    registry.register(
        Command::new("part")
            .with_description("Leave a channel")
            .with_usage("part [#channel] [reason]")
            .with_level(PermissionLevel::Admin)
            .with_handler(part),
    );
    registry.register(
        Command::new("msg")
            .with_description("Send a message to a nick or channel")
            .with_usage("msg <target> <text>")
            .with_level(PermissionLevel::Admin)
            .with_handler(|ctx| relay(ctx, cmd::PRIVMSG, "msg <target> <text>")),
    );
    registry.register(
        Command::new("notice")
            .with_description("Send a notice to a nick or channel")
            .with_usage("notice <target> <text>")
            .with_level(PermissionLevel::Admin)
            .with_handler(|ctx| relay(ctx, cmd::NOTICE, "notice <target> <text>")),
    );
    registry.register(
        Command::new("action")
            .with_description("Act out the given text")
            .with_usage("action <text>")
            .with_handler(action),
    );
    registry.register(
        Command::new("whois")
            .with_description("Ask the server about a nick")
            .with_usage("whois <nick>")
            .with_handler(whois),
    );
    registry.register(
        Command::new("nick")
            .with_description("Change the bot's nickname")
            .with_usage("nick <new-nick>")
            .with_level(PermissionLevel::Owner)
            .with_handler(nick),
    );
    registry.register(
        Command::new("restart")
            .with_description("Reconnect to the server")
            .with_usage("restart")
            .with_level(PermissionLevel::Owner)
            .with_handler(restart),
    );
    registry.register(
        Command::new("die")
            .with_description("Disconnect and stop the bot")
            .with_usage("die [message]")
            .with_level(PermissionLevel::Owner)
            .with_handler(die),
    );
}

fn member_usage(name: &str, as_mask: bool) -> String {
    let target = if as_mask { "nick|mask" } else { "nick" };
    format!("{} [#channel] <{}>", name, target)
}

fn usage(ctx: &CommandContext<'_>, usage: &str) -> CommandError {
    CommandError::InvalidArgs(format!("Usage: {}", ctx.prefixed(usage)))
}

/// Queue one line; handlers return the empty reply so nothing else is sent
fn send(ctx: &CommandContext<'_>, line: &str) -> Result<String, CommandError> {
    ctx.client
        .send_raw(line)
        .map_err(|e| CommandError::ExecutionFailed(e.to_string()))?;
    Ok(String::new())
}

/// Leading `#channel` argument, else the channel the command came from.
/// Also returns the index of the first argument after the channel.
fn target_channel<'a>(ctx: &CommandContext<'a>) -> Option<(&'a str, usize)> {
    match ctx.arg(0) {
        Some(first) if is_channel_name(first) => Some((first, 1)),
        _ => ctx.channel.map(|channel| (channel, 0)),
    }
}

/// A bare nick becomes `nick!*@*`
fn ban_mask(target: &str) -> String {
    if target.contains('!') || target.contains('@') {
        target.to_string()
    } else {
        format!("{}!*@*", target)
    }
}

fn member_mode(ctx: &CommandContext<'_>, name: &str, mode: &str, as_mask: bool) -> Result<String, CommandError> {
    let (channel, next) = target_channel(ctx).ok_or_else(|| usage(ctx, &member_usage(name, as_mask)))?;
    let target = ctx
        .arg(next)
        .ok_or_else(|| usage(ctx, &member_usage(name, as_mask)))?;
    let target = if as_mask { ban_mask(target) } else { target.to_string() };

    tracing::info!(channel, mode, %target, by = ctx.nick, "Changing member mode");
    send(ctx, &format!("{} {} {} {}", cmd::MODE, channel, mode, target))
}

fn kick(ctx: &CommandContext<'_>) -> Result<String, CommandError> {
    const USAGE: &str = "kick [#channel] <nick> [reason]";
    let (channel, next) = target_channel(ctx).ok_or_else(|| usage(ctx, USAGE))?;
    let victim = ctx.arg(next).ok_or_else(|| usage(ctx, USAGE))?;
    let mut reason = ctx.rest(next + 1);
    if reason.is_empty() {
        reason = format!("Kicked by {}", ctx.nick);
    }

    tracing::info!(channel, victim, by = ctx.nick, "Kicking");
    send(ctx, &format!("{} {} {} :{}", cmd::KICK, channel, victim, reason))
}

fn invite(ctx: &CommandContext<'_>) -> Result<String, CommandError> {
    const USAGE: &str = "invite <nick> [#channel]";
    let invitee = ctx.arg(0).ok_or_else(|| usage(ctx, USAGE))?;
    let channel = ctx
        .arg(1)
        .filter(|c| is_channel_name(c))
        .or(ctx.channel)
        .ok_or_else(|| usage(ctx, USAGE))?;
    send(ctx, &format!("{} {} {}", cmd::INVITE, invitee, channel))
}

fn topic(ctx: &CommandContext<'_>) -> Result<String, CommandError> {
    let (channel, next) = target_channel(ctx).ok_or_else(|| usage(ctx, "topic [#channel] [text]"))?;
    let text = ctx.rest(next);
    if text.is_empty() {
        send(ctx, &format!("{} {}", cmd::TOPIC, channel))
    } else {
        send(ctx, &format!("{} {} :{}", cmd::TOPIC, channel, text))
    }
}

fn mode(ctx: &CommandContext<'_>) -> Result<String, CommandError> {
    let target = ctx
        .arg(0)
        .ok_or_else(|| usage(ctx, "mode <target> [modes] [args]"))?;
    let modes = ctx.rest(1);
    if modes.is_empty() {
        send(ctx, &format!("{} {}", cmd::MODE, target))
    } else {
        send(ctx, &format!("{} {} {}", cmd::MODE, target, modes))
    }
}

fn join(ctx: &CommandContext<'_>) -> Result<String, CommandError> {
    let channel = ctx
        .arg(0)
        .map(normalize_channel)
        .ok_or_else(|| usage(ctx, "join <#channel> [key]"))?;
    tracing::info!(%channel, by = ctx.nick, "Joining on request");
    match ctx.arg(1) {
        Some(key) => send(ctx, &format!("{} {} {}", cmd::JOIN, channel, key)),
        None => send(ctx, &format!("{} {}", cmd::JOIN, channel)),
    }
}

fn part(ctx: &CommandContext<'_>) -> Result<String, CommandError> {
    let (channel, next) = target_channel(ctx).ok_or_else(|| usage(ctx, "part [#channel] [reason]"))?;
    let mut reason = ctx.rest(next);
    if reason.is_empty() {
        reason = "Leaving".to_string();
    }
    tracing::info!(channel, by = ctx.nick, "Leaving on request");
    send(ctx, &format!("{} {} :{}", cmd::PART, channel, reason))
}

fn relay(ctx: &CommandContext<'_>, verb: &str, usage_text: &str) -> Result<String, CommandError> {
    let target = ctx.arg(0).ok_or_else(|| usage(ctx, usage_text))?;
    let text = ctx.rest(1);
    if text.is_empty() {
        return Err(usage(ctx, usage_text));
    }
    send(ctx, &format!("{} {} :{}", verb, target, text))
}

fn action(ctx: &CommandContext<'_>) -> Result<String, CommandError> {
    let text = ctx.rest(0);
    if text.is_empty() {
        return Err(usage(ctx, "action <text>"));
    }
    send(ctx, &format!("{} {} :\x01ACTION {}\x01", cmd::PRIVMSG, ctx.reply_to, text))
}

fn whois(ctx: &CommandContext<'_>) -> Result<String, CommandError> {
    let who = ctx.arg(0).ok_or_else(|| usage(ctx, "whois <nick>"))?;
    send(ctx, &format!("{} {}", cmd::WHOIS, who))
}

fn nick(ctx: &CommandContext<'_>) -> Result<String, CommandError> {
    let new_nick = ctx.arg(0).ok_or_else(|| usage(ctx, "nick <new-nick>"))?;
    // The client's nick follows the server's NICK echo, not the request
    send(ctx, &format!("{} {}", cmd::NICK, new_nick))
}

fn restart(ctx: &CommandContext<'_>) -> Result<String, CommandError> {
    let reason = format!("Restarting as requested by {}", ctx.nick);
    tracing::warn!(by = ctx.nick, "Restart requested");
    ctx.client
        .privmsg(ctx.reply_to, &reason)
        .and_then(|_| ctx.client.quit(&reason))
        .map_err(|e| CommandError::ExecutionFailed(e.to_string()))?;
    Ok(String::new())
}

fn die(ctx: &CommandContext<'_>) -> Result<String, CommandError> {
    let mut reason = ctx.rest(0);
    if reason.is_empty() {
        reason = format!("Shutting down as requested by {}", ctx.nick);
    }
    tracing::warn!(by = ctx.nick, "Shutdown requested");
    ctx.services.shutdown.send_replace(true);
    ctx.client
        .privmsg(ctx.reply_to, &reason)
        .and_then(|_| ctx.client.quit(&reason))
        .map_err(|e| CommandError::ExecutionFailed(e.to_string()))?;
    Ok(String::new())
}

#[cfg(test)]
mod tests {
    use super::super::testing::{Fixture, ADMIN, OWNER, REGULAR};
    use crate::application::errors::CommandError;
    use crate::domain::entities::PermissionLevel;

    #[test]
    fn member_modes_use_named_or_current_channel() {
        let fixture = Fixture::new();
        assert_eq!(fixture.run(ADMIN, Some("#rust"), "op dave").unwrap(), "");
        fixture.run(ADMIN, None, "devoice #ops erin").unwrap();
        assert_eq!(fixture.recorder.take(), vec!["MODE #rust +o dave", "MODE #ops -v erin"]);

        assert!(matches!(
            fixture.run(ADMIN, None, "op dave"),
            Err(CommandError::InvalidArgs(_))
        ));
        assert!(fixture.run(ADMIN, Some("#rust"), "voice").is_err());
        assert!(fixture.recorder.sent().is_empty());
    }

    #[test]
    fn bans_and_mutes_expand_bare_nicks() {
        let fixture = Fixture::new();
        fixture.run(ADMIN, Some("#rust"), "ban spammer").unwrap();
        fixture.run(ADMIN, Some("#rust"), "unban *!*@bad.host").unwrap();
        fixture.run(ADMIN, Some("#rust"), "mute troll").unwrap();
        fixture.run(ADMIN, Some("#rust"), "unmute troll!t@x").unwrap();
        assert_eq!(
            fixture.recorder.take(),
            vec![
                "MODE #rust +b spammer!*@*",
                "MODE #rust -b *!*@bad.host",
                "MODE #rust +q troll!*@*",
                "MODE #rust -q troll!t@x",
            ]
        );
    }

    #[test]
    fn kick_defaults_reason_to_the_kicker() {
        let fixture = Fixture::new();
        fixture.run(ADMIN, Some("#rust"), "kick dave").unwrap();
        fixture.run(ADMIN, None, "kick #ops dave go cool off").unwrap();
        assert_eq!(
            fixture.recorder.take(),
            vec!["KICK #rust dave :Kicked by bob", "KICK #ops dave :go cool off"]
        );
    }

    #[test]
    fn topic_invite_and_mode() {
        let fixture = Fixture::new();
        fixture.run(ADMIN, Some("#rust"), "topic").unwrap();
        fixture.run(ADMIN, None, "topic #rust Release day").unwrap();
        fixture.run(ADMIN, Some("#rust"), "invite dave").unwrap();
        fixture.run(ADMIN, None, "invite dave #ops").unwrap();
        fixture.run(ADMIN, None, "mode #rust +m").unwrap();
        fixture.run(ADMIN, None, "mode #rust").unwrap();
        assert_eq!(
            fixture.recorder.take(),
            vec![
                "TOPIC #rust",
                "TOPIC #rust :Release day",
                "INVITE dave #rust",
                "INVITE dave #ops",
                "MODE #rust +m",
                "MODE #rust",
            ]
        );
        assert!(fixture.run(ADMIN, None, "invite dave").is_err());
    }

    #[test]
    fn join_and_part() {
        let fixture = Fixture::new();
        fixture.run(ADMIN, None, "join #new secret").unwrap();
        fixture.run(ADMIN, None, "join rust").unwrap();
        fixture.run(ADMIN, Some("#rust"), "part").unwrap();
        fixture.run(ADMIN, None, "part #new see you").unwrap();
        assert_eq!(
            fixture.recorder.take(),
            vec!["JOIN #new secret", "JOIN #rust", "PART #rust :Leaving", "PART #new :see you"]
        );
        assert!(fixture.run(ADMIN, None, "part").is_err());
    }

    #[test]
    fn relays_actions_and_whois() {
        let fixture = Fixture::new();
        fixture.run(ADMIN, None, "msg #rust hello from afar").unwrap();
        fixture.run(ADMIN, None, "notice dave heads up").unwrap();
        fixture.run(REGULAR, Some("#rust"), "action waves").unwrap();
        fixture.run(REGULAR, None, "whois dave").unwrap();
        assert_eq!(
            fixture.recorder.take(),
            vec![
                "PRIVMSG #rust :hello from afar",
                "NOTICE dave :heads up",
                "PRIVMSG #rust :\x01ACTION waves\x01",
                "WHOIS dave",
            ]
        );
        assert!(fixture.run(ADMIN, None, "msg dave").is_err());
    }

    #[test]
    fn nick_waits_for_the_server() {
        let fixture = Fixture::new();
        fixture.run(OWNER, None, "nick mbot2").unwrap();
        assert_eq!(fixture.recorder.take(), vec!["NICK mbot2"]);
        assert_eq!(fixture.client.current_nick(), "mbot");
    }

    #[test]
    fn die_quits_and_requests_shutdown() {
        let fixture = Fixture::new();
        fixture.run(OWNER, Some("#rust"), "die").unwrap();
        assert_eq!(
            fixture.recorder.take(),
            vec![
                "PRIVMSG #rust :Shutting down as requested by alice",
                "QUIT :Shutting down as requested by alice",
            ]
        );
        assert!(*fixture.services.shutdown.borrow());
    }

    #[test]
    fn restart_quits_without_shutdown() {
        let fixture = Fixture::new();
        fixture.run(OWNER, None, "restart").unwrap();
        assert_eq!(
            fixture.recorder.take(),
            vec![
                "PRIVMSG alice :Restarting as requested by alice",
                "QUIT :Restarting as requested by alice",
            ]
        );
        assert!(!*fixture.services.shutdown.borrow());
    }

    #[test]
    fn levels_follow_the_command_table() {
        let fixture = Fixture::new();
        for (name, level) in [
            ("op", PermissionLevel::Admin),
            ("ban", PermissionLevel::Admin),
            ("join", PermissionLevel::Admin),
            ("msg", PermissionLevel::Admin),
            ("action", PermissionLevel::Regular),
            ("whois", PermissionLevel::Regular),
            ("nick", PermissionLevel::Owner),
            ("die", PermissionLevel::Owner),
            ("restart", PermissionLevel::Owner),
        ] {
            assert_eq!(fixture.commands.find(name).unwrap().required_level, level, "{}", name);
        }
    }
}
