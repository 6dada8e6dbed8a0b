//! Event dispatcher - Protocol bookkeeping, then fan-out to loaded modules

use std::sync::Arc;
use std::time::Duration;

use super::parser::contains_nick;
use crate::application::errors::VerificationError;
use crate::application::services::verification::{
    CHALLENGE_LINES, MISMATCH_LINES, PERSIST_FAILED_LINE, SUCCESS_FOOTER, SUCCESS_LINES,
};
use crate::application::services::{CommandRouter, OwnerVerification, RouteOutcome};
use crate::domain::entities::{cmd, is_channel_name, EventKind, Message, PermissionLevel};
use crate::domain::traits::{Client, ClientHandle};
use crate::infrastructure::plugins::ModuleEntry;
use crate::plugins::Capability;

/// Connection details the dispatcher acts on
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub channels: Vec<String>,
    /// Sent to NickServ after registration
    pub password: Option<String>,
    /// Wait between registration and the owner challenge
    pub verification_delay: Duration,
}

/// Routes every inbound event
pub struct EventDispatcher {
    router: CommandRouter,
    verification: Arc<OwnerVerification>,
    session: SessionConfig,
}

fn send(client: &dyn Client, line: &str) {
    if let Err(e) = client.send_raw(line) {
        tracing::warn!("Failed to send {:?}: {}", line, e);
    }
}

fn say(client: &dyn Client, target: &str, text: &str) {
    if let Err(e) = client.privmsg(target, text) {
        tracing::warn!("Failed to message {}: {}", target, e);
    }
}

/// Send the owner challenge, one line per message
pub fn send_challenge(client: &dyn Client, nick: &str) {
    tracing::info!(nick, "Sending owner verification challenge");
    for line in CHALLENGE_LINES {
        say(client, nick, line);
    }
}

fn capability_for(kind: EventKind) -> Option<Capability> {
    match kind {
        EventKind::ChatLine => Some(Capability::ChatLine),
        EventKind::Join => Some(Capability::Join),
        EventKind::Part => Some(Capability::Part),
        EventKind::Quit => Some(Capability::Quit),
        EventKind::Kick => Some(Capability::Kick),
        EventKind::TopicChange => Some(Capability::TopicChange),
        EventKind::NickChange => Some(Capability::NickChange),
        EventKind::Invite => Some(Capability::Invite),
        EventKind::Notice => Some(Capability::Notice),
        EventKind::ModeChange => Some(Capability::ModeChange),
        EventKind::Error => Some(Capability::Error),
        EventKind::Other => None,
    }
}

fn deliver(entry: &ModuleEntry, capability: Capability, client: &dyn Client, msg: &Message) {
    let module = entry.module();
    match capability {
        Capability::ChatLine => module.on_chat_line(client, msg),
        Capability::DirectMention => module.on_direct_mention(client, msg),
        Capability::Join => module.on_join(client, msg),
        Capability::Part => module.on_part(client, msg),
        Capability::Quit => module.on_quit(client, msg),
        Capability::Kick => module.on_kick(client, msg),
        Capability::TopicChange => module.on_topic_change(client, msg),
        Capability::NickChange => module.on_nick_change(client, msg),
        Capability::Invite => module.on_invite(client, msg),
        Capability::Notice => module.on_notice(client, msg),
        Capability::ModeChange => module.on_mode_change(client, msg),
        Capability::Error => module.on_error(client, msg),
        Capability::Commands => {}
    }
}

impl EventDispatcher {
    pub fn new(router: CommandRouter, verification: Arc<OwnerVerification>, session: SessionConfig) -> Self {
        Self {
            router,
            verification,
            session,
        }
    }

    /// Handle one inbound event
    pub fn dispatch(&self, client: &ClientHandle, msg: &Message) {
        tracing::trace!(id = %msg.id, kind = msg.kind().as_str(), received = %msg.timestamp, "Dispatching {}", msg.command);
        let sender_ignored = msg
            .source_hostmask()
            .map(|h| self.router.services().permissions.level_of(&h) == PermissionLevel::Ignored)
            .unwrap_or(false);

        let fan_out = match msg.command.as_str() {
            cmd::PRIVMSG => !sender_ignored && self.handle_privmsg(client, msg),
            _ => {
                self.bookkeeping(client, msg);
                !sender_ignored
            }
        };

        if fan_out {
            self.fan_out(client.as_ref(), msg);
        }
    }

    fn bookkeeping(&self, handle: &ClientHandle, msg: &Message) {
        let client = handle.as_ref();
        let nick = msg.source_nick();
        match msg.command.as_str() {
            cmd::PING => send(client, &format!("{} :{}", cmd::PONG, msg.trailing())),
            cmd::RPL_WELCOME => {
                if let Some(assigned) = msg.param(0) {
                    client.set_nick(assigned);
                }
                tracing::info!("Registered as {}", client.current_nick());
                if let Some(password) = &self.session.password {
                    say(client, "NickServ", &format!("IDENTIFY {}", password));
                }
            }
            cmd::RPL_ENDOFMOTD | cmd::ERR_NOMOTD => {
                for channel in &self.session.channels {
                    tracing::info!("Joining {}", channel);
                    if let Err(e) = client.join(channel) {
                        tracing::warn!("Failed to join {}: {}", channel, e);
                    }
                }
                self.schedule_challenge(handle);
            }
            cmd::ERR_NICKNAMEINUSE => {
                let taken = msg.param(1).map(str::to_string).unwrap_or_else(|| client.current_nick());
                let next = format!("{}_", taken);
                tracing::warn!("Nickname {} is in use, trying {}", taken, next);
                send(client, &format!("{} {}", cmd::NICK, next));
                client.set_nick(&next);
            }
            cmd::NICK => {
                let new_nick = msg.trailing();
                if nick.eq_ignore_ascii_case(&client.current_nick()) {
                    client.set_nick(new_nick);
                    tracing::info!("Now known as {}", new_nick);
                } else {
                    tracing::info!("{} is now known as {}", nick, new_nick);
                }
            }
            cmd::JOIN => {
                let channel = msg.param(0).unwrap_or_default();
                if nick.eq_ignore_ascii_case(&client.current_nick()) {
                    tracing::info!("Joined {}", channel);
                } else {
                    tracing::info!("{} joined {}", nick, channel);
                }
            }
            cmd::PART => tracing::info!(
                "{} left {} ({})",
                nick,
                msg.param(0).unwrap_or_default(),
                msg.param(1).unwrap_or("")
            ),
            cmd::QUIT => tracing::info!("{} quit ({})", nick, msg.trailing()),
            cmd::KICK => tracing::info!(
                "{} kicked {} from {} ({})",
                nick,
                msg.param(1).unwrap_or_default(),
                msg.param(0).unwrap_or_default(),
                msg.param(2).unwrap_or("")
            ),
            cmd::TOPIC => tracing::info!(
                "{} changed the topic of {} to: {}",
                nick,
                msg.param(0).unwrap_or_default(),
                msg.trailing()
            ),
            cmd::RPL_TOPIC => tracing::info!(
                "Topic for {}: {}",
                msg.param(1).unwrap_or_default(),
                msg.trailing()
            ),
            cmd::INVITE => tracing::info!(
                "{} invited us to {}",
                nick,
                msg.param(1).unwrap_or_default()
            ),
            cmd::MODE => {
                for line in describe_mode_change(msg) {
                    tracing::info!("{}", line);
                }
            }
            cmd::NOTICE => tracing::debug!("-{}- {}", nick, msg.trailing()),
            cmd::ERROR => tracing::error!("Server error: {}", msg.trailing()),
            cmd::ERR_BANNEDFROMCHAN
            | cmd::ERR_CHANNELISFULL
            | cmd::ERR_INVITEONLYCHAN
            | cmd::ERR_BADCHANNELKEY => tracing::warn!(
                "Cannot join {}: {}",
                msg.param(1).unwrap_or_default(),
                msg.trailing()
            ),
            cmd::RPL_LOGGEDIN => tracing::info!("Logged in: {}", msg.trailing()),
            _ => tracing::trace!("{} {}", msg.command, msg.params.join(" ")),
        }
    }

    /// Returns whether modules should see the line
    fn handle_privmsg(&self, client: &ClientHandle, msg: &Message) -> bool {
        let nick = msg.source_nick();
        let target = msg.param(0).unwrap_or_default();
        let text = msg.trailing();
        let is_private = !is_channel_name(target);

        if is_channel_name(target) {
            tracing::info!("[{}] <{}> {}", target, nick, text);
        } else {
            tracing::info!("<{}> {}", nick, text);
        }

        // The passphrase reply never reaches modules or the router
        if is_private && self.verification.is_pending_for(nick) {
            if let Some(hostmask) = msg.source_hostmask() {
                self.answer_challenge(client.as_ref(), nick, &hostmask, text);
                return false;
            }
        }

        // A command line is rate checked once, by the router
        match self.router.route(client, msg) {
            RouteOutcome::NotCommand => !self.router.check_message_flood(client, msg),
            RouteOutcome::Demoted | RouteOutcome::Ignored => false,
            _ => true,
        }
    }

    fn answer_challenge(&self, client: &dyn Client, nick: &str, hostmask: &str, reply: &str) {
        match self.verification.verify(hostmask, reply) {
            Ok(()) => {
                for line in SUCCESS_LINES {
                    say(client, nick, line);
                }
                say(client, nick, hostmask);
                for line in SUCCESS_FOOTER {
                    say(client, nick, line);
                }
            }
            Err(VerificationError::Mismatch) => {
                for line in MISMATCH_LINES {
                    say(client, nick, line);
                }
            }
            Err(VerificationError::Persist(e)) => {
                tracing::error!("Failed to save owner record: {}", e);
                say(client, nick, PERSIST_FAILED_LINE);
            }
            Err(e) => tracing::error!("Owner verification error: {}", e),
        }
    }

    /// Send the challenge after the configured delay, without blocking the event loop
    fn schedule_challenge(&self, client: &ClientHandle) {
        let Some(nick) = self.verification.pending_nick() else {
            return;
        };
        let delay = self.session.verification_delay;
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) if !delay.is_zero() => handle,
            _ => {
                send_challenge(client.as_ref(), &nick);
                return;
            }
        };
        let client = Arc::clone(client);
        let verification = self.verification.clone();
        tracing::info!(nick = %nick, "Owner challenge scheduled in {:?}", delay);
        handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if verification.is_pending_for(&nick) {
                send_challenge(client.as_ref(), &nick);
            }
        });
    }

    fn fan_out(&self, client: &dyn Client, msg: &Message) {
        let modules = self.router.services().modules.snapshot();
        if modules.is_empty() {
            return;
        }
        let capability = capability_for(msg.kind());
        let mentioned = msg.kind() == EventKind::ChatLine && contains_nick(&client.current_nick(), msg.trailing());

        for entry in &modules {
            entry.module().on_message(client, msg);
            if let Some(capability) = capability {
                if entry.has(capability) {
                    deliver(entry, capability, client, msg);
                }
            }
            if mentioned && entry.has(Capability::DirectMention) {
                deliver(entry, Capability::DirectMention, client, msg);
            }
        }
    }
}

const USER_MODES: &[(char, &str, &str)] = &[
    ('o', "gives operator status to", "removes operator status from"),
    ('v', "gives voice to", "removes voice from"),
    ('h', "gives half-operator status to", "removes half-operator status from"),
    ('q', "gives owner status to", "removes owner status from"),
    ('a', "gives admin status to", "removes admin status from"),
    ('b', "bans", "removes the ban on"),
    ('e', "adds a ban exception for", "removes the ban exception for"),
    ('I', "adds an invite exception for", "removes the invite exception for"),
];

const CHANNEL_MODES: &[(char, &str)] = &[
    ('i', "invite-only"),
    ('m', "moderated"),
    ('n', "no external messages"),
    ('s', "secret"),
    ('p', "private"),
    ('t', "topic protection"),
];

/// Turn a MODE line into one readable sentence per mode letter
pub fn describe_mode_change(msg: &Message) -> Vec<String> {
    let setter = match msg.source_nick() {
        "" => "The server",
        nick => nick,
    };
    let target = msg.param(0).unwrap_or_default();
    let modes = msg.param(1).unwrap_or_default();
    let mut args = msg.params.iter().skip(2).map(String::as_str);

    if !is_channel_name(target) {
        return vec![format!("{} sets user mode {} on {}", setter, modes, target)];
    }

    let mut adding = true;
    let mut lines = Vec::new();
    for mode in modes.chars() {
        match mode {
            '+' => adding = true,
            '-' => adding = false,
            _ => {
                if let Some((_, give, take)) = USER_MODES.iter().find(|(m, _, _)| *m == mode) {
                    let who = args.next().unwrap_or("?");
                    let verb = if adding { give } else { take };
                    lines.push(format!("{} {} {} in {}", setter, verb, who, target));
                } else if let Some((_, name)) = CHANNEL_MODES.iter().find(|(m, _)| *m == mode) {
                    let verb = if adding { "enables" } else { "disables" };
                    lines.push(format!("{} {} {} on {}", setter, verb, name, target));
                } else if mode == 'k' {
                    // The key is sent on both set and unset
                    args.next();
                    if adding {
                        lines.push(format!("{} sets a channel key on {}", setter, target));
                    } else {
                        lines.push(format!("{} removes the channel key from {}", setter, target));
                    }
                } else if mode == 'l' {
                    if adding {
                        let limit = args.next().unwrap_or("?");
                        lines.push(format!("{} sets the user limit on {} to {}", setter, target, limit));
                    } else {
                        lines.push(format!("{} removes the user limit from {}", setter, target));
                    }
                } else {
                    let sign = if adding { '+' } else { '-' };
                    lines.push(format!("{} sets mode {}{} on {}", setter, sign, mode, target));
                }
            }
        }
    }
    lines
}
