use super::User;
use chrono::{DateTime, Utc};
use crate::application::errors::BotError;

/// Protocol command names and numerics the bot cares about
pub mod cmd {
    pub const PING: &str = "PING";
    pub const PONG: &str = "PONG";
    pub const PRIVMSG: &str = "PRIVMSG";
    pub const NOTICE: &str = "NOTICE";
    pub const JOIN: &str = "JOIN";
    pub const PART: &str = "PART";
    pub const KICK: &str = "KICK";
    pub const QUIT: &str = "QUIT";
    pub const NICK: &str = "NICK";
    pub const USER: &str = "USER";
    pub const INVITE: &str = "INVITE";
    pub const TOPIC: &str = "TOPIC";
    pub const MODE: &str = "MODE";
    pub const WHOIS: &str = "WHOIS";
    pub const ERROR: &str = "ERROR";

    pub const RPL_WELCOME: &str = "001";
    pub const RPL_TOPIC: &str = "332";
    pub const RPL_TOPICWHOTIME: &str = "333";
    pub const RPL_ENDOFMOTD: &str = "376";
    pub const ERR_NOMOTD: &str = "422";
    pub const ERR_NICKNAMEINUSE: &str = "433";
    pub const ERR_BANNEDFROMCHAN: &str = "474";
    pub const ERR_CHANNELISFULL: &str = "471";
    pub const ERR_INVITEONLYCHAN: &str = "473";
    pub const ERR_BADCHANNELKEY: &str = "475";
    pub const RPL_LOGGEDIN: &str = "900";
}

/// Event kinds a module can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ChatLine,
    Join,
    Part,
    Quit,
    Kick,
    TopicChange,
    NickChange,
    Invite,
    Notice,
    ModeChange,
    Error,
    Other,
}

impl EventKind {
    pub fn from_command(command: &str) -> Self {
        match command {
            cmd::PRIVMSG => EventKind::ChatLine,
            cmd::JOIN => EventKind::Join,
            cmd::PART => EventKind::Part,
            cmd::QUIT => EventKind::Quit,
            cmd::KICK => EventKind::Kick,
            cmd::TOPIC | cmd::RPL_TOPIC | cmd::RPL_TOPICWHOTIME => EventKind::TopicChange,
            cmd::NICK => EventKind::NickChange,
            cmd::INVITE => EventKind::Invite,
            cmd::NOTICE => EventKind::Notice,
            cmd::MODE => EventKind::ModeChange,
            cmd::ERROR => EventKind::Error,
            _ => EventKind::Other,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventKind::ChatLine => "chat-line",
            EventKind::Join => "join",
            EventKind::Part => "part",
            EventKind::Quit => "quit",
            EventKind::Kick => "kick",
            EventKind::TopicChange => "topic-change",
            EventKind::NickChange => "nick-change",
            EventKind::Invite => "invite",
            EventKind::Notice => "notice",
            EventKind::ModeChange => "mode-change",
            EventKind::Error => "error",
            EventKind::Other => "other",
        }
    }
}

/// One inbound protocol line
#[derive(Debug, Clone)]
pub struct Message {
    pub id: String,
    pub prefix: Option<User>,
    pub command: String,
    pub params: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(command: impl Into<String>, params: Vec<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            prefix: None,
            command: command.into(),
            params,
            timestamp: Utc::now(),
        }
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = Some(User::from_prefix(prefix));
        self
    }

    /// Build a chat line, mostly for tests and modules replaying traffic.
    pub fn privmsg(prefix: &str, target: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(cmd::PRIVMSG, vec![target.into(), text.into()]).with_prefix(prefix)
    }

    /// Parse a raw line: `[@tags] [:prefix] COMMAND [params...] [:trailing]`.
    pub fn parse(line: &str) -> Result<Self, BotError> {
        let mut rest = line.trim_end_matches(['\r', '\n']);

        if rest.starts_with('@') {
            rest = rest
                .split_once(' ')
                .map(|(_, r)| r)
                .ok_or_else(|| BotError::Parse(format!("tags without command: {}", line)))?;
        }

        let mut prefix = None;
        if let Some(stripped) = rest.strip_prefix(':') {
            let (p, r) = stripped
                .split_once(' ')
                .ok_or_else(|| BotError::Parse(format!("prefix without command: {}", line)))?;
            prefix = Some(User::from_prefix(p));
            rest = r;
        }

        let rest = rest.trim_start();
        let (command, mut rest) = match rest.split_once(' ') {
            Some((c, r)) => (c, r),
            None => (rest, ""),
        };
        if command.is_empty() {
            return Err(BotError::Parse(format!("empty command: {}", line)));
        }

        let mut params = Vec::new();
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing.to_string());
                break;
            }
            match rest.split_once(' ') {
                Some((p, r)) => {
                    params.push(p.to_string());
                    rest = r;
                }
                None => {
                    params.push(rest.to_string());
                    break;
                }
            }
        }

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            prefix,
            command: command.to_uppercase(),
            params,
            timestamp: Utc::now(),
        })
    }

    pub fn kind(&self) -> EventKind {
        EventKind::from_command(&self.command)
    }

    /// Last parameter, which carries the free text of most commands
    pub fn trailing(&self) -> &str {
        self.params.last().map(String::as_str).unwrap_or("")
    }

    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    pub fn source_nick(&self) -> &str {
        self.prefix.as_ref().map(|p| p.nick.as_str()).unwrap_or("")
    }

    /// Sender hostmask, only for user prefixes
    pub fn source_hostmask(&self) -> Option<String> {
        self.prefix
            .as_ref()
            .filter(|p| p.is_user())
            .map(User::hostmask)
    }
}

pub fn is_channel_name(target: &str) -> bool {
    target.starts_with(['#', '&', '+', '!'])
}
