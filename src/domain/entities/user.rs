use std::fmt;

/// Sender of a protocol line, taken from the `nick!user@host` prefix
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct User {
    pub nick: String,
    pub user: Option<String>,
    pub host: Option<String>,
}

impl User {
    pub fn new(nick: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            user: None,
            host: None,
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Parse a message prefix. Server prefixes carry no `!` or `@` and come back as a bare nick.
    pub fn from_prefix(prefix: &str) -> Self {
        let (rest, host) = match prefix.split_once('@') {
            Some((rest, host)) => (rest, Some(host.to_string())),
            None => (prefix, None),
        };
        let (nick, user) = match rest.split_once('!') {
            Some((nick, user)) => (nick, Some(user.to_string())),
            None => (rest, None),
        };
        Self {
            nick: nick.to_string(),
            user,
            host,
        }
    }

    /// Full identity string used as the permission key
    pub fn hostmask(&self) -> String {
        match (&self.user, &self.host) {
            (Some(user), Some(host)) => format!("{}!{}@{}", self.nick, user, host),
            (Some(user), None) => format!("{}!{}", self.nick, user),
            (None, Some(host)) => format!("{}@{}", self.nick, host),
            (None, None) => self.nick.clone(),
        }
    }

    /// True when the prefix names a user rather than a server
    pub fn is_user(&self) -> bool {
        self.user.is_some() || self.host.is_some()
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hostmask())
    }
}

/// Nickname portion of a hostmask (everything before the first `!`).
pub fn nick_of(hostmask: &str) -> &str {
    hostmask.split('!').next().unwrap_or(hostmask)
}

/// Hostmask that matches every user@host for `nick`.
pub fn wildcard_hostmask(nick: &str) -> String {
    format!("{}!*@*", nick)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_prefix() {
        let user = User::from_prefix("alice!~al@example.org");
        assert_eq!(user.nick, "alice");
        assert_eq!(user.user.as_deref(), Some("~al"));
        assert_eq!(user.host.as_deref(), Some("example.org"));
        assert_eq!(user.hostmask(), "alice!~al@example.org");
        assert!(user.is_user());
    }

    #[test]
    fn server_prefix_is_not_a_user() {
        let server = User::from_prefix("irc.libera.chat");
        assert_eq!(server.nick, "irc.libera.chat");
        assert!(!server.is_user());
    }

    #[test]
    fn nick_helpers() {
        assert_eq!(nick_of("bob!b@host"), "bob");
        assert_eq!(nick_of("bob"), "bob");
        assert_eq!(wildcard_hostmask("bob"), "bob!*@*");
    }
}
