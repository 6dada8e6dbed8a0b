use std::sync::Arc;

use crate::application::errors::BotError;
use crate::domain::entities::cmd;

/// Client trait - outbound side of the protocol connection.
///
/// Handed to built-in commands and to loaded modules. Sends are queued, so
/// implementations must not block.
pub trait Client: Send + Sync {
    /// Nickname the server currently knows us by
    fn current_nick(&self) -> String;

    /// Record the nickname the server now knows us by
    fn set_nick(&self, nick: &str);

    /// Queue one raw protocol line (without the trailing CRLF)
    fn send_raw(&self, line: &str) -> Result<(), BotError>;

    /// Send text to a channel or nick, one line per message
    fn privmsg(&self, target: &str, text: &str) -> Result<(), BotError> {
        for line in text.lines() {
            self.send_raw(&format!("{} {} :{}", cmd::PRIVMSG, target, line))?;
        }
        Ok(())
    }

    fn notice(&self, target: &str, text: &str) -> Result<(), BotError> {
        for line in text.lines() {
            self.send_raw(&format!("{} {} :{}", cmd::NOTICE, target, line))?;
        }
        Ok(())
    }

    fn join(&self, channel: &str) -> Result<(), BotError> {
        self.send_raw(&format!("{} {}", cmd::JOIN, channel))
    }

    /// Leave the server; the connection closes once the server acknowledges
    fn quit(&self, reason: &str) -> Result<(), BotError> {
        self.send_raw(&format!("{} :{}", cmd::QUIT, reason))
    }
}

/// Shared handle to the live client
pub type ClientHandle = Arc<dyn Client>;
