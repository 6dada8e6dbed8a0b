//! Message handling - Event dispatch and command parsing

pub mod dispatcher;
pub mod parser;

pub use dispatcher::{describe_mode_change, EventDispatcher, SessionConfig};
pub use parser::{contains_nick, CommandParser, ParsedCommand};
