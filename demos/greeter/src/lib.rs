//! Greeter - a small mbot module
//!
//! Welcomes people joining a channel and answers `!greet`. Build with
//! `cargo build -p mbot-greeter` and copy the shared library into the bot's
//! module directory as `greeter_v<version>.<ext>`, linked from `greeter.<ext>`.

use mbot::plugins::{is_channel_name, Capability, Client, Message, Module};

const VERSION: &str = if cfg!(feature = "v2") { "2.0.0" } else { "1.0.0" };

#[derive(Default)]
pub struct Greeter;

/// Channel the line was sent to, or the sender for private lines
fn reply_target(msg: &Message) -> &str {
    match msg.param(0) {
        Some(target) if is_channel_name(target) => target,
        _ => msg.source_nick(),
    }
}

impl Module for Greeter {
    fn name(&self) -> &str {
        "greeter"
    }

    fn version(&self) -> &str {
        VERSION
    }

    fn on_load(&self) -> Result<(), String> {
        Ok(())
    }

    fn on_message(&self, _client: &dyn Client, _msg: &Message) {}

    fn capabilities(&self) -> Vec<Capability> {
        vec![Capability::Commands, Capability::Join]
    }

    fn commands(&self) -> Vec<String> {
        vec!["greet".to_string()]
    }

    fn handle_command(&self, client: &dyn Client, msg: &Message, _command: &str, args: &[String]) {
        let who = args.first().map(String::as_str).unwrap_or_else(|| msg.source_nick());
        let _ = client.privmsg(reply_target(msg), &format!("Hello, {}! (greeter {})", who, VERSION));
    }

    fn on_join(&self, client: &dyn Client, msg: &Message) {
        let nick = msg.source_nick();
        if nick.eq_ignore_ascii_case(&client.current_nick()) {
            return;
        }
        if let Some(channel) = msg.param(0) {
            let _ = client.privmsg(channel, &format!("Welcome to {}, {}!", channel, nick));
        }
    }
}

mbot::declare_module!(Greeter, Greeter::default);
