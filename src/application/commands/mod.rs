//! Built-in commands
//!
//! Every handler receives a [`CommandContext`] and returns the reply text. The
//! router sends it back line by line to wherever the command came from.

pub mod admin;
pub mod basic;
pub mod channel;
pub mod irc;
pub mod modules;
pub mod registry;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::watch;

use crate::application::services::{ChannelPolicies, PermissionResolver, RateLimiter};
use crate::domain::entities::PermissionLevel;
use crate::domain::traits::ClientHandle;
use crate::infrastructure::plugins::{ModuleInstaller, ModuleRegistry};

pub use registry::{Command, CommandRegistry};

/// Shared state the built-in commands operate on
pub struct Services {
    pub permissions: Arc<PermissionResolver>,
    pub rate_limiter: Arc<RateLimiter>,
    pub channels: Arc<ChannelPolicies>,
    pub modules: Arc<ModuleRegistry>,
    /// Absent when remote loading is not configured
    pub installer: Option<Arc<ModuleInstaller>>,
    pub module_dir: PathBuf,
    /// Set once the owner asks the bot to stop; the connection loop stops reconnecting
    pub shutdown: watch::Sender<bool>,
}

/// Everything a handler may look at for one invocation
pub struct CommandContext<'a> {
    pub nick: &'a str,
    pub hostmask: &'a str,
    pub level: PermissionLevel,
    /// Channel for channel commands, the sender's nick for private ones
    pub reply_to: &'a str,
    pub channel: Option<&'a str>,
    pub args: &'a [String],
    pub prefix: &'a str,
    pub client: &'a ClientHandle,
    pub services: &'a Services,
    pub commands: &'a CommandRegistry,
}

impl<'a> CommandContext<'a> {
    pub fn arg(&self, index: usize) -> Option<&'a str> {
        self.args.get(index).map(String::as_str)
    }

    /// Arguments from `index` on, joined by single spaces
    pub fn rest(&self, index: usize) -> String {
        self.args.get(index..).map(|a| a.join(" ")).unwrap_or_default()
    }

    /// `!name` with the configured prefix
    pub fn prefixed(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }
}

/// Register every built-in command
pub fn register_defaults(registry: &mut CommandRegistry) {
    basic::register(registry);
    admin::register(registry);
    modules::register(registry);
    channel::register(registry);
    irc::register(registry);
}
