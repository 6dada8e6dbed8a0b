//! Domain traits - Abstractions for infrastructure implementations

pub mod bot;
pub mod store;

pub use bot::{Client, ClientHandle};
pub use store::{ChannelSettings, HostmaskLevel, Settings, SettingsStore};
