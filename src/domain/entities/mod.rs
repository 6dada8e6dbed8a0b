//! Domain entities - Core objects shared by every layer

pub mod channel;
pub mod level;
pub mod message;
pub mod user;

pub use channel::{normalize_channel, ChannelPolicy};
pub use level::PermissionLevel;
pub use message::{cmd, is_channel_name, EventKind, Message};
pub use user::{nick_of, wildcard_hostmask, User};
