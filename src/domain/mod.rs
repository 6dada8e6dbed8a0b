//! Domain layer - Core types shared by every other layer
//!
//! This layer contains:
//! - Entities: protocol messages, senders, permission levels, commands, channel policies
//! - Traits: abstractions over the live client and settings persistence

pub mod entities;
pub mod traits;
