//! Application layer - Use cases and business logic
//!
//! This layer contains:
//! - Services: Permissions, flood control, owner verification, command routing
//! - Commands: Built-in command handlers
//! - Errors: Error types shared across layers
//! - Messaging: Command parsing and event dispatch

pub mod commands;
pub mod errors;
pub mod messaging;
pub mod services;
