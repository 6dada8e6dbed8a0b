//! Infrastructure layer - External concerns
//!
//! This layer contains:
//! - Config: Configuration loading
//! - Storage: YAML persistence for settings and channel policies
//! - Plugins: loading, hot-swapping and fetching module artifacts
//! - Adapters: the IRC connection

pub mod adapters;
pub mod config;
pub mod plugins;
pub mod storage;
