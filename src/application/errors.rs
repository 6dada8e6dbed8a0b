//! Application layer errors

use thiserror::Error;

use crate::domain::entities::PermissionLevel;

/// General bot errors
#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    #[error("Module error: {0}")]
    Module(#[from] ModuleError),

    #[error("Verification error: {0}")]
    Verification(#[from] VerificationError),

    #[error("Connection closed")]
    Disconnected,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Module loading and lifecycle errors
#[derive(Error, Debug)]
pub enum ModuleError {
    #[error("Failed to open {path}: {reason}")]
    Open { path: String, reason: String },

    #[error("Missing module entry point in {path}: {reason}")]
    Symbol { path: String, reason: String },

    #[error("Module contract violated: {0}")]
    Contract(String),

    #[error("Module {name} failed to load: {reason}")]
    LoadHook { name: String, reason: String },

    #[error("Module {0} is not loaded")]
    NotLoaded(String),

    #[error("Failed to read module directory {path}: {source}")]
    Directory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Download failed: {0}")]
    Fetch(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Command execution errors
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("{0}")]
    InvalidArgs(String),

    #[error("{0}")]
    ExecutionFailed(String),

    #[error("Access denied. Command '{command}' requires {required} level. Your level: {current}")]
    PermissionDenied {
        command: String,
        required: PermissionLevel,
        current: PermissionLevel,
    },

    #[error("Error saving settings: {0}")]
    Storage(#[from] StorageError),

    #[error("{0}")]
    Module(#[from] ModuleError),
}

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Lock poisoned: {0}")]
    Poisoned(String),
}

impl From<serde_yaml::Error> for StorageError {
    fn from(e: serde_yaml::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Owner verification errors
#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("No verification is pending")]
    NotPending,

    #[error("Passphrase does not match")]
    Mismatch,

    #[error("Hashing failed: {0}")]
    Hash(String),

    #[error("Failed to persist owner record: {0}")]
    Persist(#[from] StorageError),
}
