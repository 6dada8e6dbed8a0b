use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ordered permission level of a sender.
///
/// The derived `Ord` follows declaration order, so `Ignored < BadBoy < Regular < Admin < Owner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum PermissionLevel {
    Ignored,
    BadBoy,
    Regular,
    Admin,
    Owner,
}

impl PermissionLevel {
    pub const ALL: [PermissionLevel; 5] = [
        PermissionLevel::Ignored,
        PermissionLevel::BadBoy,
        PermissionLevel::Regular,
        PermissionLevel::Admin,
        PermissionLevel::Owner,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionLevel::Ignored => "Ignored",
            PermissionLevel::BadBoy => "BadBoy",
            PermissionLevel::Regular => "Regular",
            PermissionLevel::Admin => "Admin",
            PermissionLevel::Owner => "Owner",
        }
    }
}

impl Default for PermissionLevel {
    fn default() -> Self {
        PermissionLevel::Regular
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<PermissionLevel> for u8 {
    fn from(level: PermissionLevel) -> Self {
        level as u8
    }
}

impl TryFrom<u8> for PermissionLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        PermissionLevel::ALL
            .get(value as usize)
            .copied()
            .ok_or_else(|| format!("invalid permission level: {}", value))
    }
}

impl FromStr for PermissionLevel {
    type Err = String;

    /// Accepts the level names plus the aliases admins tend to type.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "owner" => Ok(PermissionLevel::Owner),
            "admin" => Ok(PermissionLevel::Admin),
            "regular" | "user" | "normal" => Ok(PermissionLevel::Regular),
            "badboy" | "bad" => Ok(PermissionLevel::BadBoy),
            "ignored" | "ignore" => Ok(PermissionLevel::Ignored),
            other => Err(format!("Unknown level: {}", other)),
        }
    }
}
