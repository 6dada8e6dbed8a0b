use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-channel command policy and free-form settings
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ChannelPolicy {
    pub enabled_commands: Vec<String>,
    pub disabled_commands: Vec<String>,
    pub settings: BTreeMap<String, serde_yaml::Value>,
}

impl ChannelPolicy {
    /// Deny-list wins; a non-empty allow-list admits only its members.
    pub fn allows(&self, command: &str) -> bool {
        if self.disabled_commands.iter().any(|c| c.eq_ignore_ascii_case(command)) {
            return false;
        }
        self.enabled_commands.is_empty() || self.enabled_commands.iter().any(|c| c.eq_ignore_ascii_case(command))
    }

    pub fn enable(&mut self, command: &str) {
        self.disabled_commands.retain(|c| c != command);
        if !self.enabled_commands.iter().any(|c| c == command) {
            self.enabled_commands.push(command.to_string());
        }
    }

    pub fn disable(&mut self, command: &str) {
        self.enabled_commands.retain(|c| c != command);
        if !self.disabled_commands.iter().any(|c| c == command) {
            self.disabled_commands.push(command.to_string());
        }
    }

    /// Store a setting, keeping numbers and booleans typed when the raw text parses as one.
    pub fn set(&mut self, key: impl Into<String>, raw: &str) {
        let value = match serde_yaml::from_str::<serde_yaml::Value>(raw) {
            Ok(v @ (serde_yaml::Value::Bool(_) | serde_yaml::Value::Number(_))) => v,
            _ => serde_yaml::Value::String(raw.to_string()),
        };
        self.settings.insert(key.into(), value);
    }

    /// Human-readable summary, one line per aspect
    pub fn describe(&self, channel: &str) -> Vec<String> {
        let enabled = if self.enabled_commands.is_empty() {
            "all".to_string()
        } else {
            self.enabled_commands.join(", ")
        };
        let disabled = if self.disabled_commands.is_empty() {
            "none".to_string()
        } else {
            self.disabled_commands.join(", ")
        };
        let settings = if self.settings.is_empty() {
            "none".to_string()
        } else {
            self.settings
                .iter()
                .map(|(k, v)| format!("{}={}", k, display_value(v)))
                .collect::<Vec<_>>()
                .join(", ")
        };

        vec![
            format!("Channel {} settings:", channel),
            format!("Enabled commands: {}", enabled),
            format!("Disabled commands: {}", disabled),
            format!("Custom settings: {}", settings),
        ]
    }
}

fn display_value(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Null => "null".to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

/// Channel names are stored lowercased, with their `#` sigil.
pub fn normalize_channel(name: &str) -> String {
    let name = name.to_ascii_lowercase();
    if name.starts_with('#') {
        name
    } else {
        format!("#{}", name)
    }
}
