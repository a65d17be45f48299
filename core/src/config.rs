//! JSON config loading.
//!
//! Read once from the app-home directory at startup and never reopened.
//! Unknown keys and values are ignored; a missing or malformed file
//! degrades to defaults with a logged warning rather than a startup
//! failure — config errors are soft.

use std::path::Path;
use std::path::PathBuf;

use gate_protocol::GateAction;
use gate_protocol::GateCategory;
use serde_json::Value;

use crate::shell::Dialect;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigAllowlistEntry {
    Regex { tool: String, pattern: String },
    Shell { command: Vec<String>, dialect: Dialect },
}

#[derive(Debug, Clone)]
pub struct GateConfig {
    pub enabled: bool,
    pub category_overrides: Vec<(GateCategory, GateAction)>,
    pub allowlist: Vec<ConfigAllowlistEntry>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            category_overrides: Vec::new(),
            allowlist: Vec::new(),
        }
    }
}

/// The app-home directory's config file, e.g.
/// `~/.config/<app_name>/config.json` on Linux.
pub fn default_config_path(app_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(app_name).join("config.json"))
}

impl GateConfig {
    /// Load from `path`. A missing file is not a warning (it's the common
    /// case of "no config yet"); a present-but-malformed file logs a
    /// warning and falls back to defaults.
    pub fn load_from_path(path: &Path) -> GateConfig {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return GateConfig::default(),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "failed to read approval gate config, using defaults");
                return GateConfig::default();
            }
        };
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> GateConfig {
        let root: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(error = %err, "malformed approval gate config, using defaults");
                return GateConfig::default();
            }
        };

        let Some(gates) = root.get("approval_gates") else {
            return GateConfig::default();
        };

        let enabled = gates.get("enabled").and_then(Value::as_bool).unwrap_or(true);

        let mut category_overrides = Vec::new();
        if let Some(categories) = gates.get("categories").and_then(Value::as_object) {
            for (key, value) in categories {
                let (Some(category), Some(action)) = (
                    GateCategory::from_config_key(key),
                    value.as_str().and_then(GateAction::from_config_value),
                ) else {
                    continue;
                };
                category_overrides.push((category, action));
            }
        }

        let mut allowlist = Vec::new();
        if let Some(entries) = gates.get("allowlist").and_then(Value::as_array) {
            for entry in entries {
                if let Some(parsed) = parse_allowlist_entry(entry) {
                    allowlist.push(parsed);
                }
            }
        }

        GateConfig {
            enabled,
            category_overrides,
            allowlist,
        }
    }
}

fn parse_allowlist_entry(entry: &Value) -> Option<ConfigAllowlistEntry> {
    let tool = entry.get("tool")?.as_str()?;
    if tool == "shell" {
        let command = entry
            .get("command")?
            .as_array()?
            .iter()
            .map(|v| v.as_str().map(str::to_owned))
            .collect::<Option<Vec<String>>>()?;
        let dialect = match entry.get("shell").and_then(Value::as_str) {
            Some("bash") => Dialect::Bash,
            Some("powershell") => Dialect::PowerShell,
            Some("cmd") => Dialect::Cmd,
            _ => Dialect::Unknown,
        };
        Some(ConfigAllowlistEntry::Shell { command, dialect })
    } else {
        let pattern = entry.get("pattern")?.as_str()?.to_string();
        Some(ConfigAllowlistEntry::Regex {
            tool: tool.to_string(),
            pattern,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_approval_gates_key_is_default() {
        let config = GateConfig::parse(r#"{"unrelated": true}"#);
        assert!(config.enabled);
        assert!(config.category_overrides.is_empty());
    }

    #[test]
    fn malformed_json_is_default() {
        let config = GateConfig::parse("{not json");
        assert!(config.enabled);
    }

    #[test]
    fn parses_categories_and_regex_allowlist() {
        let config = GateConfig::parse(
            r#"{
                "approval_gates": {
                    "enabled": true,
                    "categories": {"shell": "gate", "network": "deny"},
                    "allowlist": [
                        {"tool": "write_file", "pattern": "/tmp/.*\\.txt"}
                    ]
                }
            }"#,
        );
        assert!(config.category_overrides.contains(&(GateCategory::Shell, GateAction::Gate)));
        assert!(config.category_overrides.contains(&(GateCategory::Network, GateAction::Deny)));
        assert_eq!(
            config.allowlist,
            vec![ConfigAllowlistEntry::Regex {
                tool: "write_file".to_string(),
                pattern: "/tmp/.*\\.txt".to_string()
            }]
        );
    }

    #[test]
    fn parses_shell_allowlist() {
        let config = GateConfig::parse(
            r#"{
                "approval_gates": {
                    "allowlist": [
                        {"tool": "shell", "command": ["git"], "shell": "bash"}
                    ]
                }
            }"#,
        );
        assert_eq!(
            config.allowlist,
            vec![ConfigAllowlistEntry::Shell {
                command: vec!["git".to_string()],
                dialect: Dialect::Bash
            }]
        );
    }

    #[test]
    fn unknown_keys_and_bad_category_values_are_ignored() {
        let config = GateConfig::parse(
            r#"{
                "approval_gates": {
                    "categories": {"shell": "gate", "bogus_category": "deny", "network": "bogus_action"},
                    "mystery_key": 42
                }
            }"#,
        );
        assert_eq!(config.category_overrides, vec![(GateCategory::Shell, GateAction::Gate)]);
    }

    #[test]
    fn missing_file_is_default_without_warning() {
        let config = GateConfig::load_from_path(Path::new("/nonexistent/gate/config.json"));
        assert!(config.enabled);
    }
}
