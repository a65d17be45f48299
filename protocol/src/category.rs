use serde::Deserialize;
use serde::Serialize;

/// Risk class assigned to a tool name. The mapping from tool name to
/// category is a closed, built-in table in `gate-core`, extended only by a
/// callback-registered extension resolver (see `gate_core::resolver`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateCategory {
    FileRead,
    FileWrite,
    Shell,
    Network,
    Memory,
    Subagent,
    Mcp,
    /// Named `python` in the on-disk config schema for source compatibility,
    /// but covers any plugin-interpreter tool call.
    Plugin,
}

impl GateCategory {
    /// The action a freshly initialized engine assigns before any config or
    /// CLI override is applied.
    pub fn default_action(self) -> GateAction {
        match self {
            GateCategory::FileRead | GateCategory::Memory | GateCategory::Plugin => {
                GateAction::Allow
            }
            GateCategory::FileWrite
            | GateCategory::Shell
            | GateCategory::Network
            | GateCategory::Subagent
            | GateCategory::Mcp => GateAction::Gate,
        }
    }

    /// Name used in the JSON config's `categories` map.
    pub fn config_key(self) -> &'static str {
        match self {
            GateCategory::FileRead => "file_read",
            GateCategory::FileWrite => "file_write",
            GateCategory::Shell => "shell",
            GateCategory::Network => "network",
            GateCategory::Memory => "memory",
            GateCategory::Subagent => "subagent",
            GateCategory::Mcp => "mcp",
            GateCategory::Plugin => "python",
        }
    }

    pub fn from_config_key(key: &str) -> Option<Self> {
        Some(match key {
            "file_read" => GateCategory::FileRead,
            "file_write" => GateCategory::FileWrite,
            "shell" => GateCategory::Shell,
            "network" => GateCategory::Network,
            "memory" => GateCategory::Memory,
            "subagent" => GateCategory::Subagent,
            "mcp" => GateCategory::Mcp,
            "python" => GateCategory::Plugin,
            _ => return None,
        })
    }
}

/// The action a category (or, transitively, a tool call) resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateAction {
    Allow,
    Gate,
    Deny,
}

impl GateAction {
    pub fn from_config_value(value: &str) -> Option<Self> {
        Some(match value {
            "allow" => GateAction::Allow,
            "gate" => GateAction::Gate,
            "deny" => GateAction::Deny,
            _ => return None,
        })
    }
}
