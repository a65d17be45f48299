use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

/// Outcome of a single `check()` call. `Aborted` means the user interrupted
/// (Ctrl-C/Ctrl-D); `NonInteractiveDenied` means no TTY was attached for a
/// call that would otherwise have prompted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Allowed {
        #[serde(skip_serializing_if = "Option::is_none")]
        approved_path: Option<ApprovedPath>,
    },
    Denied,
    NonInteractiveDenied,
    /// The prompter response that additionally installs a new session
    /// allowlist entry. `pattern` is the human-readable form of the pattern
    /// that was installed, included here for audit logging.
    AllowedAlways {
        pattern: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        approved_path: Option<ApprovedPath>,
    },
    Aborted,
    RateLimited {
        retry_after_seconds: u64,
    },
}

impl Decision {
    pub fn allowed() -> Self {
        Decision::Allowed {
            approved_path: None,
        }
    }

    /// Whether this outcome should be treated by the model/caller as "do not
    /// repeat this immediately": denials, non-interactive denials, and rate
    /// limits all count, matching the record-denial side effect in the
    /// engine's state machine.
    pub fn counts_as_denial(&self) -> bool {
        matches!(
            self,
            Decision::Denied | Decision::NonInteractiveDenied | Decision::RateLimited { .. }
        )
    }

    pub fn is_terminal_allow(&self) -> bool {
        matches!(self, Decision::Allowed { .. } | Decision::AllowedAlways { .. })
    }
}

/// Attached to file-operation outcomes so the caller can distinguish
/// create-vs-overwrite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovedPath {
    pub resolved: PathBuf,
    pub did_exist: bool,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn denial_classification() {
        assert!(Decision::Denied.counts_as_denial());
        assert!(Decision::NonInteractiveDenied.counts_as_denial());
        assert!(
            Decision::RateLimited {
                retry_after_seconds: 5
            }
            .counts_as_denial()
        );
        assert!(!Decision::allowed().counts_as_denial());
        assert!(!Decision::Aborted.counts_as_denial());
    }

    #[test]
    fn json_shape_is_stable() {
        let value = serde_json::to_value(Decision::allowed()).unwrap();
        assert_eq!(value["decision"], "allowed");
    }
}
