use serde::Deserialize;
use serde::Serialize;

/// Request frame sent from a subagent's gate up to its parent when a tool
/// call resolves to `Prompt` and the subagent holds an upstream channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequestWire {
    pub request_id: u32,
    pub tool_name: String,
    pub arguments_json: String,
    pub display_summary: String,
}

/// Response frame sent back down the channel. `result` is the wire encoding
/// of a [`WireResult`]; kept as a raw integer on the struct (rather than the
/// enum itself) so that an out-of-range value deserializes successfully and
/// can be rejected explicitly as a protocol error, instead of failing JSON
/// deserialization in a way that is hard to distinguish from a malformed
/// frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalResponseWire {
    pub request_id: u32,
    pub result: u8,
    #[serde(default)]
    pub pattern: String,
}

/// The small, closed set of outcomes that can cross the subagent wire.
/// `NonInteractiveDenied` never appears here: by construction only the root
/// process prompts, so every non-root hop either forwards or returns one of
/// these five.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireResult {
    Allowed,
    Denied,
    AllowedAlways,
    Aborted,
    RateLimited,
}

impl WireResult {
    pub fn to_u8(self) -> u8 {
        match self {
            WireResult::Allowed => 0,
            WireResult::Denied => 1,
            WireResult::AllowedAlways => 2,
            WireResult::Aborted => 3,
            WireResult::RateLimited => 4,
        }
    }

    pub fn try_from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => WireResult::Allowed,
            1 => WireResult::Denied,
            2 => WireResult::AllowedAlways,
            3 => WireResult::Aborted,
            4 => WireResult::RateLimited,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn wire_result_round_trips() {
        for result in [
            WireResult::Allowed,
            WireResult::Denied,
            WireResult::AllowedAlways,
            WireResult::Aborted,
            WireResult::RateLimited,
        ] {
            assert_eq!(WireResult::try_from_u8(result.to_u8()), Some(result));
        }
    }

    #[test]
    fn out_of_range_is_none() {
        assert_eq!(WireResult::try_from_u8(255), None);
    }

    #[test]
    fn request_round_trip_preserves_fields() {
        let request = ApprovalRequestWire {
            request_id: 7,
            tool_name: "shell".to_string(),
            arguments_json: r#"{"command":"git status"}"#.to_string(),
            display_summary: "git status".to_string(),
        };
        let encoded = serde_json::to_string(&request).unwrap();
        let decoded: ApprovalRequestWire = serde_json::from_str(&encoded).unwrap();
        assert_eq!(request, decoded);
    }
}
