//! Wire and domain types shared between the approval gate engine and its
//! callers (the CLI driver, and — across a process boundary — a subagent).
//!
//! This crate carries no behavior: it is the vocabulary `gate-core` and
//! `gate-cli` speak. Keeping it dependency-light means a subagent process
//! that only needs to *serialize* a request doesn't have to pull in the
//! engine, the shell parser, or `tokio`.

mod category;
mod decision;
mod error_code;
mod tool_call;
mod wire;

pub use category::GateAction;
pub use category::GateCategory;
pub use decision::ApprovedPath;
pub use decision::Decision;
pub use error_code::error_code;
pub use tool_call::ToolCall;
pub use wire::ApprovalRequestWire;
pub use wire::ApprovalResponseWire;
pub use wire::WireResult;
