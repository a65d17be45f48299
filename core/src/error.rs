//! Error taxonomy. Kinds, not type names: the engine never
//! propagates a resource failure as a crash, it degrades to `Denied` — this
//! type exists so that degradation happens at one well-logged place rather
//! than being silently swallowed.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GateError {
    /// Regex or rate-limiter allocation failed during `Engine::init`;
    /// `init` itself fails rather than returning a half-built engine.
    #[error("failed to initialize approval gate: {0}")]
    InitFailed(String),

    /// A `--allow TOOL:SPEC` CLI flag was malformed (missing colon or empty
    /// remainder). The caller's responsibility to turn this into a non-zero
    /// exit.
    #[error("invalid --allow spec {spec:?}: {reason}")]
    InvalidCliAllow { spec: String, reason: &'static str },

    /// The subagent wire protocol was violated: oversize frame, malformed
    /// JSON, or a response `request_id` that didn't match the outstanding
    /// request. Every variant here is converted to `Decision::Denied` by the
    /// caller, never propagated as a process error.
    #[error("subagent channel protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("frame exceeded the 64 KiB limit")]
    FrameTooLarge,
    #[error("malformed JSON frame: {0}")]
    MalformedJson(String),
    #[error("response request_id {got} did not match outstanding request {expected}")]
    RequestIdMismatch { expected: u32, got: u32 },
    #[error("channel closed before a complete frame was received")]
    IncompleteFrame,
    #[error("no response within the configured timeout")]
    Timeout,
}
