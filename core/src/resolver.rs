//! Extension resolver.
//!
//! The built-in tool-name-to-category table is closed. Tools the engine
//! doesn't recognize (MCP-registered tools, plugin-provided tools) are
//! classified by consulting an injected resolver rather than a process-wide
//! mutable callback struct, expressed as ordinary dependency injection.

use gate_protocol::GateCategory;

/// Maps unknown tool names to a category, and names the argument whose
/// string value the Pattern Generator and allowlist matcher should use for
/// that tool.
pub trait ExtensionResolver: Send + Sync {
    /// Category for a tool name not in the built-in table. `None` leaves it
    /// unclassified — unclassified tools are gated by default.
    fn resolve_category(&self, tool_name: &str) -> Option<GateCategory>;

    /// The argument name (a top-level key in the tool's JSON arguments)
    /// whose string value should be extracted as the match target for
    /// allowlist regexes and for pattern generation. `None` means the tool
    /// has no natural single-argument match target.
    fn match_argument_name(&self, tool_name: &str) -> Option<&str>;
}

/// A resolver that recognizes nothing; every tool call falls through to the
/// built-in table (and its `Gate`-by-default treatment when unmatched).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullResolver;

impl ExtensionResolver for NullResolver {
    fn resolve_category(&self, _tool_name: &str) -> Option<GateCategory> {
        None
    }

    fn match_argument_name(&self, _tool_name: &str) -> Option<&str> {
        None
    }
}
