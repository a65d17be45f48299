//! Approval Gate Engine — the policy core. Everything else in
//! this crate exists to answer one question this module asks for every tool
//! call: allow it, deny it, or stop and ask.

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use gate_protocol::Decision;
use gate_protocol::GateAction;
use gate_protocol::GateCategory;
use gate_protocol::ToolCall;
use regex_lite::Regex;

use crate::channel::UpstreamChannel;
use crate::config::ConfigAllowlistEntry;
use crate::config::GateConfig;
use crate::error::GateError;
use crate::pattern;
use crate::pattern::GeneratedPattern;
use crate::prompter::PromptKey;
use crate::prompter::Prompter;
use crate::rate_limit::RateLimiter;
use crate::resolver::ExtensionResolver;
use crate::shell;
use crate::shell::Dialect;

const ALL_CATEGORIES: [GateCategory; 8] = [
    GateCategory::FileRead,
    GateCategory::FileWrite,
    GateCategory::Shell,
    GateCategory::Network,
    GateCategory::Memory,
    GateCategory::Subagent,
    GateCategory::Mcp,
    GateCategory::Plugin,
];

#[derive(Debug, Clone)]
struct RegexAllowlistEntry {
    tool_name: String,
    compiled: Option<Regex>,
}

impl RegexAllowlistEntry {
    fn is_match(&self, target: &str) -> bool {
        self.compiled.as_ref().is_some_and(|re| re.is_match(target))
    }
}

#[derive(Debug, Clone)]
struct ShellAllowlistEntry {
    tokens: Vec<String>,
    dialect: Dialect,
}

/// What `requires_check` determined without yet touching the rate limiter,
/// an upstream channel, or a prompter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiresCheck {
    Allow,
    Deny,
    Prompt,
}

/// Tool names the gate classifies without consulting an
/// [`ExtensionResolver`]. MCP tools, plugin-registered tools, and anything
/// else a host application adds at runtime go through the resolver instead.
fn builtin_category(tool_name: &str) -> Option<GateCategory> {
    Some(match tool_name {
        "read_file" | "list_directory" | "glob" | "grep" => GateCategory::FileRead,
        "write_file" | "edit_file" | "delete_file" | "apply_patch" => GateCategory::FileWrite,
        "shell" | "exec_command" => GateCategory::Shell,
        "http_fetch" | "web_search" => GateCategory::Network,
        "recall_memory" | "store_memory" | "send_message" => GateCategory::Memory,
        "spawn_subagent" => GateCategory::Subagent,
        "mcp_call" => GateCategory::Mcp,
        "run_python" => GateCategory::Plugin,
        _ => return None,
    })
}

fn log_decision(tool_name: &str, decision: &Decision) {
    match decision {
        Decision::Allowed { .. } => tracing::debug!(tool = tool_name, "allowed"),
        Decision::AllowedAlways { pattern, .. } => {
            tracing::debug!(tool = tool_name, pattern = pattern.as_str(), "allowed always")
        }
        Decision::Denied | Decision::NonInteractiveDenied => tracing::warn!(tool = tool_name, "denied"),
        Decision::RateLimited { retry_after_seconds } => {
            tracing::warn!(tool = tool_name, retry_after_seconds, "rate limited")
        }
        Decision::Aborted => tracing::warn!(tool = tool_name, "aborted by operator"),
    }
}

fn display_summary(tool_call: &ToolCall) -> String {
    if let Some(command) = tool_call.string_arg("command") {
        return format!("{}: {command}", tool_call.name);
    }
    if let Some(path) = tool_call.string_arg("path") {
        return format!("{}: {path}", tool_call.name);
    }
    format!("{}: {}", tool_call.name, tool_call.arguments)
}

/// Per-process (or per-subagent) policy state.
pub struct Engine {
    categories: HashMap<GateCategory, GateAction>,
    regex_allowlist: Vec<RegexAllowlistEntry>,
    regex_static_count: usize,
    shell_allowlist: Vec<ShellAllowlistEntry>,
    shell_static_count: usize,
    rate_limiter: RateLimiter,
    interactive: bool,
    gating_enabled: bool,
    upstream: Option<Arc<dyn UpstreamChannel>>,
}

impl Engine {
    /// Zero the category map, apply defaults, fold in the parsed config, and
    /// mark everything loaded so far as static.
    pub fn init(config: GateConfig, interactive: bool) -> Result<Engine, GateError> {
        let mut categories = HashMap::new();
        for category in ALL_CATEGORIES {
            categories.insert(category, category.default_action());
        }
        for (category, action) in &config.category_overrides {
            categories.insert(*category, *action);
        }

        let mut engine = Engine {
            categories,
            regex_allowlist: Vec::new(),
            regex_static_count: 0,
            shell_allowlist: Vec::new(),
            shell_static_count: 0,
            rate_limiter: RateLimiter::new(),
            interactive,
            gating_enabled: config.enabled,
            upstream: None,
        };

        for entry in &config.allowlist {
            match entry {
                ConfigAllowlistEntry::Regex { tool, pattern } => engine.add_allowlist(tool.clone(), pattern),
                ConfigAllowlistEntry::Shell { command, dialect } => {
                    engine.add_shell_allowlist(command.clone(), *dialect)
                }
            }
        }
        engine.regex_static_count = engine.regex_allowlist.len();
        engine.shell_static_count = engine.shell_allowlist.len();

        Ok(engine)
    }

    /// Deep-copy categories and static allowlist entries only; a fresh rate
    /// limiter; no upstream channel (the caller wires one in if this engine
    /// belongs to a spawned subagent). Session entries never propagate to a
    /// spawned subagent's own engine.
    pub fn init_from_parent(parent: &Engine) -> Engine {
        let regex_allowlist = parent.regex_allowlist[..parent.regex_static_count].to_vec();
        let shell_allowlist = parent.shell_allowlist[..parent.shell_static_count].to_vec();
        let regex_static_count = regex_allowlist.len();
        let shell_static_count = shell_allowlist.len();
        Engine {
            categories: parent.categories.clone(),
            regex_allowlist,
            regex_static_count,
            shell_allowlist,
            shell_static_count,
            rate_limiter: RateLimiter::new(),
            interactive: false,
            gating_enabled: parent.gating_enabled,
            upstream: None,
        }
    }

    pub fn set_category_action(&mut self, category: GateCategory, action: GateAction) {
        self.categories.insert(category, action);
    }

    pub fn add_allowlist(&mut self, tool_name: impl Into<String>, pattern: &str) {
        self.regex_allowlist.push(RegexAllowlistEntry {
            tool_name: tool_name.into(),
            compiled: Regex::new(pattern).ok(),
        });
    }

    pub fn add_shell_allowlist(&mut self, tokens: Vec<String>, dialect: Dialect) {
        self.shell_allowlist.push(ShellAllowlistEntry { tokens, dialect });
    }

    /// Parse a `--allow TOOL:SPEC` CLI flag. `shell:a,b,c` becomes a shell
    /// allowlist entry with dialect `Unknown` (matches any dialect); anything
    /// else becomes a regex allowlist entry for that tool name.
    pub fn add_cli_allow(&mut self, spec: &str) -> Result<(), GateError> {
        let Some((tool, rest)) = spec.split_once(':') else {
            return Err(GateError::InvalidCliAllow {
                spec: spec.to_string(),
                reason: "missing ':' separator",
            });
        };
        if rest.is_empty() {
            return Err(GateError::InvalidCliAllow {
                spec: spec.to_string(),
                reason: "empty spec after ':'",
            });
        }
        if tool == "shell" {
            let tokens = rest.split(',').map(str::to_string).collect();
            self.add_shell_allowlist(tokens, Dialect::Unknown);
        } else {
            self.add_allowlist(tool, rest);
        }
        Ok(())
    }

    pub fn enable_yolo(&mut self) {
        self.gating_enabled = false;
    }

    fn resolve_category(&self, tool_name: &str, resolver: &dyn ExtensionResolver) -> Option<GateCategory> {
        builtin_category(tool_name).or_else(|| resolver.resolve_category(tool_name))
    }

    /// The match target a regex allowlist entry is tested against: the
    /// `path` argument's bare value for file-category tools (matching what
    /// the Pattern Generator anchors its regex against, not the surrounding
    /// JSON), the string value of the resolver-declared match argument for
    /// extension tools, or the raw arguments JSON otherwise.
    fn match_target<'a>(
        &self,
        tool_call: &'a ToolCall,
        category: Option<GateCategory>,
        resolver: &dyn ExtensionResolver,
    ) -> Cow<'a, str> {
        if matches!(category, Some(GateCategory::FileRead) | Some(GateCategory::FileWrite)) {
            if let Some(path) = tool_call.string_arg("path") {
                return Cow::Owned(path);
            }
        } else if builtin_category(&tool_call.name).is_none() {
            if let Some(arg_name) = resolver.match_argument_name(&tool_call.name) {
                if let Some(value) = tool_call.string_arg(arg_name) {
                    return Cow::Owned(value);
                }
            }
        }
        Cow::Borrowed(tool_call.arguments.as_str())
    }

    fn shell_allowlist_matches(&self, tool_call: &ToolCall) -> bool {
        let Some(command) = tool_call.string_arg("command") else {
            return false;
        };
        let Some(parsed) = shell::parse(&command) else {
            return false;
        };
        if !parsed.is_safe_for_matching() {
            return false;
        }
        self.shell_allowlist
            .iter()
            .filter(|entry| matches!(entry.dialect, Dialect::Unknown) || entry.dialect == parsed.dialect)
            .any(|entry| shell::matches_prefix(&parsed, &entry.tokens))
    }

    /// Category lookup plus allowlist match, without touching the rate
    /// limiter, an upstream channel, or a prompter.
    pub fn requires_check(&self, tool_call: &ToolCall, resolver: &dyn ExtensionResolver) -> RequiresCheck {
        if !self.gating_enabled {
            return RequiresCheck::Allow;
        }
        let category = self.resolve_category(&tool_call.name, resolver);
        let action = category
            .and_then(|c| self.categories.get(&c).copied())
            .unwrap_or(GateAction::Gate);

        match action {
            GateAction::Allow => RequiresCheck::Allow,
            GateAction::Deny => RequiresCheck::Deny,
            GateAction::Gate => {
                let matched = if category == Some(GateCategory::Shell) {
                    self.shell_allowlist_matches(tool_call)
                } else {
                    let target = self.match_target(tool_call, category, resolver);
                    self.regex_allowlist
                        .iter()
                        .any(|entry| entry.tool_name == tool_call.name && entry.is_match(&target))
                };
                if matched {
                    RequiresCheck::Allow
                } else {
                    RequiresCheck::Prompt
                }
            }
        }
    }

    fn record_outcome(&mut self, tool_name: &str, decision: &Decision) {
        match decision {
            Decision::Allowed { .. } | Decision::AllowedAlways { .. } => self.rate_limiter.reset(tool_name),
            Decision::Denied | Decision::NonInteractiveDenied | Decision::RateLimited { .. } => {
                self.rate_limiter.record_denial(tool_name)
            }
            Decision::Aborted => {}
        }
    }

    /// Derive an allow-always pattern for `tool_call` via the Pattern
    /// Generator, install it as a new session allowlist entry, and return
    /// its human-readable form for the `Decision::AllowedAlways` payload.
    fn install_always_pattern(&mut self, tool_call: &ToolCall, resolver: &dyn ExtensionResolver) -> String {
        let category = self.resolve_category(&tool_call.name, resolver);

        if category == Some(GateCategory::Shell) {
            if let Some(command) = tool_call.string_arg("command") {
                if let Some(parsed) = shell::parse(&command) {
                    if let Some(GeneratedPattern::ShellPrefix(tokens, dialect)) = pattern::generate_shell_pattern(&parsed) {
                        let readable = tokens.join(" ");
                        self.add_shell_allowlist(tokens, dialect);
                        return readable;
                    }
                }
            }
        } else if matches!(category, Some(GateCategory::FileRead) | Some(GateCategory::FileWrite)) {
            if let Some(path) = tool_call.string_arg("path") {
                let home = dirs::home_dir();
                if let GeneratedPattern::Regex(re) = pattern::generate_file_pattern(Path::new(&path), home.as_deref()) {
                    self.add_allowlist(tool_call.name.clone(), &re);
                    return re;
                }
            }
        } else if let Some(arg_name) = resolver.match_argument_name(&tool_call.name) {
            if let Some(value) = tool_call.string_arg(arg_name) {
                if let GeneratedPattern::Regex(re) = pattern::generate_extension_pattern(&value) {
                    self.add_allowlist(tool_call.name.clone(), &re);
                    return re;
                }
            }
        }

        // No extractable match target: still honor ALWAYS by matching any
        // future call to this tool name.
        self.add_allowlist(tool_call.name.clone(), ".*");
        ".*".to_string()
    }

    pub fn set_upstream_channel(&mut self, channel: Arc<dyn UpstreamChannel>) {
        self.upstream = Some(channel);
    }

    /// Single-call state machine.
    pub async fn check(
        &mut self,
        tool_call: &ToolCall,
        resolver: &dyn ExtensionResolver,
        prompter: Option<&dyn Prompter>,
    ) -> Decision {
        if self.rate_limiter.is_blocked(&tool_call.name) {
            let decision = Decision::RateLimited {
                retry_after_seconds: self.rate_limiter.remaining(&tool_call.name),
            };
            log_decision(&tool_call.name, &decision);
            return decision;
        }

        let decision = match self.requires_check(tool_call, resolver) {
            RequiresCheck::Allow => {
                self.rate_limiter.reset(&tool_call.name);
                Decision::allowed()
            }
            RequiresCheck::Deny => {
                self.rate_limiter.record_denial(&tool_call.name);
                Decision::Denied
            }
            RequiresCheck::Prompt => self.resolve_prompt(tool_call, resolver, prompter).await,
        };
        log_decision(&tool_call.name, &decision);
        decision
    }

    async fn resolve_prompt(
        &mut self,
        tool_call: &ToolCall,
        resolver: &dyn ExtensionResolver,
        prompter: Option<&dyn Prompter>,
    ) -> Decision {
        if let Some(channel) = self.upstream.clone() {
            let summary = display_summary(tool_call);
            return match channel.request_approval(tool_call, &summary).await {
                Ok(decision) => {
                    self.record_outcome(&tool_call.name, &decision);
                    decision
                }
                Err(_) => {
                    self.rate_limiter.record_denial(&tool_call.name);
                    Decision::Denied
                }
            };
        }

        if !self.interactive {
            self.rate_limiter.record_denial(&tool_call.name);
            return Decision::NonInteractiveDenied;
        }

        let Some(prompter) = prompter else {
            self.rate_limiter.record_denial(&tool_call.name);
            return Decision::NonInteractiveDenied;
        };
        self.prompt_single(tool_call, resolver, prompter).await
    }

    async fn prompt_single(
        &mut self,
        tool_call: &ToolCall,
        resolver: &dyn ExtensionResolver,
        prompter: &dyn Prompter,
    ) -> Decision {
        let preview = display_summary(tool_call);
        loop {
            prompter.show_single(&tool_call.name, &preview).await;
            match prompter.read_key().await {
                PromptKey::Allow => {
                    prompter.clear_prompt().await;
                    self.rate_limiter.reset(&tool_call.name);
                    return Decision::allowed();
                }
                PromptKey::Deny => {
                    prompter.clear_prompt().await;
                    self.rate_limiter.record_denial(&tool_call.name);
                    return Decision::Denied;
                }
                PromptKey::AllowAlways => {
                    prompter.clear_prompt().await;
                    self.rate_limiter.reset(&tool_call.name);
                    let pattern = self.install_always_pattern(tool_call, resolver);
                    return Decision::AllowedAlways {
                        pattern,
                        approved_path: None,
                    };
                }
                PromptKey::Details => {
                    let resolved = tool_call.string_arg("path").map(PathBuf::from);
                    let exists = resolved.as_deref().map(Path::exists).unwrap_or(false);
                    prompter.show_details(&tool_call.name, resolved.as_deref(), exists).await;
                }
                PromptKey::Digit(_) => {
                    // Digit selection only means something inside a batch
                    // prompt; outside one it's simply ignored and re-prompts.
                }
                PromptKey::Interrupted => {
                    prompter.clear_prompt().await;
                    return Decision::Aborted;
                }
            }
        }
    }

    /// Batch state machine. Consolidation order: `Aborted` >
    /// `Denied` > `RateLimited` > `AllowedAlways` (only if every *prompted*
    /// item chose ALWAYS) > `Allowed`.
    pub async fn check_batch(
        &mut self,
        tool_calls: &[ToolCall],
        resolver: &dyn ExtensionResolver,
        prompter: Option<&dyn Prompter>,
    ) -> Decision {
        if tool_calls.is_empty() {
            return Decision::allowed();
        }

        let mut entries: Vec<(bool, Decision)> = Vec::with_capacity(tool_calls.len());
        let mut pending_indices = Vec::new();

        for call in tool_calls {
            if self.rate_limiter.is_blocked(&call.name) {
                entries.push((
                    false,
                    Decision::RateLimited {
                        retry_after_seconds: self.rate_limiter.remaining(&call.name),
                    },
                ));
                continue;
            }
            match self.requires_check(call, resolver) {
                RequiresCheck::Allow => {
                    self.rate_limiter.reset(&call.name);
                    entries.push((false, Decision::allowed()));
                }
                RequiresCheck::Deny => {
                    self.rate_limiter.record_denial(&call.name);
                    entries.push((false, Decision::Denied));
                }
                RequiresCheck::Prompt => {
                    pending_indices.push(entries.len());
                    entries.push((true, Decision::Aborted));
                }
            }
        }

        if !pending_indices.is_empty() {
            if let Some(channel) = self.upstream.clone() {
                for &idx in &pending_indices {
                    let call = &tool_calls[idx];
                    let summary = display_summary(call);
                    let decision = match channel.request_approval(call, &summary).await {
                        Ok(decision) => {
                            self.record_outcome(&call.name, &decision);
                            decision
                        }
                        Err(_) => {
                            self.rate_limiter.record_denial(&call.name);
                            Decision::Denied
                        }
                    };
                    entries[idx].1 = decision;
                }
            } else if !self.interactive {
                for &idx in &pending_indices {
                    self.rate_limiter.record_denial(&tool_calls[idx].name);
                    entries[idx].1 = Decision::NonInteractiveDenied;
                }
            } else if let Some(prompter) = prompter {
                let pending_calls: Vec<ToolCall> = pending_indices.iter().map(|&i| tool_calls[i].clone()).collect();
                let decisions = self.prompt_batch(&pending_calls, resolver, prompter).await;
                for (&idx, decision) in pending_indices.iter().zip(decisions) {
                    entries[idx].1 = decision;
                }
            } else {
                for &idx in &pending_indices {
                    self.rate_limiter.record_denial(&tool_calls[idx].name);
                    entries[idx].1 = Decision::NonInteractiveDenied;
                }
            }
        }

        let decision = consolidate(&entries);
        log_decision("batch", &decision);
        decision
    }

    async fn prompt_batch(
        &mut self,
        pending: &[ToolCall],
        resolver: &dyn ExtensionResolver,
        prompter: &dyn Prompter,
    ) -> Vec<Decision> {
        let mut decisions: Vec<Option<Decision>> = vec![None; pending.len()];

        loop {
            prompter.show_batch(pending, &decisions).await;
            if decisions.iter().all(Option::is_some) {
                break;
            }

            match prompter.read_key().await {
                PromptKey::Allow => {
                    for (call, slot) in pending.iter().zip(decisions.iter_mut()) {
                        if slot.is_none() {
                            self.rate_limiter.reset(&call.name);
                            *slot = Some(Decision::allowed());
                        }
                    }
                }
                PromptKey::Deny => {
                    for (call, slot) in pending.iter().zip(decisions.iter_mut()) {
                        if slot.is_none() {
                            self.rate_limiter.record_denial(&call.name);
                            *slot = Some(Decision::Denied);
                        }
                    }
                }
                PromptKey::Digit(n) => {
                    if let Some(idx) = (n as usize).checked_sub(1) {
                        if let Some(call) = pending.get(idx) {
                            if decisions[idx].is_none() {
                                let outcome = self.prompt_single(call, resolver, prompter).await;
                                decisions[idx] = Some(outcome);
                            }
                        }
                    }
                }
                PromptKey::Interrupted => {
                    for slot in decisions.iter_mut() {
                        if slot.is_none() {
                            *slot = Some(Decision::Aborted);
                        }
                    }
                }
                PromptKey::AllowAlways | PromptKey::Details => {
                    // Neither key means anything at the top-level batch view
                    // (AllowAlways and Details only apply to a single
                    // selected item, reached via a digit first); re-render.
                }
            }
        }

        prompter.clear_batch_prompt(pending.len()).await;
        decisions.into_iter().map(|d| d.unwrap_or(Decision::Aborted)).collect()
    }
}

fn consolidate(entries: &[(bool, Decision)]) -> Decision {
    if entries.iter().any(|(_, d)| matches!(d, Decision::Aborted)) {
        return Decision::Aborted;
    }
    if entries
        .iter()
        .any(|(_, d)| matches!(d, Decision::Denied | Decision::NonInteractiveDenied))
    {
        return Decision::Denied;
    }
    if let Some((_, Decision::RateLimited { retry_after_seconds })) =
        entries.iter().find(|(_, d)| matches!(d, Decision::RateLimited { .. }))
    {
        return Decision::RateLimited {
            retry_after_seconds: *retry_after_seconds,
        };
    }

    let prompted: Vec<&(bool, Decision)> = entries.iter().filter(|(was_prompted, _)| *was_prompted).collect();
    if !prompted.is_empty() && prompted.iter().all(|(_, d)| matches!(d, Decision::AllowedAlways { .. })) {
        if let Some((_, last)) = prompted.last() {
            return last.clone();
        }
    }

    Decision::allowed()
}
