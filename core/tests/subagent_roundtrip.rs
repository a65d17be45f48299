#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use gate_core::Engine;
use gate_core::GateConfig;
use gate_core::NullResolver;
use gate_core::ParentApprovalLoop;
use gate_core::PromptKey;
use gate_core::Prompter;
use gate_core::UpstreamChannel;
use gate_core::channel::spawn_subagent_channels;
use gate_protocol::Decision;
use gate_protocol::ToolCall;
use std::path::Path;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;

struct ScriptedPrompter {
    keys: Mutex<VecDeque<PromptKey>>,
}

impl ScriptedPrompter {
    fn new(keys: Vec<PromptKey>) -> Self {
        Self {
            keys: Mutex::new(keys.into()),
        }
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn show_single(&self, _tool_name: &str, _preview: &str) {}
    async fn show_details(&self, _tool_name: &str, _resolved_path: Option<&Path>, _exists: bool) {}
    async fn show_batch(&self, _tool_calls: &[ToolCall], _statuses: &[Option<Decision>]) {}

    async fn read_key(&self) -> PromptKey {
        self.keys.lock().unwrap().pop_front().unwrap_or(PromptKey::Deny)
    }

    async fn read_key_timeout(&self, _timeout: Duration) -> Option<PromptKey> {
        Some(self.read_key().await)
    }

    async fn clear_prompt(&self) {}
    async fn clear_batch_prompt(&self, _lines: usize) {}
}

/// A subagent forwards a gated shell call through its channel; the parent's
/// loop resolves it against a real `Engine` via a prompter answering
/// "allow always", and the subagent sees the resulting decision plus the
/// growth of the parent's own session allowlist.
#[tokio::test]
async fn subagent_forwarded_prompt_grows_parent_allowlist_and_skips_the_next_one() {
    let config = GateConfig::parse(r#"{"approval_gates": {"categories": {"shell": "gate"}}}"#);
    let parent_engine = Engine::init(config, true).unwrap();
    let engine = Arc::new(AsyncMutex::new(parent_engine));

    let prompter: Arc<dyn Prompter> = Arc::new(ScriptedPrompter::new(vec![PromptKey::AllowAlways]));
    let loop_runner = ParentApprovalLoop::new(engine.clone(), Arc::new(NullResolver), Some(prompter));

    let (subagent_channel, parent_request_rx, parent_response_tx) = spawn_subagent_channels().unwrap();
    let handle = loop_runner.spawn_child(parent_request_rx, parent_response_tx);

    let call = ToolCall::new("1", "shell", r#"{"command":"git log"}"#);
    let decision = subagent_channel.request_approval(&call, "git log").await.unwrap();
    assert!(matches!(decision, Decision::AllowedAlways { .. }));

    // A subagent's own engine never inherits this session entry.
    let subagent_engine = Engine::init_from_parent(&*engine.lock().await);
    let second_call = ToolCall::new("2", "shell", r#"{"command":"git log --oneline"}"#);
    let resolver = NullResolver;
    assert_eq!(
        subagent_engine.requires_check(&second_call, &resolver),
        gate_core::RequiresCheck::Prompt
    );

    // The parent itself matches immediately now, without prompting again.
    let prompter2: Arc<dyn Prompter> = Arc::new(ScriptedPrompter::new(vec![]));
    let mut guard = engine.lock().await;
    let decision2 = guard.check(&second_call, &resolver, Some(prompter2.as_ref())).await;
    assert_eq!(decision2, Decision::allowed());
    drop(guard);

    drop(subagent_channel);
    let _ = handle.await;
}
