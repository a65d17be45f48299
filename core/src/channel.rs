//! Subagent Approval Channel.
//!
//! A subagent is spawned with two pipes — one carrying requests up to the
//! parent, one carrying responses back down. Rather than a single-threaded
//! `poll()` loop on the parent side, this module uses one task per subagent
//! channel, serializing calls to the prompter through a shared `Engine`
//! mutex. Each pipe is modeled as one direction of a
//! `tokio::net::UnixStream::pair()` — the unused half of each pair is simply
//! never touched by either process.

use std::sync::Arc;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::time::Duration;

use futures::SinkExt;
use futures::StreamExt;
use gate_protocol::ApprovalRequestWire;
use gate_protocol::ApprovalResponseWire;
use gate_protocol::Decision;
use gate_protocol::ToolCall;
use gate_protocol::WireResult;
use tokio::net::UnixStream;
use tokio::sync::Mutex as AsyncMutex;
use bytes::Buf;
use bytes::BufMut;
use bytes::BytesMut;
use tokio_util::codec::Decoder;
use tokio_util::codec::Encoder;
use tokio_util::codec::Framed;

use crate::engine::Engine;
use crate::error::GateError;
use crate::error::ProtocolError;
use crate::prompter::Prompter;
use crate::resolver::ExtensionResolver;

/// Frames larger than this are a protocol error, not a buffering concern.
pub const MAX_FRAME_BYTES: usize = 64 * 1024;
/// Default deadline a subagent waits for a response before giving up, also
/// configurable via [`SubagentChannel::with_timeout`].
pub const DEFAULT_CHANNEL_TIMEOUT: Duration = Duration::from_secs(5 * 60);

impl From<std::io::Error> for ProtocolError {
    fn from(_: std::io::Error) -> Self {
        ProtocolError::IncompleteFrame
    }
}

/// NUL-delimited framing: each message is a UTF-8 JSON object, no length
/// prefix, terminated by a single `0x00` byte.
#[derive(Debug, Default)]
struct NulFramedCodec;

impl Decoder for NulFramedCodec {
    type Item = BytesMut;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match src.iter().position(|&byte| byte == 0) {
            Some(pos) if pos > MAX_FRAME_BYTES => {
                src.clear();
                Err(ProtocolError::FrameTooLarge)
            }
            Some(pos) => {
                let frame = src.split_to(pos);
                src.advance(1);
                Ok(Some(frame))
            }
            None if src.len() > MAX_FRAME_BYTES => {
                src.clear();
                Err(ProtocolError::FrameTooLarge)
            }
            None => Ok(None),
        }
    }
}

impl Encoder<Vec<u8>> for NulFramedCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Vec<u8>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > MAX_FRAME_BYTES {
            return Err(ProtocolError::FrameTooLarge);
        }
        dst.put_slice(&item);
        dst.put_u8(0);
        Ok(())
    }
}

/// The parent-facing side of a channel: anything that can turn a
/// `Prompt`-verdict tool call into a `Decision` by forwarding it somewhere
/// upstream. Implemented by [`SubagentChannel`]; engines without a channel
/// simply hold `None` and resolve `Prompt` locally.
#[async_trait::async_trait]
pub trait UpstreamChannel: Send + Sync {
    async fn request_approval(&self, tool_call: &ToolCall, display_summary: &str) -> Result<Decision, GateError>;
}

fn wire_result_to_decision(result: WireResult, pattern: String) -> Decision {
    match result {
        WireResult::Allowed => Decision::allowed(),
        WireResult::Denied => Decision::Denied,
        WireResult::AllowedAlways => Decision::AllowedAlways {
            pattern,
            approved_path: None,
        },
        WireResult::Aborted => Decision::Aborted,
        // The wire format carries no retry-after value (its response shape
        // is `{request_id, result, pattern}`); the subagent can't know its
        // parent's back-off window, so it reports zero and relies on the
        // parent having already denied/blocked the retry.
        WireResult::RateLimited => Decision::RateLimited { retry_after_seconds: 0 },
    }
}

fn decision_to_wire(decision: &Decision) -> (WireResult, String) {
    match decision {
        Decision::Allowed { .. } => (WireResult::Allowed, String::new()),
        Decision::Denied | Decision::NonInteractiveDenied => (WireResult::Denied, String::new()),
        Decision::AllowedAlways { pattern, .. } => (WireResult::AllowedAlways, pattern.clone()),
        Decision::Aborted => (WireResult::Aborted, String::new()),
        Decision::RateLimited { .. } => (WireResult::RateLimited, String::new()),
    }
}

/// Subagent-side channel handle: request writer, response reader, and the
/// monotonic id counter the subagent owns. The two `Framed` halves are each
/// guarded by their own mutex rather than one shared lock, since a
/// well-behaved subagent never has more than one outstanding request at a
/// time anyway — the mutexes make that a compile-time-enforced property
/// instead of a documented convention.
pub struct SubagentChannel {
    request_tx: AsyncMutex<Framed<UnixStream, NulFramedCodec>>,
    response_rx: AsyncMutex<Framed<UnixStream, NulFramedCodec>>,
    next_request_id: AtomicU32,
    timeout: Duration,
}

impl SubagentChannel {
    pub fn new(request_pipe: UnixStream, response_pipe: UnixStream) -> Self {
        Self {
            request_tx: AsyncMutex::new(Framed::new(request_pipe, NulFramedCodec)),
            response_rx: AsyncMutex::new(Framed::new(response_pipe, NulFramedCodec)),
            next_request_id: AtomicU32::new(1),
            timeout: DEFAULT_CHANNEL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait::async_trait]
impl UpstreamChannel for SubagentChannel {
    async fn request_approval(&self, tool_call: &ToolCall, display_summary: &str) -> Result<Decision, GateError> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::SeqCst);
        let request = ApprovalRequestWire {
            request_id,
            tool_name: tool_call.name.clone(),
            arguments_json: tool_call.arguments.clone(),
            display_summary: display_summary.to_string(),
        };
        let encoded =
            serde_json::to_vec(&request).map_err(|err| ProtocolError::MalformedJson(err.to_string()))?;

        {
            let mut tx = self.request_tx.lock().await;
            tx.send(encoded).await?;
        }

        let frame = {
            let mut rx = self.response_rx.lock().await;
            let next = tokio::time::timeout(self.timeout, rx.next())
                .await
                .map_err(|_| ProtocolError::Timeout)?;
            next.ok_or(ProtocolError::IncompleteFrame)??
        };

        let response: ApprovalResponseWire =
            serde_json::from_slice(&frame).map_err(|err| ProtocolError::MalformedJson(err.to_string()))?;
        if response.request_id != request_id {
            return Err(GateError::Protocol(ProtocolError::RequestIdMismatch {
                expected: request_id,
                got: response.request_id,
            }));
        }
        let result = WireResult::try_from_u8(response.result).ok_or_else(|| {
            ProtocolError::MalformedJson(format!("unrecognized result code {}", response.result))
        })?;
        Ok(wire_result_to_decision(result, response.pattern))
    }
}

/// Parent-side runner: one task per child channel, all funneled through the
/// same `Engine` mutex so at most one prompt is ever on-screen at once, no
/// matter how many subagents forward concurrently.
pub struct ParentApprovalLoop {
    engine: Arc<AsyncMutex<Engine>>,
    resolver: Arc<dyn ExtensionResolver>,
    prompter: Option<Arc<dyn Prompter>>,
}

impl ParentApprovalLoop {
    pub fn new(
        engine: Arc<AsyncMutex<Engine>>,
        resolver: Arc<dyn ExtensionResolver>,
        prompter: Option<Arc<dyn Prompter>>,
    ) -> Self {
        Self {
            engine,
            resolver,
            prompter,
        }
    }

    /// Spawn the forwarding loop for one subagent's pipes. Returns once the
    /// child closes either end.
    pub fn spawn_child(&self, request_pipe: UnixStream, response_pipe: UnixStream) -> tokio::task::JoinHandle<()> {
        let engine = self.engine.clone();
        let resolver = self.resolver.clone();
        let prompter = self.prompter.clone();
        tokio::spawn(async move {
            tracing::debug!("subagent approval channel opened");
            let mut requests = Framed::new(request_pipe, NulFramedCodec);
            let mut responses = Framed::new(response_pipe, NulFramedCodec);

            loop {
                let frame = match requests.next().await {
                    Some(Ok(frame)) => frame,
                    Some(Err(err)) => {
                        tracing::warn!(error = %err, "subagent channel framing error, closing");
                        break;
                    }
                    None => break,
                };
                let Ok(request) = serde_json::from_slice::<ApprovalRequestWire>(&frame) else {
                    tracing::warn!("malformed approval request frame, ignoring");
                    continue;
                };
                let tool_call = ToolCall::new(
                    request.request_id.to_string(),
                    request.tool_name,
                    request.arguments_json,
                );

                let decision = {
                    let mut engine = engine.lock().await;
                    engine.check(&tool_call, resolver.as_ref(), prompter.as_deref()).await
                };

                let (result, pattern) = decision_to_wire(&decision);
                let response = ApprovalResponseWire {
                    request_id: request.request_id,
                    result: result.to_u8(),
                    pattern,
                };
                let Ok(encoded) = serde_json::to_vec(&response) else {
                    break;
                };
                if responses.send(encoded).await.is_err() {
                    tracing::warn!("failed to send approval response, closing channel");
                    break;
                }
            }
            tracing::debug!("subagent approval channel closed");
        })
    }
}

/// Set up both pipe pairs for a freshly spawned subagent: the subagent's
/// channel handle, plus the two parent-side halves to pass to
/// [`ParentApprovalLoop::spawn_child`].
pub fn spawn_subagent_channels() -> std::io::Result<(SubagentChannel, UnixStream, UnixStream)> {
    let (child_request_tx, parent_request_rx) = UnixStream::pair()?;
    let (parent_response_tx, child_response_rx) = UnixStream::pair()?;
    let channel = SubagentChannel::new(child_request_tx, child_response_rx);
    Ok((channel, parent_request_rx, parent_response_tx))
}
