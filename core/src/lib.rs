//! The approval gate engine: the policy core that decides, for every tool
//! call a model issues, whether it is allowed, denied, rate-limited, or must
//! be confirmed by the human operator.
//!
//! Four tightly coupled pieces make up the core:
//! [`shell`] (the Shell Command Parser), [`pattern`] (the Pattern
//! Generator), [`rate_limit`] (the Denial Rate Limiter), and [`engine`] (the
//! Approval Gate Engine itself, which hosts the other three). [`prompter`]
//! and [`channel`] are the two ways a `Prompt` verdict gets resolved: an
//! interactive TTY, or a forwarded request from a subagent.

pub mod channel;
pub mod config;
pub mod engine;
pub mod error;
pub mod pattern;
pub mod prompter;
pub mod rate_limit;
pub mod resolver;
pub mod shell;

pub use channel::ParentApprovalLoop;
pub use channel::SubagentChannel;
pub use channel::UpstreamChannel;
pub use config::GateConfig;
pub use engine::Engine;
pub use engine::RequiresCheck;
pub use error::GateError;
pub use prompter::PromptKey;
pub use prompter::Prompter;
pub use prompter::TtyPrompter;
pub use resolver::ExtensionResolver;
pub use resolver::NullResolver;
