//! `gatectl`: the approval gate's CLI surface. Parses the
//! hosting agent's pass-through flags, seeds an [`Engine`] from the JSON
//! config plus those flags, and drives it over a line-oriented stdin/stdout
//! protocol: one JSON [`ToolCall`] per input line, one JSON [`Decision`] per
//! output line.

use std::io::IsTerminal;
use std::sync::Arc;

use clap::Parser;
use gate_core::Engine;
use gate_core::GateConfig;
use gate_core::NullResolver;
use gate_core::TtyPrompter;
use gate_core::config::default_config_path;
use gate_protocol::Decision;
use gate_protocol::ToolCall;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

/// Name of the directory under the platform config root this tool's
/// `config.json` lives in.
pub const APP_NAME: &str = "approval-gate";

#[derive(Debug, Parser)]
#[command(author, version, about = "Approval gate policy engine for agent tool calls")]
pub struct Cli {
    /// Disable the gate entirely; every decision becomes `Allowed`.
    #[arg(long)]
    pub yolo: bool,

    /// Pre-approve a tool, repeatable. `TOOL:SPEC`; `shell:git,log` or
    /// `write_file:^/tmp/.*\.txt$`.
    #[arg(long = "allow", value_name = "TOOL:SPEC")]
    pub allow: Vec<String>,

    /// Override a category's default action. `NAME=ACTION`, e.g.
    /// `network=deny`.
    #[arg(long = "allow-category", value_name = "NAME=ACTION")]
    pub allow_category: Vec<String>,
}

/// Initialize logging the way the host agent's other entry points do:
/// `RUST_LOG` if set and valid, `error` otherwise, written to stderr so it
/// never interleaves with the tool-call/decision protocol on stdout.
pub fn init_logging() {
    let default_level = "error";
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_level)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

/// Build an `Engine` from config-file defaults plus this process's CLI
/// flags (pass-through from the hosting agent).
pub fn build_engine(cli: &Cli) -> Result<Engine, gate_core::GateError> {
    let config = match default_config_path(APP_NAME) {
        Some(path) => GateConfig::load_from_path(&path),
        None => GateConfig::default(),
    };
    let interactive = std::io::stdin().is_terminal();
    let mut engine = Engine::init(config, interactive)?;

    if cli.yolo {
        engine.enable_yolo();
    }
    for spec in &cli.allow {
        engine.add_cli_allow(spec)?;
    }
    for spec in &cli.allow_category {
        apply_category_override(&mut engine, spec)?;
    }

    Ok(engine)
}

fn apply_category_override(engine: &mut Engine, spec: &str) -> Result<(), gate_core::GateError> {
    let (name, action) = spec.split_once('=').ok_or_else(|| gate_core::GateError::InvalidCliAllow {
        spec: spec.to_string(),
        reason: "missing '=' separator",
    })?;
    let category = gate_protocol::GateCategory::from_config_key(name).ok_or_else(|| {
        gate_core::GateError::InvalidCliAllow {
            spec: spec.to_string(),
            reason: "unrecognized category name",
        }
    })?;
    let action = gate_protocol::GateAction::from_config_value(action).ok_or_else(|| {
        gate_core::GateError::InvalidCliAllow {
            spec: spec.to_string(),
            reason: "unrecognized action (expected allow|gate|deny)",
        }
    })?;
    engine.set_category_action(category, action);
    Ok(())
}

/// Read `ToolCall` JSON, one per line, from `input`; write the resulting
/// `Decision` JSON, one per line, to `output`. Malformed input lines are
/// skipped with a warning rather than aborting the whole stream — the
/// calling agent process is expected to keep running regardless of one bad
/// line.
pub async fn run_stdin_driver(
    mut engine: Engine,
    input: impl tokio::io::AsyncRead + Unpin,
    mut output: impl tokio::io::AsyncWrite + Unpin,
) -> std::io::Result<()> {
    let resolver = NullResolver;
    let prompter = TtyPrompter::create().map(|p| Arc::new(p) as Arc<dyn gate_core::Prompter>);

    let mut lines = BufReader::new(input).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let tool_call: ToolCall = match serde_json::from_str(&line) {
            Ok(call) => call,
            Err(err) => {
                tracing::warn!(error = %err, "skipping malformed tool call line");
                continue;
            }
        };

        let decision: Decision = engine
            .check(&tool_call, &resolver, prompter.as_deref())
            .await;
        let encoded = serde_json::to_string(&decision).unwrap_or_else(|_| r#"{"decision":"denied"}"#.to_string());
        output.write_all(encoded.as_bytes()).await?;
        output.write_all(b"\n").await?;
        output.flush().await?;
    }

    Ok(())
}
