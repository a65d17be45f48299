use std::io::Cursor;

use gate_cli::Cli;
use gate_cli::build_engine;
use gate_cli::run_stdin_driver;
use gate_protocol::ToolCall;
use serde_json::Value;

fn cli(args: &[&str]) -> Cli {
    let mut full = vec!["gatectl"];
    full.extend_from_slice(args);
    <Cli as clap::Parser>::parse_from(full)
}

fn call(name: &str, arguments: &str) -> ToolCall {
    ToolCall::new("1", name, arguments)
}

async fn drive(engine: gate_core::Engine, calls: &[ToolCall]) -> Vec<Value> {
    let mut input = String::new();
    for call in calls {
        input.push_str(&serde_json::to_string(call).unwrap());
        input.push('\n');
    }
    let mut output = Cursor::new(Vec::new());
    run_stdin_driver(engine, Cursor::new(input.into_bytes()), &mut output)
        .await
        .unwrap();
    String::from_utf8(output.into_inner())
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn file_read_is_allowed_by_default_with_no_tty() {
    let engine = build_engine(&cli(&[])).unwrap();
    let c = call("read_file", r#"{"path":"/tmp/x.txt"}"#);
    let decisions = drive(engine, &[c]).await;
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0]["decision"], "allowed");
}

#[tokio::test]
async fn gated_category_denies_without_a_tty_to_prompt_on() {
    let engine = build_engine(&cli(&[])).unwrap();
    let c = call("http_fetch", r#"{"url":"https://example.com"}"#);
    let decisions = drive(engine, &[c]).await;
    assert_eq!(decisions[0]["decision"], "non_interactive_denied");
}

#[tokio::test]
async fn allow_category_flag_flips_a_gated_category_to_allow() {
    let engine = build_engine(&cli(&["--allow-category", "network=allow"])).unwrap();
    let c = call("http_fetch", r#"{"url":"https://example.com"}"#);
    let decisions = drive(engine, &[c]).await;
    assert_eq!(decisions[0]["decision"], "allowed");
}

#[tokio::test]
async fn yolo_allows_a_call_that_would_otherwise_be_gated() {
    let engine = build_engine(&cli(&["--yolo"])).unwrap();
    let c = call("exec_command", r#"{"command":"rm -rf /"}"#);
    let decisions = drive(engine, &[c]).await;
    assert_eq!(decisions[0]["decision"], "allowed");
}

#[tokio::test]
async fn cli_allow_spec_pre_approves_a_matching_shell_command() {
    let engine = build_engine(&cli(&["--allow", "shell:git,status"])).unwrap();
    let c = call("shell", r#"{"command":"git status"}"#);
    let decisions = drive(engine, &[c]).await;
    assert_eq!(decisions[0]["decision"], "allowed");
}

#[tokio::test]
async fn blank_and_malformed_lines_are_skipped_without_aborting_the_stream() {
    let engine = build_engine(&cli(&[])).unwrap();
    let good = call("read_file", r#"{"path":"/tmp/x.txt"}"#);
    let mut input = String::new();
    input.push_str("not json at all\n");
    input.push('\n');
    input.push_str(&serde_json::to_string(&good).unwrap());
    input.push('\n');
    let mut output = Cursor::new(Vec::new());
    run_stdin_driver(engine, Cursor::new(input.into_bytes()), &mut output)
        .await
        .unwrap();
    let decisions: Vec<Value> = String::from_utf8(output.into_inner())
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0]["decision"], "allowed");
}

#[test]
fn invalid_cli_allow_spec_is_rejected_at_startup() {
    let err = build_engine(&cli(&["--allow", "no-colon-here"]));
    assert!(err.is_err());
}
