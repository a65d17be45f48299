//! Prompter Interface — the one component allowed to touch
//! the terminal. Writes exclusively to stderr so they never interleave with
//! a streaming stdout response; owns raw-mode input for the duration of a
//! single key read.

use std::io::Write as _;
use std::path::Path;
use std::time::Duration;

use crossterm::event::Event;
use crossterm::event::KeyCode;
use crossterm::event::KeyEventKind;
use crossterm::event::KeyModifiers;
use crossterm::terminal;
use crossterm::tty::IsTty;
use gate_protocol::Decision;
use gate_protocol::ToolCall;

/// A classified keypress. Unrecognized input is filtered out before it
/// reaches here (`read_key` loops past it) rather than forced into one of
/// these variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKey {
    Allow,
    Deny,
    AllowAlways,
    Details,
    /// A digit 1-9 selecting an item within a batch prompt.
    Digit(u32),
    Interrupted,
}

/// Abstract "ask a user to confirm operation O" / "show batch" contract the
/// engine drives. A trait, not a concrete terminal type, so the engine's
/// tests can script responses without a real TTY.
#[async_trait::async_trait]
pub trait Prompter: Send + Sync {
    async fn show_single(&self, tool_name: &str, preview: &str);
    async fn show_details(&self, tool_name: &str, resolved_path: Option<&Path>, exists: bool);
    async fn show_batch(&self, tool_calls: &[ToolCall], statuses: &[Option<Decision>]);
    async fn read_key(&self) -> PromptKey;
    async fn read_key_timeout(&self, timeout: Duration) -> Option<PromptKey>;
    /// Erase the prompt just shown via `show_single`/`show_details`, leaving
    /// the terminal as if it never appeared (used on `Allowed` outcomes).
    async fn clear_prompt(&self);
    async fn clear_batch_prompt(&self, lines: usize);
}

/// The real, crossterm-backed prompter. `create` returns `None` when stdin
/// isn't a TTY — the engine then falls back to `NonInteractiveDenied` for
/// anything that would otherwise prompt.
pub struct TtyPrompter {
    last_lines: std::sync::atomic::AtomicUsize,
}

impl TtyPrompter {
    pub fn create() -> Option<Self> {
        if !std::io::stdin().is_tty() {
            return None;
        }
        terminal::enable_raw_mode().ok()?;
        Some(TtyPrompter {
            last_lines: std::sync::atomic::AtomicUsize::new(0),
        })
    }
}

impl Drop for TtyPrompter {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

fn classify(code: KeyCode, modifiers: KeyModifiers) -> Option<PromptKey> {
    if modifiers.contains(KeyModifiers::CONTROL) && matches!(code, KeyCode::Char('c') | KeyCode::Char('d')) {
        return Some(PromptKey::Interrupted);
    }
    match code {
        KeyCode::Char('y') | KeyCode::Char('Y') => Some(PromptKey::Allow),
        KeyCode::Char('n') | KeyCode::Char('N') => Some(PromptKey::Deny),
        KeyCode::Char('a') | KeyCode::Char('A') => Some(PromptKey::AllowAlways),
        KeyCode::Char('?') => Some(PromptKey::Details),
        KeyCode::Char(c) if c.is_ascii_digit() && c != '0' => c.to_digit(10).map(PromptKey::Digit),
        _ => None,
    }
}

fn blocking_read_key() -> PromptKey {
    loop {
        match crossterm::event::read() {
            Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                if let Some(prompt_key) = classify(key.code, key.modifiers) {
                    return prompt_key;
                }
            }
            Ok(_) => continue,
            Err(_) => return PromptKey::Interrupted,
        }
    }
}

fn status_mark(status: &Option<Decision>) -> &'static str {
    match status {
        None => " ",
        Some(Decision::Allowed { .. }) | Some(Decision::AllowedAlways { .. }) => "+",
        Some(Decision::Aborted) => "x",
        _ => "-",
    }
}

fn clear_lines(n: usize) {
    let mut stderr = std::io::stderr();
    if n > 0 {
        let _ = write!(stderr, "\x1b[{n}A");
    }
    let _ = write!(stderr, "\x1b[0J");
    let _ = stderr.flush();
}

#[async_trait::async_trait]
impl Prompter for TtyPrompter {
    async fn show_single(&self, tool_name: &str, preview: &str) {
        let mut stderr = std::io::stderr();
        let _ = write!(
            stderr,
            "\r\n{tool_name} wants to run:\r\n  {preview}\r\n[y]es [n]o [a]lways [?]details > "
        );
        let _ = stderr.flush();
        self.last_lines.store(3, std::sync::atomic::Ordering::Relaxed);
    }

    async fn show_details(&self, tool_name: &str, resolved_path: Option<&Path>, exists: bool) {
        let mut stderr = std::io::stderr();
        match resolved_path {
            Some(path) => {
                let state = if exists { "exists" } else { "does not exist" };
                let _ = write!(stderr, "\r\n  {tool_name} -> {} ({state})\r\n", path.display());
            }
            None => {
                let _ = write!(stderr, "\r\n  {tool_name} has no resolvable path\r\n");
            }
        }
        let _ = stderr.flush();
    }

    async fn show_batch(&self, tool_calls: &[ToolCall], statuses: &[Option<Decision>]) {
        let mut stderr = std::io::stderr();
        let _ = write!(stderr, "\r\n{} pending tool calls:\r\n", tool_calls.len());
        for (i, (call, status)) in tool_calls.iter().zip(statuses).enumerate() {
            let _ = write!(stderr, "  [{}] {} {}\r\n", status_mark(status), i + 1, call.name);
        }
        let _ = write!(stderr, "[y]es-all [n]o-all 1-9 select > ");
        let _ = stderr.flush();
    }

    async fn read_key(&self) -> PromptKey {
        tokio::task::spawn_blocking(blocking_read_key)
            .await
            .unwrap_or(PromptKey::Interrupted)
    }

    async fn read_key_timeout(&self, timeout: Duration) -> Option<PromptKey> {
        tokio::task::spawn_blocking(move || match crossterm::event::poll(timeout) {
            Ok(true) => Some(blocking_read_key()),
            Ok(false) => None,
            Err(_) => Some(PromptKey::Interrupted),
        })
        .await
        .unwrap_or(Some(PromptKey::Interrupted))
    }

    async fn clear_prompt(&self) {
        clear_lines(self.last_lines.swap(0, std::sync::atomic::Ordering::Relaxed));
    }

    async fn clear_batch_prompt(&self, lines: usize) {
        clear_lines(lines + 2);
    }
}
