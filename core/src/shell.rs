//! Shell Command Parser.
//!
//! Tokenizes a shell command string, classifies its dialect, and answers
//! whether the token stream is safe to use for allowlist prefix matching.
//! This is deliberately a much smaller lexer than a real shell grammar (the
//! teacher's `is_safe_command.rs` reaches for the full `tree-sitter-bash`
//! grammar to decide whether a command is "known safe"); here we only need
//! enough structure to preserve argument boundaries and to recognize the
//! handful of metacharacters that change control flow between commands.

use std::path::Path;

/// Shell dialect a command string is interpreted under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Bash,
    PowerShell,
    Cmd,
    Unknown,
}

/// The result of tokenizing a shell command string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedShellCommand {
    pub dialect: Dialect,
    /// Token sequence preserving argument boundaries; metacharacter tokens
    /// (`;`, `&&`, `|`, `>`, ...) appear verbatim alongside word tokens.
    pub tokens: Vec<String>,
    is_safe_for_matching: bool,
}

impl ParsedShellCommand {
    pub fn is_safe_for_matching(&self) -> bool {
        self.is_safe_for_matching
    }

    /// First token's basename, e.g. `/usr/bin/git` -> `git`.
    pub fn base_command(&self) -> Option<&str> {
        self.tokens.first().map(|t| basename(t))
    }
}

fn basename(token: &str) -> &str {
    Path::new(token)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(token)
}

/// Parse `command_string`. Returns `None` only on empty input. Malformed
/// quoting still returns a best-effort parse, marked unsafe for matching.
pub fn parse(command_string: &str) -> Option<ParsedShellCommand> {
    if command_string.trim().is_empty() {
        return None;
    }

    let dialect = infer_dialect(command_string);
    let Lexed {
        tokens,
        is_safe_for_matching,
    } = lex(command_string);

    Some(ParsedShellCommand {
        dialect,
        tokens,
        is_safe_for_matching,
    })
}

fn infer_dialect(command_string: &str) -> Dialect {
    let lower = command_string.to_ascii_lowercase();
    if lower.contains("$env:") || lower.contains(".ps1") || lower.contains("powershell") || lower.contains("pwsh") {
        Dialect::PowerShell
    } else if lower.contains("cmd.exe /c") || lower.contains("cmd /c") {
        Dialect::Cmd
    } else {
        // POSIX shells are the ubiquitous default; `Unknown` is reserved
        // for allowlist entries that should match regardless of dialect,
        // not for commands we simply couldn't classify.
        Dialect::Bash
    }
}

struct Lexed {
    tokens: Vec<String>,
    is_safe_for_matching: bool,
}

/// Multi-character operator tokens that always make a command unsafe for
/// prefix matching because they chain, pipe, or background a command.
const CHAINING_OPERATORS: &[&str] = &["||", "&&", ";", "&", "|"];
/// Redirection operator tokens: safe for identifying the base command, but
/// they still change visible side effects, so they force
/// `is_safe_for_matching` to false.
const REDIRECTION_OPERATORS: &[&str] = &[">>", ">", "<<", "<"];

fn lex(src: &str) -> Lexed {
    let mut tokens: Vec<String> = Vec::new();
    let mut word = String::new();
    let mut word_has_content = false;
    let mut word_has_unquoted_glob = false;
    let mut unsafe_for_matching = false;

    let mut in_single = false;
    let mut in_double = false;

    let chars: Vec<char> = src.chars().collect();
    let mut i = 0usize;

    macro_rules! flush_word {
        () => {
            if word_has_content {
                tokens.push(std::mem::take(&mut word));
                word_has_content = false;
                if word_has_unquoted_glob && tokens.len() > 2 {
                    unsafe_for_matching = true;
                }
                word_has_unquoted_glob = false;
            }
        };
    }

    while i < chars.len() {
        let ch = chars[i];

        if in_single {
            if ch == '\'' {
                in_single = false;
            } else {
                word.push(ch);
                word_has_content = true;
            }
            i += 1;
            continue;
        }

        if in_double {
            match ch {
                '"' => in_double = false,
                '\\' if i + 1 < chars.len() && matches!(chars[i + 1], '"' | '\\' | '$' | '`') => {
                    word.push(chars[i + 1]);
                    word_has_content = true;
                    i += 1;
                }
                '`' => {
                    unsafe_for_matching = true;
                    i = consume_backtick(&chars, i, &mut word);
                    word_has_content = true;
                    continue;
                }
                '$' if chars.get(i + 1) == Some(&'(') => {
                    unsafe_for_matching = true;
                    i = consume_balanced(&chars, i + 1, '(', ')', &mut word);
                    word_has_content = true;
                    continue;
                }
                _ => {
                    word.push(ch);
                    word_has_content = true;
                }
            }
            i += 1;
            continue;
        }

        match ch {
            c if c.is_whitespace() => {
                flush_word!();
            }
            '\'' => in_single = true,
            '"' => in_double = true,
            '\\' if i + 1 < chars.len() => {
                word.push(chars[i + 1]);
                word_has_content = true;
                i += 1;
            }
            '`' => {
                unsafe_for_matching = true;
                i = consume_backtick(&chars, i, &mut word);
                word_has_content = true;
                continue;
            }
            '$' if chars.get(i + 1) == Some(&'(') => {
                unsafe_for_matching = true;
                i = consume_balanced(&chars, i + 1, '(', ')', &mut word);
                word_has_content = true;
                continue;
            }
            '<' if chars.get(i + 1) == Some(&'(') => {
                unsafe_for_matching = true;
                i = consume_balanced(&chars, i + 1, '(', ')', &mut word);
                word_has_content = true;
                continue;
            }
            '>' if chars.get(i + 1) == Some(&'(') => {
                unsafe_for_matching = true;
                i = consume_balanced(&chars, i + 1, '(', ')', &mut word);
                word_has_content = true;
                continue;
            }
            '|' | '&' | ';' | '<' | '>' => {
                flush_word!();
                let (op, consumed) = lex_operator(&chars, i);
                unsafe_for_matching = true;
                tokens.push(op);
                i += consumed;
                continue;
            }
            '*' | '?' | '[' => {
                word.push(ch);
                word_has_content = true;
                word_has_unquoted_glob = true;
            }
            _ => {
                word.push(ch);
                word_has_content = true;
            }
        }
        i += 1;
    }

    // Unterminated quote: best-effort, but never safe for matching.
    if in_single || in_double {
        unsafe_for_matching = true;
    }
    flush_word!();

    // A final pass: any chaining/redirection operator token present makes
    // the whole command unsafe for matching (already set above as we lex
    // them, but re-derive defensively so the invariant can't drift).
    if tokens
        .iter()
        .any(|t| CHAINING_OPERATORS.contains(&t.as_str()) || REDIRECTION_OPERATORS.contains(&t.as_str()))
    {
        unsafe_for_matching = true;
    }

    Lexed {
        tokens,
        is_safe_for_matching: !unsafe_for_matching,
    }
}

fn lex_operator(chars: &[char], i: usize) -> (String, usize) {
    let two: Option<String> = chars.get(i + 1).map(|c| format!("{}{}", chars[i], c));
    match (chars[i], two.as_deref()) {
        ('|', Some("||")) => ("||".to_string(), 2),
        ('&', Some("&&")) => ("&&".to_string(), 2),
        ('>', Some(">>")) => (">>".to_string(), 2),
        ('<', Some("<<")) => ("<<".to_string(), 2),
        (c, _) => (c.to_string(), 1),
    }
}

/// Consume a backtick command substitution starting at `start` (the index of
/// the opening backtick), appending the raw text (including both backticks)
/// to `word`. Best-effort: an unterminated backtick consumes to end of
/// input.
fn consume_backtick(chars: &[char], start: usize, word: &mut String) -> usize {
    word.push('`');
    let mut i = start + 1;
    while i < chars.len() && chars[i] != '`' {
        word.push(chars[i]);
        i += 1;
    }
    if i < chars.len() {
        word.push('`');
        i += 1;
    }
    i
}

/// Consume a balanced `open`/`close` group starting with `open` at index
/// `open_idx`, appending the raw text (including the enclosing `$`/`<`/`>`
/// prefix already pushed by the caller via `word`, plus the parens) to
/// `word`. Returns the index just past the closing delimiter.
fn consume_balanced(chars: &[char], open_idx: usize, open: char, close: char, word: &mut String) -> usize {
    debug_assert_eq!(chars[open_idx], open);
    // The caller has not yet pushed the char preceding `open` (the `$`, `<`,
    // or `>`); include it so the reconstructed token is readable.
    word.push(chars[open_idx - 1]);
    word.push(open);
    let mut depth = 1i32;
    let mut i = open_idx + 1;
    while i < chars.len() && depth > 0 {
        if chars[i] == open {
            depth += 1;
        } else if chars[i] == close {
            depth -= 1;
        }
        word.push(chars[i]);
        i += 1;
    }
    i
}

/// Fixed table of cross-platform command aliases. Unknown names are never
/// equivalent to anything but themselves.
const EQUIVALENCE_CLASSES: &[&[&str]] = &[
    &["ls", "dir"],
    &["cat", "type"],
    &["cp", "copy"],
    &["rm", "del"],
];

/// Whether `a` and `b` name the same logical operation across shell
/// dialects (`ls` ≡ `dir`, `cat` ≡ `type`, `cp` ≡ `copy`, `rm` ≡ `del`).
pub fn commands_are_equivalent(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    EQUIVALENCE_CLASSES
        .iter()
        .any(|class| class.contains(&a) && class.contains(&b))
}

/// Whether `parsed`'s token stream starts with `prefix_tokens`: the base
/// command compared via [`commands_are_equivalent`], every following token
/// compared byte-exact.
pub fn matches_prefix(parsed: &ParsedShellCommand, prefix_tokens: &[String]) -> bool {
    if prefix_tokens.is_empty() || parsed.tokens.len() < prefix_tokens.len() {
        return false;
    }
    let base_matches = match (parsed.base_command(), prefix_tokens.first()) {
        (Some(base), Some(prefix_base)) => commands_are_equivalent(base, basename(prefix_base)),
        _ => false,
    };
    if !base_matches {
        return false;
    }
    parsed.tokens[1..prefix_tokens.len()] == prefix_tokens[1..]
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn empty_input_is_none() {
        assert!(parse("").is_none());
        assert!(parse("   ").is_none());
    }

    #[test]
    fn simple_command_is_safe() {
        let parsed = parse("git log --oneline").unwrap();
        assert!(parsed.is_safe_for_matching());
        assert_eq!(parsed.tokens, vec!["git", "log", "--oneline"]);
        assert_eq!(parsed.base_command(), Some("git"));
    }

    #[test]
    fn quoting_preserves_argument_boundaries() {
        let parsed = parse(r#"grep -R "Cargo.toml" -n"#).unwrap();
        assert_eq!(parsed.tokens, vec!["grep", "-R", "Cargo.toml", "-n"]);
        assert!(parsed.is_safe_for_matching());
    }

    #[test]
    fn single_quotes_suppress_expansion_chars() {
        let parsed = parse(r#"echo '$(rm -rf /)'"#).unwrap();
        // Inside single quotes, `$(` is a literal, not a substitution.
        assert!(parsed.is_safe_for_matching());
        assert_eq!(parsed.tokens, vec!["echo", "$(rm -rf /)"]);
    }

    #[test]
    fn semicolon_chain_is_unsafe() {
        let parsed = parse("git status; rm -rf /").unwrap();
        assert!(!parsed.is_safe_for_matching());
    }

    #[test]
    fn pipe_is_unsafe() {
        assert!(!parse("cat foo | wc -l").unwrap().is_safe_for_matching());
    }

    #[test]
    fn and_or_chains_are_unsafe() {
        assert!(!parse("true && false").unwrap().is_safe_for_matching());
        assert!(!parse("true || false").unwrap().is_safe_for_matching());
    }

    #[test]
    fn background_is_unsafe() {
        assert!(!parse("sleep 10 &").unwrap().is_safe_for_matching());
    }

    #[test]
    fn backtick_substitution_is_unsafe() {
        assert!(!parse("echo `whoami`").unwrap().is_safe_for_matching());
    }

    #[test]
    fn dollar_paren_substitution_is_unsafe() {
        assert!(!parse("echo $(whoami)").unwrap().is_safe_for_matching());
    }

    #[test]
    fn process_substitution_is_unsafe() {
        assert!(!parse("diff <(ls a) <(ls b)").unwrap().is_safe_for_matching());
        assert!(!parse("tee >(cat)").unwrap().is_safe_for_matching());
    }

    #[test]
    fn redirection_is_unsafe_for_matching_but_base_command_stands() {
        let parsed = parse("echo hi > out.txt").unwrap();
        assert!(!parsed.is_safe_for_matching());
        assert_eq!(parsed.base_command(), Some("echo"));
    }

    #[test]
    fn malformed_quotes_are_best_effort_and_unsafe() {
        let parsed = parse("echo 'unterminated").unwrap();
        assert!(!parsed.is_safe_for_matching());
        assert_eq!(parsed.tokens, vec!["echo", "unterminated"]);
    }

    #[test]
    fn equivalence_table_is_symmetric_and_closed() {
        assert!(commands_are_equivalent("ls", "dir"));
        assert!(commands_are_equivalent("dir", "ls"));
        assert!(commands_are_equivalent("cat", "type"));
        assert!(commands_are_equivalent("cp", "copy"));
        assert!(commands_are_equivalent("rm", "del"));
        assert!(!commands_are_equivalent("ls", "rm"));
        assert!(!commands_are_equivalent("foo", "bar"));
    }

    #[test]
    fn prefix_match_uses_equivalence_only_for_base_command() {
        let parsed = parse("dir /tmp").unwrap();
        assert!(matches_prefix(
            &parsed,
            &["ls".to_string(), "/tmp".to_string()]
        ));
        // Second token is compared byte-exact, no equivalence applied.
        assert!(!matches_prefix(
            &parsed,
            &["ls".to_string(), "/other".to_string()]
        ));
    }

    #[test]
    fn prefix_match_requires_base_command() {
        let parsed = parse("git log --oneline").unwrap();
        assert!(matches_prefix(&parsed, &["git".to_string()]));
        assert!(matches_prefix(
            &parsed,
            &["git".to_string(), "log".to_string()]
        ));
        assert!(!matches_prefix(
            &parsed,
            &["git".to_string(), "log".to_string(), "--stat".to_string()]
        ));
    }

    #[test]
    fn unquoted_glob_in_first_argument_is_safe_but_further_out_is_not() {
        // The glob lands in the first (and only) argument word.
        assert!(parse("echo b*.txt").unwrap().is_safe_for_matching());
        // The glob lands past the first argument, reaching a later word.
        assert!(!parse("find . -name *.rs").unwrap().is_safe_for_matching());
    }

    #[test]
    fn base_command_strips_path() {
        let parsed = parse("/usr/bin/git status").unwrap();
        assert_eq!(parsed.base_command(), Some("git"));
    }
}
