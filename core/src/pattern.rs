//! Pattern Generator.
//!
//! Turns an approved tool call into a reusable allow-always pattern that the
//! engine can install into its allowlist so that future identical (or
//! prefix-matching) calls skip the prompt entirely.

use std::path::Path;

use crate::shell::Dialect;
use crate::shell::ParsedShellCommand;

/// A pattern emitted by the generator, ready for the engine to install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratedPattern {
    Regex(String),
    ShellPrefix(Vec<String>, Dialect),
}

/// Threshold for the file-path heuristic below. Exposed as a constant
/// rather than hidden in a magic number since no canonical source documents
/// a specific value for it.
pub const HOME_DIR_PATTERN_MIN_DEPTH: usize = 3;

/// For a shell tool call approved as ALLOW_ALWAYS: `[base, subcommand]` when
/// the command has at least two tokens and the second looks like a
/// subcommand (alphanumeric, no slash); otherwise just `[base]`.
pub fn generate_shell_pattern(parsed: &ParsedShellCommand) -> Option<GeneratedPattern> {
    let base = parsed.base_command()?.to_string();
    let prefix = match parsed.tokens.get(1) {
        Some(candidate) if looks_like_subcommand(candidate) => vec![base, candidate.clone()],
        _ => vec![base],
    };
    Some(GeneratedPattern::ShellPrefix(prefix, parsed.dialect))
}

fn looks_like_subcommand(token: &str) -> bool {
    !token.is_empty() && !token.contains('/') && !token.contains('\\') && token.chars().all(|c| c.is_ascii_alphanumeric())
}

/// For a file tool call approved as ALLOW_ALWAYS: if the path is under the
/// user's home directory and at least [`HOME_DIR_PATTERN_MIN_DEPTH`]
/// segments deep relative to it, a regex matching the containing directory
/// (with a trailing separator, so `src` doesn't also match `src-backup`);
/// otherwise an exact-path regex. Tested against the tool call's bare `path`
/// argument, not the raw arguments JSON — see `Engine::match_target`.
pub fn generate_file_pattern(path: &Path, home_dir: Option<&Path>) -> GeneratedPattern {
    if let Some(home) = home_dir {
        if let Ok(relative) = path.strip_prefix(home) {
            if relative.components().count() >= HOME_DIR_PATTERN_MIN_DEPTH {
                let dir = path.parent().unwrap_or(path);
                return GeneratedPattern::Regex(format!("^{}/", regex_escape(&dir.display().to_string())));
            }
        }
    }
    GeneratedPattern::Regex(format!("^{}$", regex_escape(&path.display().to_string())))
}

/// For an extension tool call: a regex anchored to the exact value of the
/// registered match-argument.
pub fn generate_extension_pattern(match_argument_value: &str) -> GeneratedPattern {
    GeneratedPattern::Regex(format!("^{}$", regex_escape(match_argument_value)))
}

/// `regex-lite` doesn't export an escape helper, so this mirrors the
/// character class `regex::escape` treats as meta.
fn regex_escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(
            ch,
            '\\' | '.' | '+' | '*' | '?' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '^' | '$'
        ) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::shell::parse;
    use std::path::PathBuf;

    #[test]
    fn shell_pattern_includes_subcommand_when_alphanumeric() {
        let parsed = parse("git log --oneline").unwrap();
        assert_eq!(
            generate_shell_pattern(&parsed),
            Some(GeneratedPattern::ShellPrefix(
                vec!["git".to_string(), "log".to_string()],
                Dialect::Bash
            ))
        );
    }

    #[test]
    fn shell_pattern_falls_back_to_base_only() {
        let parsed = parse("ls -la").unwrap();
        // "-la" isn't alphanumeric-only (it's a flag), so it isn't treated
        // as a subcommand.
        assert_eq!(
            generate_shell_pattern(&parsed),
            Some(GeneratedPattern::ShellPrefix(vec!["ls".to_string()], Dialect::Bash))
        );
    }

    #[test]
    fn shell_pattern_single_token() {
        let parsed = parse("pwd").unwrap();
        assert_eq!(
            generate_shell_pattern(&parsed),
            Some(GeneratedPattern::ShellPrefix(vec!["pwd".to_string()], Dialect::Bash))
        );
    }

    #[test]
    fn file_pattern_under_home_deep_enough_matches_directory() {
        let home = PathBuf::from("/home/user");
        let path = home.join("projects/widget/src/main.rs");
        let pattern = generate_file_pattern(&path, Some(&home));
        match pattern {
            GeneratedPattern::Regex(re) => {
                assert!(re.starts_with("^/home/user/projects/widget/src"));
                assert!(!re.contains("main\\.rs"));
            }
            other => panic!("expected regex pattern, got {other:?}"),
        }
    }

    #[test]
    fn file_pattern_shallow_under_home_is_exact() {
        let home = PathBuf::from("/home/user");
        let path = home.join("notes.txt");
        let pattern = generate_file_pattern(&path, Some(&home));
        assert_eq!(
            pattern,
            GeneratedPattern::Regex("^/home/user/notes\\.txt$".to_string())
        );
    }

    #[test]
    fn file_pattern_outside_home_is_exact() {
        let path = PathBuf::from("/tmp/a.txt");
        let pattern = generate_file_pattern(&path, Some(Path::new("/home/user")));
        assert_eq!(pattern, GeneratedPattern::Regex("^/tmp/a\\.txt$".to_string()));
    }

    #[test]
    fn extension_pattern_anchors_full_value() {
        let pattern = generate_extension_pattern("peer-42");
        assert_eq!(pattern, GeneratedPattern::Regex("^peer\\-42$".to_string()));
    }

    #[test]
    fn file_pattern_directory_regex_has_trailing_separator_boundary() {
        let home = PathBuf::from("/home/user");
        let path = home.join("projects/widget/src/main.rs");
        let pattern = generate_file_pattern(&path, Some(&home));
        match pattern {
            GeneratedPattern::Regex(re) => {
                // Without the trailing separator this would also match a
                // sibling directory like ".../widget/src-backup/evil.sh".
                assert!(re.ends_with('/'));
                assert_eq!(re, "^/home/user/projects/widget/src/".to_string());
            }
            other => panic!("expected regex pattern, got {other:?}"),
        }
    }
}
