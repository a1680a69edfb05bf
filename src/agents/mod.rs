//! Agent integration modules
//!
//! Each submodule implements the adapter for a specific AI coding agent.

pub mod claude_code;
pub mod codex;

/// Truncate a string to at most `max` characters (by Unicode char boundary).
pub(crate) fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Extract the final path component (filename) from a slash-separated path.
pub(crate) fn short_path(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_string()
}

/// Parse a shell command of the form `aura set-name "<name>"`.
///
/// Accepts any binary path whose basename is `aura` (`./aura`,
/// `/usr/local/bin/aura`), double or single quotes, and a bare single-token
/// name. Returns `None` for anything else.
pub(crate) fn parse_set_name_command(command: &str) -> Option<String> {
    let trimmed = command.trim();

    let mut tokens = trimmed.split_whitespace();
    let binary = tokens.next()?;
    let basename = binary.rsplit('/').next().unwrap_or(binary);
    if basename != "aura" || tokens.next() != Some("set-name") {
        return None;
    }

    let after_keyword = &trimmed[trimmed.find("set-name")? + "set-name".len()..];
    let rest = after_keyword.trim();
    if rest.is_empty() {
        return None;
    }

    if (rest.starts_with('"') && rest.ends_with('"') && rest.len() >= 2)
        || (rest.starts_with('\'') && rest.ends_with('\'') && rest.len() >= 2)
    {
        let inner = &rest[1..rest.len() - 1];
        if inner.is_empty() {
            return None;
        }
        return Some(inner.to_string());
    }

    Some(rest.to_string())
}
