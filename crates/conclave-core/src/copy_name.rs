//! `generateCopySessionName` (§4.6.2) — derives the name for a session
//! created by "extract"/fork-as-copy, bumping a trailing `(Copy N)` marker.

/// Produce the name for a copy of a session named `old_name`, per the exact
/// matching rules in the distilled specification and its fixture table.
pub fn generate_copy_session_name(old_name: &str) -> String {
    let trimmed = old_name.trim_end_matches(|c: char| c.is_whitespace());
    if trimmed.is_empty() {
        return "New Chat (Copy)".to_string();
    }

    if let Some(suffix) = match_copy_suffix(trimmed) {
        return suffix;
    }

    format!("{trimmed} (Copy)")
}

/// Attempts to recognize a trailing `(Copy)` or `(Copy N)` marker (preceded
/// by at least one whitespace character, tolerant of non-ASCII whitespace
/// inside the parens) and returns the bumped name. Returns `None` when the
/// trailing parenthesized group exists but doesn't match the grammar exactly
/// (e.g. extra inner spaces), so the caller falls through to unconditional
/// append.
fn match_copy_suffix(s: &str) -> Option<String> {
    if !s.ends_with(')') {
        return None;
    }
    let open_idx = s.rfind('(')?;
    let before = &s[..open_idx];
    if before.is_empty() || !before.ends_with(|c: char| c.is_whitespace()) {
        return None;
    }
    let stem = before.trim_end_matches(|c: char| c.is_whitespace());

    let inner: Vec<char> = s[open_idx + 1..s.len() - 1].chars().collect();
    if inner.len() < 4 {
        return None;
    }
    let head: String = inner[..4].iter().map(|c| c.to_ascii_lowercase()).collect();
    if head != "copy" {
        return None;
    }

    let rest = &inner[4..];
    if rest.is_empty() {
        // Bare "(Copy)" — implicit count of 1, bump to 2.
        return Some(format!("{stem} (Copy 2)"));
    }

    let ws_len = rest.iter().take_while(|c| c.is_whitespace()).count();
    if ws_len == 0 {
        return None;
    }
    let digits: &[char] = &rest[ws_len..];
    if digits.is_empty() || !digits.iter().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let digit_str: String = digits.iter().collect();
    match digit_str.parse::<u64>() {
        Ok(0) => Some(format!("{stem} (Copy)")),
        Ok(n) => Some(format!("{stem} (Copy {})", n + 1)),
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixtures() {
        assert_eq!(generate_copy_session_name(""), "New Chat (Copy)");
        assert_eq!(
            generate_copy_session_name("Some session"),
            "Some session (Copy)"
        );
        assert_eq!(
            generate_copy_session_name("Some session (Copy)"),
            "Some session (Copy 2)"
        );
        assert_eq!(
            generate_copy_session_name("Some session (Copy 9)"),
            "Some session (Copy 10)"
        );
        assert_eq!(
            generate_copy_session_name("Another session\t(COPY\u{3000}7)\r\n"),
            "Another session (Copy 8)"
        );
        assert_eq!(
            generate_copy_session_name("Yet another session ( Copy )"),
            "Yet another session ( Copy ) (Copy)"
        );
    }

    #[test]
    fn zero_normalizes_to_bare_copy() {
        assert_eq!(
            generate_copy_session_name("Some session (Copy 0)"),
            "Some session (Copy)"
        );
    }

    #[test]
    fn unparseable_number_falls_through() {
        let huge = "Some session (Copy 99999999999999999999)";
        assert_eq!(generate_copy_session_name(huge), format!("{huge} (Copy)"));
    }
}
