//! Session id parsing rules (§6.4).
//!
//! A session id is an opaque string with two structural markers: a leading
//! `.` marks a *temporary* session (excluded from listings), and a `.`
//! strictly after position 0 marks a *subsession* boundary — the suffix
//! (including that `.`) addresses a child session that shares its parent's
//! sandbox.

/// Splits `s` into `(main, suffix)` where `main` is `s` up to the first `.`
/// strictly after position 0, and `suffix` is the remainder including that
/// `.`. If no such `.` exists, returns `(s, "")`.
pub fn split_session_id(s: &str) -> (&str, &str) {
    match s.char_indices().skip(1).find(|&(_, c)| c == '.') {
        Some((idx, _)) => (&s[..idx], &s[idx..]),
        None => (s, ""),
    }
}

/// A subsession is any session id whose suffix (per `split_session_id`) is
/// non-empty.
pub fn is_subsession_id(s: &str) -> bool {
    !split_session_id(s).1.is_empty()
}

/// A temporary session id begins with `.`.
pub fn is_temporary_session_id(s: &str) -> bool {
    s.starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_first_dot_after_position_zero() {
        assert_eq!(split_session_id("session789.suffix"), ("session789", ".suffix"));
    }

    #[test]
    fn leading_dot_is_not_the_split_point() {
        assert_eq!(split_session_id(".temp123.suffix"), (".temp123", ".suffix"));
    }

    #[test]
    fn no_suffix_when_no_interior_dot() {
        assert_eq!(split_session_id(".temp456"), (".temp456", ""));
    }

    #[test]
    fn subsession_and_temporary_flags() {
        assert!(is_subsession_id("session789.suffix"));
        assert!(!is_subsession_id("session789"));
        assert!(is_temporary_session_id(".temp456"));
        assert!(!is_temporary_session_id("session789"));
    }
}
