//! Bounding command output before it reaches the model (§4.5).
//!
//! A shell command can print an unbounded amount of text (`find /`, `cat
//! big_log.txt`), but the turn loop feeds tool output straight back into the
//! context window. Cutting from the middle keeps the invocation context at
//! the top and the final result/error at the bottom, which is the part a
//! model actually needs to decide what to do next — chopping only the tail
//! would throw away exactly that.

/// Output longer than this (in characters) gets middle-truncated.
pub const MAX_OUTPUT_CHARS: usize = 30_000;

const TRUNCATION_MARKER: &str = "OUTPUT TRUNCATED";

/// Shrink `text` to at most `budget` characters, replacing the middle span
/// with a marker noting how many characters were dropped.
///
/// Splitting happens on `char` indices, never byte indices, so a multi-byte
/// UTF-8 sequence is never sliced in half.
pub fn truncate_output(text: &str, budget: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= budget {
        return text.to_owned();
    }

    let keep_each_side = budget / 2;
    let dropped = chars.len() - budget;

    let head: String = chars[..keep_each_side].iter().collect();
    let tail: String = chars[chars.len() - keep_each_side..].iter().collect();

    format!("{head}\n\n... [{TRUNCATION_MARKER}: {dropped} chars omitted] ...\n\n{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn within_budget_is_untouched() {
        let text = "all good here";
        assert_eq!(truncate_output(text, MAX_OUTPUT_CHARS), text);
    }

    #[test]
    fn exactly_at_budget_is_untouched() {
        let text: String = "q".repeat(500);
        let result = truncate_output(&text, 500);
        assert_eq!(result, text);
        assert!(!result.contains(TRUNCATION_MARKER));
    }

    #[test]
    fn one_char_over_budget_gets_marked() {
        let text: String = "q".repeat(501);
        let result = truncate_output(&text, 500);
        assert!(result.contains(TRUNCATION_MARKER));
        assert!(result.contains("1 chars omitted"));
    }

    #[test]
    fn keeps_recognizable_head_and_tail() {
        let start = "BEGIN".repeat(2_000);
        let middle = "m".repeat(20_000);
        let end = "END".repeat(2_000);
        let combined = format!("{start}{middle}{end}");

        let result = truncate_output(&combined, MAX_OUTPUT_CHARS);

        assert!(result.contains(TRUNCATION_MARKER));
        assert!(result.starts_with('B'));
        assert!(result.ends_with('D'));
    }

    #[test]
    fn respects_a_custom_budget() {
        let text: String = "v".repeat(300);
        let result = truncate_output(&text, 150);
        assert!(result.contains("150 chars omitted"));
    }

    #[test]
    fn multibyte_chars_are_not_split() {
        // Each of these is a 4-byte emoji; slicing by byte index would panic.
        let text: String = "🦀".repeat(40_000);
        let result = truncate_output(&text, MAX_OUTPUT_CHARS);
        assert!(result.contains(TRUNCATION_MARKER));
    }

    #[test]
    fn empty_text_is_untouched() {
        assert_eq!(truncate_output("", MAX_OUTPUT_CHARS), "");
    }
}
