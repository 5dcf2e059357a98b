//! Message validation and sanitization.
//!
//! Pure functions over text, no shared state. Validation rejects on the
//! first failing rule, in this order:
//!
//! 1. content missing
//! 2. longer than [`MAX_MESSAGE_LENGTH`] code points
//! 3. empty or whitespace only
//! 4. a character repeated more than [`MAX_REPEATED_CHARS`] times in a row
//! 5. a word repeated more than [`MAX_REPEATED_WORDS`] times in a row
//! 6. [`MIN_EXCESSIVE_MARKS`] or more combining marks in a row
//! 7. a character outside letters, numbers, punctuation, separators, symbols
//!    and marks
//!
//! Rules 4 to 7 only look at the text between URLs, so a long or unusual URL
//! never trips them. Sanitizing likewise leaves URLs in place untouched.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ValidationError;

/// Maximum message length in code points
pub const MAX_MESSAGE_LENGTH: usize = 1000;

/// Longest allowed run of one character
pub const MAX_REPEATED_CHARS: usize = 5;

/// Longest allowed run of one word (case-insensitive)
pub const MAX_REPEATED_WORDS: usize = 3;

/// Shortest run of combining marks that is rejected
pub const MIN_EXCESSIVE_MARKS: usize = 10;

/// Maximum reaction emoji length in code points
pub const MAX_EMOJI_LENGTH: usize = 16;

// Trailing punctuation is left outside the match so "see https://a.b/c!" keeps
// the "!" as message text.
static URL: LazyLock<Regex> = LazyLock::new(|| compile(r#"(?i)@?https?://[^\s]*[^\s!?.,;:'"]"#));

static EXCESSIVE_MARKS: LazyLock<Regex> =
    LazyLock::new(|| compile(&format!(r"\p{{M}}{{{MIN_EXCESSIVE_MARKS},}}")));

static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| compile(r"[^\p{L}\p{N}\p{P}\p{Z}\p{S}\p{M}]"));

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| unreachable!("built-in pattern must compile: {e}"))
}

/// Piece of a message: plain text, or a URL exempt from content rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    Text(&'a str),
    Url(&'a str),
}

/// Split `text` around URLs, keeping their positions.
fn split_urls(text: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut last = 0;

    for m in URL.find_iter(text) {
        if m.start() > last {
            segments.push(Segment::Text(&text[last..m.start()]));
        }
        segments.push(Segment::Url(m.as_str()));
        last = m.end();
    }

    if last < text.len() {
        segments.push(Segment::Text(&text[last..]));
    }

    segments
}

fn text_parts<'a>(segments: &'a [Segment<'a>]) -> impl Iterator<Item = &'a str> + 'a {
    segments.iter().filter_map(|s| match s {
        Segment::Text(text) => Some(*text),
        Segment::Url(_) => None,
    })
}

fn has_long_char_run(text: &str, max: usize) -> bool {
    let mut prev = None;
    let mut run = 0;

    for c in text.chars() {
        if prev == Some(c) {
            run += 1;
            if run > max {
                return true;
            }
        } else {
            prev = Some(c);
            run = 1;
        }
    }

    false
}

fn collapse_char_runs(text: &str, max: usize) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev = None;
    let mut run = 0;

    for c in text.chars() {
        if prev == Some(c) {
            run += 1;
        } else {
            prev = Some(c);
            run = 1;
        }
        if run <= max {
            out.push(c);
        }
    }

    out
}

/// Each URL acts as a unique word, so it breaks a run without joining one.
fn has_long_word_run(segments: &[Segment<'_>], max: usize) -> bool {
    let mut prev: Option<String> = None;
    let mut run = 0;

    for segment in segments {
        let Segment::Text(text) = segment else {
            prev = None;
            run = 0;
            continue;
        };

        for word in text.split_whitespace() {
            let word = word.to_lowercase();
            if prev.as_deref() == Some(word.as_str()) {
                run += 1;
                if run > max {
                    return true;
                }
            } else {
                prev = Some(word);
                run = 1;
            }
        }
    }

    false
}

/// Check message content against all rules.
///
/// # Errors
///
/// Returns the [`ValidationError`] of the first rule that fails.
pub fn validate_message(content: Option<&str>) -> Result<(), ValidationError> {
    let Some(content) = content else {
        return Err(ValidationError::Missing);
    };

    let len = content.chars().count();
    if len > MAX_MESSAGE_LENGTH {
        return Err(ValidationError::TooLong { len, max: MAX_MESSAGE_LENGTH });
    }

    if content.trim().is_empty() {
        return Err(ValidationError::Empty);
    }

    let segments = split_urls(content);

    if text_parts(&segments).any(|text| has_long_char_run(text, MAX_REPEATED_CHARS)) {
        return Err(ValidationError::RepeatedCharacters { max: MAX_REPEATED_CHARS });
    }

    if has_long_word_run(&segments, MAX_REPEATED_WORDS) {
        return Err(ValidationError::RepeatedWords { max: MAX_REPEATED_WORDS });
    }

    if text_parts(&segments).any(|text| EXCESSIVE_MARKS.is_match(text)) {
        return Err(ValidationError::ExcessiveMarks);
    }

    if text_parts(&segments).any(|text| DISALLOWED.is_match(text)) {
        return Err(ValidationError::InvalidCharacters);
    }

    Ok(())
}

/// Boolean form of [`validate_message`].
#[must_use]
pub fn is_valid_message(content: &str) -> bool {
    validate_message(Some(content)).is_ok()
}

/// Clean message content for storage and relay.
///
/// Truncates to [`MAX_MESSAGE_LENGTH`] code points, strips disallowed
/// characters, collapses character runs to [`MAX_REPEATED_CHARS`] and trims.
/// URLs stay in place, untouched. Never fails; may return an empty string.
#[must_use]
pub fn sanitize_message(content: &str) -> String {
    let truncated: String = content.chars().take(MAX_MESSAGE_LENGTH).collect();

    let mut out = String::with_capacity(truncated.len());
    for segment in split_urls(&truncated) {
        match segment {
            Segment::Text(text) => {
                let stripped = DISALLOWED.replace_all(text, "");
                out.push_str(&collapse_char_runs(&stripped, MAX_REPEATED_CHARS));
            },
            Segment::Url(url) => out.push_str(url),
        }
    }

    out.trim().to_string()
}

/// Check a reaction emoji.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidEmoji`] if the emoji is empty, longer
/// than [`MAX_EMOJI_LENGTH`] code points, or contains whitespace or control
/// characters.
pub fn validate_emoji(emoji: &str) -> Result<(), ValidationError> {
    let len = emoji.chars().count();
    if len == 0 || len > MAX_EMOJI_LENGTH {
        return Err(ValidationError::InvalidEmoji);
    }

    if emoji.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ValidationError::InvalidEmoji);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marks(n: usize) -> String {
        // Distinct marks so the repeated-character rule does not fire first.
        (0..n).filter_map(|i| char::from_u32(0x0300 + i as u32)).collect()
    }

    #[test]
    fn accepts_ordinary_sentence() {
        assert_eq!(validate_message(Some("hello there, how are you?")), Ok(()));
        assert!(is_valid_message("Xin chào, bạn khỏe không? 😀"));
    }

    #[test]
    fn rejects_missing_content() {
        assert_eq!(validate_message(None), Err(ValidationError::Missing));
    }

    #[test]
    fn rejects_over_length() {
        let long = "ab".repeat(500) + "c";
        assert_eq!(
            validate_message(Some(&long)),
            Err(ValidationError::TooLong { len: 1001, max: MAX_MESSAGE_LENGTH })
        );
    }

    #[test]
    fn length_counts_code_points() {
        let exact = "é".to_string() + &"xé".repeat(499) + "y";
        assert_eq!(exact.chars().count(), 1000);
        assert!(exact.len() > 1000);
        assert_eq!(validate_message(Some(&exact)), Ok(()));
    }

    #[test]
    fn rejects_blank() {
        assert_eq!(validate_message(Some("")), Err(ValidationError::Empty));
        assert_eq!(validate_message(Some(" \t  ")), Err(ValidationError::Empty));
    }

    #[test]
    fn rejects_repeated_characters() {
        assert!(is_valid_message("nooooo"));
        assert_eq!(
            validate_message(Some("noooooo")),
            Err(ValidationError::RepeatedCharacters { max: MAX_REPEATED_CHARS })
        );
    }

    #[test]
    fn rejects_repeated_words_case_insensitive() {
        assert!(is_valid_message("ha ha ha"));
        assert_eq!(
            validate_message(Some("spam Spam SPAM spam")),
            Err(ValidationError::RepeatedWords { max: MAX_REPEATED_WORDS })
        );
    }

    #[test]
    fn rejects_mark_stacking() {
        let nine = format!("a{}", marks(9));
        assert!(is_valid_message(&nine));

        let eleven = format!("a{}", marks(11));
        assert_eq!(validate_message(Some(&eleven)), Err(ValidationError::ExcessiveMarks));
    }

    #[test]
    fn rejects_control_characters() {
        assert_eq!(validate_message(Some("hi\u{0007}")), Err(ValidationError::InvalidCharacters));
        assert_eq!(validate_message(Some("line\nbreak")), Err(ValidationError::InvalidCharacters));
    }

    #[test]
    fn urls_are_exempt_from_content_rules() {
        assert!(is_valid_message("look https://example.test/aaaaaaaaaa/%E2%80%8B"));
        assert!(is_valid_message("@https://example.test/?q=zzzzzzz"));
    }

    #[test]
    fn sanitize_collapses_runs_outside_urls() {
        assert_eq!(
            sanitize_message("check https://x.test/a!!!!!!!! now"),
            "check https://x.test/a!!!!! now"
        );
    }

    #[test]
    fn sanitize_keeps_url_content() {
        let url = "https://x.test/aaaaaaaaaaaa";
        assert_eq!(sanitize_message(&format!("  see {url}  ")), format!("see {url}"));
    }

    #[test]
    fn sanitize_restores_multiple_urls_in_order() {
        let input = "https://a.test/1 and https://b.test/2";
        assert_eq!(sanitize_message(input), input);
    }

    #[test]
    fn brackets_next_to_url_are_plain_text() {
        let input = "[[[[[https://x.test/a]]]]]";
        assert!(is_valid_message(input));
        assert_eq!(sanitize_message(input), input);
    }

    #[test]
    fn urls_break_word_runs() {
        assert!(is_valid_message("go https://a.test go go go"));
        assert!(!is_valid_message("go go https://a.test/x go go go go"));
    }

    #[test]
    fn sanitize_strips_and_truncates() {
        assert_eq!(sanitize_message("a\u{0000}b\u{0007}c"), "abc");

        let long = "x ".repeat(700);
        let cleaned = sanitize_message(&long);
        assert!(cleaned.chars().count() <= MAX_MESSAGE_LENGTH);
    }

    #[test]
    fn sanitize_may_produce_empty_text() {
        assert_eq!(sanitize_message("\u{0001}\u{0002}"), "");
    }

    #[test]
    fn emoji_rules() {
        assert_eq!(validate_emoji("👍"), Ok(()));
        assert_eq!(validate_emoji("👨‍👩‍👧"), Ok(()));
        assert_eq!(validate_emoji(""), Err(ValidationError::InvalidEmoji));
        assert_eq!(validate_emoji("a b"), Err(ValidationError::InvalidEmoji));
        assert_eq!(validate_emoji(&"x".repeat(17)), Err(ValidationError::InvalidEmoji));
    }
}
