//! Keyword screen applied to the topic before a brief is written.

const BLOCKED_WORDS: [&str; 3] = ["kill", "hate", "slur"];

/// Returns `false` when the text contains a blocked word as a whole word
/// (case-insensitive). Empty text passes.
pub fn basic_moderation(text: &str) -> bool {
    !text
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .any(|word| BLOCKED_WORDS.iter().any(|b| word.eq_ignore_ascii_case(b)))
}
