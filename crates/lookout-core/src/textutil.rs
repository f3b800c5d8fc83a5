//! Text sanitation helpers: sentence splitting, boundary-aware truncation,
//! and content hashing for the feed idempotency triple.

use sha2::{Digest, Sha256};

use crate::defaults::TRUNCATE_SENTENCE_WINDOW;

/// Marker appended when [`truncate_at_boundary`] shortens its input.
pub const ELLIPSIS: &str = "…";

/// SHA-256 hex digest of `text`, used as the `content_hash` leg of the
/// `(topic_id, content_id, content_hash)` idempotency triple.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Split text into sentences on `.`, `!`, `?` terminators.
///
/// A terminator only closes a sentence when followed by whitespace or the end
/// of input, which keeps decimals and common abbreviations intact often
/// enough for summary assembly. Empty segments are dropped.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            let closes = chars.peek().map(|n| n.is_whitespace()).unwrap_or(true);
            if closes {
                let trimmed = current.trim();
                if !trimmed.is_empty() {
                    sentences.push(trimmed.to_string());
                }
                current.clear();
            }
        }
    }
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
    sentences
}

/// Truncate `text` to at most `budget` characters, cutting at a sentence
/// boundary when one falls within the last 20% of the budget, otherwise at
/// the last word boundary — never mid-word. Appends [`ELLIPSIS`] only when
/// the input was actually shortened.
pub fn truncate_at_boundary(text: &str, budget: usize) -> String {
    if budget == 0 {
        return String::new();
    }
    if text.chars().count() <= budget {
        return text.to_string();
    }

    let prefix: String = text.chars().take(budget).collect();

    // Prefer a sentence boundary near the end of the budget.
    let window_start = (budget as f64 * (1.0 - TRUNCATE_SENTENCE_WINDOW)) as usize;
    let sentence_cut = prefix
        .char_indices()
        .filter(|&(_, c)| matches!(c, '.' | '!' | '?'))
        .map(|(i, c)| i + c.len_utf8())
        .filter(|&end| prefix[..end].chars().count() >= window_start)
        .next_back();

    if let Some(end) = sentence_cut {
        return format!("{}{}", prefix[..end].trim_end(), ELLIPSIS);
    }

    // Fall back to the last word boundary; a single unbroken token gets a
    // hard cut at the budget.
    let word_cut = prefix.char_indices().rev().find(|(_, c)| c.is_whitespace());
    match word_cut {
        Some((i, _)) if i > 0 => format!("{}{}", prefix[..i].trim_end(), ELLIPSIS),
        _ => format!("{}{}", prefix.trim_end(), ELLIPSIS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_is_stable_hex() {
        let h = content_hash("hello");
        assert_eq!(h.len(), 64);
        assert_eq!(h, content_hash("hello"));
        assert_ne!(h, content_hash("hello "));
    }

    #[test]
    fn split_sentences_basic() {
        let s = split_sentences("First point. Second point! Third point?");
        assert_eq!(
            s,
            vec!["First point.", "Second point!", "Third point?"]
        );
    }

    #[test]
    fn split_sentences_keeps_decimals() {
        let s = split_sentences("Revenue grew 3.5 percent. Costs fell.");
        assert_eq!(s, vec!["Revenue grew 3.5 percent.", "Costs fell."]);
    }

    #[test]
    fn split_sentences_trailing_fragment() {
        let s = split_sentences("Complete sentence. trailing fragment");
        assert_eq!(s, vec!["Complete sentence.", "trailing fragment"]);
    }

    #[test]
    fn truncate_short_input_untouched() {
        let text = "Short enough.";
        assert_eq!(truncate_at_boundary(text, 100), text);
    }

    #[test]
    fn truncate_prefers_sentence_boundary() {
        // Sentence end falls inside the last 20% of the budget.
        let text = "Aaaa bbbb cccc dddd eeee ffff gggg hhh. More trailing text here";
        let out = truncate_at_boundary(text, 45);
        assert_eq!(out, format!("Aaaa bbbb cccc dddd eeee ffff gggg hhh.{ELLIPSIS}"));
    }

    #[test]
    fn truncate_falls_back_to_word_boundary() {
        let text = "alpha beta gamma delta epsilon zeta";
        let out = truncate_at_boundary(text, 18);
        assert!(out.ends_with(ELLIPSIS));
        let body = out.trim_end_matches(ELLIPSIS);
        // Never mid-word: the body must be a prefix of the input ending at a
        // token boundary.
        assert!(text.starts_with(body));
        assert!(text[body.len()..].starts_with(' '));
    }

    #[test]
    fn truncate_single_giant_token() {
        let text = "a".repeat(50);
        let out = truncate_at_boundary(&text, 10);
        assert_eq!(out, format!("{}{ELLIPSIS}", "a".repeat(10)));
    }

    #[test]
    fn truncate_marks_only_when_truncated() {
        assert!(!truncate_at_boundary("hello world", 20).contains(ELLIPSIS));
        assert!(truncate_at_boundary("hello wide world", 8).contains(ELLIPSIS));
    }

    #[test]
    fn truncate_zero_budget() {
        assert_eq!(truncate_at_boundary("anything", 0), "");
    }
}
