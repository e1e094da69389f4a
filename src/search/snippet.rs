//! Query-biased snippet extraction.
//!
//! Picks the paragraph with the most query-term matches, optionally pulls
//! in a short preceding paragraph for context, and truncates at the best
//! natural boundary found in the tail of the length budget.

use unicode_segmentation::UnicodeSegmentation;

/// Fraction of `max_len` searched (from the end) for a truncation point.
const BOUNDARY_WINDOW: f64 = 0.30;

/// Paragraphs shorter than this are prepended as lead-in context.
const SHORT_PARAGRAPH: usize = 100;

/// Strips leading markdown heading lines.
fn strip_leading_headings(text: &str) -> &str {
    let mut rest = text.trim_start();
    while rest.starts_with('#') {
        match rest.find('\n') {
            Some(idx) => rest = rest[idx + 1..].trim_start(),
            None => return "",
        }
    }
    rest
}

/// Builds a query-biased snippet of at most `max_len` bytes.
#[must_use]
pub fn query_biased_snippet(text: &str, max_len: usize, query_terms: &[String]) -> String {
    let body = strip_leading_headings(text);
    if body.len() <= max_len {
        return body.to_string();
    }

    let separator = if body.contains("\n\n") { "\n\n" } else { "\n" };
    let paragraphs: Vec<&str> = body.split(separator).collect();

    let lowered: Vec<String> = query_terms.iter().map(|t| t.to_lowercase()).collect();
    let score = |paragraph: &str| -> usize {
        let lower = paragraph.to_lowercase();
        lowered.iter().filter(|t| lower.contains(t.as_str())).count()
    };

    let mut best_index = 0;
    let mut best_score = 0;
    for (i, paragraph) in paragraphs.iter().enumerate() {
        let s = score(paragraph);
        if s > best_score {
            best_score = s;
            best_index = i;
        }
    }

    // No query match: take the document head as the snippet.
    if best_score == 0 {
        return smart_truncate(body, max_len);
    }

    let mut selected = String::new();
    if best_index > 0 && paragraphs[best_index - 1].len() < SHORT_PARAGRAPH {
        selected.push_str(paragraphs[best_index - 1]);
        selected.push_str(separator);
    }
    selected.push_str(paragraphs[best_index]);

    smart_truncate(&selected, max_len)
}

/// Truncates at the best boundary: paragraph break, sentence end, line
/// break, then word break, each searched within the last 30% of
/// `max_len`. Falls back to a grapheme-safe hard cut.
#[must_use]
pub fn smart_truncate(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        return text.to_string();
    }

    // Cut to a char-safe prefix of max_len bytes first.
    let mut cut = max_len;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    let prefix = &text[..cut];

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let window_start = (max_len as f64 * (1.0 - BOUNDARY_WINDOW)) as usize;

    if let Some(idx) = rfind_in_window(prefix, "\n\n", window_start) {
        return prefix[..idx].trim_end().to_string();
    }
    if let Some(idx) = rfind_sentence_end(prefix, window_start) {
        return prefix[..idx].trim_end().to_string();
    }
    if let Some(idx) = rfind_in_window(prefix, "\n", window_start) {
        return prefix[..idx].trim_end().to_string();
    }
    if let Some(idx) = rfind_in_window(prefix, " ", window_start) {
        return prefix[..idx].trim_end().to_string();
    }

    // Hard cut on a grapheme boundary.
    let mut end = 0;
    for (offset, grapheme) in prefix.grapheme_indices(true) {
        if offset + grapheme.len() > max_len {
            break;
        }
        end = offset + grapheme.len();
    }
    prefix[..end].to_string()
}

fn rfind_in_window(text: &str, needle: &str, window_start: usize) -> Option<usize> {
    text.rfind(needle).filter(|&idx| idx >= window_start)
}

/// Finds the last `.`/`!`/`?` followed by whitespace within the window;
/// returns the index just past the punctuation.
fn rfind_sentence_end(text: &str, window_start: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut best = None;
    for (i, &b) in bytes.iter().enumerate() {
        if i < window_start {
            continue;
        }
        if matches!(b, b'.' | b'!' | b'?')
            && bytes
                .get(i + 1)
                .is_some_and(|&next| next == b' ' || next == b'\n')
        {
            best = Some(i + 1);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_short_text_returned_whole() {
        let text = "A short note body.";
        assert_eq!(query_biased_snippet(text, 100, &terms(&["note"])), text);
    }

    #[test]
    fn test_leading_headings_stripped() {
        let text = "# Title\n## Section\nActual body content.";
        assert_eq!(
            query_biased_snippet(text, 100, &terms(&[])),
            "Actual body content."
        );
    }

    #[test]
    fn test_picks_matching_paragraph() {
        let filler = "Filler paragraph with nothing relevant inside it at all.".repeat(3);
        let text = format!("{filler}\n\nThe chunker splits at heading boundaries.\n\n{filler}");
        let snippet = query_biased_snippet(&text, 80, &terms(&["chunker"]));
        assert!(snippet.contains("chunker"));
        assert!(!snippet.contains("Filler paragraph"));
    }

    #[test]
    fn test_prepends_short_previous_paragraph() {
        let filler = "x".repeat(200);
        let text = format!("{filler}\n\nContext:\n\nThe chunker splits at heading boundaries.");
        let snippet = query_biased_snippet(&text, 120, &terms(&["chunker"]));
        assert!(snippet.starts_with("Context:"));
    }

    #[test]
    fn test_no_match_truncates_from_start() {
        let text = "Start of the document. ".repeat(30);
        let snippet = query_biased_snippet(&text, 100, &terms(&["absent"]));
        assert!(snippet.starts_with("Start of the document."));
        assert!(snippet.len() <= 100);
    }

    #[test]
    fn test_smart_truncate_prefers_paragraph_break() {
        let text = format!("{}\n\n{}", "a".repeat(80), "b".repeat(80));
        let out = smart_truncate(&text, 100);
        assert_eq!(out, "a".repeat(80));
    }

    #[test]
    fn test_smart_truncate_sentence_boundary() {
        let text = format!("{}. {}", "word ".repeat(16).trim_end(), "x".repeat(100));
        let out = smart_truncate(&text, 100);
        assert!(out.ends_with('.'));
    }

    #[test]
    fn test_smart_truncate_word_boundary() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu nu";
        let out = smart_truncate(text, 40);
        assert!(out.len() <= 40);
        assert!(!out.ends_with(' '));
        // Ends on a complete word.
        assert!(text.starts_with(&out));
        assert!(text.as_bytes()[out.len()] == b' ');
    }

    #[test]
    fn test_smart_truncate_multibyte_safe() {
        let text = "é".repeat(100);
        let out = smart_truncate(&text, 51);
        assert!(out.len() <= 51);
        assert!(out.chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_boundary_outside_window_ignored() {
        // Only break is early in the text, outside the 30% tail window.
        let text = format!("ab cd{}", "e".repeat(200));
        let out = smart_truncate(&text, 100);
        // Falls through to the hard cut.
        assert_eq!(out.len(), 100);
    }
}
