// src/util.rs — Shared helpers

use std::borrow::Cow;

/// Single-line excerpt of model output for log fields.
///
/// Line breaks become spaces and text longer than `max_bytes` is cut on a
/// UTF-8 boundary, with the number of dropped bytes appended.
pub fn log_preview(text: &str, max_bytes: usize) -> Cow<'_, str> {
    let needs_flatten = text.contains(['\n', '\r']);
    if text.len() <= max_bytes && !needs_flatten {
        return Cow::Borrowed(text);
    }

    let mut end = max_bytes.min(text.len());
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    let mut out: String = text[..end]
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    if end < text.len() {
        out.push_str(&format!("... (+{} bytes)", text.len() - end));
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_single_line_is_borrowed() {
        assert!(matches!(log_preview("hello", 10), Cow::Borrowed("hello")));
    }

    #[test]
    fn test_long_text_is_cut() {
        assert_eq!(log_preview("hello world", 5), "hello... (+6 bytes)");
    }

    #[test]
    fn test_newlines_flattened() {
        assert_eq!(log_preview("{\n\"a\": 1\n}", 100), "{ \"a\": 1 }");
    }

    #[test]
    fn test_multibyte_boundary() {
        // "café" is 5 bytes; cutting at 4 must not split the é
        assert_eq!(log_preview("café", 4), "caf... (+2 bytes)");
    }

    #[test]
    fn test_zero_budget() {
        assert_eq!(log_preview("hi", 0), "... (+2 bytes)");
    }
}
