//! Text layout helpers for the summary card.
//!
//! Pure string work, no PDF types: word wrapping for the address block and
//! the bounded footer rendering of the extra bag. Keeping these pure is
//! what makes the page-usage caps testable without rendering anything.

use serde_json::{Map, Value};

/// Column width of the wrapped address block.
pub const ADDRESS_WRAP_WIDTH: usize = 70;

/// The footer shows at most this many lines of the pretty-printed extra
/// bag, whatever its size.
pub const FOOTER_MAX_LINES: usize = 10;

/// Each footer line is cut to this many characters.
pub const FOOTER_MAX_LINE_CHARS: usize = 100;

/// Greedy word wrap at `width` columns. Words longer than a full line are
/// broken hard so no output line ever exceeds `width` characters.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return Vec::new();
    }

    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        for chunk in split_long_word(word, width) {
            let chunk_len = chunk.chars().count();
            if current_len == 0 {
                current.push_str(&chunk);
                current_len = chunk_len;
            } else if current_len + 1 + chunk_len <= width {
                current.push(' ');
                current.push_str(&chunk);
                current_len += 1 + chunk_len;
            } else {
                lines.push(std::mem::take(&mut current));
                current.push_str(&chunk);
                current_len = chunk_len;
            }
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Split one word into chunks of at most `width` characters.
fn split_long_word(word: &str, width: usize) -> Vec<String> {
    if word.chars().count() <= width {
        return vec![word.to_string()];
    }

    let mut chunks = Vec::new();
    let mut buf = String::new();
    let mut len = 0usize;
    for ch in word.chars() {
        buf.push(ch);
        len += 1;
        if len == width {
            chunks.push(std::mem::take(&mut buf));
            len = 0;
        }
    }
    if !buf.is_empty() {
        chunks.push(buf);
    }
    chunks
}

/// Footer block for the extra bag: pretty-printed JSON, first
/// [`FOOTER_MAX_LINES`] lines, each cut to [`FOOTER_MAX_LINE_CHARS`]
/// characters. Caps page usage regardless of payload size.
pub fn footer_lines(extra: &Map<String, Value>) -> Vec<String> {
    let pretty = serde_json::to_string_pretty(&Value::Object(extra.clone()))
        .unwrap_or_else(|_| String::from("{}"));

    pretty
        .lines()
        .take(FOOTER_MAX_LINES)
        .map(|line| truncate_chars(line, FOOTER_MAX_LINE_CHARS))
        .collect()
}

/// First `max` characters of a string, on char boundaries.
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
