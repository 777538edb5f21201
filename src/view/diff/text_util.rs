//! Cell text formatting: tab expansion and line-length breaks.

use serde::Serialize;

pub(crate) fn split_at_char(text: &str, max_chars: usize) -> (&str, &str) {
    if max_chars == 0 {
        return ("", text);
    }
    for (count, (idx, _)) in text.char_indices().enumerate() {
        if count == max_chars {
            return (&text[..idx], &text[idx..]);
        }
    }
    (text, "")
}

/// Truncate a string to at most `max_chars` characters, respecting UTF-8 char boundaries.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> &str {
    split_at_char(text, max_chars).0
}

/// One piece of formatted cell text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TextSegment {
    Text { text: String },
    /// A tab, expanded to the next tab stop
    Tab { width: u32 },
    /// Line-length break; soft breaks come from wrapping, hard ones mark
    /// where an unwrapped line overflows
    Break { soft: bool },
}

/// Split `text` into segments, expanding tabs to multiples of `tab_size` and
/// breaking every `line_length` columns.
#[must_use]
pub fn format_text(
    text: &str,
    tab_size: u32,
    line_length: u32,
    wrapping: bool,
) -> Vec<TextSegment> {
    let tab_size = tab_size.max(1);
    let line_length = line_length.max(1);
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut column = 0u32;

    for c in text.chars() {
        let width = if c == '\t' {
            tab_size - column % tab_size
        } else {
            1
        };
        if column > 0 && column + width > line_length {
            flush(&mut segments, &mut current);
            segments.push(TextSegment::Break { soft: wrapping });
            column = 0;
        }
        if c == '\t' {
            flush(&mut segments, &mut current);
            // re-measure after a break moved the tab to column 0
            let width = tab_size - column % tab_size;
            segments.push(TextSegment::Tab { width });
            column += width;
        } else {
            current.push(c);
            column += 1;
        }
    }
    flush(&mut segments, &mut current);
    segments
}

fn flush(segments: &mut Vec<TextSegment>, current: &mut String) {
    if !current.is_empty() {
        segments.push(TextSegment::Text {
            text: std::mem::take(current),
        });
    }
}

/// Render segments as display lines.
#[must_use]
pub fn segments_to_lines(segments: &[TextSegment]) -> Vec<String> {
    let mut lines = vec![String::new()];
    for segment in segments {
        match segment {
            TextSegment::Text { text } => {
                if let Some(line) = lines.last_mut() {
                    line.push_str(text);
                }
            }
            TextSegment::Tab { width } => {
                if let Some(line) = lines.last_mut() {
                    line.extend(std::iter::repeat_n(' ', *width as usize));
                }
            }
            TextSegment::Break { .. } => lines.push(String::new()),
        }
    }
    lines
}
