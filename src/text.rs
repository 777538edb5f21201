//! Comment text wrapping

use crate::view::diff::split_at_char;

/// Wrap comment prose to `max_width` characters, keeping paragraph breaks.
///
/// Words longer than the width are hard-split.
#[must_use]
pub fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    if max_width == 0 {
        return Vec::new();
    }

    let mut lines = Vec::new();
    for raw_line in text.lines() {
        if raw_line.trim().is_empty() {
            lines.push(String::new());
            continue;
        }

        let mut current = String::new();
        let mut current_width = 0usize;
        for word in raw_line.split_whitespace() {
            let word_width = word.chars().count();
            if current_width > 0 && current_width + 1 + word_width <= max_width {
                current.push(' ');
                current.push_str(word);
                current_width += 1 + word_width;
                continue;
            }
            if current_width > 0 {
                lines.push(std::mem::take(&mut current));
            }

            let mut rest = word;
            while rest.chars().count() > max_width {
                let (head, tail) = split_at_char(rest, max_width);
                lines.push(head.to_string());
                rest = tail;
            }
            current.push_str(rest);
            current_width = rest.chars().count();
        }

        if current_width > 0 {
            lines.push(current);
        }
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wraps_on_words() {
        assert_eq!(
            wrap_text("please rename this helper", 12),
            vec!["please", "rename this", "helper"]
        );
    }

    #[test]
    fn test_keeps_paragraphs() {
        assert_eq!(wrap_text("one\n\ntwo", 10), vec!["one", "", "two"]);
    }

    #[test]
    fn test_splits_long_words_on_chars() {
        assert_eq!(wrap_text("ééééé x", 2), vec!["éé", "éé", "é", "x"]);
    }

    #[test]
    fn test_zero_width() {
        assert!(wrap_text("anything", 0).is_empty());
    }
}
