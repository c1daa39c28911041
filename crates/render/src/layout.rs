//! Line breaking and font fitting.

use crate::metrics::text_width;

/// Minimum size restored text is shrunk to before it is allowed to overflow.
pub const MIN_FONT_SIZE: f32 = 3.0;

/// Wrapped lines with the size they were laid out at.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub font_size: f32,
    pub leading: f32,
    pub lines: Vec<String>,
}

impl TextBlock {
    pub fn height(&self) -> f32 {
        self.lines.len() as f32 * self.leading
    }
}

/// Greedy word wrap to `max_width` points. Explicit newlines are kept and
/// words longer than a line are broken by character.
pub fn wrap_text(text: &str, font_size: f32, max_width: f32) -> TextBlock {
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if line.is_empty() {
                word.to_string()
            } else {
                format!("{} {}", line, word)
            };
            if text_width(&candidate, font_size) <= max_width {
                line = candidate;
                continue;
            }
            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            if text_width(word, font_size) <= max_width {
                line = word.to_string();
            } else {
                for c in word.chars() {
                    line.push(c);
                    if text_width(&line, font_size) > max_width && line.chars().count() > 1 {
                        line.pop();
                        lines.push(std::mem::take(&mut line));
                        line.push(c);
                    }
                }
            }
        }
        lines.push(line);
    }

    TextBlock {
        font_size,
        leading: font_size * 1.2,
        lines,
    }
}

/// Largest size not above `preferred` at which `text` fits on one line of
/// `width` x `height`, floored at [`MIN_FONT_SIZE`].
pub fn fit_font_size(text: &str, preferred: f32, width: f32, height: f32) -> f32 {
    let mut size = preferred.min(height * 0.9);
    let measured = text_width(text, size);
    if measured > width && measured > 0.0 {
        size *= width / measured;
    }
    size.max(MIN_FONT_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap() {
        // "aaaa" = 4 * 556 / 1000 * 10 = 22.24pt
        let block = wrap_text("aaaa aaaa aaaa", 10.0, 50.0);
        assert_eq!(block.lines, vec!["aaaa aaaa", "aaaa"]);
        assert!((block.height() - 24.0).abs() < 1e-4);
    }

    #[test]
    fn test_wrap_keeps_paragraphs() {
        let block = wrap_text("first\n\nsecond", 11.0, 500.0);
        assert_eq!(block.lines, vec!["first", "", "second"]);
    }

    #[test]
    fn test_wrap_breaks_long_words() {
        let block = wrap_text("aaaaaaaaaa", 10.0, 23.0);
        assert_eq!(block.lines, vec!["aaaa", "aaaa", "aa"]);
    }

    #[test]
    fn test_fit_font_size() {
        assert_eq!(fit_font_size("ab", 12.0, 200.0, 20.0), 12.0);
        // Box height caps the size.
        assert!((fit_font_size("ab", 12.0, 200.0, 10.0) - 9.0).abs() < 1e-4);
        // Width shrinks it: "ab" at 12pt = 13.344pt wide.
        let size = fit_font_size("ab", 12.0, 6.672, 20.0);
        assert!((size - 6.0).abs() < 1e-3);
        assert_eq!(fit_font_size("abcdefgh", 12.0, 1.0, 20.0), MIN_FONT_SIZE);
    }
}
