//! Positioned page text.
//!
//! Extraction lives in the PDF layer; everything above it only sees lines of
//! text with one horizontal extent per character, which is enough to resolve
//! any substring to a box.

use crate::model::Rect;

/// A single visual line of text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    /// Box covering every glyph on the line.
    pub rect: Rect,
    /// `[x0, x1]` for each `char` of `text`, in order.
    pub char_spans: Vec<[f32; 2]>,
}

impl TextLine {
    pub fn new(text: String, rect: Rect, char_spans: Vec<[f32; 2]>) -> Self {
        Self {
            text,
            rect,
            char_spans,
        }
    }

    /// Line with evenly spaced characters; handy for synthetic pages.
    pub fn uniform(text: &str, x: f32, y: f32, char_width: f32, height: f32) -> Self {
        let char_spans: Vec<[f32; 2]> = (0..text.chars().count())
            .map(|i| {
                let x0 = x + i as f32 * char_width;
                [x0, x0 + char_width]
            })
            .collect();
        let x1 = char_spans.last().map(|s| s[1]).unwrap_or(x);
        Self {
            text: text.to_string(),
            rect: Rect::new(x, y, x1, y + height),
            char_spans,
        }
    }

    /// Box of the characters `start..end` (char indices).
    pub fn span_rect(&self, start: usize, end: usize) -> Option<Rect> {
        if start >= end || end > self.char_spans.len() {
            return None;
        }
        let x0 = self.char_spans[start..end]
            .iter()
            .map(|s| s[0])
            .fold(f32::INFINITY, f32::min);
        let x1 = self.char_spans[start..end]
            .iter()
            .map(|s| s[1])
            .fold(f32::NEG_INFINITY, f32::max);
        Some(Rect::new(x0, self.rect.y0, x1, self.rect.y1))
    }

    /// Boxes of every literal, non-overlapping occurrence of `needle`.
    pub fn find_all(&self, needle: &str) -> Vec<Rect> {
        if needle.is_empty() {
            return Vec::new();
        }
        let needle_chars = needle.chars().count();
        self.text
            .match_indices(needle)
            .filter_map(|(byte_idx, _)| {
                let start = self.text[..byte_idx].chars().count();
                self.span_rect(start, start + needle_chars)
            })
            .collect()
    }

    /// Characters whose horizontal centre lies inside `rect`, provided the
    /// line's vertical centre does too.
    pub fn text_in(&self, rect: &Rect) -> String {
        let cy = (self.rect.y0 + self.rect.y1) / 2.0;
        if cy < rect.y0 || cy > rect.y1 {
            return String::new();
        }
        self.text
            .chars()
            .zip(self.char_spans.iter())
            .filter(|(_, span)| {
                let cx = (span[0] + span[1]) / 2.0;
                cx >= rect.x0 && cx <= rect.x1
            })
            .map(|(c, _)| c)
            .collect()
    }
}

/// Text of one page in reading order.
#[derive(Debug, Clone, PartialEq)]
pub struct PageText {
    pub index: usize,
    pub width: f32,
    pub height: f32,
    pub lines: Vec<TextLine>,
}

impl PageText {
    pub fn new(index: usize, width: f32, height: f32) -> Self {
        Self {
            index,
            width,
            height,
            lines: Vec::new(),
        }
    }

    pub fn with_lines(mut self, lines: Vec<TextLine>) -> Self {
        self.lines = lines;
        self
    }

    /// Lines joined with `\n`.
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn search(&self, needle: &str) -> Vec<Rect> {
        self.lines
            .iter()
            .flat_map(|line| line.find_all(needle))
            .collect()
    }

    /// Visible text inside `rect`, lines joined with spaces.
    pub fn text_in(&self, rect: &Rect) -> String {
        self.lines
            .iter()
            .map(|l| l.text_in(rect))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Lines whose top edge is inside the top `fraction` of the page.
    pub fn top_lines(&self, fraction: f32) -> impl Iterator<Item = &TextLine> + '_ {
        let limit = self.height * fraction;
        self.lines.iter().filter(move |l| l.rect.y0 < limit)
    }
}

/// Resolves a text span to on-page boxes.
pub trait TextLocator {
    fn locate(&self, page: &PageText, needle: &str) -> Vec<Rect>;
}

/// Searches the extracted lines directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineSearch;

impl TextLocator for LineSearch {
    fn locate(&self, page: &PageText, needle: &str) -> Vec<Rect> {
        page.search(needle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_all_multiple() {
        let line = TextLine::uniform("ab ab", 10.0, 100.0, 5.0, 12.0);
        let hits = line.find_all("ab");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0], Rect::new(10.0, 100.0, 20.0, 112.0));
        assert_eq!(hits[1], Rect::new(25.0, 100.0, 35.0, 112.0));
    }

    #[test]
    fn test_find_all_non_ascii_offsets() {
        let line = TextLine::uniform("Özgür Ünal", 0.0, 0.0, 4.0, 10.0);
        let hits = line.find_all("Ünal");
        assert_eq!(hits, vec![Rect::new(24.0, 0.0, 40.0, 10.0)]);
    }

    #[test]
    fn test_text_in() {
        let page = PageText::new(0, 595.0, 842.0).with_lines(vec![
            TextLine::uniform("John Smith", 72.0, 200.0, 6.0, 12.0),
            TextLine::uniform("Second line", 72.0, 220.0, 6.0, 12.0),
        ]);
        let rect = page.search("Smith")[0];
        assert_eq!(page.text_in(&rect), "Smith");
        assert_eq!(page.text_in(&Rect::new(0.0, 0.0, 10.0, 10.0)), "");
    }

    #[test]
    fn test_top_lines() {
        let page = PageText::new(0, 100.0, 100.0).with_lines(vec![
            TextLine::uniform("top", 0.0, 5.0, 1.0, 2.0),
            TextLine::uniform("bottom", 0.0, 50.0, 1.0, 2.0),
        ]);
        let top: Vec<_> = page.top_lines(0.2).map(|l| l.text.as_str()).collect();
        assert_eq!(top, vec!["top"]);
    }
}
