//! Structural landmark detection.

use crate::model::{Bands, StructuralMarks};
use crate::text::PageText;
use blindfold_rules::{profiles, LanguageProfile};

/// Derives abstract, references and skip-page landmarks from page text.
///
/// Keyword tables of every supported language are consulted, so a Turkish
/// paper with an English abstract heading is still handled.
pub fn locate_sections(pages: &[PageText], bands: &Bands) -> StructuralMarks {
    let profiles: Vec<&LanguageProfile> = profiles().iter().collect();
    let mut marks = StructuralMarks::default();

    for page in pages {
        if marks.abstract_page.is_none() {
            if let Some(cutoff) = abstract_cutoff(page, &profiles) {
                log::info!(
                    "[Locate] abstract on page {} at y={:.1}",
                    page.index,
                    cutoff
                );
                marks.abstract_page = Some(page.index);
                marks.abstract_y_cutoff = Some(cutoff);
            }
        }

        if marks.references_page.is_none() && has_references_heading(page, &profiles) {
            log::info!("[Locate] references on page {}", page.index);
            marks.references_page = Some(page.index);
        }

        if has_skip_heading(page, &profiles, bands.skip) {
            log::info!("[Locate] page {} skipped", page.index);
            marks.skip_pages.push(page.index);
        }
    }

    marks
}

/// Smallest `y0` among lines containing an abstract keyword, any case.
fn abstract_cutoff(page: &PageText, profiles: &[&LanguageProfile]) -> Option<f32> {
    page.lines
        .iter()
        .filter(|line| {
            let lower = line.text.to_lowercase();
            profiles
                .iter()
                .flat_map(|p| p.abstract_keywords.iter())
                .any(|kw| lower.contains(kw.as_str()))
        })
        .map(|line| line.rect.y0)
        .fold(None, |acc: Option<f32>, y| {
            Some(acc.map_or(y, |a| a.min(y)))
        })
}

/// Whole-token, case-sensitive match of a references heading.
fn has_references_heading(page: &PageText, profiles: &[&LanguageProfile]) -> bool {
    page.lines.iter().any(|line| {
        line.text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .any(|token| {
                profiles
                    .iter()
                    .flat_map(|p| p.references_keywords.iter())
                    .any(|kw| kw == token)
            })
    })
}

fn has_skip_heading(page: &PageText, profiles: &[&LanguageProfile], band: f32) -> bool {
    page.top_lines(band).any(|line| {
        let lower = line.text.to_lowercase();
        profiles
            .iter()
            .flat_map(|p| p.skip_keywords.iter())
            .any(|kw| lower.contains(kw.as_str()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::TextLine;

    fn page(index: usize, lines: &[(&str, f32)]) -> PageText {
        PageText::new(index, 595.0, 842.0).with_lines(
            lines
                .iter()
                .map(|(t, y)| TextLine::uniform(t, 72.0, *y, 6.0, 12.0))
                .collect(),
        )
    }

    #[test]
    fn test_abstract_and_references() {
        let pages = vec![
            page(0, &[("A Title", 60.0), ("Abstract", 300.0), ("the abstract body", 320.0)]),
            page(1, &[("Body text", 100.0)]),
            page(2, &[("REFERENCES", 400.0)]),
        ];
        let marks = locate_sections(&pages, &Bands::default());
        assert_eq!(marks.abstract_page, Some(0));
        assert_eq!(marks.abstract_y_cutoff, Some(300.0));
        assert_eq!(marks.references_page, Some(2));
        assert!(marks.skip_pages.is_empty());
    }

    #[test]
    fn test_references_is_case_sensitive_token() {
        let pages = vec![
            page(0, &[("see the references below", 100.0)]),
            page(1, &[("CROSSREFERENCES", 100.0)]),
            page(2, &[("KAYNAKÇA", 100.0)]),
        ];
        let marks = locate_sections(&pages, &Bands::default());
        assert_eq!(marks.references_page, Some(2));
    }

    #[test]
    fn test_missing_landmarks() {
        let marks = locate_sections(&[page(0, &[("Nothing here", 100.0)])], &Bands::default());
        assert_eq!(marks, StructuralMarks::default());
    }

    #[test]
    fn test_skip_only_near_top() {
        let pages = vec![
            page(0, &[("1 Introduction", 100.0)]),
            page(1, &[("Some text", 100.0), ("5 Related Work", 600.0)]),
            page(2, &[("Teşekkür", 50.0)]),
        ];
        let marks = locate_sections(&pages, &Bands::default());
        assert_eq!(marks.skip_pages, vec![0, 2]);
    }

    #[test]
    fn test_turkish_abstract() {
        let pages = vec![page(0, &[("ÖZET", 250.0)])];
        let marks = locate_sections(&pages, &Bands::default());
        assert_eq!(marks.abstract_page, Some(0));
    }
}
