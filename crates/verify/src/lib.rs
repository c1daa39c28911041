//! Post-processing verification checks.
//!
//! Text is compared on its ASCII-letter skeleton: recovery tokens never
//! contain ASCII letters, so a token drawn inside a box cannot be mistaken
//! for the text it replaces.

use blindfold_core::{Category, PageText, Region, RegionLedger};
use serde::Serialize;

/// Shortest skeleton worth checking.
const MIN_SKELETON: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Leak {
    /// Position in the ledger.
    pub index: usize,
    pub page: usize,
    pub category: Category,
    /// What is readable inside the box.
    pub found: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VerifyReport {
    /// Regions that were checked.
    pub checked: usize,
    pub leaks: Vec<Leak>,
}

impl VerifyReport {
    pub fn ok(&self) -> bool {
        self.leaks.is_empty()
    }
}

fn skeleton(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn readable(pages: &[PageText], region: &Region) -> Option<(String, bool)> {
    let original = skeleton(region.text.as_deref()?);
    if original.len() < MIN_SKELETON {
        return None;
    }
    let page = pages.get(region.page)?;
    let found = page.text_in(&region.rect);
    let present = skeleton(&found).contains(&original);
    Some((found, present))
}

/// Fails every text region whose original text is still readable inside its
/// box in the redacted `pages`.
pub fn verify_redaction(pages: &[PageText], ledger: &RegionLedger) -> VerifyReport {
    let mut report = VerifyReport::default();

    for (index, region) in ledger.iter().enumerate() {
        if !region.category.is_text() {
            continue;
        }
        let Some((found, present)) = readable(pages, region) else {
            continue;
        };
        report.checked += 1;
        if present {
            log::warn!(
                "[Verify] region {} ({}) still readable on page {}",
                index,
                region.category,
                region.page
            );
            report.leaks.push(Leak {
                index,
                page: region.page,
                category: region.category,
                found,
            });
        }
    }

    log::info!(
        "[Verify] checked {} regions, {} leaks",
        report.checked,
        report.leaks.len()
    );
    report
}

/// Ledger indices of restored text regions whose text is not readable back.
pub fn verify_restoration(
    pages: &[PageText],
    ledger: &RegionLedger,
    restored: &[usize],
) -> Vec<usize> {
    restored
        .iter()
        .copied()
        .filter(|&index| {
            let Some(region) = ledger.regions().get(index) else {
                return false;
            };
            matches!(readable(pages, region), Some((_, false)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use blindfold_core::{encipher, Rect, TextLine};

    fn page(lines: &[(&str, f32)]) -> Vec<PageText> {
        vec![PageText::new(0, 595.0, 842.0).with_lines(
            lines
                .iter()
                .map(|(t, y)| TextLine::uniform(t, 72.0, *y, 6.0, 12.0))
                .collect(),
        )]
    }

    fn ledger() -> RegionLedger {
        let mut ledger = RegionLedger::new();
        ledger.push(Region::text(
            Category::Name,
            0,
            Rect::new(72.0, 200.0, 132.0, 212.0),
            "John Smith".into(),
            encipher("John Smith"),
        ));
        ledger.push(Region::image(0, Rect::new(0.0, 0.0, 10.0, 10.0)));
        ledger
    }

    #[test]
    fn test_leak_detected() {
        let report = verify_redaction(&page(&[("John Smith", 200.0)]), &ledger());
        assert_eq!(report.checked, 1);
        assert!(!report.ok());
        assert_eq!(report.leaks[0].index, 0);
    }

    #[test]
    fn test_token_is_not_a_leak() {
        let token = encipher("John Smith");
        let report = verify_redaction(&page(&[(&token, 200.0)]), &ledger());
        assert_eq!(report.checked, 1);
        assert!(report.ok());
    }

    #[test]
    fn test_text_elsewhere_is_not_a_leak() {
        let report = verify_redaction(&page(&[("John Smith", 400.0)]), &ledger());
        assert!(report.ok());
    }

    #[test]
    fn test_restoration() {
        assert!(verify_restoration(&page(&[("John Smith", 200.0)]), &ledger(), &[0, 1]).is_empty());
        assert_eq!(verify_restoration(&page(&[]), &ledger(), &[0]), vec![0]);
    }
}
