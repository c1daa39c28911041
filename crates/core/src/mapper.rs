//! Candidate to on-page region resolution.

use crate::cipher::encipher;
use crate::detector::Candidate;
use crate::model::{Bands, Category, Rect, Region, StructuralMarks};
use crate::text::{PageText, TextLocator};

pub struct RegionMapper<'a> {
    locator: &'a dyn TextLocator,
    bands: Bands,
}

impl<'a> RegionMapper<'a> {
    pub fn new(locator: &'a dyn TextLocator, bands: Bands) -> Self {
        Self { locator, bands }
    }

    /// Every eligible occurrence of every candidate becomes a region; an
    /// occurrence inside a box already taken on this page is dropped.
    pub fn map(
        &self,
        page: &PageText,
        candidates: &[Candidate],
        marks: &StructuralMarks,
    ) -> Vec<Region> {
        let mut regions: Vec<Region> = Vec::new();

        for candidate in candidates {
            let token = encipher(&candidate.text);
            for rect in self.locator.locate(page, &candidate.text) {
                if !self.is_eligible(candidate.category, page, &rect, marks) {
                    log::debug!(
                        "[Map] page {}: {} occurrence at y={:.1} outside window",
                        page.index,
                        candidate.category,
                        rect.y0
                    );
                    continue;
                }
                if regions.iter().any(|r| r.rect.contains(&rect)) {
                    continue;
                }
                regions.push(Region::text(
                    candidate.category,
                    page.index,
                    rect,
                    candidate.text.clone(),
                    token.clone(),
                ));
            }
        }

        regions
    }

    /// Processing window for one occurrence.
    ///
    /// The abstract cutoff bounds names only: e-mail addresses and
    /// affiliations are often typeset as footnotes under the abstract
    /// heading of the first page.
    pub fn is_eligible(
        &self,
        category: Category,
        page: &PageText,
        rect: &Rect,
        marks: &StructuralMarks,
    ) -> bool {
        if marks.is_skipped(page.index) || marks.references_page == Some(page.index) {
            return false;
        }
        if page.index == 0 && rect.y0 < page.height * self.bands.title {
            return false;
        }
        if category == Category::Name && marks.abstract_page == Some(page.index) {
            if let Some(cutoff) = marks.abstract_y_cutoff {
                return rect.y0 < cutoff;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::{LineSearch, TextLine};

    fn page(index: usize, lines: &[(&str, f32)]) -> PageText {
        PageText::new(index, 595.0, 842.0).with_lines(
            lines
                .iter()
                .map(|(t, y)| TextLine::uniform(t, 72.0, *y, 6.0, 12.0))
                .collect(),
        )
    }

    fn name(text: &str) -> Candidate {
        Candidate {
            category: Category::Name,
            text: text.into(),
        }
    }

    #[test]
    fn test_every_occurrence_mapped() {
        let mapper = RegionMapper::new(&LineSearch, Bands::default());
        let p = page(1, &[("Jane Doe wrote", 300.0), ("thanks Jane Doe", 400.0)]);
        let regions = mapper.map(&p, &[name("Jane Doe")], &StructuralMarks::default());
        assert_eq!(regions.len(), 2);
        assert!(regions.iter().all(|r| r.page == 1));
        assert_eq!(regions[0].cipher.as_deref(), Some(encipher("Jane Doe").as_str()));
    }

    #[test]
    fn test_contained_occurrence_dropped() {
        let mapper = RegionMapper::new(&LineSearch, Bands::default());
        let p = page(1, &[("Jane Doe", 300.0)]);
        let regions = mapper.map(&p, &[name("Jane Doe"), name("Doe")], &StructuralMarks::default());
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].text.as_deref(), Some("Jane Doe"));
    }

    #[test]
    fn test_title_band_on_first_page() {
        let mapper = RegionMapper::new(&LineSearch, Bands::default());
        let p = page(0, &[("Jane Doe", 50.0), ("Jane Doe", 200.0)]);
        let regions = mapper.map(&p, &[name("Jane Doe")], &StructuralMarks::default());
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].rect.y0, 200.0);
    }

    #[test]
    fn test_abstract_cutoff_bounds_names_only() {
        let mapper = RegionMapper::new(&LineSearch, Bands::default());
        let p = page(0, &[("Jane Doe", 200.0), ("Abstract", 300.0), ("Jane Doe at Acme Institute", 320.0)]);
        let marks = StructuralMarks {
            abstract_page: Some(0),
            abstract_y_cutoff: Some(300.0),
            ..StructuralMarks::default()
        };
        let candidates = vec![
            name("Jane Doe"),
            Candidate { category: Category::Institution, text: "Acme Institute".into() },
        ];
        let regions = mapper.map(&p, &candidates, &marks);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].rect.y0, 200.0);
        assert_eq!(regions[1].category, Category::Institution);
        assert_eq!(regions[1].rect.y0, 320.0);
    }

    #[test]
    fn test_skip_and_references_pages_excluded() {
        let mapper = RegionMapper::new(&LineSearch, Bands::default());
        let marks = StructuralMarks {
            references_page: Some(3),
            skip_pages: vec![2],
            ..StructuralMarks::default()
        };
        for index in [2, 3] {
            let p = page(index, &[("Jane Doe", 300.0)]);
            assert!(mapper.map(&p, &[name("Jane Doe")], &marks).is_empty());
        }
        let p = page(4, &[("Jane Doe", 300.0)]);
        assert_eq!(mapper.map(&p, &[name("Jane Doe")], &marks).len(), 1);
    }
}
