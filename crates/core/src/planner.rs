//! Redaction planning: landmarks, detection and mapping over a whole document.

use crate::detector::{EntityDetector, EntityRecognizer, RecognizerError};
use crate::locator::locate_sections;
use crate::mapper::RegionMapper;
use crate::model::{Bands, Category, Options, Rect, Region, RegionLedger, StructuralMarks};
use crate::text::{PageText, TextLocator};

/// Everything an anonymization run decided before touching the document.
#[derive(Debug, Clone, Default)]
pub struct RedactionPlan {
    pub marks: StructuralMarks,
    pub ledger: RegionLedger,
}

pub struct Planner<'a> {
    recognizer: &'a dyn EntityRecognizer,
    locator: &'a dyn TextLocator,
    bands: Bands,
}

impl<'a> Planner<'a> {
    pub fn new(
        recognizer: &'a dyn EntityRecognizer,
        locator: &'a dyn TextLocator,
        bands: Bands,
    ) -> Self {
        Self {
            recognizer,
            locator,
            bands,
        }
    }

    /// Builds the ledger for `pages`.
    ///
    /// `image_rects[i]` holds the placement boxes of the images drawn on page
    /// `i`. Regions are ordered by page, text before images.
    pub fn plan(
        &self,
        pages: &[PageText],
        image_rects: &[Vec<Rect>],
        options: &Options,
    ) -> Result<RedactionPlan, RecognizerError> {
        let marks = locate_sections(pages, &self.bands);
        let detector = EntityDetector::new(self.recognizer, self.bands);
        let mapper = RegionMapper::new(self.locator, self.bands);
        let mut ledger = RegionLedger::new();

        for page in pages {
            let scannable =
                !marks.is_skipped(page.index) && marks.references_page != Some(page.index);
            if scannable {
                let candidates = detector.detect(page, options, &marks)?;
                ledger.extend(mapper.map(page, &candidates, &marks));
            }

            if options.enabled(Category::Image) && marks.is_after_references(page.index) {
                if let Some(rects) = image_rects.get(page.index) {
                    ledger.extend(
                        rects
                            .iter()
                            .filter(|r| r.is_well_formed())
                            .map(|r| Region::image(page.index, *r)),
                    );
                }
            }
        }

        log::info!(
            "[Plan] {} regions (name={}, contact={}, institution={}, image={})",
            ledger.len(),
            ledger.count(Category::Name),
            ledger.count(Category::Contact),
            ledger.count(Category::Institution),
            ledger.count(Category::Image)
        );

        Ok(RedactionPlan { marks, ledger })
    }
}
