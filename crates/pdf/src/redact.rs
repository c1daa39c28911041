//! Applies a region ledger to a document.

use crate::content::{decode_page, encode_page};
use crate::document::PdfDocument;
use crate::error::Result;
use crate::fonts::{page_fonts, FontMap};
use crate::image::blur_page_images;
use crate::text::{ensure_writer_font, isolate, redaction_block, remove_glyphs};
use crate::utils::{page_box, PageBox};
use blindfold_core::{encipher, Category, Rect, Region, RegionLedger};
use lopdf::content::Operation;

pub const DEFAULT_TOKEN_FONT_SIZE: f32 = 6.0;
pub const DEFAULT_BLUR_SIGMA: f32 = 12.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RedactSettings {
    /// Size of the recovery token drawn in each box.
    pub token_font_size: f32,
    /// Gaussian sigma for image regions; must be positive.
    pub blur_sigma: f32,
}

impl Default for RedactSettings {
    fn default() -> Self {
        Self {
            token_font_size: DEFAULT_TOKEN_FONT_SIZE,
            blur_sigma: DEFAULT_BLUR_SIGMA,
        }
    }
}

/// Counts from one redaction pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RedactSummary {
    pub glyphs_removed: usize,
    pub text_regions: usize,
    pub images_blurred: usize,
}

fn token_of(region: &Region) -> String {
    match (&region.cipher, &region.text) {
        (Some(token), _) => token.clone(),
        (None, Some(text)) => encipher(text),
        (None, None) => String::new(),
    }
}

/// Content of a page with the text regions removed and their token boxes
/// appended. Returns the new content and the number of glyphs removed.
pub(crate) fn redact_content(
    operations: Vec<Operation>,
    fonts: &FontMap,
    page: PageBox,
    regions: &[&Region],
    token_font_size: f32,
) -> (Vec<Operation>, usize) {
    let rects: Vec<Rect> = regions.iter().map(|r| r.rect).collect();
    let (operations, removed) = remove_glyphs(operations, fonts, page, &rects);

    let mut out = isolate(operations);
    for region in regions {
        out.extend(redaction_block(page, &region.rect, &token_of(region), token_font_size));
    }
    (out, removed)
}

/// Applies every region of `ledger` to `doc`.
pub fn apply_redactions(
    doc: &mut PdfDocument,
    ledger: &RegionLedger,
    settings: &RedactSettings,
) -> Result<RedactSummary> {
    let mut summary = RedactSummary::default();

    // Reject the ledger before touching anything.
    for region in ledger {
        doc.page_id(region.page)?;
    }

    for index in 0..doc.page_count() {
        let page_id = doc.page_id(index)?;
        let (images, texts): (Vec<&Region>, Vec<&Region>) = ledger
            .on_page(index)
            .filter(|r| r.rect.is_well_formed())
            .partition(|r| r.category == Category::Image);

        if !texts.is_empty() {
            let pdf = doc.inner_mut();
            ensure_writer_font(pdf, page_id)?;
            let fonts = page_fonts(pdf, page_id);
            let operations = decode_page(pdf, page_id)?;
            let (operations, removed) = redact_content(
                operations,
                &fonts,
                page_box(pdf, page_id),
                &texts,
                settings.token_font_size,
            );
            encode_page(pdf, page_id, operations)?;
            summary.glyphs_removed += removed;
            summary.text_regions += texts.len();
            log::info!(
                "[Redact] page {}: {} regions, {} glyphs removed",
                index,
                texts.len(),
                removed
            );
        }

        if !images.is_empty() {
            let rects: Vec<Rect> = images.iter().map(|r| r.rect).collect();
            summary.images_blurred +=
                blur_page_images(doc.inner_mut(), page_id, &rects, settings.blur_sigma)?;
        }
    }

    log::info!(
        "[Redact] done: {} text regions, {} glyphs, {} images",
        summary.text_regions,
        summary.glyphs_removed,
        summary.images_blurred
    );
    Ok(summary)
}
