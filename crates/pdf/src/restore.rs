//! Reverses redactions on a target document, page by page.

use crate::content::{decode_page, encode_page};
use crate::document::PdfDocument;
use crate::error::Result;
use crate::fonts::page_fonts;
use crate::image::restore_image;
use crate::text::{
    ensure_writer_font, find_blocks, isolate, remove_glyphs, restore_block, shown_token,
    MarkedBlock, REDACTION_TAG, RESTORE_TAG,
};
use crate::utils::page_box;
use blindfold_core::{
    recover_text, Category, Rect, RecoveryChannel, Region, RestorePlan, SkipReason, SkippedRegion,
};
use lopdf::content::Operation;
use std::collections::BTreeMap;

/// What a restore pass did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestoreOutcome {
    /// Ledger indices written back, in ledger order.
    pub restored: Vec<usize>,
    pub skipped: Vec<SkippedRegion>,
}

fn matching<'a>(blocks: &'a [MarkedBlock], rect: &Rect) -> Option<&'a MarkedBlock> {
    blocks
        .iter()
        .find(|b| b.rect.is_some_and(|r| r.approx_eq(rect)))
}

/// Restores the text regions of one page. Returns `(index, outcome)` pairs.
fn restore_text_page(
    target: &mut PdfDocument,
    page: usize,
    regions: &[(usize, &Region)],
    channel: RecoveryChannel,
) -> Result<Vec<(usize, std::result::Result<(), SkipReason>)>> {
    let page_id = target.page_id(page)?;
    let pdf = target.inner_mut();
    ensure_writer_font(pdf, page_id)?;
    let fonts = page_fonts(pdf, page_id);
    let bounds = page_box(pdf, page_id);
    let operations = decode_page(pdf, page_id)?;

    let redactions = find_blocks(&operations, bounds, REDACTION_TAG);
    let restores = find_blocks(&operations, bounds, RESTORE_TAG);

    let mut results = Vec::new();
    let mut dropped: Vec<(usize, usize)> = Vec::new();
    let mut blank: Vec<Rect> = Vec::new();
    let mut writes: Vec<(Rect, String)> = Vec::new();

    for &(index, region) in regions {
        let block = matching(&redactions, &region.rect);
        let read_token = || block.and_then(|b| b.token.clone().or_else(|| shown_token(&operations, b)));
        match recover_text(region, channel, read_token) {
            Ok(text) => {
                match block {
                    Some(b) => dropped.push((b.start, b.end)),
                    None => blank.push(region.rect),
                }
                // Text restored by an earlier pass is replaced, not stacked.
                if let Some(previous) = matching(&restores, &region.rect) {
                    dropped.push((previous.start, previous.end));
                }
                writes.push((region.rect, text));
                results.push((index, Ok(())));
            }
            Err(reason) => {
                log::warn!("[Restore] region {} on page {}: {}", index, page, reason);
                results.push((index, Err(reason)));
            }
        }
    }

    if writes.is_empty() {
        return Ok(results);
    }

    let kept: Vec<Operation> = operations
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !dropped.iter().any(|&(start, end)| *i >= start && *i <= end))
        .map(|(_, op)| op)
        .collect();
    let (kept, removed) = remove_glyphs(kept, &fonts, bounds, &blank);
    if removed > 0 {
        log::debug!("[Restore] page {}: {} glyphs blanked without a block", page, removed);
    }

    let mut out = isolate(kept);
    for (rect, text) in &writes {
        out.extend(restore_block(bounds, rect, text));
    }
    encode_page(target.inner_mut(), page_id, out)?;
    log::info!("[Restore] page {}: {} text regions", page, writes.len());
    Ok(results)
}

/// Writes back every region of `plan` into `target`, taking images from
/// `original`. Regions that cannot be restored are reported, not fatal.
pub fn apply_restore(
    target: &mut PdfDocument,
    original: &PdfDocument,
    plan: &RestorePlan,
    channel: RecoveryChannel,
) -> Result<RestoreOutcome> {
    let mut outcome = RestoreOutcome {
        restored: Vec::new(),
        skipped: plan.skipped.clone(),
    };

    let mut by_page: BTreeMap<usize, Vec<(usize, &Region)>> = BTreeMap::new();
    for (index, region) in &plan.regions {
        by_page.entry(region.page).or_default().push((*index, region));
    }

    for (&page, regions) in &by_page {
        let (images, texts): (Vec<(usize, &Region)>, Vec<(usize, &Region)>) = regions
            .iter()
            .copied()
            .partition(|(_, r)| r.category == Category::Image);

        if !texts.is_empty() {
            for (index, result) in restore_text_page(target, page, &texts, channel)? {
                match result {
                    Ok(()) => outcome.restored.push(index),
                    Err(reason) => outcome.skipped.push(SkippedRegion { index, reason }),
                }
            }
        }

        if !images.is_empty() {
            let target_page = target.page_id(page)?;
            let original_page = original.page_id(page)?;
            for (index, region) in images {
                if restore_image(
                    target.inner_mut(),
                    target_page,
                    original.inner(),
                    original_page,
                    &region.rect,
                )? {
                    outcome.restored.push(index);
                } else {
                    log::warn!("[Restore] region {}: no matching image on page {}", index, page);
                    outcome.skipped.push(SkippedRegion {
                        index,
                        reason: SkipReason::ImageNotFound,
                    });
                }
            }
        }
    }

    outcome.restored.sort_unstable();
    outcome.skipped.sort_by_key(|s| s.index);
    log::info!(
        "[Restore] {} restored, {} skipped",
        outcome.restored.len(),
        outcome.skipped.len()
    );
    Ok(outcome)
}
