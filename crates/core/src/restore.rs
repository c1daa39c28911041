//! Restore planning.
//!
//! Decides which ledger entries can be reversed against a given pair of
//! documents and how the original text of each one is recovered.

use crate::cipher::{decipher, CipherError};
use crate::model::{CategorySet, Region, RegionLedger};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Source of the text written back into a restored box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecoveryChannel {
    /// The ledger's `text` field.
    #[default]
    Ledger,
    /// Decode the recovery token (from the ledger, else read from the page).
    Cipher,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    PageOutOfRange { page: usize, pages: usize },
    MalformedRect,
    MissingText,
    Undecodable(CipherError),
    ImageNotFound,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::PageOutOfRange { page, pages } => {
                write!(f, "page {} out of range ({} pages)", page, pages)
            }
            SkipReason::MalformedRect => f.write_str("malformed rect"),
            SkipReason::MissingText => f.write_str("no recoverable text"),
            SkipReason::Undecodable(e) => write!(f, "undecodable token: {}", e),
            SkipReason::ImageNotFound => f.write_str("no matching image in original"),
        }
    }
}

/// A ledger entry that was not restored.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRegion {
    /// Position in the full ledger.
    pub index: usize,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default)]
pub struct RestorePlan {
    /// `(ledger index, region)` pairs that passed validation, in ledger order.
    pub regions: Vec<(usize, Region)>,
    pub skipped: Vec<SkippedRegion>,
}

/// Selects regions of `categories` whose page exists in both documents and
/// whose rect is well formed.
pub fn plan_restore(
    ledger: &RegionLedger,
    categories: CategorySet,
    target_pages: usize,
    original_pages: usize,
) -> RestorePlan {
    let pages = target_pages.min(original_pages);
    let mut plan = RestorePlan::default();

    for (index, region) in ledger.iter().enumerate() {
        if !categories.contains(region.category) {
            continue;
        }
        let reason = if region.page >= pages {
            Some(SkipReason::PageOutOfRange {
                page: region.page,
                pages,
            })
        } else if !region.rect.is_well_formed() {
            Some(SkipReason::MalformedRect)
        } else {
            None
        };

        match reason {
            Some(reason) => {
                log::warn!("[Restore] skipping region {}: {}", index, reason);
                plan.skipped.push(SkippedRegion { index, reason });
            }
            None => plan.regions.push((index, region.clone())),
        }
    }

    plan
}

/// Original text of a text region.
///
/// `read_token` returns the token printed in the target document and is only
/// called for the cipher channel when the ledger carries no token.
pub fn recover_text(
    region: &Region,
    channel: RecoveryChannel,
    read_token: impl FnOnce() -> Option<String>,
) -> Result<String, SkipReason> {
    match channel {
        RecoveryChannel::Ledger => match (&region.text, &region.cipher) {
            (Some(text), _) => Ok(text.clone()),
            (None, Some(token)) => decipher(token).map_err(SkipReason::Undecodable),
            (None, None) => Err(SkipReason::MissingText),
        },
        RecoveryChannel::Cipher => {
            let token = match &region.cipher {
                Some(token) => token.clone(),
                None => read_token().ok_or(SkipReason::MissingText)?,
            };
            decipher(token.trim()).map_err(SkipReason::Undecodable)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::encipher;
    use crate::model::{Category, Rect};

    fn ledger() -> RegionLedger {
        let mut ledger = RegionLedger::new();
        let r = Rect::new(10.0, 10.0, 50.0, 20.0);
        ledger.push(Region::text(Category::Name, 0, r, "Jane".into(), encipher("Jane")));
        ledger.push(Region::text(Category::Contact, 5, r, "j@x.io".into(), encipher("j@x.io")));
        ledger.push(Region::text(
            Category::Institution,
            0,
            Rect::new(50.0, 10.0, 10.0, 20.0),
            "Acme".into(),
            encipher("Acme"),
        ));
        ledger.push(Region::image(1, r));
        ledger
    }

    #[test]
    fn test_validation_and_category_filter() {
        let plan = plan_restore(&ledger(), CategorySet::all(), 3, 2);
        let kept: Vec<usize> = plan.regions.iter().map(|(i, _)| *i).collect();
        assert_eq!(kept, vec![0, 3]);
        assert_eq!(plan.skipped.len(), 2);
        assert_eq!(
            plan.skipped[0],
            SkippedRegion {
                index: 1,
                reason: SkipReason::PageOutOfRange { page: 5, pages: 2 }
            }
        );
        assert_eq!(plan.skipped[1].reason, SkipReason::MalformedRect);

        let names = plan_restore(&ledger(), CategorySet::empty().with(Category::Name), 3, 3);
        assert_eq!(names.regions.len(), 1);
        assert!(names.skipped.is_empty());
    }

    #[test]
    fn test_recover_text_channels() {
        let mut region = ledger().regions()[0].clone();
        assert_eq!(recover_text(&region, RecoveryChannel::Ledger, || None).unwrap(), "Jane");
        assert_eq!(recover_text(&region, RecoveryChannel::Cipher, || None).unwrap(), "Jane");

        region.cipher = None;
        let from_page = recover_text(&region, RecoveryChannel::Cipher, || Some(encipher("Jane")));
        assert_eq!(from_page.unwrap(), "Jane");
        assert_eq!(
            recover_text(&region, RecoveryChannel::Cipher, || None),
            Err(SkipReason::MissingText)
        );

        region.text = None;
        region.cipher = Some("^".into());
        assert!(matches!(
            recover_text(&region, RecoveryChannel::Ledger, || None),
            Err(SkipReason::Undecodable(_))
        ));
    }

    #[test]
    fn test_undecodable_token_is_reported_with_cause() {
        let mut region = ledger().regions()[0].clone();
        region.text = None;
        region.cipher = Some("^".into());
        let reason = recover_text(&region, RecoveryChannel::Ledger, || None).unwrap_err();
        let skipped = SkippedRegion { index: 0, reason };
        let report = vec![skipped.clone()];
        assert_eq!(
            report[0].reason,
            SkipReason::Undecodable(CipherError::OrphanCaseMarker(0))
        );
        assert_eq!(report[0], skipped);
    }
}
