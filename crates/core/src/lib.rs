//! Core planning for reversible paper anonymization.
//!
//! Everything here works on extracted [`PageText`] and produces or consumes a
//! [`RegionLedger`]; the PDF layer applies the plans.

pub mod cipher;
pub mod detector;
pub mod keywords;
pub mod locator;
pub mod mapper;
pub mod model;
pub mod planner;
pub mod restore;
pub mod text;

pub use cipher::{decipher, encipher, CipherError};
pub use detector::{
    Candidate, EntityDetector, EntityLabel, EntityRecognizer, EntitySpan, RecognizerError,
};
pub use keywords::extract_keywords;
pub use locator::locate_sections;
pub use mapper::RegionMapper;
pub use model::{
    Bands, Category, CategorySet, Options, Rect, Region, RegionLedger, StructuralMarks,
};
pub use planner::{Planner, RedactionPlan};
pub use restore::{
    plan_restore, recover_text, RecoveryChannel, RestorePlan, SkipReason, SkippedRegion,
};
pub use text::{LineSearch, PageText, TextLine, TextLocator};

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    Recognizer(#[from] RecognizerError),
    #[error(transparent)]
    Cipher(#[from] CipherError),
    #[error("ledger json: {0}")]
    Json(#[from] serde_json::Error),
}
