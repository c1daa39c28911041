//! PDF layer: text extraction, glyph-level redaction, image blurring,
//! restore and review pages, all on top of `lopdf`.

mod content;
pub mod document;
pub mod error;
mod fonts;
mod image;
pub mod metadata;
pub mod redact;
pub mod restore;
pub mod review;
#[cfg(feature = "pdfium")]
pub mod safe_render;
mod text;
mod utils;

pub use document::PdfDocument;
pub use error::{PdfError, Result};
pub use metadata::{scrub_metadata, ScrubReport};
pub use redact::{apply_redactions, RedactSettings, RedactSummary, DEFAULT_BLUR_SIGMA, DEFAULT_TOKEN_FONT_SIZE};
pub use restore::{apply_restore, RestoreOutcome};
pub use review::{append_review_pages, REVIEW_HEADING};
#[cfg(feature = "pdfium")]
pub use safe_render::PdfiumTextLocator;
pub use text::{REDACTION_TAG, RESTORE_TAG};
pub use utils::{page_box, PageBox};
