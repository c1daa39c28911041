//! Reversible anonymization of academic-paper PDFs.
//!
//! [`Anonymizer::anonymize_bytes`] redacts author names, contact addresses,
//! institutions and (after the references) images, returning the redacted
//! PDF and a [`RegionLedger`]. [`Anonymizer::restore_bytes`] reverses any
//! subset of categories using the ledger and the original document.

mod anonymizer;
pub mod config;
pub mod error;

pub use anonymizer::{Anonymized, Anonymizer, RestoreReport, Restored};
pub use config::{load_config, save_config, ConfigError, EngineConfig};
pub use error::{Error, ErrorKind, Phase, Result};

pub use blindfold_core::{
    decipher, encipher, Category, CategorySet, EntityLabel, EntityRecognizer, EntitySpan, Options,
    Rect, RecognizerError, RecoveryChannel, Region, RegionLedger, SkipReason, SkippedRegion,
};
pub use blindfold_ledger::LedgerKey;
pub use blindfold_nlp::RecognizerConfig;
pub use blindfold_pdf::PdfDocument;
pub use blindfold_verify::{Leak, VerifyReport};
