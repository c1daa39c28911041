use crate::config::EngineConfig;
use crate::error::{Context, Error, ErrorKind, Phase, Result};
use blindfold_core::{
    extract_keywords, plan_restore, CategorySet, CoreError, EntityRecognizer, LineSearch, Planner,
    RegionLedger, SkippedRegion, TextLocator,
};
use blindfold_ledger::{open, seal, LedgerError, LedgerKey};
use blindfold_pdf::{
    append_review_pages, apply_redactions, apply_restore, scrub_metadata, PdfDocument,
};
use blindfold_verify::{verify_redaction, verify_restoration, VerifyReport};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Output of an anonymization run.
#[derive(Debug)]
pub struct Anonymized {
    pub pdf: Vec<u8>,
    pub ledger: RegionLedger,
    /// Empty report when verification is disabled.
    pub verification: VerifyReport,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestoreReport {
    /// Ledger indices written back.
    pub restored: Vec<usize>,
    pub skipped: Vec<SkippedRegion>,
    /// Restored text regions that could not be read back from the output.
    pub unreadable: Vec<usize>,
}

#[derive(Debug)]
pub struct Restored {
    pub pdf: Vec<u8>,
    pub report: RestoreReport,
}

/// Entry point for anonymize, restore and review operations.
pub struct Anonymizer {
    config: EngineConfig,
    recognizer: Box<dyn EntityRecognizer>,
    ledger_key: Option<LedgerKey>,
}

fn document_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Writes `bytes` next to `path` and renames over it once complete.
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

impl Anonymizer {
    /// Builds the configured recognizer; a missing model is fatal here.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate().during("<engine>", Phase::Load)?;
        let recognizer =
            blindfold_nlp::build_recognizer(&config.recognizer).during("<engine>", Phase::Detect)?;
        Ok(Self::with_recognizer(config, recognizer))
    }

    pub fn with_recognizer(config: EngineConfig, recognizer: Box<dyn EntityRecognizer>) -> Self {
        let ledger_key = config
            .ledger_passphrase
            .as_deref()
            .and_then(|p| LedgerKey::from_passphrase(p).ok());
        Self {
            config,
            recognizer,
            ledger_key,
        }
    }

    /// Uses a raw key instead of the configured passphrase.
    pub fn with_ledger_key(mut self, key: LedgerKey) -> Self {
        self.ledger_key = Some(key);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[cfg(feature = "pdfium")]
    fn locator(&self, pdf: &[u8]) -> Box<dyn TextLocator> {
        if self.config.pdfium_search {
            match blindfold_pdf::PdfiumTextLocator::new(pdf.to_vec()) {
                Ok(locator) => return Box::new(locator),
                Err(e) => log::warn!("[Anonymize] pdfium search unavailable: {}", e),
            }
        }
        Box::new(LineSearch)
    }

    #[cfg(not(feature = "pdfium"))]
    fn locator(&self, _pdf: &[u8]) -> Box<dyn TextLocator> {
        if self.config.pdfium_search {
            log::warn!("[Anonymize] pdfium search requested but the feature is disabled");
        }
        Box::new(LineSearch)
    }

    /// Redacts `pdf` and returns the redacted document with its ledger.
    pub fn anonymize_bytes(&self, name: &str, pdf: &[u8]) -> Result<Anonymized> {
        let mut doc = PdfDocument::from_bytes(pdf).during(name, Phase::Load)?;
        log::info!("[Anonymize] {}: {} pages", name, doc.page_count());

        let pages = doc.extract_pages().during(name, Phase::Locate)?;
        let image_rects = doc.image_rects().during(name, Phase::Locate)?;

        let locator = self.locator(pdf);
        let planner = Planner::new(self.recognizer.as_ref(), locator.as_ref(), self.config.bands());
        let plan = planner
            .plan(&pages, &image_rects, &self.config.options)
            .map_err(CoreError::from)
            .during(name, Phase::Detect)?;
        log::info!(
            "[Anonymize] {}: abstract page {:?}, references page {:?}, skip pages {:?}",
            name,
            plan.marks.abstract_page,
            plan.marks.references_page,
            plan.marks.skip_pages
        );

        apply_redactions(&mut doc, &plan.ledger, &self.config.redact_settings())
            .during(name, Phase::Redact)?;
        if self.config.scrub_metadata {
            scrub_metadata(&mut doc).during(name, Phase::Redact)?;
        }
        let output = doc.to_bytes().during(name, Phase::Save)?;

        let verification = if self.config.verify_output {
            let redacted = PdfDocument::from_bytes(&output).during(name, Phase::Verify)?;
            let pages = redacted.extract_pages().during(name, Phase::Verify)?;
            let report = verify_redaction(&pages, &plan.ledger);
            if !report.ok() {
                let first = report.leaks[0].index;
                return Err(Error::new(name, Phase::Verify, ErrorKind::RedactionLeak(report.leaks))
                    .with_region(first));
            }
            report
        } else {
            VerifyReport::default()
        };

        Ok(Anonymized {
            pdf: output,
            ledger: plan.ledger,
            verification,
        })
    }

    /// Redacts `input` into `output`; the output only appears once complete.
    pub fn anonymize_file(&self, input: &Path, output: &Path) -> Result<RegionLedger> {
        let name = document_name(input);
        let bytes = std::fs::read(input).during(&name, Phase::Load)?;
        let anonymized = self.anonymize_bytes(&name, &bytes)?;
        write_atomic(output, &anonymized.pdf).during(&name, Phase::Save)?;
        log::info!("[Anonymize] wrote {}", output.display());
        Ok(anonymized.ledger)
    }

    /// Writes back the regions of `categories` from `ledger` into `target`,
    /// using `original` for images.
    pub fn restore_bytes(
        &self,
        name: &str,
        target: &[u8],
        original: &[u8],
        ledger: &RegionLedger,
        categories: CategorySet,
    ) -> Result<Restored> {
        let mut target_doc = PdfDocument::from_bytes(target).during(name, Phase::Load)?;
        let original_doc = PdfDocument::from_bytes(original).during(name, Phase::Load)?;

        let (target_pages, original_pages) = (target_doc.page_count(), original_doc.page_count());
        if target_pages < original_pages {
            return Err(Error::new(
                name,
                Phase::Restore,
                ErrorKind::PageCountMismatch {
                    target: target_pages,
                    original: original_pages,
                },
            ));
        }

        let plan = plan_restore(ledger, categories, target_pages, original_pages);
        let outcome = apply_restore(
            &mut target_doc,
            &original_doc,
            &plan,
            self.config.recovery_channel,
        )
        .during(name, Phase::Restore)?;
        let pdf = target_doc.to_bytes().during(name, Phase::Save)?;

        let restored_doc = PdfDocument::from_bytes(&pdf).during(name, Phase::Verify)?;
        let pages = restored_doc.extract_pages().during(name, Phase::Verify)?;
        let unreadable = verify_restoration(&pages, ledger, &outcome.restored);
        if !unreadable.is_empty() {
            log::warn!("[Restore] {}: regions {:?} not readable after restore", name, unreadable);
        }

        Ok(Restored {
            pdf,
            report: RestoreReport {
                restored: outcome.restored,
                skipped: outcome.skipped,
                unreadable,
            },
        })
    }

    /// File form of [`Anonymizer::restore_bytes`]. `output` may be `target`.
    pub fn restore_file(
        &self,
        target: &Path,
        original: &Path,
        ledger: &RegionLedger,
        categories: CategorySet,
        output: &Path,
    ) -> Result<RestoreReport> {
        let name = document_name(target);
        let target_bytes = std::fs::read(target).during(&name, Phase::Load)?;
        let original_bytes = std::fs::read(original).during(&name, Phase::Load)?;
        let restored = self.restore_bytes(&name, &target_bytes, &original_bytes, ledger, categories)?;
        write_atomic(output, &restored.pdf).during(&name, Phase::Save)?;
        log::info!(
            "[Restore] wrote {} ({} restored, {} skipped)",
            output.display(),
            restored.report.restored.len(),
            restored.report.skipped.len()
        );
        Ok(restored.report)
    }

    /// Appends reviewer comments as trailing pages.
    pub fn merge_review_comments(&self, name: &str, pdf: &[u8], comments: &str) -> Result<Vec<u8>> {
        let mut doc = PdfDocument::from_bytes(pdf).during(name, Phase::Load)?;
        append_review_pages(&mut doc, comments).during(name, Phase::Review)?;
        doc.to_bytes().during(name, Phase::Save)
    }

    pub fn merge_review_comments_file(&self, input: &Path, comments: &str, output: &Path) -> Result<()> {
        let name = document_name(input);
        let bytes = std::fs::read(input).during(&name, Phase::Load)?;
        let merged = self.merge_review_comments(&name, &bytes, comments)?;
        write_atomic(output, &merged).during(&name, Phase::Save)
    }

    fn key(&self, name: &str, phase: Phase) -> Result<&LedgerKey> {
        self.ledger_key
            .as_ref()
            .ok_or(LedgerError::MissingKey)
            .during(name, phase)
    }

    pub fn seal_ledger(&self, ledger: &RegionLedger) -> Result<String> {
        let key = self.key("<ledger>", Phase::Seal)?;
        seal(ledger, key).during("<ledger>", Phase::Seal)
    }

    pub fn open_ledger(&self, sealed: &str) -> Result<RegionLedger> {
        let key = self.key("<ledger>", Phase::Open)?;
        open(sealed, key).during("<ledger>", Phase::Open)
    }

    /// Author keywords, or the most frequent content phrases.
    pub fn extract_keywords(&self, name: &str, pdf: &[u8], top_n: usize) -> Result<Vec<String>> {
        let doc = PdfDocument::from_bytes(pdf).during(name, Phase::Load)?;
        let pages = doc.extract_pages().during(name, Phase::Locate)?;
        Ok(extract_keywords(&pages, top_n))
    }
}
