use crate::config::ConfigError;
use blindfold_core::CoreError;
use blindfold_ledger::LedgerError;
use blindfold_nlp::NlpError;
use blindfold_pdf::PdfError;
use blindfold_verify::Leak;
use std::fmt;

/// Step of an operation an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Load,
    Locate,
    Detect,
    Redact,
    Verify,
    Seal,
    Open,
    Restore,
    Review,
    Save,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Load => "load",
            Phase::Locate => "locate",
            Phase::Detect => "detect",
            Phase::Redact => "redact",
            Phase::Verify => "verify",
            Phase::Seal => "seal",
            Phase::Open => "open",
            Phase::Restore => "restore",
            Phase::Review => "review",
            Phase::Save => "save",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    #[error(transparent)]
    Pdf(#[from] PdfError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Recognizer(#[from] NlpError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{} region(s) still readable after redaction", .0.len())]
    RedactionLeak(Vec<Leak>),

    #[error("target has {target} pages but the original has {original}")]
    PageCountMismatch { target: usize, original: usize },
}

/// Failure of a facade operation on one document.
#[derive(Debug)]
pub struct Error {
    /// File name or caller-supplied label.
    pub document: String,
    pub phase: Phase,
    /// Ledger index, when one region caused the failure.
    pub region: Option<usize>,
    pub kind: ErrorKind,
}

impl Error {
    pub fn new(document: impl Into<String>, phase: Phase, kind: impl Into<ErrorKind>) -> Self {
        Self {
            document: document.into(),
            phase,
            region: None,
            kind: kind.into(),
        }
    }

    pub fn with_region(mut self, region: usize) -> Self {
        self.region = Some(region);
        self
    }

    /// Leaks found by output verification, if that is what failed.
    pub fn leaks(&self) -> Option<&[Leak]> {
        match &self.kind {
            ErrorKind::RedactionLeak(leaks) => Some(leaks),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} failed", self.document, self.phase)?;
        if let Some(region) = self.region {
            write!(f, " at region {}", region)?;
        }
        write!(f, ": {}", self.kind)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Attaches document and phase to a lower-level result.
pub(crate) trait Context<T> {
    fn during(self, document: &str, phase: Phase) -> Result<T>;
}

impl<T, E: Into<ErrorKind>> Context<T> for std::result::Result<T, E> {
    fn during(self, document: &str, phase: Phase) -> Result<T> {
        self.map_err(|e| Error::new(document, phase, e))
    }
}
