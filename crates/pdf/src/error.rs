use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("PDF error: {0}")]
    Lopdf(#[from] lopdf::Error),

    #[error("page {page} out of range ({pages} pages)")]
    PageOutOfRange { page: usize, pages: usize },

    #[error("content stream: {0}")]
    Content(String),

    #[error("image: {0}")]
    Image(String),

    #[error("document structure: {0}")]
    Structure(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "pdfium")]
    #[error("pdfium: {0}")]
    Pdfium(String),
}

pub type Result<T> = std::result::Result<T, PdfError>;
