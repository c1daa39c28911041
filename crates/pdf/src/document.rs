use crate::content::{decode_page, page_text};
use crate::error::{PdfError, Result};
use crate::fonts::page_fonts;
use crate::image::image_placements;
use crate::utils::page_box;
use blindfold_core::{PageText, Rect};
use lopdf::{Document, ObjectId};
use std::path::Path;

/// A loaded PDF with its pages in document order.
pub struct PdfDocument {
    doc: Document,
    page_ids: Vec<ObjectId>,
}

impl PdfDocument {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let doc = Document::load(path.as_ref())?;
        Ok(Self::from_document(doc))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let doc = Document::load_mem(bytes)?;
        Ok(Self::from_document(doc))
    }

    pub fn from_document(doc: Document) -> Self {
        let page_ids = doc.page_iter().collect();
        Self { doc, page_ids }
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    pub fn page_id(&self, index: usize) -> Result<ObjectId> {
        self.page_ids
            .get(index)
            .copied()
            .ok_or(PdfError::PageOutOfRange {
                page: index,
                pages: self.page_ids.len(),
            })
    }

    pub(crate) fn inner(&self) -> &Document {
        &self.doc
    }

    pub(crate) fn inner_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    /// Re-reads the page list after pages were added.
    pub(crate) fn refresh_pages(&mut self) {
        self.page_ids = self.doc.page_iter().collect();
    }

    /// Positioned text of one page.
    pub fn page_text(&self, index: usize) -> Result<PageText> {
        let page_id = self.page_id(index)?;
        let operations = decode_page(&self.doc, page_id)?;
        let fonts = page_fonts(&self.doc, page_id);
        Ok(page_text(index, &operations, &fonts, page_box(&self.doc, page_id)))
    }

    /// Positioned text of every page.
    pub fn extract_pages(&self) -> Result<Vec<PageText>> {
        let pages = (0..self.page_count())
            .map(|index| self.page_text(index))
            .collect::<Result<Vec<_>>>()?;
        log::info!(
            "[Extract] {} pages, {} lines",
            pages.len(),
            pages.iter().map(|p| p.lines.len()).sum::<usize>()
        );
        Ok(pages)
    }

    /// Placement boxes of the images drawn on each page.
    pub fn image_rects(&self) -> Result<Vec<Vec<Rect>>> {
        self.page_ids
            .iter()
            .map(|&page_id| {
                Ok(image_placements(&self.doc, page_id)?
                    .into_iter()
                    .map(|p| p.rect)
                    .collect())
            })
            .collect()
    }

    /// Serialized document with compressed streams.
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        self.doc.compress();
        let mut buffer = Vec::new();
        self.doc.save_to(&mut buffer)?;
        Ok(buffer)
    }

    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("pages", &self.page_ids.len())
            .finish()
    }
}
