//! Text search through pdfium.
//!
//! pdfium's own text layer is used to resolve spans to boxes when the
//! document's fonts are too unusual for the built-in extractor. The library
//! is bound at runtime; when it is missing the caller gets an error and can
//! fall back to [`blindfold_core::LineSearch`].

use crate::document::PdfDocument;
use crate::error::{PdfError, Result};
use crate::utils::{page_box, PageBox};
use blindfold_core::{PageText, Rect, TextLocator};
use pdfium_render::prelude::*;
use std::path::PathBuf;

/// Directories probed for the pdfium shared library.
fn get_pdfium_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(dir) = std::env::var("BLINDFOLD_PDFIUM_DIR") {
        paths.push(PathBuf::from(dir));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            paths.push(exe_dir.join("libs"));
            paths.push(exe_dir.to_path_buf());
        }
    }

    paths.push(PathBuf::from("libs"));
    paths.push(PathBuf::from("./"));
    paths
}

fn bind_pdfium() -> Result<Pdfium> {
    for path in get_pdfium_search_paths() {
        let lib_path = Pdfium::pdfium_platform_library_name_at_path(&path);
        log::debug!("[Pdfium] trying {:?}", lib_path);

        if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
            log::info!("[Pdfium] loaded from {:?}", path);
            return Ok(Pdfium::new(bindings));
        }
    }

    log::debug!("[Pdfium] trying system library");
    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| PdfError::Pdfium(format!("library unavailable: {}", e)))
}

/// Page-space box of a pdfium search segment given in user space.
fn segment_rect(page: &PageBox, left: f32, bottom: f32, right: f32, top: f32) -> Rect {
    page.bounds(&[(left, bottom), (right, top)])
}

/// [`TextLocator`] backed by pdfium's text search.
pub struct PdfiumTextLocator {
    pdfium: Pdfium,
    bytes: Vec<u8>,
    boxes: Vec<PageBox>,
}

impl PdfiumTextLocator {
    pub fn new(bytes: Vec<u8>) -> Result<Self> {
        let doc = PdfDocument::from_bytes(&bytes)?;
        let boxes = (0..doc.page_count())
            .map(|index| doc.page_id(index).map(|id| page_box(doc.inner(), id)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            pdfium: bind_pdfium()?,
            bytes,
            boxes,
        })
    }

    fn search(&self, page_index: usize, needle: &str) -> Result<Vec<Rect>> {
        let bounds_box = self
            .boxes
            .get(page_index)
            .copied()
            .ok_or(PdfError::PageOutOfRange {
                page: page_index,
                pages: self.boxes.len(),
            })?;
        let document = self
            .pdfium
            .load_pdf_from_byte_slice(&self.bytes, None)
            .map_err(|e| PdfError::Pdfium(format!("load: {}", e)))?;
        let page = document
            .pages()
            .get(page_index as u16)
            .map_err(|e| PdfError::Pdfium(format!("page {}: {}", page_index, e)))?;

        let text = page
            .text()
            .map_err(|e| PdfError::Pdfium(format!("text layer: {}", e)))?;
        let search = text
            .search(needle, &PdfSearchOptions::new())
            .map_err(|e| PdfError::Pdfium(format!("search: {}", e)))?;

        let mut rects = Vec::new();
        for segments in search.iter(PdfSearchDirection::SearchForward) {
            for segment in segments.iter() {
                let bounds = segment.bounds();
                rects.push(segment_rect(
                    &bounds_box,
                    bounds.left().value,
                    bounds.bottom().value,
                    bounds.right().value,
                    bounds.top().value,
                ));
            }
        }
        Ok(rects)
    }
}

impl TextLocator for PdfiumTextLocator {
    fn locate(&self, page: &PageText, needle: &str) -> Vec<Rect> {
        match self.search(page.index, needle) {
            Ok(rects) => rects,
            Err(e) => {
                log::warn!("[Pdfium] {}; using extracted lines", e);
                page.search(needle)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_rect_honours_box_origin() {
        let shifted = PageBox {
            llx: 20.0,
            lly: 30.0,
            urx: 615.0,
            ury: 872.0,
        };
        let rect = segment_rect(&shifted, 92.0, 700.0, 152.0, 712.0);
        assert_eq!(rect, Rect::new(72.0, 160.0, 132.0, 172.0));
        // Same box the extractor reports for the same glyph quad.
        assert_eq!(rect, shifted.bounds(&[(92.0, 712.0), (152.0, 700.0)]));
    }
}
