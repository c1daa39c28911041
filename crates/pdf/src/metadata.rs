//! Document-level identity metadata.
//!
//! The Info dictionary and the XMP stream often name the authors even when
//! the pages do not.

use crate::document::PdfDocument;
use crate::error::Result;
use lopdf::{Dictionary, Object};

/// Info entries that can identify the authors.
const IDENTITY_FIELDS: [&[u8]; 4] = [b"Author", b"Creator", b"Producer", b"Company"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrubReport {
    pub items_removed: usize,
    pub details: Vec<String>,
}

impl ScrubReport {
    fn add(&mut self, detail: String) {
        self.items_removed += 1;
        self.details.push(detail);
    }
}

fn scrub_info(info: &mut Dictionary, report: &mut ScrubReport) {
    for field in IDENTITY_FIELDS {
        if info.remove(field).is_some() {
            report.add(format!("Info/{}", String::from_utf8_lossy(field)));
        }
    }
}

/// Removes author-identifying Info entries and the catalog's XMP metadata.
pub fn scrub_metadata(doc: &mut PdfDocument) -> Result<ScrubReport> {
    let pdf = doc.inner_mut();
    let mut report = ScrubReport::default();

    let info_ref = match pdf.trailer.get(b"Info") {
        Ok(Object::Reference(id)) => Some(*id),
        _ => None,
    };
    match info_ref {
        Some(id) => {
            if let Ok(Object::Dictionary(info)) = pdf.get_object_mut(id) {
                scrub_info(info, &mut report);
            }
        }
        None => {
            if let Ok(Object::Dictionary(info)) = pdf.trailer.get_mut(b"Info") {
                scrub_info(info, &mut report);
            }
        }
    }

    let catalog_id = pdf.trailer.get(b"Root")?.as_reference()?;
    let metadata_ref = match pdf.get_dictionary(catalog_id)?.get(b"Metadata") {
        Ok(Object::Reference(id)) => Some(*id),
        _ => None,
    };
    if let Some(metadata_id) = metadata_ref {
        pdf.objects.remove(&metadata_id);
        pdf.get_dictionary_mut(catalog_id)?.remove(b"Metadata");
        report.add(format!("XMP metadata {:?}", metadata_id));
    }

    log::info!("[Metadata] removed {} items", report.items_removed);
    Ok(report)
}
