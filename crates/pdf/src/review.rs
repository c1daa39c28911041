use crate::document::PdfDocument;
use crate::error::{PdfError, Result};
use crate::fonts::{writer_font_dict, WRITER_FONT};
use crate::utils::page_box;
use blindfold_render::{encode_win_ansi, wrap_text};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Object, ObjectId, Stream, StringFormat};

pub const REVIEW_HEADING: &str = "Reviewer Comments";

const MARGIN: f32 = 72.0;
const BODY_SIZE: f32 = 11.0;
const HEADING_SIZE: f32 = 14.0;

fn real(v: f32) -> Object {
    Object::Real(v)
}

fn show(text: &str) -> Operation {
    Operation::new(
        "Tj",
        vec![Object::String(encode_win_ansi(text), StringFormat::Literal)],
    )
}

/// Content of one review page: optional heading, then `lines` from the top
/// margin down.
fn page_content(height: f32, heading: bool, lines: &[String], leading: f32) -> Vec<Operation> {
    let mut ops = vec![
        Operation::new("BT", vec![]),
        Operation::new("g", vec![real(0.0)]),
    ];
    let mut top = height - MARGIN;

    if heading {
        top -= HEADING_SIZE;
        ops.push(Operation::new(
            "Tf",
            vec![Object::Name(WRITER_FONT.to_vec()), real(HEADING_SIZE)],
        ));
        ops.push(Operation::new(
            "Tm",
            vec![real(1.0), real(0.0), real(0.0), real(1.0), real(MARGIN), real(top)],
        ));
        ops.push(show(REVIEW_HEADING));
        top -= HEADING_SIZE;
    }

    ops.push(Operation::new(
        "Tf",
        vec![Object::Name(WRITER_FONT.to_vec()), real(BODY_SIZE)],
    ));
    ops.push(Operation::new("TL", vec![real(leading)]));
    ops.push(Operation::new(
        "Tm",
        vec![real(1.0), real(0.0), real(0.0), real(1.0), real(MARGIN), real(top - BODY_SIZE)],
    ));
    for line in lines {
        ops.push(show(line));
        ops.push(Operation::new("T*", vec![]));
    }
    ops.push(Operation::new("ET", vec![]));
    ops
}

fn pages_root(doc: &lopdf::Document) -> Result<ObjectId> {
    let catalog = doc.catalog()?;
    Ok(catalog.get(b"Pages")?.as_reference()?)
}

/// Appends "Reviewer Comments" pages holding `comments`, sized like the last
/// page. Existing pages are not modified. Returns the number of pages added.
pub fn append_review_pages(doc: &mut PdfDocument, comments: &str) -> Result<usize> {
    let last = doc
        .page_count()
        .checked_sub(1)
        .ok_or_else(|| PdfError::Structure("document has no pages".into()))?;
    let last_id = doc.page_id(last)?;
    let size = page_box(doc.inner(), last_id);
    let (width, height) = (size.width(), size.height());

    let block = wrap_text(comments, BODY_SIZE, width - 2.0 * MARGIN);
    let usable = height - 2.0 * MARGIN;
    let first_capacity = ((usable - 2.0 * HEADING_SIZE - BODY_SIZE) / block.leading).floor() as usize + 1;
    let capacity = ((usable - BODY_SIZE) / block.leading).floor() as usize + 1;

    let mut chunks: Vec<&[String]> = Vec::new();
    let (first, mut rest) = block.lines.split_at(first_capacity.max(1).min(block.lines.len()));
    chunks.push(first);
    while !rest.is_empty() {
        let (chunk, tail) = rest.split_at(capacity.max(1).min(rest.len()));
        chunks.push(chunk);
        rest = tail;
    }

    let pdf = doc.inner_mut();
    let pages_id = pages_root(pdf)?;
    let font_id = pdf.add_object(writer_font_dict());
    let mut new_pages = Vec::with_capacity(chunks.len());

    for (i, lines) in chunks.iter().enumerate() {
        let operations = page_content(height, i == 0, lines, block.leading);
        let data = Content { operations }
            .encode()
            .map_err(|e| PdfError::Content(e.to_string()))?;
        let content_id = pdf.add_object(Stream::new(Dictionary::new(), data));
        let page_id = pdf.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![real(0.0), real(0.0), real(width), real(height)],
            "Resources" => dictionary! {
                "Font" => dictionary! { "BfHelv" => font_id },
            },
            "Contents" => content_id,
        });
        new_pages.push(page_id);
    }

    let pages = pdf.get_object_mut(pages_id)?.as_dict_mut()?;
    let mut kids = match pages.get(b"Kids") {
        Ok(Object::Array(kids)) => kids.clone(),
        _ => return Err(PdfError::Structure("page tree root has no Kids array".into())),
    };
    kids.extend(new_pages.iter().map(|id| Object::Reference(*id)));
    let count = match pages.get(b"Count") {
        Ok(Object::Integer(n)) => *n,
        _ => 0,
    };
    pages.set("Kids", Object::Array(kids));
    pages.set("Count", Object::Integer(count + new_pages.len() as i64));

    doc.refresh_pages();
    log::info!(
        "[Review] appended {} page(s), {} lines",
        new_pages.len(),
        block.lines.len()
    );
    Ok(new_pages.len())
}
