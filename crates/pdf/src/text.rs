use crate::content::{Interpreter, PlacedGlyph, Shown};
use crate::error::Result;
use crate::fonts::{writer_font_dict, FontMap, WRITER_FONT};
use crate::utils::{bind_resource, numbers, page_resources, resource_category, PageBox};
use blindfold_core::Rect;
use blindfold_render::{encode_win_ansi, fit_font_size};
use lopdf::content::Operation;
use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};

/// Marked-content tag of a token block painted over a redacted span.
pub const REDACTION_TAG: &[u8] = b"BfRedaction";
/// Marked-content tag of text written back by restore.
pub const RESTORE_TAG: &[u8] = b"BfRestore";

const TOKEN_KEY: &[u8] = b"Token";

fn hit(glyph: &PlacedGlyph, rects: &[Rect]) -> bool {
    let (cx, cy) = glyph.center();
    rects.iter().any(|r| r.contains_point(cx, cy))
}

/// TJ array equivalent to `shown` without the glyphs inside `rects`; every
/// removed glyph leaves its advance behind as a numeric adjustment.
fn rebuild(shown: Vec<Shown>, rects: &[Rect]) -> (Vec<Object>, usize) {
    let mut array = Vec::new();
    let mut removed = 0;
    let mut pending = 0.0f32;

    let flush = |array: &mut Vec<Object>, pending: &mut f32| {
        if *pending != 0.0 {
            array.push(Object::Real(*pending));
            *pending = 0.0;
        }
    };

    for element in shown {
        match element {
            Shown::Adjust(obj) => {
                flush(&mut array, &mut pending);
                array.push(obj);
            }
            Shown::Text { format, glyphs } => {
                let mut run: Vec<u8> = Vec::new();
                for placed in glyphs {
                    if hit(&placed, rects) {
                        if !run.is_empty() {
                            array.push(Object::String(std::mem::take(&mut run), format));
                        }
                        pending += placed.compensation;
                        removed += 1;
                    } else {
                        flush(&mut array, &mut pending);
                        run.extend_from_slice(&placed.glyph.bytes);
                    }
                }
                if !run.is_empty() {
                    array.push(Object::String(run, format));
                }
            }
        }
    }
    flush(&mut array, &mut pending);
    (array, removed)
}

/// Rewrites text-showing operators so that no glyph whose centre lies in
/// one of `rects` is painted. Layout of the remaining glyphs is unchanged.
///
/// Returns the new operations and the number of glyphs removed.
pub(crate) fn remove_glyphs(
    operations: Vec<Operation>,
    fonts: &FontMap,
    page: PageBox,
    rects: &[Rect],
) -> (Vec<Operation>, usize) {
    let mut interpreter = Interpreter::new(fonts, page);
    let mut out = Vec::with_capacity(operations.len());
    let mut total = 0;

    for op in operations {
        let Some(shown) = interpreter.step(&op) else {
            out.push(op);
            continue;
        };
        let any_hit = shown.iter().any(|s| match s {
            Shown::Text { glyphs, .. } => glyphs.iter().any(|g| hit(g, rects)),
            Shown::Adjust(_) => false,
        });
        if !any_hit {
            out.push(op);
            continue;
        }

        let (array, removed) = rebuild(shown, rects);
        total += removed;
        log::debug!("[Redact] {} glyphs removed from {}", removed, op.operator);

        match op.operator.as_str() {
            "'" => out.push(Operation::new("T*", vec![])),
            "\"" => {
                out.push(Operation::new("Tw", vec![op.operands[0].clone()]));
                out.push(Operation::new("Tc", vec![op.operands[1].clone()]));
                out.push(Operation::new("T*", vec![]));
            }
            _ => {}
        }
        out.push(Operation::new("TJ", vec![Object::Array(array)]));
    }

    (out, total)
}

fn real(v: f32) -> Object {
    Object::Real(v)
}

fn rect_ops(page: PageBox, rect: &Rect) -> Vec<Object> {
    let (x, y, w, h) = page.to_user(rect);
    vec![real(x), real(y), real(w), real(h)]
}

/// Text line drawn with the writer font, clipped to `rect`.
fn clipped_text(page: PageBox, rect: &Rect, text: &str, font_size: f32) -> Vec<Operation> {
    let (x, y, _, h) = page.to_user(rect);
    let baseline = y + (h - font_size).max(0.0) / 2.0 + 0.2 * font_size;
    vec![
        Operation::new("q", vec![]),
        Operation::new("re", rect_ops(page, rect)),
        Operation::new("W", vec![]),
        Operation::new("n", vec![]),
        Operation::new("BT", vec![]),
        Operation::new("g", vec![real(0.0)]),
        Operation::new("Tf", vec![Object::Name(WRITER_FONT.to_vec()), real(font_size)]),
        Operation::new(
            "Tm",
            vec![real(1.0), real(0.0), real(0.0), real(1.0), real(x + 0.5), real(baseline)],
        ),
        Operation::new(
            "Tj",
            vec![Object::String(encode_win_ansi(text), StringFormat::Literal)],
        ),
        Operation::new("ET", vec![]),
        Operation::new("Q", vec![]),
    ]
}

fn white_fill(page: PageBox, rect: &Rect) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new("rg", vec![real(1.0), real(1.0), real(1.0)]),
        Operation::new("re", rect_ops(page, rect)),
        Operation::new("f", vec![]),
        Operation::new("Q", vec![]),
    ]
}

/// Opaque box over `rect` carrying the recovery token, both drawn and in
/// the block's properties.
pub(crate) fn redaction_block(page: PageBox, rect: &Rect, token: &str, font_size: f32) -> Vec<Operation> {
    let mut props = Dictionary::new();
    props.set(TOKEN_KEY, Object::String(token.as_bytes().to_vec(), StringFormat::Literal));

    let mut ops = vec![Operation::new(
        "BDC",
        vec![Object::Name(REDACTION_TAG.to_vec()), Object::Dictionary(props)],
    )];
    ops.extend(white_fill(page, rect));
    ops.extend(clipped_text(page, rect, token, font_size));
    ops.push(Operation::new("EMC", vec![]));
    ops
}

/// White box over `rect` with `text` fitted inside it.
pub(crate) fn restore_block(page: PageBox, rect: &Rect, text: &str) -> Vec<Operation> {
    let size = fit_font_size(text, rect.height(), rect.width() - 1.0, rect.height());
    let mut ops = vec![Operation::new("BMC", vec![Object::Name(RESTORE_TAG.to_vec())])];
    ops.extend(white_fill(page, rect));
    ops.extend(clipped_text(page, rect, text, size));
    ops.push(Operation::new("EMC", vec![]));
    ops
}

/// A marked-content block found in a content stream.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MarkedBlock {
    /// Index of the opening `BMC`/`BDC`.
    pub start: usize,
    /// Index of the matching `EMC`.
    pub end: usize,
    /// Page-space box of the first `re` inside the block.
    pub rect: Option<Rect>,
    pub token: Option<String>,
}

/// Top-level marked blocks tagged `tag`.
pub(crate) fn find_blocks(operations: &[Operation], page: PageBox, tag: &[u8]) -> Vec<MarkedBlock> {
    let mut blocks = Vec::new();
    let mut i = 0;

    while i < operations.len() {
        let op = &operations[i];
        let tagged = matches!(op.operator.as_str(), "BMC" | "BDC")
            && matches!(op.operands.first(), Some(Object::Name(n)) if n.as_slice() == tag);
        if !tagged {
            i += 1;
            continue;
        }

        let token = match op.operands.get(1) {
            Some(Object::Dictionary(props)) => match props.get(TOKEN_KEY) {
                Ok(Object::String(bytes, _)) => String::from_utf8(bytes.clone()).ok(),
                _ => None,
            },
            _ => None,
        };

        let mut depth = 0usize;
        let mut rect = None;
        let mut end = None;
        for (j, inner) in operations.iter().enumerate().skip(i + 1) {
            match inner.operator.as_str() {
                "BMC" | "BDC" => depth += 1,
                "EMC" if depth == 0 => {
                    end = Some(j);
                    break;
                }
                "EMC" => depth -= 1,
                "re" if rect.is_none() => {
                    if let Some(v) = numbers(&inner.operands).filter(|v| v.len() == 4) {
                        rect = Some(page.bounds(&[(v[0], v[1]), (v[0] + v[2], v[1] + v[3])]));
                    }
                }
                _ => {}
            }
        }

        let Some(end) = end else {
            log::warn!("[Content] unterminated marked block at {}", i);
            break;
        };
        blocks.push(MarkedBlock {
            start: i,
            end,
            rect,
            token,
        });
        i = end + 1;
    }

    blocks
}

/// Token shown inside a redaction block when its properties carry none.
pub(crate) fn shown_token(operations: &[Operation], block: &MarkedBlock) -> Option<String> {
    operations[block.start..=block.end]
        .iter()
        .find(|op| op.operator == "Tj")
        .and_then(|op| match op.operands.first() {
            Some(Object::String(bytes, _)) => Some(blindfold_render::decode_win_ansi(bytes)),
            _ => None,
        })
}

/// Wraps page content in `q`/`Q` so appended blocks start from the default
/// graphics state.
pub(crate) fn isolate(operations: Vec<Operation>) -> Vec<Operation> {
    let mut out = Vec::with_capacity(operations.len() + 2);
    out.push(Operation::new("q", vec![]));
    out.extend(operations);
    out.push(Operation::new("Q", vec![]));
    out
}

/// Registers the writer font on the page when missing.
pub(crate) fn ensure_writer_font(doc: &mut Document, page_id: ObjectId) -> Result<()> {
    let resources = page_resources(doc, page_id);
    if resource_category(doc, &resources, b"Font").has(WRITER_FONT) {
        return Ok(());
    }
    let font_id = doc.add_object(writer_font_dict());
    bind_resource(doc, page_id, b"Font", WRITER_FONT, font_id)
}

/// Font size operand of the first `Tf` in `operations`.
#[cfg(test)]
fn first_font_size(operations: &[Operation]) -> Option<f32> {
    operations
        .iter()
        .find(|op| op.operator == "Tf")
        .and_then(|op| op.operands.get(1))
        .and_then(crate::utils::get_number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::placed_glyphs;
    use lopdf::content::Content;

    fn letter() -> PageBox {
        PageBox {
            llx: 0.0,
            lly: 0.0,
            urx: 595.0,
            ury: 842.0,
        }
    }

    fn ops(src: &str) -> Vec<Operation> {
        Content::decode(src.as_bytes()).unwrap().operations
    }

    fn text_of(operations: &[Operation]) -> String {
        placed_glyphs(operations, &FontMap::new(), letter())
            .iter()
            .map(|g| g.glyph.text.clone())
            .collect()
    }

    #[test]
    fn test_remove_glyphs_keeps_layout() {
        let original = ops("BT /F1 10 Tf 72 742 Td (John Smith, Ada) Tj ET");
        let fonts = FontMap::new();
        let before = placed_glyphs(&original, &fonts, letter());
        // "Smith" starts after "John " (J500 o556 h556 n556 space278), 25.56 wide
        let smith = Rect::new(72.0 + 24.46, 92.0, 72.0 + 24.46 + 25.56, 102.0);

        let (rewritten, removed) = remove_glyphs(original, &fonts, letter(), &[smith]);
        assert_eq!(removed, 5);
        assert_eq!(text_of(&rewritten), "John , Ada");

        let after = placed_glyphs(&rewritten, &fonts, letter());
        let ada_before = before.iter().rev().find(|g| g.glyph.text == "A").unwrap();
        let ada_after = after.iter().rev().find(|g| g.glyph.text == "A").unwrap();
        assert!((ada_before.rect.x0 - ada_after.rect.x0).abs() < 1e-3);
    }

    #[test]
    fn test_remove_from_tj_array_and_quote() {
        let original = ops("BT /F1 10 Tf 12 TL 0 742 Td [(ab) -200 (cd)] TJ (ef) ' ET");
        let everything = Rect::new(0.0, 0.0, 595.0, 842.0);
        let (rewritten, removed) = remove_glyphs(original, &FontMap::new(), letter(), &[everything]);
        assert_eq!(removed, 6);
        assert_eq!(text_of(&rewritten), "");
        assert!(rewritten.iter().any(|op| op.operator == "T*"));
    }

    #[test]
    fn test_untouched_operations_are_kept() {
        let original = ops("BT /F1 10 Tf 72 742 Td (keep) Tj ET");
        let (rewritten, removed) =
            remove_glyphs(original.clone(), &FontMap::new(), letter(), &[Rect::new(0.0, 0.0, 1.0, 1.0)]);
        assert_eq!(removed, 0);
        assert_eq!(rewritten.len(), original.len());
        assert_eq!(rewritten[3].operator, "Tj");
    }

    #[test]
    fn test_redaction_block_round_trip() {
        let rect = Rect::new(72.0, 92.0, 130.0, 102.0);
        let mut content = ops("BT /F1 10 Tf 72 742 Td (x) Tj ET");
        content.extend(redaction_block(letter(), &rect, "10^15814", 6.0));

        let encoded = Content { operations: content }.encode().unwrap();
        let decoded = Content::decode(&encoded).unwrap().operations;

        let blocks = find_blocks(&decoded, letter(), REDACTION_TAG);
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].rect.unwrap().approx_eq(&rect));
        assert_eq!(blocks[0].token.as_deref(), Some("10^15814"));
        assert_eq!(shown_token(&decoded, &blocks[0]).as_deref(), Some("10^15814"));
        assert_eq!(decoded[blocks[0].end].operator, "EMC");
        assert_eq!(first_font_size(&decoded[blocks[0].start..]), Some(6.0));
    }

    #[test]
    fn test_restore_block_fits_text() {
        let rect = Rect::new(72.0, 92.0, 100.0, 102.0);
        let block = restore_block(letter(), &rect, "A much longer original string");
        let size = first_font_size(&block).unwrap();
        assert!(size < 10.0);
        assert!(find_blocks(&block, letter(), RESTORE_TAG).len() == 1);
    }
}
