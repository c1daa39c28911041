//! Content stream interpretation.
//!
//! [`Interpreter`] replays graphics and text state operators and reports,
//! for every text-showing operator, where each glyph lands on the page.
//! Extraction and glyph removal both run on top of it so that they agree on
//! glyph positions.

use crate::error::{PdfError, Result};
use crate::fonts::{FontInfo, FontMap, Glyph};
use crate::utils::{
    get_number, get_page_content, matrix_operands, multiply, set_page_content, transform, Matrix,
    PageBox, IDENTITY,
};
use blindfold_core::{PageText, Rect, TextLine};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, StringFormat};

/// Glyph extent above and below the baseline, in font size units.
const ASCENT: f32 = 0.8;
const DESCENT: f32 = 0.2;

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    font: Option<Vec<u8>>,
    font_size: f32,
    char_spacing: f32,
    word_spacing: f32,
    h_scale: f32,
    leading: f32,
    rise: f32,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: IDENTITY,
            font: None,
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            h_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

/// A glyph as painted.
#[derive(Debug, Clone)]
pub(crate) struct PlacedGlyph {
    pub glyph: Glyph,
    /// Page-space box from descent to ascent.
    pub rect: Rect,
    /// Page-space baseline `y`.
    pub baseline: f32,
    /// TJ adjustment that moves the pen exactly as far as this glyph does.
    pub compensation: f32,
}

impl PlacedGlyph {
    pub fn center(&self) -> (f32, f32) {
        (
            (self.rect.x0 + self.rect.x1) / 2.0,
            (self.rect.y0 + self.rect.y1) / 2.0,
        )
    }
}

/// One element of a shown string or TJ array.
#[derive(Debug, Clone)]
pub(crate) enum Shown {
    Text {
        format: StringFormat,
        glyphs: Vec<PlacedGlyph>,
    },
    Adjust(Object),
}

/// Image or form placement by `Do`.
#[derive(Debug, Clone)]
pub(crate) struct Placement {
    pub name: Vec<u8>,
    pub rect: Rect,
}

pub(crate) struct Interpreter<'f> {
    fonts: &'f FontMap,
    page: PageBox,
    fallback: FontInfo,
    gs: GraphicsState,
    stack: Vec<GraphicsState>,
    tm: Matrix,
    tlm: Matrix,
}

impl<'f> Interpreter<'f> {
    pub fn new(fonts: &'f FontMap, page: PageBox) -> Self {
        Self {
            fonts,
            page,
            fallback: FontInfo::fallback(),
            gs: GraphicsState::default(),
            stack: Vec::new(),
            tm: IDENTITY,
            tlm: IDENTITY,
        }
    }

    /// Page-space box of the unit square under the current CTM.
    pub fn unit_square(&self) -> Rect {
        let m = &self.gs.ctm;
        let corners = [
            transform(m, 0.0, 0.0),
            transform(m, 1.0, 0.0),
            transform(m, 0.0, 1.0),
            transform(m, 1.0, 1.0),
        ];
        self.page.bounds(&corners)
    }

    /// Applies `op`; text-showing operators return what they paint.
    pub fn step(&mut self, op: &Operation) -> Option<Vec<Shown>> {
        let operands = &op.operands;
        let num = |i: usize| operands.get(i).and_then(get_number);

        match op.operator.as_str() {
            "q" => self.stack.push(self.gs.clone()),
            "Q" => {
                if let Some(saved) = self.stack.pop() {
                    self.gs = saved;
                }
            }
            "cm" => {
                if let Some(m) = matrix_operands(operands) {
                    self.gs.ctm = multiply(&m, &self.gs.ctm);
                }
            }
            "BT" => {
                self.tm = IDENTITY;
                self.tlm = IDENTITY;
            }
            "Tf" => {
                if let Some(Object::Name(name)) = operands.first() {
                    self.gs.font = Some(name.clone());
                }
                if let Some(size) = num(1) {
                    self.gs.font_size = size;
                }
            }
            "Tc" => self.gs.char_spacing = num(0).unwrap_or(0.0),
            "Tw" => self.gs.word_spacing = num(0).unwrap_or(0.0),
            "Tz" => self.gs.h_scale = num(0).unwrap_or(100.0) / 100.0,
            "TL" => self.gs.leading = num(0).unwrap_or(0.0),
            "Ts" => self.gs.rise = num(0).unwrap_or(0.0),
            "Tm" => {
                if let Some(m) = matrix_operands(operands) {
                    self.tm = m;
                    self.tlm = m;
                }
            }
            "Td" => {
                if let (Some(tx), Some(ty)) = (num(0), num(1)) {
                    self.next_line(tx, ty);
                }
            }
            "TD" => {
                if let (Some(tx), Some(ty)) = (num(0), num(1)) {
                    self.gs.leading = -ty;
                    self.next_line(tx, ty);
                }
            }
            "T*" => self.next_line(0.0, -self.gs.leading),
            "Tj" => {
                if let Some(Object::String(bytes, format)) = operands.first() {
                    return Some(vec![self.show(bytes, *format)]);
                }
            }
            "'" => {
                self.next_line(0.0, -self.gs.leading);
                if let Some(Object::String(bytes, format)) = operands.first() {
                    return Some(vec![self.show(bytes, *format)]);
                }
            }
            "\"" => {
                if let (Some(aw), Some(ac)) = (num(0), num(1)) {
                    self.gs.word_spacing = aw;
                    self.gs.char_spacing = ac;
                }
                self.next_line(0.0, -self.gs.leading);
                if let Some(Object::String(bytes, format)) = operands.get(2) {
                    return Some(vec![self.show(bytes, *format)]);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    let mut shown = Vec::with_capacity(items.len());
                    for item in items {
                        match item {
                            Object::String(bytes, format) => shown.push(self.show(bytes, *format)),
                            other => {
                                if let Some(n) = get_number(other) {
                                    let tx = -n / 1000.0 * self.gs.font_size * self.gs.h_scale;
                                    self.advance(tx);
                                }
                                shown.push(Shown::Adjust(other.clone()));
                            }
                        }
                    }
                    return Some(shown);
                }
            }
            _ => {}
        }
        None
    }

    fn next_line(&mut self, tx: f32, ty: f32) {
        self.tlm = multiply(&[1.0, 0.0, 0.0, 1.0, tx, ty], &self.tlm);
        self.tm = self.tlm;
    }

    fn advance(&mut self, tx: f32) {
        self.tm = multiply(&[1.0, 0.0, 0.0, 1.0, tx, 0.0], &self.tm);
    }

    fn show(&mut self, bytes: &[u8], format: StringFormat) -> Shown {
        let font = self
            .gs
            .font
            .as_ref()
            .and_then(|name| self.fonts.get(name))
            .unwrap_or(&self.fallback);
        let decoded = font.decode(bytes);

        let size = self.gs.font_size;
        let th = self.gs.h_scale;
        let mut glyphs = Vec::with_capacity(decoded.len());

        for glyph in decoded {
            let w0 = glyph.width / 1000.0 * size;
            let spacing = self.gs.char_spacing + if glyph.is_space { self.gs.word_spacing } else { 0.0 };
            let tx = (w0 + spacing) * th;

            let trm = multiply(&self.tm, &self.gs.ctm);
            let lo = self.gs.rise - DESCENT * size;
            let hi = self.gs.rise + ASCENT * size;
            let right = w0 * th;
            let corners = [
                transform(&trm, 0.0, lo),
                transform(&trm, right, lo),
                transform(&trm, 0.0, hi),
                transform(&trm, right, hi),
            ];
            let rect = self.page.bounds(&corners);
            let (_, baseline) = {
                let (x, y) = transform(&trm, 0.0, self.gs.rise);
                self.page.to_page(x, y)
            };

            let scale = size * th;
            let compensation = if scale.abs() > f32::EPSILON {
                -tx * 1000.0 / scale
            } else {
                0.0
            };

            glyphs.push(PlacedGlyph {
                glyph,
                rect,
                baseline,
                compensation,
            });
            self.advance(tx);
        }

        Shown::Text { format, glyphs }
    }
}

/// All glyphs painted by `operations`, in content order.
pub(crate) fn placed_glyphs(operations: &[Operation], fonts: &FontMap, page: PageBox) -> Vec<PlacedGlyph> {
    let mut interpreter = Interpreter::new(fonts, page);
    let mut glyphs = Vec::new();
    for op in operations {
        if let Some(shown) = interpreter.step(op) {
            for element in shown {
                if let Shown::Text { glyphs: g, .. } = element {
                    glyphs.extend(g);
                }
            }
        }
    }
    glyphs
}

/// XObjects placed by `Do`, with their page-space boxes.
pub(crate) fn placements(operations: &[Operation], fonts: &FontMap, page: PageBox) -> Vec<Placement> {
    let mut interpreter = Interpreter::new(fonts, page);
    let mut found = Vec::new();
    for op in operations {
        if op.operator == "Do" {
            if let Some(Object::Name(name)) = op.operands.first() {
                found.push(Placement {
                    name: name.clone(),
                    rect: interpreter.unit_square(),
                });
            }
            continue;
        }
        interpreter.step(op);
    }
    found
}

/// Groups glyphs into visual lines.
///
/// A glyph continues the current line when its baseline is within a third
/// of the line height and it does not jump back left. A gap wider than a
/// fifth of the height between two non-space glyphs becomes a space.
pub(crate) fn build_lines(glyphs: &[PlacedGlyph]) -> Vec<TextLine> {
    struct Open {
        text: String,
        spans: Vec<[f32; 2]>,
        rect: Rect,
        baseline: f32,
        last_x1: f32,
    }

    fn finish(open: Open) -> Option<TextLine> {
        if open.text.trim().is_empty() {
            return None;
        }
        Some(TextLine::new(open.text, open.rect, open.spans))
    }

    let mut lines = Vec::new();
    let mut open: Option<Open> = None;

    for placed in glyphs {
        let chars: Vec<char> = placed.glyph.text.chars().collect();
        if chars.is_empty() || !placed.rect.is_well_formed() {
            continue;
        }
        let height = placed.rect.height();

        let continues = open.as_ref().is_some_and(|line| {
            (placed.baseline - line.baseline).abs() <= height / 3.0
                && placed.rect.x0 >= line.last_x1 - height
        });
        if !continues {
            if let Some(done) = open.take().and_then(finish) {
                lines.push(done);
            }
        }

        let line = open.get_or_insert_with(|| Open {
            text: String::new(),
            spans: Vec::new(),
            rect: placed.rect,
            baseline: placed.baseline,
            last_x1: placed.rect.x0,
        });

        let gap = placed.rect.x0 - line.last_x1;
        let prev_space = line.text.ends_with(char::is_whitespace);
        if !line.text.is_empty() && gap > height / 5.0 && !prev_space && !chars[0].is_whitespace() {
            line.text.push(' ');
            line.spans.push([line.last_x1, placed.rect.x0]);
        }

        // Ligatures share their glyph's advance evenly.
        let step = placed.rect.width() / chars.len() as f32;
        for (k, c) in chars.iter().enumerate() {
            let x0 = placed.rect.x0 + step * k as f32;
            line.text.push(*c);
            line.spans.push([x0, x0 + step]);
        }
        line.rect = line.rect.union(&placed.rect);
        line.last_x1 = placed.rect.x1;
    }

    if let Some(done) = open.and_then(finish) {
        lines.push(done);
    }
    lines
}

pub(crate) fn page_text(
    index: usize,
    operations: &[Operation],
    fonts: &FontMap,
    page: PageBox,
) -> PageText {
    let glyphs = placed_glyphs(operations, fonts, page);
    PageText::new(index, page.width(), page.height()).with_lines(build_lines(&glyphs))
}

/// Parsed content of a page.
pub(crate) fn decode_page(doc: &Document, page_id: ObjectId) -> Result<Vec<Operation>> {
    let data = get_page_content(doc, page_id)?;
    Content::decode(&data)
        .map(|content| content.operations)
        .map_err(|e| PdfError::Content(format!("page {:?}: {}", page_id, e)))
}

/// Replaces the page content with `operations`.
pub(crate) fn encode_page(doc: &mut Document, page_id: ObjectId, operations: Vec<Operation>) -> Result<()> {
    let data = Content { operations }
        .encode()
        .map_err(|e| PdfError::Content(format!("page {:?}: {}", page_id, e)))?;
    set_page_content(doc, page_id, data)
}
