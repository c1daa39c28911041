use crate::error::{PdfError, Result};
use blindfold_core::Rect;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

/// Affine matrix `[a b c d e f]` as used by `cm` and `Tm`.
pub(crate) type Matrix = [f32; 6];

pub(crate) const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// `m1` applied first, then `m2`.
pub(crate) fn multiply(m1: &Matrix, m2: &Matrix) -> Matrix {
    [
        m1[0] * m2[0] + m1[1] * m2[2],
        m1[0] * m2[1] + m1[1] * m2[3],
        m1[2] * m2[0] + m1[3] * m2[2],
        m1[2] * m2[1] + m1[3] * m2[3],
        m1[4] * m2[0] + m1[5] * m2[2] + m2[4],
        m1[4] * m2[1] + m1[5] * m2[3] + m2[5],
    ]
}

pub(crate) fn transform(m: &Matrix, x: f32, y: f32) -> (f32, f32) {
    (m[0] * x + m[2] * y + m[4], m[1] * x + m[3] * y + m[5])
}

/// Numeric operand value.
pub(crate) fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

pub(crate) fn numbers(operands: &[Object]) -> Option<Vec<f32>> {
    operands.iter().map(get_number).collect()
}

pub(crate) fn matrix_operands(operands: &[Object]) -> Option<Matrix> {
    let values = numbers(operands.get(..6)?)?;
    Some([values[0], values[1], values[2], values[3], values[4], values[5]])
}

/// Visible box of a page in default user space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub llx: f32,
    pub lly: f32,
    pub urx: f32,
    pub ury: f32,
}

impl PageBox {
    pub fn width(&self) -> f32 {
        self.urx - self.llx
    }

    pub fn height(&self) -> f32 {
        self.ury - self.lly
    }

    /// User-space point to top-left page space.
    pub fn to_page(&self, x: f32, y: f32) -> (f32, f32) {
        (x - self.llx, self.ury - y)
    }

    /// Page-space rect to user-space `(x, y, width, height)` with `y` at the
    /// bottom edge, as `re` expects.
    pub fn to_user(&self, rect: &Rect) -> (f32, f32, f32, f32) {
        (
            self.llx + rect.x0,
            self.ury - rect.y1,
            rect.width(),
            rect.height(),
        )
    }

    /// Bounding box in page space of a user-space quad.
    pub fn bounds(&self, corners: &[(f32, f32)]) -> Rect {
        let mut rect = Rect::new(f32::INFINITY, f32::INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY);
        for &(x, y) in corners {
            let (px, py) = self.to_page(x, y);
            rect.x0 = rect.x0.min(px);
            rect.y0 = rect.y0.min(py);
            rect.x1 = rect.x1.max(px);
            rect.y1 = rect.y1.max(py);
        }
        rect
    }
}

/// Normalized box from a `[llx lly urx ury]` array.
fn extract_box_values(arr: &[Object]) -> Option<PageBox> {
    let values = numbers(arr)?;
    if values.len() != 4 {
        return None;
    }
    Some(PageBox {
        llx: values[0].min(values[2]),
        lly: values[1].min(values[3]),
        urx: values[0].max(values[2]),
        ury: values[1].max(values[3]),
    })
}

/// Page attribute, looked up through the `Parent` chain when not set on the
/// page itself.
pub(crate) fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = doc.get_dictionary(page_id).ok()?;
    // Bounded walk in case of a cyclic tree.
    for _ in 0..32 {
        if let Ok(value) = current.get(key) {
            return resolve(doc, value);
        }
        let parent = current.get(b"Parent").ok()?.as_reference().ok()?;
        current = doc.get_dictionary(parent).ok()?;
    }
    None
}

pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

pub(crate) fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, obj)? {
        Object::Dictionary(dict) => Some(dict),
        Object::Stream(stream) => Some(&stream.dict),
        _ => None,
    }
}

/// CropBox, else MediaBox, else US Letter.
pub fn page_box(doc: &Document, page_id: ObjectId) -> PageBox {
    let from = |key: &[u8]| match inherited(doc, page_id, key) {
        Some(Object::Array(arr)) => extract_box_values(arr),
        _ => None,
    };
    from(b"CropBox").or_else(|| from(b"MediaBox")).unwrap_or_else(|| {
        log::warn!("[PageBox] no media box on {:?}, using Letter", page_id);
        PageBox {
            llx: 0.0,
            lly: 0.0,
            urx: 612.0,
            ury: 792.0,
        }
    })
}

/// Effective resources of a page (cloned; inherited when absent).
pub(crate) fn page_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    match inherited(doc, page_id, b"Resources") {
        Some(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    }
}

/// Sub-dictionary of the page resources (`Font`, `XObject`), resolved.
pub(crate) fn resource_category(doc: &Document, resources: &Dictionary, key: &[u8]) -> Dictionary {
    resources
        .get(key)
        .ok()
        .and_then(|obj| resolve_dict(doc, obj))
        .cloned()
        .unwrap_or_default()
}

/// Binds `name` to `target` in the page's `category` resources.
///
/// The page gets its own inline resources so that pages sharing an inherited
/// or referenced dictionary are not affected.
pub(crate) fn bind_resource(
    doc: &mut Document,
    page_id: ObjectId,
    category: &[u8],
    name: &[u8],
    target: ObjectId,
) -> Result<()> {
    let mut resources = page_resources(doc, page_id);
    let mut entries = resource_category(doc, &resources, category);
    entries.set(name.to_vec(), Object::Reference(target));
    resources.set(category.to_vec(), Object::Dictionary(entries));

    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page.set("Resources", Object::Dictionary(resources));
    Ok(())
}

/// Decoded stream bytes, raw when no filter applies.
pub(crate) fn get_stream_content(stream: &Stream) -> Vec<u8> {
    match stream.decompressed_content() {
        Ok(data) => data,
        Err(_) => stream.content.clone(),
    }
}

/// Page content, multiple streams joined.
pub(crate) fn get_page_content(doc: &Document, page_id: ObjectId) -> Result<Vec<u8>> {
    let page = doc.get_dictionary(page_id)?;

    let contents = match page.get(b"Contents") {
        Ok(contents) => contents,
        Err(_) => return Ok(Vec::new()),
    };

    match resolve(doc, contents) {
        Some(Object::Stream(stream)) => Ok(get_stream_content(stream)),
        Some(Object::Array(arr)) => {
            let mut all_content = Vec::new();
            for item in arr {
                if let Some(Object::Stream(stream)) = resolve(doc, item) {
                    all_content.extend(get_stream_content(stream));
                    all_content.push(b'\n');
                }
            }
            Ok(all_content)
        }
        _ => Err(PdfError::Structure(format!(
            "page {:?} has unreadable contents",
            page_id
        ))),
    }
}

/// Replaces the page's content with a single new stream.
pub(crate) fn set_page_content(doc: &mut Document, page_id: ObjectId, data: Vec<u8>) -> Result<()> {
    let stream = Stream::new(Dictionary::new(), data);
    let stream_id = doc.add_object(stream);
    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page.set("Contents", Object::Reference(stream_id));
    Ok(())
}
