use crate::content::{decode_page, placements, Placement};
use crate::error::{PdfError, Result};
use crate::fonts::FontMap;
use crate::utils::{bind_resource, page_box, page_resources, resolve, resource_category};
use blindfold_core::Rect;
use flate2::read::ZlibDecoder;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imageproc::filter::gaussian_blur_f32;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashMap;
use std::io::{Cursor, Read};

/// Grey used for images that cannot be decoded.
const PLACEHOLDER: Rgb<u8> = Rgb([160, 160, 160]);

/// Entries that no longer describe a re-encoded RGB image.
const STRIPPED_KEYS: [&[u8]; 5] = [b"Decode", b"DecodeParms", b"ImageMask", b"Mask", b"Length"];

fn dimension(dict: &Dictionary, key: &[u8]) -> Option<u32> {
    match dict.get(key) {
        Ok(Object::Integer(v)) if *v > 0 => Some(*v as u32),
        _ => None,
    }
}

fn is_image(stream: &Stream) -> bool {
    matches!(stream.dict.get(b"Subtype"), Ok(Object::Name(n)) if n == b"Image")
}

/// Filter names in decoding order.
fn filters(doc: &Document, stream: &Stream) -> Vec<Vec<u8>> {
    match stream.dict.get(b"Filter").ok().and_then(|f| resolve(doc, f)) {
        Some(Object::Name(n)) => vec![n.clone()],
        Some(Object::Array(arr)) => arr
            .iter()
            .filter_map(|f| resolve(doc, f)?.as_name().ok().map(<[u8]>::to_vec))
            .collect(),
        _ => Vec::new(),
    }
}

fn is_dct(doc: &Document, stream: &Stream) -> bool {
    filters(doc, stream) == [b"DCTDecode".to_vec()]
}

fn has_predictor(doc: &Document, stream: &Stream) -> bool {
    let params = stream.dict.get(b"DecodeParms").ok().and_then(|p| resolve(doc, p));
    match params.and_then(|p| p.as_dict().ok()) {
        Some(dict) => matches!(dict.get(b"Predictor"), Ok(Object::Integer(p)) if *p > 1),
        None => false,
    }
}

/// Unfiltered bytes of an image stream. lopdf declines to decompress image
/// XObjects, so Flate is inflated here; other filters yield `None`.
pub(crate) fn image_data(doc: &Document, image_obj: &Stream) -> Option<Vec<u8>> {
    let filters = filters(doc, image_obj);
    match filters.as_slice() {
        [] => Some(image_obj.content.clone()),
        [flate] if flate.as_slice() == b"FlateDecode" && !has_predictor(doc, image_obj) => {
            let mut data = Vec::new();
            ZlibDecoder::new(image_obj.content.as_slice())
                .read_to_end(&mut data)
                .ok()?;
            Some(data)
        }
        _ => None,
    }
}

/// Decodes an image XObject to RGB: raw or Flate 8-bit RGB or grey, else
/// anything the `image` crate recognises (JPEG, PNG).
fn decode(doc: &Document, image_obj: &Stream) -> Option<RgbImage> {
    let width = dimension(&image_obj.dict, b"Width")?;
    let height = dimension(&image_obj.dict, b"Height")?;

    if is_dct(doc, image_obj) {
        return image::load_from_memory(&image_obj.content)
            .ok()
            .map(|img| img.to_rgb8());
    }

    let image_data = image_data(doc, image_obj)?;

    let bits_per_component = match image_obj.dict.get(b"BitsPerComponent") {
        Ok(Object::Integer(b)) => *b,
        _ => 8,
    };
    let color_space = image_obj.dict.get(b"ColorSpace").ok().and_then(|c| resolve(doc, c));
    let is_rgb = matches!(color_space, Some(Object::Name(n)) if n == b"DeviceRGB");
    let is_gray = matches!(color_space, Some(Object::Name(n)) if n == b"DeviceGray");
    let pixels = (width as usize) * (height as usize);

    if is_rgb && bits_per_component == 8 && image_data.len() >= pixels * 3 {
        return RgbImage::from_raw(width, height, image_data[..pixels * 3].to_vec());
    }
    if is_gray && bits_per_component == 8 && image_data.len() >= pixels {
        let mut img = RgbImage::new(width, height);
        for (i, &gray) in image_data.iter().take(pixels).enumerate() {
            let x = (i as u32) % width;
            let y = (i as u32) / width;
            img.put_pixel(x, y, Rgb([gray, gray, gray]));
        }
        return Some(img);
    }

    image::load_from_memory(&image_data).ok().map(|img| img.to_rgb8())
}

/// New image XObject with the blurred pixels of `image_obj`.
fn blurred_stream(doc: &Document, image_obj: &Stream, sigma: f32) -> Result<Stream> {
    let use_jpeg = is_dct(doc, image_obj);
    let rgb = match decode(doc, image_obj) {
        Some(img) => gaussian_blur_f32(&img, sigma),
        None => {
            log::warn!("[Image] cannot decode image, replacing with placeholder");
            let width = dimension(&image_obj.dict, b"Width").unwrap_or(1);
            let height = dimension(&image_obj.dict, b"Height").unwrap_or(1);
            RgbImage::from_pixel(width, height, PLACEHOLDER)
        }
    };
    let (width, height) = rgb.dimensions();

    let mut new_dict = image_obj.dict.clone();
    for key in STRIPPED_KEYS {
        new_dict.remove(key);
    }
    new_dict.set("Width", Object::Integer(width as i64));
    new_dict.set("Height", Object::Integer(height as i64));
    new_dict.set("ColorSpace", Object::Name(b"DeviceRGB".to_vec()));
    new_dict.set("BitsPerComponent", Object::Integer(8));

    if use_jpeg {
        let mut output_data = Vec::new();
        DynamicImage::ImageRgb8(rgb)
            .write_to(&mut Cursor::new(&mut output_data), ImageFormat::Jpeg)
            .map_err(|e| PdfError::Image(e.to_string()))?;
        new_dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));
        Ok(Stream::new(new_dict, output_data))
    } else {
        new_dict.remove(b"Filter");
        let mut stream = Stream::new(new_dict, rgb.into_raw());
        stream.compress().ok();
        Ok(stream)
    }
}

/// Image XObjects of the page: resource name to object id.
fn page_images(doc: &Document, page_id: ObjectId) -> HashMap<Vec<u8>, ObjectId> {
    let resources = page_resources(doc, page_id);
    resource_category(doc, &resources, b"XObject")
        .iter()
        .filter_map(|(name, obj)| {
            let id = obj.as_reference().ok()?;
            match doc.get_object(id) {
                Ok(Object::Stream(stream)) if is_image(stream) => Some((name.clone(), id)),
                _ => None,
            }
        })
        .collect()
}

/// Placements of image XObjects on the page, in painting order.
pub(crate) fn image_placements(doc: &Document, page_id: ObjectId) -> Result<Vec<Placement>> {
    let images = page_images(doc, page_id);
    if images.is_empty() {
        return Ok(Vec::new());
    }
    let operations = decode_page(doc, page_id)?;
    let found = placements(&operations, &FontMap::new(), page_box(doc, page_id));
    Ok(found
        .into_iter()
        .filter(|p| images.contains_key(&p.name))
        .collect())
}

/// Replaces the images placed at `rects` with blurred copies bound under the
/// same resource names. Returns how many XObjects were replaced.
///
/// An XObject drawn several times is replaced everywhere it appears.
pub(crate) fn blur_page_images(
    doc: &mut Document,
    page_id: ObjectId,
    rects: &[Rect],
    sigma: f32,
) -> Result<usize> {
    let images = page_images(doc, page_id);
    let mut names: Vec<Vec<u8>> = Vec::new();
    for placement in image_placements(doc, page_id)? {
        if rects.iter().any(|r| r.approx_eq(&placement.rect)) && !names.contains(&placement.name) {
            names.push(placement.name);
        }
    }

    for name in &names {
        let Some(&image_id) = images.get(name) else {
            continue;
        };
        let stream = match doc.get_object(image_id) {
            Ok(Object::Stream(stream)) => stream.clone(),
            _ => continue,
        };
        let blurred = blurred_stream(doc, &stream, sigma)?;
        let blurred_id = doc.add_object(blurred);
        bind_resource(doc, page_id, b"XObject", name, blurred_id)?;
        log::info!(
            "[Image] blurred {:?} on page {:?}",
            String::from_utf8_lossy(name),
            page_id
        );
    }

    Ok(names.len())
}

fn remap(target: &mut Document, source: &Document, obj: Object, map: &mut HashMap<ObjectId, ObjectId>) -> Object {
    match obj {
        Object::Reference(id) => Object::Reference(import_object(target, source, id, map)),
        Object::Array(items) => Object::Array(
            items
                .into_iter()
                .map(|item| remap(target, source, item, map))
                .collect(),
        ),
        Object::Dictionary(dict) => Object::Dictionary(remap_dict(target, source, dict, map)),
        Object::Stream(mut stream) => {
            stream.dict = remap_dict(target, source, stream.dict, map);
            Object::Stream(stream)
        }
        other => other,
    }
}

fn remap_dict(
    target: &mut Document,
    source: &Document,
    dict: Dictionary,
    map: &mut HashMap<ObjectId, ObjectId>,
) -> Dictionary {
    let mut out = Dictionary::new();
    for (key, value) in dict.into_iter() {
        out.set(key, remap(target, source, value, map));
    }
    out
}

/// Copies `id` and everything it references from `source` into `target`.
pub(crate) fn import_object(
    target: &mut Document,
    source: &Document,
    id: ObjectId,
    map: &mut HashMap<ObjectId, ObjectId>,
) -> ObjectId {
    if let Some(&done) = map.get(&id) {
        return done;
    }
    let new_id = target.new_object_id();
    map.insert(id, new_id);
    let obj = source.get_object(id).cloned().unwrap_or(Object::Null);
    let obj = remap(target, source, obj, map);
    target.objects.insert(new_id, obj);
    new_id
}

/// Rebinds the original image placed at `rect` on the target page.
/// Returns false when the original page has no image there.
pub(crate) fn restore_image(
    target: &mut Document,
    target_page: ObjectId,
    original: &Document,
    original_page: ObjectId,
    rect: &Rect,
) -> Result<bool> {
    let found = image_placements(original, original_page)?;
    let Some(placement) = found.iter().find(|p| p.rect.approx_eq(rect)) else {
        return Ok(false);
    };
    let Some(&image_id) = page_images(original, original_page).get(&placement.name) else {
        return Ok(false);
    };

    let mut map = HashMap::new();
    let imported = import_object(target, original, image_id, &mut map);
    bind_resource(target, target_page, b"XObject", &placement.name, imported)?;
    log::info!(
        "[Image] restored {:?} ({} objects imported)",
        String::from_utf8_lossy(&placement.name),
        map.len()
    );
    Ok(true)
}
