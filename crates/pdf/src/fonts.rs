//! Font decoding for text extraction and glyph removal.
//!
//! Only what is needed to map string bytes to characters and advance widths:
//! simple fonts (Widths, base encoding, Differences), composite Identity
//! fonts (2-byte codes, W array) and ToUnicode CMaps.

use crate::utils::{
    get_number, get_stream_content, page_resources, resolve, resolve_dict, resource_category,
};
use blindfold_render::{char_width, decode_win_ansi};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashMap;

/// Name the writer registers standard Helvetica under.
pub const WRITER_FONT: &[u8] = b"BfHelv";

#[derive(Debug, Clone)]
pub(crate) struct Glyph {
    pub bytes: Vec<u8>,
    pub text: String,
    /// Advance in 1/1000 text space units.
    pub width: f32,
    /// Single-byte code 32, subject to word spacing.
    pub is_space: bool,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FontInfo {
    two_byte: bool,
    first_char: u32,
    widths: Vec<f32>,
    cid_widths: HashMap<u32, f32>,
    default_width: Option<f32>,
    monospace: bool,
    differences: HashMap<u32, char>,
    to_unicode: HashMap<u32, String>,
}

impl FontInfo {
    /// Stand-in for an unresolvable font: single byte WinAnsi with
    /// Helvetica metrics.
    pub fn fallback() -> Self {
        Self::default()
    }

    pub fn load(doc: &Document, font: &Dictionary) -> Self {
        let mut info = FontInfo::default();

        let subtype = font.get(b"Subtype").and_then(Object::as_name).unwrap_or(b"");
        let base_font = font.get(b"BaseFont").and_then(Object::as_name).unwrap_or(b"");
        info.monospace = base_font.windows(7).any(|w| w == b"Courier");

        if subtype == b"Type0" {
            info.two_byte = true;
            if let Some(descendant) = font
                .get(b"DescendantFonts")
                .ok()
                .and_then(|o| resolve(doc, o))
                .and_then(|o| o.as_array().ok())
                .and_then(|arr| arr.first())
                .and_then(|o| resolve_dict(doc, o))
            {
                info.default_width = Some(
                    descendant
                        .get(b"DW")
                        .ok()
                        .and_then(get_number)
                        .unwrap_or(1000.0),
                );
                if let Some(Object::Array(w)) = descendant.get(b"W").ok().and_then(|o| resolve(doc, o)) {
                    info.cid_widths = parse_cid_widths(doc, w);
                }
            }
        } else {
            info.first_char = font
                .get(b"FirstChar")
                .ok()
                .and_then(get_number)
                .unwrap_or(0.0) as u32;
            if let Some(Object::Array(w)) = font.get(b"Widths").ok().and_then(|o| resolve(doc, o)) {
                info.widths = w
                    .iter()
                    .map(|o| resolve(doc, o).and_then(get_number).unwrap_or(0.0))
                    .collect();
            }
            if let Some(Object::Dictionary(enc)) = font.get(b"Encoding").ok().and_then(|o| resolve(doc, o)) {
                if let Ok(Object::Array(diffs)) = enc.get(b"Differences") {
                    info.differences = parse_differences(diffs);
                }
            }
        }

        if let Some(Object::Stream(cmap)) = font.get(b"ToUnicode").ok().and_then(|o| resolve(doc, o)) {
            info.to_unicode = parse_to_unicode(&get_stream_content(cmap));
        }

        info
    }

    /// Splits a shown string into glyphs.
    pub fn decode(&self, bytes: &[u8]) -> Vec<Glyph> {
        let step = if self.two_byte { 2 } else { 1 };
        bytes
            .chunks(step)
            .map(|chunk| {
                let code = chunk.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32);
                let text = self.text_for(code, chunk);
                let width = self.width_for(code, &text);
                Glyph {
                    bytes: chunk.to_vec(),
                    text,
                    width,
                    is_space: !self.two_byte && code == 32,
                }
            })
            .collect()
    }

    fn text_for(&self, code: u32, bytes: &[u8]) -> String {
        if let Some(text) = self.to_unicode.get(&code) {
            return text.clone();
        }
        if self.two_byte {
            return char::from_u32(code)
                .filter(|c| !c.is_control())
                .map(String::from)
                .unwrap_or_default();
        }
        if let Some(c) = self.differences.get(&code) {
            return c.to_string();
        }
        decode_win_ansi(bytes)
    }

    fn width_for(&self, code: u32, text: &str) -> f32 {
        if self.two_byte {
            return self
                .cid_widths
                .get(&code)
                .copied()
                .or(self.default_width)
                .unwrap_or(1000.0);
        }
        if let Some(w) = code
            .checked_sub(self.first_char)
            .and_then(|i| self.widths.get(i as usize))
        {
            return *w;
        }
        if self.monospace {
            return 600.0;
        }
        if text.is_empty() {
            return char_width(' ') as f32;
        }
        text.chars().map(|c| char_width(c) as f32).sum()
    }
}

/// Fonts of a page keyed by resource name.
pub(crate) type FontMap = HashMap<Vec<u8>, FontInfo>;

/// Fonts of the page's effective resources.
pub(crate) fn page_fonts(doc: &Document, page_id: ObjectId) -> FontMap {
    let resources = page_resources(doc, page_id);
    load_fonts(doc, &resource_category(doc, &resources, b"Font"))
}

pub(crate) fn load_fonts(doc: &Document, fonts: &Dictionary) -> FontMap {
    fonts
        .iter()
        .filter_map(|(name, obj)| {
            let dict = resolve_dict(doc, obj)?;
            Some((name.clone(), FontInfo::load(doc, dict)))
        })
        .collect()
}

fn parse_cid_widths(doc: &Document, w: &[Object]) -> HashMap<u32, f32> {
    let mut widths = HashMap::new();
    let mut i = 0;
    while i < w.len() {
        let Some(first) = get_number(&w[i]) else {
            break;
        };
        match w.get(i + 1).and_then(|o| resolve(doc, o)) {
            Some(Object::Array(list)) => {
                for (k, v) in list.iter().enumerate() {
                    if let Some(width) = get_number(v) {
                        widths.insert(first as u32 + k as u32, width);
                    }
                }
                i += 2;
            }
            Some(last) => {
                let (Some(last), Some(width)) = (get_number(last), w.get(i + 2).and_then(get_number))
                else {
                    break;
                };
                for cid in first as u32..=last as u32 {
                    widths.insert(cid, width);
                }
                i += 3;
            }
            None => break,
        }
    }
    widths
}

fn parse_differences(diffs: &[Object]) -> HashMap<u32, char> {
    let mut map = HashMap::new();
    let mut code = 0u32;
    for item in diffs {
        match item {
            Object::Integer(n) => code = *n as u32,
            Object::Name(name) => {
                if let Some(c) = glyph_name_to_char(name) {
                    map.insert(code, c);
                }
                code += 1;
            }
            _ => {}
        }
    }
    map
}

fn glyph_name_to_char(name: &[u8]) -> Option<char> {
    if let [c] = name {
        if c.is_ascii_alphabetic() {
            return Some(*c as char);
        }
    }
    // uniXXXX
    if name.len() == 7 && name.starts_with(b"uni") {
        let hex = std::str::from_utf8(&name[3..]).ok()?;
        return u32::from_str_radix(hex, 16).ok().and_then(char::from_u32);
    }
    let c = match name {
        b"space" => ' ',
        b"period" => '.',
        b"comma" => ',',
        b"colon" => ':',
        b"semicolon" => ';',
        b"hyphen" | b"minus" => '-',
        b"at" => '@',
        b"underscore" => '_',
        b"quoteright" => '’',
        b"quoteleft" => '‘',
        b"parenleft" => '(',
        b"parenright" => ')',
        b"zero" => '0',
        b"one" => '1',
        b"two" => '2',
        b"three" => '3',
        b"four" => '4',
        b"five" => '5',
        b"six" => '6',
        b"seven" => '7',
        b"eight" => '8',
        b"nine" => '9',
        b"endash" => '–',
        b"emdash" => '—',
        b"dotlessi" => 'ı',
        b"germandbls" => 'ß',
        _ => return None,
    };
    Some(c)
}

fn hex_value(token: &[u8]) -> Option<u32> {
    let s = std::str::from_utf8(token).ok()?;
    u32::from_str_radix(s, 16).ok()
}

fn utf16_hex(token: &[u8]) -> Option<String> {
    let units: Vec<u16> = token
        .chunks(4)
        .map(|c| std::str::from_utf8(c).ok().and_then(|s| u16::from_str_radix(s, 16).ok()))
        .collect::<Option<Vec<_>>>()?;
    String::from_utf16(&units).ok()
}

#[derive(Debug, PartialEq)]
enum CmapToken {
    Hex(Vec<u8>),
    Open,
    Close,
    Word(Vec<u8>),
}

fn cmap_tokens(data: &[u8]) -> Vec<CmapToken> {
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < data.len() {
        match data[i] {
            b'<' => {
                let end = data[i + 1..]
                    .iter()
                    .position(|&b| b == b'>')
                    .map(|p| i + 1 + p)
                    .unwrap_or(data.len());
                let hex: Vec<u8> = data[i + 1..end]
                    .iter()
                    .copied()
                    .filter(|b| b.is_ascii_hexdigit())
                    .collect();
                tokens.push(CmapToken::Hex(hex));
                i = end + 1;
            }
            b'[' => {
                tokens.push(CmapToken::Open);
                i += 1;
            }
            b']' => {
                tokens.push(CmapToken::Close);
                i += 1;
            }
            b if b.is_ascii_whitespace() => i += 1,
            _ => {
                let start = i;
                while i < data.len()
                    && !data[i].is_ascii_whitespace()
                    && !matches!(data[i], b'<' | b'[' | b']')
                {
                    i += 1;
                }
                tokens.push(CmapToken::Word(data[start..i].to_vec()));
            }
        }
    }
    tokens
}

#[derive(Clone, Copy, PartialEq)]
enum Section {
    Other,
    Char,
    Range,
}

/// `bfchar` and `bfrange` mappings of a ToUnicode CMap.
pub(crate) fn parse_to_unicode(data: &[u8]) -> HashMap<u32, String> {
    let tokens = cmap_tokens(data);
    let mut map = HashMap::new();
    let mut i = 0;
    let mut section = Section::Other;

    while i < tokens.len() {
        match &tokens[i] {
            CmapToken::Word(w) if w.as_slice() == b"beginbfchar" => {
                section = Section::Char;
                i += 1;
            }
            CmapToken::Word(w) if w.as_slice() == b"beginbfrange" => {
                section = Section::Range;
                i += 1;
            }
            CmapToken::Word(w) if w.starts_with(b"end") => {
                section = Section::Other;
                i += 1;
            }
            CmapToken::Hex(src) if section == Section::Char => {
                if let (Some(code), Some(CmapToken::Hex(dst))) = (hex_value(src), tokens.get(i + 1)) {
                    if let Some(text) = utf16_hex(dst) {
                        map.insert(code, text);
                    }
                }
                i += 2;
            }
            CmapToken::Hex(lo) if section == Section::Range => {
                let (Some(lo), Some(CmapToken::Hex(hi))) = (hex_value(lo), tokens.get(i + 1)) else {
                    i += 1;
                    continue;
                };
                let Some(hi) = hex_value(hi) else {
                    i += 2;
                    continue;
                };
                match tokens.get(i + 2) {
                    Some(CmapToken::Hex(dst)) => {
                        if let Some(base) = utf16_hex(dst) {
                            let mut chars: Vec<char> = base.chars().collect();
                            for code in lo..=hi.min(lo + 0xFFFF) {
                                map.insert(code, chars.iter().collect());
                                if let Some(last) = chars.last_mut() {
                                    *last = char::from_u32(*last as u32 + 1).unwrap_or(*last);
                                }
                            }
                        }
                        i += 3;
                    }
                    Some(CmapToken::Open) => {
                        let mut j = i + 3;
                        let mut code = lo;
                        while let Some(CmapToken::Hex(dst)) = tokens.get(j) {
                            if let Some(text) = utf16_hex(dst) {
                                map.insert(code, text);
                            }
                            code += 1;
                            j += 1;
                        }
                        i = j + 1;
                    }
                    _ => i += 2,
                }
            }
            _ => i += 1,
        }
    }
    map
}

/// Standard Helvetica with WinAnsi encoding, as registered by the writer.
pub(crate) fn writer_font_dict() -> Dictionary {
    let mut font = Dictionary::new();
    font.set("Type", Object::Name(b"Font".to_vec()));
    font.set("Subtype", Object::Name(b"Type1".to_vec()));
    font.set("BaseFont", Object::Name(b"Helvetica".to_vec()));
    font.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));
    font
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helvetica_fallback_widths() {
        let glyphs = FontInfo::fallback().decode(b"Ai ");
        assert_eq!(glyphs.len(), 3);
        assert_eq!(glyphs[0].text, "A");
        assert_eq!(glyphs[0].width, 667.0);
        assert_eq!(glyphs[1].width, 222.0);
        assert!(glyphs[2].is_space);
    }

    #[test]
    fn test_to_unicode() {
        let cmap = b"/CIDInit /ProcSet findresource begin\n\
            2 beginbfchar\n<0003> <0020>\n<0011> <00660069>\nendbfchar\n\
            1 beginbfrange\n<0024> <0026> <0041>\nendbfrange\n\
            1 beginbfrange\n<0030> <0031> [<00E7> <015F>]\nendbfrange\nend";
        let map = parse_to_unicode(cmap);
        assert_eq!(map.get(&0x03).map(String::as_str), Some(" "));
        assert_eq!(map.get(&0x11).map(String::as_str), Some("fi"));
        assert_eq!(map.get(&0x25).map(String::as_str), Some("B"));
        assert_eq!(map.get(&0x26).map(String::as_str), Some("C"));
        assert_eq!(map.get(&0x31).map(String::as_str), Some("ş"));
    }

    #[test]
    fn test_type0_two_byte_codes() {
        let mut font = FontInfo {
            two_byte: true,
            default_width: Some(500.0),
            ..FontInfo::default()
        };
        font.cid_widths.insert(0x24, 700.0);
        font.to_unicode.insert(0x24, "A".into());
        let glyphs = font.decode(&[0x00, 0x24, 0x00, 0x25]);
        assert_eq!(glyphs.len(), 2);
        assert_eq!(glyphs[0].text, "A");
        assert_eq!(glyphs[0].width, 700.0);
        assert_eq!(glyphs[1].width, 500.0);
        assert!(!glyphs[0].is_space);
    }

    #[test]
    fn test_differences() {
        let diffs = vec![
            Object::Integer(65),
            Object::Name(b"B".to_vec()),
            Object::Name(b"uni015F".to_vec()),
        ];
        let map = parse_differences(&diffs);
        assert_eq!(map.get(&65), Some(&'B'));
        assert_eq!(map.get(&66), Some(&'ş'));
    }
}
