//! Helvetica advance widths (AFM units per 1000 em).

/// Printable ASCII 0x20..=0x7E.
const ASCII_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // 0x20
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0x30
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // 0x40
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 0x50
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // 0x60
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 0x70
];

const DEFAULT_WIDTH: u16 = 556;

/// Width of `c` in 1/1000 em.
pub fn char_width(c: char) -> u16 {
    if (' '..='~').contains(&c) {
        return ASCII_WIDTHS[c as usize - 0x20];
    }
    match c {
        '\u{a0}' => 278,
        '–' => 556,
        '—' | '‰' => 1000,
        '…' => 1000,
        '‘' | '’' | '‚' => 222,
        '“' | '”' | '„' => 333,
        '•' => 350,
        '€' => 556,
        '™' => 1000,
        '©' | '®' => 737,
        'Æ' => 1000,
        'æ' | 'œ' => 889,
        'Œ' => 1000,
        'ß' => 611,
        _ => base_letter(c).map(char_width).unwrap_or(DEFAULT_WIDTH),
    }
}

/// ASCII letter a decorated Latin letter is drawn on.
pub(crate) fn base_letter(c: char) -> Option<char> {
    let base = match c {
        'À'..='Å' => 'A',
        'Ç' | 'Ć' | 'Č' => 'C',
        'È'..='Ë' => 'E',
        'Ì'..='Ï' | 'İ' => 'I',
        'Ñ' => 'N',
        'Ò'..='Ö' | 'Ø' => 'O',
        'Ù'..='Ü' => 'U',
        'Ý' | 'Ÿ' => 'Y',
        'Ğ' => 'G',
        'Ş' | 'Š' | 'Ś' => 'S',
        'Ž' => 'Z',
        'à'..='å' => 'a',
        'ç' | 'ć' | 'č' => 'c',
        'è'..='ë' => 'e',
        'ì'..='ï' | 'ı' => 'i',
        'ñ' => 'n',
        'ò'..='ö' | 'ø' => 'o',
        'ù'..='ü' => 'u',
        'ý' | 'ÿ' => 'y',
        'ğ' => 'g',
        'ş' | 'š' | 'ś' => 's',
        'ž' => 'z',
        _ => return None,
    };
    Some(base)
}

/// Width of `text` in points at `font_size`.
pub fn text_width(text: &str, font_size: f32) -> f32 {
    let units: u32 = text.chars().map(|c| char_width(c) as u32).sum();
    units as f32 * font_size / 1000.0
}
