//! WinAnsiEncoding, the single-byte encoding of the standard Helvetica font.

use crate::metrics::base_letter;

/// Code points of bytes 0x80..=0x9F; `None` marks unassigned slots.
const HIGH_CONTROL: [Option<char>; 32] = [
    Some('€'), None, Some('‚'), Some('ƒ'), Some('„'), Some('…'), Some('†'), Some('‡'),
    Some('ˆ'), Some('‰'), Some('Š'), Some('‹'), Some('Œ'), None, Some('Ž'), None,
    None, Some('‘'), Some('’'), Some('“'), Some('”'), Some('•'), Some('–'), Some('—'),
    Some('˜'), Some('™'), Some('š'), Some('›'), Some('œ'), None, Some('ž'), Some('Ÿ'),
];

fn encode_char(c: char) -> Option<u8> {
    match c as u32 {
        0x20..=0x7E | 0xA0..=0xFF => Some(c as u32 as u8),
        _ => HIGH_CONTROL
            .iter()
            .position(|h| *h == Some(c))
            .map(|i| 0x80 + i as u8),
    }
}

/// True when every character of `text` has a WinAnsi code.
pub fn is_win_ansi(text: &str) -> bool {
    text.chars().all(|c| encode_char(c).is_some())
}

/// Encodes `text`; characters without a code fall back to their undecorated
/// letter, else `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let mut lossy = 0usize;
    for c in text.chars() {
        match encode_char(c) {
            Some(b) => out.push(b),
            None => {
                lossy += 1;
                let fallback = base_letter(c).and_then(encode_char).unwrap_or(b'?');
                out.push(fallback);
            }
        }
    }
    if lossy > 0 {
        log::debug!("[Render] {} characters outside WinAnsi", lossy);
    }
    out
}

pub fn decode_win_ansi(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| match b {
            0x80..=0x9F => HIGH_CONTROL[(b - 0x80) as usize].unwrap_or('\u{fffd}'),
            _ => b as char,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_and_latin1() {
        assert_eq!(encode_win_ansi("Jö"), vec![b'J', 0xF6]);
        assert_eq!(decode_win_ansi(&[b'J', 0xF6]), "Jö");
        assert!(is_win_ansi("Müller"));
    }

    #[test]
    fn test_high_control() {
        assert_eq!(encode_win_ansi("–"), vec![0x96]);
        assert_eq!(decode_win_ansi(&[0x80, 0x93]), "€“");
    }

    #[test]
    fn test_fallbacks() {
        assert!(!is_win_ansi("Ayşe"));
        assert_eq!(encode_win_ansi("Ayşe"), b"Ayse".to_vec());
        assert_eq!(encode_win_ansi("李"), b"?".to_vec());
    }
}
