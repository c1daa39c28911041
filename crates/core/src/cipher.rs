//! Reversible recovery tokens.
//!
//! ASCII letters become their 1-based alphabet index in decimal (`a` = 1,
//! `z` = 26); an uppercase letter carries a `^` suffix. Digits and the
//! reserved marks `|`, `^`, `~` are escaped with `~`; every other character
//! passes through. Decoding reads the longest valid code first, so a `|` is
//! emitted wherever a one-digit code would otherwise be glued to the next one.

use thiserror::Error;

const SEPARATOR: char = '|';
const UPPER: char = '^';
const ESCAPE: char = '~';

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CipherError {
    #[error("dangling escape at end of token")]
    DanglingEscape,
    #[error("case marker without a letter code at offset {0}")]
    OrphanCaseMarker(usize),
    #[error("invalid letter code {code} at offset {offset}")]
    InvalidCode { code: u32, offset: usize },
}

fn is_reserved(c: char) -> bool {
    c.is_ascii_digit() || c == SEPARATOR || c == UPPER || c == ESCAPE
}

fn letter_code(c: char) -> Option<(u32, bool)> {
    if c.is_ascii_lowercase() {
        Some((c as u32 - 'a' as u32 + 1, false))
    } else if c.is_ascii_uppercase() {
        Some((c as u32 - 'A' as u32 + 1, true))
    } else {
        None
    }
}

fn code_letter(code: u32, upper: bool) -> Option<char> {
    if !(1..=26).contains(&code) {
        return None;
    }
    let base = if upper { b'A' } else { b'a' };
    Some((base + (code - 1) as u8) as char)
}

/// Encodes `text` into its recovery token.
pub fn encipher(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 2);
    // Digit of the previous code when it was a lone lowercase digit.
    let mut open_digit: Option<u32> = None;

    for c in text.chars() {
        match letter_code(c) {
            Some((code, upper)) => {
                let digits = code.to_string();
                if let Some(prev) = open_digit {
                    let first = digits.as_bytes()[0] - b'0';
                    if (10..=26).contains(&(prev * 10 + first as u32)) {
                        out.push(SEPARATOR);
                    }
                }
                out.push_str(&digits);
                if upper {
                    out.push(UPPER);
                }
                open_digit = if !upper && code < 10 { Some(code) } else { None };
            }
            None => {
                if is_reserved(c) {
                    out.push(ESCAPE);
                }
                out.push(c);
                open_digit = None;
            }
        }
    }

    out
}

/// Decodes a token produced by [`encipher`].
pub fn decipher(token: &str) -> Result<String, CipherError> {
    let chars: Vec<char> = token.chars().collect();
    let mut out = String::with_capacity(chars.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == ESCAPE {
            let next = chars.get(i + 1).ok_or(CipherError::DanglingEscape)?;
            out.push(*next);
            i += 2;
        } else if c == SEPARATOR {
            i += 1;
        } else if c == UPPER {
            return Err(CipherError::OrphanCaseMarker(i));
        } else if let Some(d1) = c.to_digit(10) {
            let mut code = d1;
            let mut len = 1;
            if let Some(d2) = chars.get(i + 1).and_then(|n| n.to_digit(10)) {
                if (10..=26).contains(&(d1 * 10 + d2)) {
                    code = d1 * 10 + d2;
                    len = 2;
                }
            }
            let upper = chars.get(i + len) == Some(&UPPER);
            let letter =
                code_letter(code, upper).ok_or(CipherError::InvalidCode { code, offset: i })?;
            out.push(letter);
            i += len + usize::from(upper);
        } else {
            out.push(c);
            i += 1;
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_known_tokens() {
        assert_eq!(encipher("abc"), "1|2|3");
        assert_eq!(encipher("John"), "10^15814");
        assert_eq!(encipher("ak"), "1|11");
        assert_eq!(encipher("bt"), "2|20");
        assert_eq!(encipher("ja"), "101");
        assert_eq!(encipher("a1"), "1~1");
        assert_eq!(encipher("x@y.com"), "24@25.31513");
    }

    #[test]
    fn test_decipher_known() {
        assert_eq!(decipher("10^15814").unwrap(), "John");
        assert_eq!(decipher("1|2|3").unwrap(), "abc");
        assert_eq!(decipher("1|23").unwrap(), "aw");
        assert_eq!(decipher("24@25.31513").unwrap(), "x@y.com");
    }

    #[test]
    fn test_uppercase_then_digit_code_needs_no_separator() {
        assert_eq!(encipher("Ak"), "1^11");
        assert_eq!(decipher("1^11").unwrap(), "Ak");
    }

    #[test]
    fn test_decipher_errors() {
        assert_eq!(decipher("~"), Err(CipherError::DanglingEscape));
        assert_eq!(decipher("^"), Err(CipherError::OrphanCaseMarker(0)));
        assert_eq!(
            decipher("0"),
            Err(CipherError::InvalidCode { code: 0, offset: 0 })
        );
    }

    #[test]
    fn test_non_ascii_passthrough() {
        let token = encipher("Ayşe Yılmaz");
        assert!(token.contains('ş'));
        assert!(token.contains('ı'));
        assert_eq!(decipher(&token).unwrap(), "Ayşe Yılmaz");
    }

    proptest! {
        #[test]
        fn prop_roundtrip_any_string(s in any::<String>()) {
            prop_assert_eq!(decipher(&encipher(&s)).unwrap(), s);
        }

        #[test]
        fn prop_roundtrip_letters_and_digits(s in "[a-zA-Z0-9|^~ .@-]{0,40}") {
            prop_assert_eq!(decipher(&encipher(&s)).unwrap(), s);
        }

        #[test]
        fn prop_injective(a in "[a-zA-Z0-9]{0,12}", b in "[a-zA-Z0-9]{0,12}") {
            prop_assume!(a != b);
            prop_assert_ne!(encipher(&a), encipher(&b));
        }
    }
}
