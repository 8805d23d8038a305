//! UTF-8 validation and code-point counting.
//!
//! Variant strings cache their character count at construction; these
//! helpers are where that count comes from.

use crate::error::{CoreError, CoreResult};

/// Validates `bytes` as UTF-8 and returns the code-point count.
pub fn check_utf8(bytes: &[u8]) -> CoreResult<usize> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Ok(s.chars().count()),
        Err(e) => Err(CoreError::bad_encoding(e.valid_up_to())),
    }
}

/// Counts the code points of an already-valid string.
pub fn char_count(s: &str) -> usize {
    s.chars().count()
}

/// Returns the byte offset of the next code-point boundary after `pos`,
/// or `None` at the end of the string.
pub fn next_char(s: &str, pos: usize) -> Option<(char, usize)> {
    let rest = &s[pos..];
    let mut chars = rest.char_indices();
    let (_, ch) = chars.next().map(|(i, c)| (i, c))?;
    let next = pos + ch.len_utf8();
    Some((ch, next))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_utf8_valid() {
        assert_eq!(check_utf8("zh中文".as_bytes()), Ok(4));
        assert_eq!(check_utf8(b""), Ok(0));
        assert_eq!(check_utf8(b"ascii"), Ok(5));
    }

    #[test]
    fn test_check_utf8_invalid() {
        assert_eq!(check_utf8(b"\xff"), Err(CoreError::bad_encoding(0)));
        assert_eq!(check_utf8(b"ok\xc3\x28"), Err(CoreError::bad_encoding(2)));
    }

    #[test]
    fn test_next_char_walk() {
        let s = "a中b";
        let (c0, p1) = next_char(s, 0).unwrap();
        assert_eq!(c0, 'a');
        let (c1, p2) = next_char(s, p1).unwrap();
        assert_eq!(c1, '中');
        let (c2, p3) = next_char(s, p2).unwrap();
        assert_eq!(c2, 'b');
        assert_eq!(next_char(s, p3), None);
    }
}
