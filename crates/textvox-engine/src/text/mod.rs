//! UTF-16 offset helpers.
//!
//! Hosts expose offsets in UTF-16 code units while Rust strings are UTF-8, so
//! every slice taken from node text goes through these conversions.

pub mod document;

pub use document::{DocumentText, Segment};

/// Length of `text` in UTF-16 code units.
pub fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}

/// Byte index of the UTF-16 offset, clamped to the end of `text`.
///
/// An offset landing inside a surrogate pair rounds up to the next character.
pub fn byte_index(text: &str, offset: usize) -> usize {
    let mut units = 0;
    for (byte, ch) in text.char_indices() {
        if units >= offset {
            return byte;
        }
        units += ch.len_utf16();
    }
    text.len()
}

/// UTF-16 offset of a byte index. `byte` must be a char boundary.
pub fn utf16_index(text: &str, byte: usize) -> usize {
    utf16_len(&text[..byte.min(text.len())])
}

/// Substring between two UTF-16 offsets, clamped to `text`.
pub fn slice(text: &str, start: usize, end: usize) -> &str {
    let start = byte_index(text, start);
    let end = byte_index(text, end).max(start);
    &text[start..end]
}

/// Character starting at the UTF-16 offset.
pub fn char_at(text: &str, offset: usize) -> Option<char> {
    text[byte_index(text, offset)..].chars().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("hello", 5)]
    #[case("", 0)]
    #[case("caf\u{e9}", 4)]
    #[case("a\u{1F600}b", 4)]
    fn counts_utf16_units(#[case] text: &str, #[case] expected: usize) {
        assert_eq!(utf16_len(text), expected);
    }

    #[test]
    fn converts_between_units_and_bytes() {
        let text = "a\u{1F600}b";
        assert_eq!(byte_index(text, 0), 0);
        assert_eq!(byte_index(text, 1), 1);
        assert_eq!(byte_index(text, 3), 5);
        assert_eq!(byte_index(text, 10), text.len());
        assert_eq!(utf16_index(text, 5), 3);
    }

    #[test]
    fn slices_by_utf16_offsets() {
        assert_eq!(slice("hello world", 6, 11), "world");
        assert_eq!(slice("hello", 3, 1), "");
        assert_eq!(slice("hello", 2, 99), "llo");
        assert_eq!(char_at("hello", 4), Some('o'));
        assert_eq!(char_at("hello", 5), None);
    }
}
