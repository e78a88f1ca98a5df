//! Byte-level rules for the supported text encodings.
//!
//! Everything here is pure: no state is kept between calls and no I/O is
//! performed. The [`Decoder`](crate::decoder::Decoder) and the
//! [`CharCursor`](crate::cursor::CharCursor) build on these rules.

use std::fmt;
use std::str::FromStr;

use crate::error::{PartitionError, Result};

/// A supported text encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    Utf8,
    Utf16Le,
    Utf16Be,
}

const HIGH_SURROGATES: std::ops::RangeInclusive<u32> = 0xD800..=0xDBFF;
const LOW_SURROGATES: std::ops::RangeInclusive<u32> = 0xDC00..=0xDFFF;

/// Returns true if `b` can begin an encoded UTF-8 character.
///
/// Any byte whose two highest bits are `10` continues a multi-byte sequence.
pub fn is_utf8_char_start(b: u8) -> bool {
    (b & 0b1100_0000) != 0b1000_0000
}

/// Length of the UTF-8 sequence introduced by `lead`, or `None` if `lead`
/// matches none of the four leading-byte patterns.
pub fn utf8_sequence_len(lead: u8) -> Option<usize> {
    if lead & 0b1000_0000 == 0b0000_0000 {
        Some(1)
    } else if lead & 0b1110_0000 == 0b1100_0000 {
        Some(2)
    } else if lead & 0b1111_0000 == 0b1110_0000 {
        Some(3)
    } else if lead & 0b1111_1000 == 0b1111_0000 {
        Some(4)
    } else {
        None
    }
}

pub fn is_high_surrogate(unit: u32) -> bool {
    HIGH_SURROGATES.contains(&unit)
}

pub fn is_low_surrogate(unit: u32) -> bool {
    LOW_SURROGATES.contains(&unit)
}

impl Codec {
    /// Size in bytes of one code unit, which is also the natural alignment.
    pub fn unit_size(self) -> usize {
        match self {
            Codec::Utf8 => 1,
            Codec::Utf16Le | Codec::Utf16Be => 2,
        }
    }

    /// Decodes one code unit starting exactly at `index`.
    ///
    /// For UTF-8 this is a whole scalar value and the returned length is the
    /// 1 to 4 bytes of its sequence; the sequence must be complete, well formed
    /// and not overlong. For UTF-16 it is one raw 16-bit unit (possibly half of
    /// a surrogate pair) and the length is always 2.
    ///
    /// Errors report `index` as the offset; callers translate it into their
    /// own coordinates.
    pub fn read_code_unit(self, buf: &[u8], index: usize) -> Result<(u32, usize)> {
        let malformed = || self.malformed(index);
        match self {
            Codec::Utf8 => {
                let lead = *buf.get(index).ok_or_else(malformed)?;
                let len = utf8_sequence_len(lead).ok_or_else(malformed)?;
                let seq = buf.get(index..index + len).ok_or_else(malformed)?;
                let mut value = match len {
                    1 => return Ok((u32::from(lead), 1)),
                    2 => u32::from(lead & 0b0001_1111),
                    3 => u32::from(lead & 0b0000_1111),
                    _ => u32::from(lead & 0b0000_0111),
                };
                for &b in &seq[1..] {
                    if is_utf8_char_start(b) {
                        return Err(malformed());
                    }
                    value = (value << 6) | u32::from(b & 0b0011_1111);
                }
                let min = match len {
                    2 => 0x80,
                    3 => 0x800,
                    _ => 0x1_0000,
                };
                if value < min || value > 0x10_FFFF || is_high_surrogate(value) || is_low_surrogate(value) {
                    return Err(malformed());
                }
                Ok((value, len))
            }
            Codec::Utf16Le | Codec::Utf16Be => {
                let pair = buf.get(index..index + 2).ok_or_else(malformed)?;
                Ok((u32::from(self.utf16_unit(pair[0], pair[1])), 2))
            }
        }
    }

    /// Smallest offset `>= offset` in `buf` at which a new character begins,
    /// clamped to `buf.len()`.
    ///
    /// For UTF-16 the start of `buf` is assumed to sit on a 2-byte boundary.
    pub fn next_code_start(self, buf: &[u8], offset: usize) -> usize {
        match self {
            Codec::Utf8 => {
                let mut offset = offset;
                while offset < buf.len() && !is_utf8_char_start(buf[offset]) {
                    offset += 1;
                }
                offset.min(buf.len())
            }
            Codec::Utf16Le | Codec::Utf16Be => {
                let mut offset = offset + (offset & 1);
                if let Some(pair) = buf.get(offset..offset + 2) {
                    // second half of a pair; the character began two bytes back
                    if is_low_surrogate(u32::from(self.utf16_unit(pair[0], pair[1]))) {
                        offset += 2;
                    }
                }
                offset.min(buf.len())
            }
        }
    }

    /// Number of bytes (0 or 1) to add to `position` to land on the codec's
    /// natural boundary.
    pub fn alignment(self, position: u64) -> u64 {
        match self {
            Codec::Utf8 => 0,
            Codec::Utf16Le | Codec::Utf16Be => position & 1,
        }
    }

    /// Number of bytes `ch` occupies when encoded with this codec.
    pub fn encoded_len(self, ch: char) -> usize {
        match self {
            Codec::Utf8 => ch.len_utf8(),
            Codec::Utf16Le | Codec::Utf16Be => ch.len_utf16() * 2,
        }
    }

    /// Encodes `text` without a byte-order mark.
    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            Codec::Utf8 => text.as_bytes().to_vec(),
            Codec::Utf16Le => text.encode_utf16().flat_map(u16::to_le_bytes).collect(),
            Codec::Utf16Be => text.encode_utf16().flat_map(u16::to_be_bytes).collect(),
        }
    }

    /// The byte-order mark written at the start of files in this encoding.
    pub fn bom(self) -> &'static [u8] {
        match self {
            Codec::Utf8 => &[0xEF, 0xBB, 0xBF],
            Codec::Utf16Le => &[0xFF, 0xFE],
            Codec::Utf16Be => &[0xFE, 0xFF],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Codec::Utf8 => "utf-8",
            Codec::Utf16Le => "utf-16le",
            Codec::Utf16Be => "utf-16be",
        }
    }

    fn utf16_unit(self, first: u8, second: u8) -> u16 {
        match self {
            Codec::Utf16Be => u16::from_be_bytes([first, second]),
            _ => u16::from_le_bytes([first, second]),
        }
    }

    pub(crate) fn malformed(self, offset: usize) -> PartitionError {
        PartitionError::MalformedSequence {
            codec: self,
            offset: offset as u64,
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Codec {
    type Err = PartitionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(Codec::Utf8),
            "utf16le" | "utf-16le" | "utf16" | "utf-16" => Ok(Codec::Utf16Le),
            "utf16be" | "utf-16be" => Ok(Codec::Utf16Be),
            _ => Err(PartitionError::Misconfiguration(format!(
                "unsupported encoding `{s}`, expected one of utf-8, utf-16le, utf-16be"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn char_start(text: &str, codec: Codec, offset: usize) -> usize {
        codec.next_code_start(&codec.encode(text), offset)
    }

    #[rstest]
    #[case("\u{7F} abcd", &[(0, 0), (1, 1)])]
    #[case("\u{80} abcd", &[(0, 0), (1, 2), (2, 2), (3, 3)])]
    #[case("\u{7FF} abcd", &[(0, 0), (1, 2), (2, 2), (3, 3)])]
    #[case("\u{800} abcd", &[(0, 0), (1, 3), (2, 3), (3, 3)])]
    #[case("\u{FFFF} abcd", &[(0, 0), (1, 3), (2, 3), (3, 3)])]
    #[case("\u{10000} abcd", &[(0, 0), (1, 4), (2, 4), (3, 4), (4, 4)])]
    fn test_utf8_char_start(#[case] text: &str, #[case] expected: &[(usize, usize)]) {
        for &(offset, start) in expected {
            assert_eq!(start, char_start(text, Codec::Utf8, offset), "offset {offset}");
        }
    }

    #[rstest]
    fn test_utf16_surrogate_char_start(
        #[values(Codec::Utf16Le, Codec::Utf16Be)] codec: Codec,
        #[values("\u{10000} abcd", "\u{10FFFF} abcd")] text: &str,
    ) {
        assert_eq!(0, char_start(text, codec, 0));
        for offset in 1..=4 {
            assert_eq!(4, char_start(text, codec, offset), "offset {offset}");
        }
    }

    #[test]
    fn test_char_start_clamps_to_buffer() {
        assert_eq!(2, Codec::Utf8.next_code_start(&[b'a', 0x80], 1));
        assert_eq!(3, Codec::Utf16Le.next_code_start(&[b'a', 0, b'b'], 3));
        assert_eq!(2, Codec::Utf16Le.next_code_start(&[b'a', 0, b'b'], 1));
    }

    #[test]
    fn test_continuation_bytes() {
        assert!(is_utf8_char_start(b'a'));
        assert!(is_utf8_char_start(0xC2));
        assert!(is_utf8_char_start(0xF0));
        assert!(!is_utf8_char_start(0x80));
        assert!(!is_utf8_char_start(0xBF));
    }

    #[rstest]
    #[case("a", 0x61, 1)]
    #[case("\u{80}", 0x80, 2)]
    #[case("\u{20AC}", 0x20AC, 3)]
    #[case("\u{1F600}", 0x1F600, 4)]
    fn test_read_utf8_code_unit(#[case] text: &str, #[case] value: u32, #[case] len: usize) {
        assert_eq!((value, len), Codec::Utf8.read_code_unit(text.as_bytes(), 0).unwrap());
    }

    #[rstest]
    #[case(&[0x80])]
    #[case(&[0xFF])]
    #[case(&[0xC2])]
    #[case(&[0xC2, 0x41])]
    #[case(&[0xC0, 0x80])]
    #[case(&[0xED, 0xA0, 0x80])]
    #[case(&[0xF4, 0x90, 0x80, 0x80])]
    fn test_read_utf8_malformed(#[case] bytes: &[u8]) {
        assert!(matches!(
            Codec::Utf8.read_code_unit(bytes, 0),
            Err(PartitionError::MalformedSequence { offset: 0, .. })
        ));
    }

    #[test]
    fn test_read_utf16_code_unit_byte_order() {
        assert_eq!((0xD800, 2), Codec::Utf16Le.read_code_unit(&[0x00, 0xD8], 0).unwrap());
        assert_eq!((0xD800, 2), Codec::Utf16Be.read_code_unit(&[0xD8, 0x00], 0).unwrap());
        assert!(Codec::Utf16Be.read_code_unit(&[0xD8], 0).is_err());
    }

    #[test]
    fn test_alignment() {
        assert_eq!(0, Codec::Utf8.alignment(7));
        assert_eq!(1, Codec::Utf16Le.alignment(7));
        assert_eq!(0, Codec::Utf16Be.alignment(8));
    }

    #[test]
    fn test_encoded_len() {
        assert_eq!(4, Codec::Utf8.encoded_len('\u{1F600}'));
        assert_eq!(4, Codec::Utf16Le.encoded_len('\u{1F600}'));
        assert_eq!(2, Codec::Utf16Be.encoded_len('a'));
        assert_eq!(3, Codec::Utf8.encoded_len('\u{20AC}'));
    }

    #[test]
    fn test_parse_codec() {
        assert_eq!(Codec::Utf8, "UTF-8".parse().unwrap());
        assert_eq!(Codec::Utf16Be, "utf16be".parse().unwrap());
        assert!(matches!(
            "latin1".parse::<Codec>(),
            Err(PartitionError::Misconfiguration(_))
        ));
    }
}
