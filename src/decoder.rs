//! Chunk-at-a-time conversion from bytes to characters.

use crate::codec::{is_high_surrogate, is_low_surrogate, utf8_sequence_len, Codec};
use crate::error::{PartitionError, Result};

/// Longest encoded character for every supported codec.
const MAX_SEQUENCE: usize = 4;

/// Outcome of one [`Decoder::convert`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Conversion {
    /// Input bytes used, including trailing bytes held back as pending state.
    pub bytes_consumed: usize,
    pub chars_produced: usize,
    /// All input was consumed and no partial character is pending.
    pub completed: bool,
}

enum Step {
    Char(char, usize),
    Incomplete,
}

/// A stateful decoder for one logical byte stream.
///
/// A character split across two chunks is held back after the first chunk
/// and finished from the bytes of the next one, so every emitted character
/// comes from a contiguous run of stream bytes. Keep one instance for the
/// whole stream.
#[derive(Debug, Clone)]
pub struct Decoder {
    codec: Codec,
    pending: [u8; MAX_SEQUENCE],
    pending_len: usize,
    /// Stream bytes consumed so far, used to place errors.
    stream_offset: u64,
}

impl Decoder {
    pub fn new(codec: Codec) -> Self {
        Decoder {
            codec,
            pending: [0; MAX_SEQUENCE],
            pending_len: 0,
            stream_offset: 0,
        }
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Bytes of an unfinished character carried over from earlier input.
    pub fn pending_len(&self) -> usize {
        self.pending_len
    }

    /// Decodes as much of `input` as fits in `output`.
    ///
    /// Conversion stops early when `output` is full; the unconsumed tail must
    /// be offered again on the next call. With `flush` set, a partial
    /// character left at the end of `input` is a `MalformedSequence` error
    /// instead of pending state. Error offsets count bytes from the start of
    /// the stream this decoder has seen.
    pub fn convert(&mut self, input: &[u8], output: &mut [char], flush: bool) -> Result<Conversion> {
        let mut consumed = 0;
        let mut produced = 0;

        if self.pending_len > 0 && !output.is_empty() {
            loop {
                match self.decode_one(&self.pending[..self.pending_len])? {
                    Step::Char(ch, _) => {
                        output[0] = ch;
                        produced = 1;
                        self.stream_offset += self.pending_len as u64;
                        self.pending_len = 0;
                        break;
                    }
                    Step::Incomplete if consumed < input.len() => {
                        self.pending[self.pending_len] = input[consumed];
                        self.pending_len += 1;
                        consumed += 1;
                    }
                    Step::Incomplete => break,
                }
            }
        }

        // Pending bytes only survive the loop above when `input` ran out.
        if self.pending_len == 0 {
            while consumed < input.len() && produced < output.len() {
                match self.decode_one(&input[consumed..])? {
                    Step::Char(ch, len) => {
                        output[produced] = ch;
                        produced += 1;
                        consumed += len;
                        self.stream_offset += len as u64;
                    }
                    Step::Incomplete => {
                        let rest = &input[consumed..];
                        self.pending[..rest.len()].copy_from_slice(rest);
                        self.pending_len = rest.len();
                        consumed = input.len();
                    }
                }
            }
        }

        if flush && self.pending_len > 0 {
            return Err(self.malformed());
        }

        Ok(Conversion {
            bytes_consumed: consumed,
            chars_produced: produced,
            completed: consumed == input.len() && self.pending_len == 0,
        })
    }

    /// Decodes the character at the start of `bytes`.
    fn decode_one(&self, bytes: &[u8]) -> Result<Step> {
        match self.codec {
            Codec::Utf8 => {
                let len = utf8_sequence_len(bytes[0]).ok_or_else(|| self.malformed())?;
                if bytes.len() < len {
                    return Ok(Step::Incomplete);
                }
                let (value, len) = self
                    .codec
                    .read_code_unit(bytes, 0)
                    .map_err(|_| self.malformed())?;
                let ch = char::from_u32(value).ok_or_else(|| self.malformed())?;
                Ok(Step::Char(ch, len))
            }
            Codec::Utf16Le | Codec::Utf16Be => {
                if bytes.len() < 2 {
                    return Ok(Step::Incomplete);
                }
                let (unit, _) = self.codec.read_code_unit(bytes, 0)?;
                if is_low_surrogate(unit) {
                    return Err(self.malformed());
                }
                if !is_high_surrogate(unit) {
                    let ch = char::from_u32(unit).ok_or_else(|| self.malformed())?;
                    return Ok(Step::Char(ch, 2));
                }
                if bytes.len() < 4 {
                    return Ok(Step::Incomplete);
                }
                let (low, _) = self.codec.read_code_unit(bytes, 2)?;
                if !is_low_surrogate(low) {
                    return Err(self.malformed());
                }
                let value = 0x1_0000 + ((unit - 0xD800) << 10) + (low - 0xDC00);
                let ch = char::from_u32(value).ok_or_else(|| self.malformed())?;
                Ok(Step::Char(ch, 4))
            }
        }
    }

    /// The character starting at `stream_offset` cannot be decoded.
    fn malformed(&self) -> PartitionError {
        PartitionError::MalformedSequence {
            codec: self.codec,
            offset: self.stream_offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn decode_in_chunks(codec: Codec, bytes: &[u8], chunk: usize) -> Result<String> {
        let mut decoder = Decoder::new(codec);
        let mut out = ['\0'; 16];
        let mut text = String::new();
        let mut rest = bytes;
        while !rest.is_empty() {
            let take = chunk.min(rest.len());
            let conversion = decoder.convert(&rest[..take], &mut out, false)?;
            text.extend(&out[..conversion.chars_produced]);
            rest = &rest[conversion.bytes_consumed..];
        }
        decoder.convert(&[], &mut out, true)?;
        Ok(text)
    }

    #[rstest]
    fn test_characters_split_across_chunks(
        #[values(Codec::Utf8, Codec::Utf16Le, Codec::Utf16Be)] codec: Codec,
        #[values(1, 2, 3, 5, 64)] chunk: usize,
    ) {
        let text = "a\u{80}b\u{20AC}\u{1F600}\n\u{10FFFF}z";
        let decoded = decode_in_chunks(codec, &codec.encode(text), chunk).unwrap();
        assert_eq!(text, decoded);
    }

    #[test]
    fn test_stops_when_output_is_full() {
        let mut decoder = Decoder::new(Codec::Utf8);
        let mut out = ['\0'; 2];
        let conversion = decoder.convert("a\u{80}c".as_bytes(), &mut out, true).unwrap();
        assert_eq!(
            Conversion {
                bytes_consumed: 3,
                chars_produced: 2,
                completed: false
            },
            conversion
        );
        assert_eq!(['a', '\u{80}'], out);
    }

    #[test]
    fn test_pending_bytes_are_consumed() {
        let mut decoder = Decoder::new(Codec::Utf8);
        let mut out = ['\0'; 4];
        let conversion = decoder.convert(&[b'a', 0xE2, 0x82], &mut out, false).unwrap();
        assert_eq!(3, conversion.bytes_consumed);
        assert_eq!(1, conversion.chars_produced);
        assert!(!conversion.completed);
        assert_eq!(2, decoder.pending_len());

        let conversion = decoder.convert(&[0xAC, b'b'], &mut out, true).unwrap();
        assert_eq!(2, conversion.chars_produced);
        assert!(conversion.completed);
        assert_eq!(['\u{20AC}', 'b'], out[..2]);
    }

    #[test]
    fn test_truncated_input_fails_on_flush() {
        let mut decoder = Decoder::new(Codec::Utf8);
        let mut out = ['\0'; 4];
        let err = decoder.convert(&[b'a', b'b', 0xF0, 0x9F], &mut out, true).unwrap_err();
        assert!(matches!(
            err,
            PartitionError::MalformedSequence {
                codec: Codec::Utf8,
                offset: 2
            }
        ));
    }

    #[rstest]
    #[case(Codec::Utf8, &[b'a', 0xFF])]
    #[case(Codec::Utf8, &[b'a', 0x80])]
    #[case(Codec::Utf16Le, &[b'a', 0, 0x00, 0xDC])]
    #[case(Codec::Utf16Be, &[0, b'a', 0xD8, 0x00, 0, b'b'])]
    fn test_malformed_input(#[case] codec: Codec, #[case] bytes: &[u8]) {
        let mut decoder = Decoder::new(codec);
        let mut out = ['\0'; 4];
        let err = decoder.convert(bytes, &mut out, true).unwrap_err();
        assert!(matches!(
            err,
            PartitionError::MalformedSequence { offset, .. } if offset == codec.unit_size() as u64
        ));
    }
}
