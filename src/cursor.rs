//! Forward-only character reader that knows the byte offset of every
//! character it hands out.

use std::io::{self, Read, Seek, SeekFrom};

use log::trace;

use crate::codec::Codec;
use crate::decoder::Decoder;
use crate::error::{PartitionError, Result};

/// Block sizes used by a [`CharCursor`] when refilling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorOptions {
    /// Raw bytes read from the source per refill. At least 4, so the first
    /// block can always hold a whole surrogate pair.
    pub byte_block_size: usize,
    /// Characters decoded per refill.
    pub char_block_size: usize,
}

impl Default for CursorOptions {
    fn default() -> Self {
        CursorOptions {
            byte_block_size: 2048,
            char_block_size: 1024,
        }
    }
}

impl CursorOptions {
    pub fn validate(&self) -> Result<()> {
        if self.byte_block_size < 4 {
            return Err(PartitionError::Misconfiguration(format!(
                "byte block size must be at least 4, got {}",
                self.byte_block_size
            )));
        }
        if self.char_block_size == 0 {
            return Err(PartitionError::Misconfiguration(
                "char block size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Bookkeeping shared between refills and position queries.
#[derive(Debug, Clone, Copy)]
struct DecodeState {
    /// Absolute offset where the next raw read begins.
    next_read: u64,
    /// Absolute offset the source is currently positioned at.
    source_pos: u64,
    /// Absolute offset of the first character in the current block.
    block_start: u64,
    /// Bytes spanned by all characters of the current block.
    block_bytes: u64,
    chars_produced: usize,
    chars_consumed: usize,
    /// The cursor may have been placed mid-character; skip to a real start
    /// before decoding the first block.
    align_first_block: bool,
    /// Absolute offset the decoder's stream begins at.
    origin: u64,
    exhausted: bool,
}

/// Reads decoded characters from a byte source, starting at whatever
/// position the source is at when the cursor is created.
///
/// Bytes are read and decoded in blocks. [`CharCursor::position`] reports the
/// exact byte offset of the next character despite that batching.
pub struct CharCursor<R> {
    source: R,
    codec: Codec,
    decoder: Decoder,
    bytes: Vec<u8>,
    chars: Vec<char>,
    state: DecodeState,
}

impl<R: Read + Seek> CharCursor<R> {
    pub fn new(source: R, codec: Codec) -> Result<Self> {
        Self::with_options(source, codec, CursorOptions::default())
    }

    pub fn with_options(mut source: R, codec: Codec, options: CursorOptions) -> Result<Self> {
        options.validate()?;
        let start = source.stream_position()?;
        Ok(CharCursor {
            source,
            codec,
            decoder: Decoder::new(codec),
            bytes: vec![0; options.byte_block_size],
            chars: vec!['\0'; options.char_block_size],
            state: DecodeState {
                next_read: start,
                source_pos: start,
                block_start: start,
                block_bytes: 0,
                chars_produced: 0,
                chars_consumed: 0,
                align_first_block: true,
                origin: start,
                exhausted: false,
            },
        })
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn get_ref(&self) -> &R {
        &self.source
    }

    pub fn into_inner(self) -> R {
        self.source
    }

    /// Returns the next character, or `None` once the source is exhausted.
    #[inline]
    pub fn try_read_next_char(&mut self) -> Result<Option<char>> {
        let state = &mut self.state;
        if state.chars_consumed < state.chars_produced {
            let ch = self.chars[state.chars_consumed];
            state.chars_consumed += 1;
            return Ok(Some(ch));
        }
        self.read_next_char_refilling()
    }

    fn read_next_char_refilling(&mut self) -> Result<Option<char>> {
        loop {
            if self.state.chars_consumed < self.state.chars_produced {
                let ch = self.chars[self.state.chars_consumed];
                self.state.chars_consumed += 1;
                return Ok(Some(ch));
            }
            if !self.fill()? {
                return Ok(None);
            }
        }
    }

    /// Reads and decodes the next block. Returns false at end of source.
    fn fill(&mut self) -> Result<bool> {
        loop {
            if self.state.exhausted {
                return Ok(false);
            }
            if self.state.align_first_block {
                self.state.next_read += self.codec.alignment(self.state.next_read);
            }
            let read_start = self.state.next_read;
            if self.state.source_pos != read_start {
                self.source.seek(SeekFrom::Start(read_start))?;
            }
            let n = read_block(&mut self.source, &mut self.bytes)?;
            self.state.source_pos = read_start + n as u64;
            self.state.chars_consumed = 0;
            self.state.chars_produced = 0;

            let pending = self.decoder.pending_len() as u64;
            let origin = self.state.origin;
            if n == 0 {
                self.state.exhausted = true;
                self.state.block_start = read_start;
                self.state.block_bytes = 0;
                self.decoder
                    .convert(&[], &mut self.chars, true)
                    .map_err(|err| err.offset_by(origin))?;
                return Ok(false);
            }

            let mut skip = 0;
            if self.state.align_first_block {
                skip = self.codec.next_code_start(&self.bytes[..n], 0);
                self.state.align_first_block = false;
                self.state.origin = read_start + skip as u64;
            }
            let origin = self.state.origin;
            let conversion = match self.decoder.convert(&self.bytes[skip..n], &mut self.chars, false) {
                Ok(conversion) => conversion,
                Err(err) => {
                    // malformed input ends the stream
                    self.state.exhausted = true;
                    return Err(err.offset_by(origin));
                }
            };

            let converted_end = read_start + (skip + conversion.bytes_consumed) as u64;
            self.state.block_start = read_start + skip as u64 - pending;
            self.state.block_bytes =
                converted_end - self.decoder.pending_len() as u64 - self.state.block_start;
            self.state.next_read = converted_end;
            self.state.chars_produced = conversion.chars_produced;
            trace!(
                "decoded {} chars from {} bytes at offset {}",
                conversion.chars_produced,
                self.state.block_bytes,
                self.state.block_start
            );

            // A block can end up holding only a partial character.
            if conversion.chars_produced > 0 {
                return Ok(true);
            }
        }
    }

    /// Byte offset in the source of the character the next read returns.
    ///
    /// This is not free: when the current block is partly consumed, the
    /// consumed characters are re-encoded to measure their byte length.
    /// Repeated calls without reads return the same value.
    pub fn position(&self) -> u64 {
        let state = &self.state;
        if state.chars_consumed == 0 {
            state.block_start
        } else if state.chars_consumed == state.chars_produced {
            state.block_start + state.block_bytes
        } else {
            let consumed: u64 = self.chars[..state.chars_consumed]
                .iter()
                .map(|&ch| self.codec.encoded_len(ch) as u64)
                .sum();
            state.block_start + consumed
        }
    }
}

impl<R: Read + Seek> Iterator for CharCursor<R> {
    type Item = Result<char>;

    fn next(&mut self) -> Option<Self::Item> {
        self.try_read_next_char().transpose()
    }
}

fn read_block<R: Read>(source: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match source.read(buf) {
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::QuickCheck;
    use rstest::rstest;
    use std::io::Cursor;

    const MIXED: &str = "ab\u{80}\u{20AC}\n\u{1F600}x\u{7FF}\u{10FFFF}\r\nyz\u{FFFF}";

    fn cursor_at(codec: Codec, text: &str, offset: u64, options: CursorOptions) -> CharCursor<Cursor<Vec<u8>>> {
        let mut source = Cursor::new(codec.encode(text));
        source.set_position(offset);
        CharCursor::with_options(source, codec, options).unwrap()
    }

    fn options(byte_block_size: usize, char_block_size: usize) -> CursorOptions {
        CursorOptions {
            byte_block_size,
            char_block_size,
        }
    }

    #[rstest]
    fn test_position_tracks_every_char(
        #[values(Codec::Utf8, Codec::Utf16Le, Codec::Utf16Be)] codec: Codec,
        #[values(options(4, 1), options(5, 2), options(7, 3), options(16, 64), CursorOptions::default())]
        block_sizes: CursorOptions,
    ) {
        let mut cursor = cursor_at(codec, MIXED, 0, block_sizes);
        let mut expected_pos = 0u64;
        for expected in MIXED.chars() {
            assert_eq!(expected_pos, cursor.position());
            assert_eq!(Some(expected), cursor.try_read_next_char().unwrap());
            expected_pos += codec.encoded_len(expected) as u64;
        }
        assert_eq!(expected_pos, cursor.position());
        assert_eq!(None, cursor.try_read_next_char().unwrap());
        assert_eq!(codec.encode(MIXED).len() as u64, cursor.position());
    }

    #[test]
    fn test_position_is_idempotent() {
        let mut cursor = cursor_at(Codec::Utf8, MIXED, 0, CursorOptions::default());
        for _ in 0..4 {
            cursor.try_read_next_char().unwrap();
        }
        let first = cursor.position();
        assert_eq!(first, cursor.position());
        assert_eq!(first, cursor.position());
        assert_eq!(7, first);
    }

    #[test]
    fn test_starts_mid_character() {
        // U+0080 occupies bytes 0..2
        let mut cursor = cursor_at(Codec::Utf8, "\u{80}abc", 1, CursorOptions::default());
        assert_eq!(Some('a'), cursor.try_read_next_char().unwrap());
        assert_eq!(3, cursor.position());
        let rest: String = cursor.map(|ch| ch.unwrap()).collect();
        assert_eq!("bc", rest);
    }

    #[rstest]
    fn test_utf16_starts_inside_surrogate_pair(
        #[values(Codec::Utf16Le, Codec::Utf16Be)] codec: Codec,
        #[values(1, 2, 3)] offset: u64,
    ) {
        let mut cursor = cursor_at(codec, "\u{10000}ab", offset, CursorOptions::default());
        assert_eq!(Some('a'), cursor.try_read_next_char().unwrap());
        assert_eq!(6, cursor.position());
    }

    #[test]
    fn test_malformed_sequence_reports_absolute_offset() {
        let mut source = Cursor::new(vec![b'x', b'a', b'b', 0xFF, b'c']);
        source.set_position(1);
        let mut cursor = CharCursor::new(source, Codec::Utf8).unwrap();
        let err = cursor.find_map(|ch| ch.err()).unwrap();
        assert!(matches!(
            err,
            PartitionError::MalformedSequence {
                codec: Codec::Utf8,
                offset: 3
            }
        ));
        assert!(cursor.next().is_none());
    }

    #[test]
    fn test_truncated_tail_is_malformed() {
        let mut bytes = Codec::Utf16Le.encode("ab");
        bytes.push(b'c');
        let cursor = CharCursor::with_options(Cursor::new(bytes), Codec::Utf16Le, options(4, 1)).unwrap();
        let results: Vec<Result<char>> = cursor.collect();
        assert_eq!(3, results.len());
        assert!(matches!(
            results[2],
            Err(PartitionError::MalformedSequence { offset: 4, .. })
        ));
    }

    #[test]
    fn test_empty_source() {
        let mut cursor = cursor_at(Codec::Utf8, "", 0, CursorOptions::default());
        assert_eq!(None, cursor.try_read_next_char().unwrap());
        assert_eq!(0, cursor.position());
    }

    #[test]
    fn test_rejects_tiny_blocks() {
        let source = Cursor::new(Vec::<u8>::new());
        assert!(matches!(
            CharCursor::with_options(source, Codec::Utf8, options(3, 8)),
            Err(PartitionError::Misconfiguration(_))
        ));
    }

    /// Starting anywhere, decoding from `next_code_start` yields the same
    /// characters as decoding everything and dropping the ones before it.
    #[test]
    fn char_start_resynchronizes_quickcheck() {
        fn prop(text: String, offset: usize, codec_index: u8) -> bool {
            let codec = [Codec::Utf8, Codec::Utf16Le, Codec::Utf16Be][codec_index as usize % 3];
            let bytes = codec.encode(&text);
            let offset = offset % (bytes.len() + 1);
            let start = codec.next_code_start(&bytes, offset);

            let mut char_start = 0;
            let mut expected = None;
            for (index, ch) in text.char_indices() {
                if char_start >= offset {
                    expected = Some((char_start, text[index..].to_string()));
                    break;
                }
                char_start += codec.encoded_len(ch);
            }
            let (expected_start, expected_rest) = expected.unwrap_or((bytes.len(), String::new()));

            let mut source = Cursor::new(bytes);
            source.set_position(offset as u64);
            let cursor = CharCursor::with_options(source, codec, options(4, 2)).unwrap();
            let decoded: Result<String> = cursor.collect();

            start == expected_start && decoded.map(|rest| rest == expected_rest).unwrap_or(false)
        }

        QuickCheck::new()
            .tests(500)
            .quickcheck(prop as fn(String, usize, u8) -> bool);
    }
}
