//! Line-at-a-time reading on top of [`CharCursor`].

use std::io::{Read, Seek};

use crate::codec::Codec;
use crate::cursor::{CharCursor, CursorOptions};
use crate::error::Result;

/// Big enough blocks that refills never re-read bytes for single-byte text.
const LINE_READER_OPTIONS: CursorOptions = CursorOptions {
    byte_block_size: 8192,
    char_block_size: 8192,
};

const BYTE_ORDER_MARK: char = '\u{FEFF}';

/// Decodes a byte source and hands it out one line at a time.
///
/// Lines end at `\n`. [`LineReader::next_line`] and the `Iterator` impl strip
/// the `\n` and a `\r` right before it; [`LineReader::read_line`] keeps both.
pub struct LineReader<R> {
    chars: CharCursor<R>,
    strip_bom: bool,
}

impl<R: Read + Seek> LineReader<R> {
    /// Reads from the source's current position. A leading byte-order mark is
    /// dropped unless disabled with [`LineReader::strip_bom`].
    pub fn new(source: R, codec: Codec) -> Result<Self> {
        Ok(LineReader {
            chars: CharCursor::with_options(source, codec, LINE_READER_OPTIONS)?,
            strip_bom: true,
        })
    }

    /// Whether a byte-order mark at the very start is dropped.
    pub fn strip_bom(mut self, strip: bool) -> Self {
        self.strip_bom = strip;
        self
    }

    pub fn codec(&self) -> Codec {
        self.chars.codec()
    }

    pub fn get_ref(&self) -> &R {
        self.chars.get_ref()
    }

    pub fn into_inner(self) -> R {
        self.chars.into_inner()
    }

    /// Appends the next line, terminator included, to `buf`. Returns the
    /// number of bytes appended; 0 means end of input.
    pub fn read_line(&mut self, buf: &mut String) -> Result<usize> {
        let before = buf.len();
        while let Some(ch) = self.chars.try_read_next_char()? {
            if self.strip_bom {
                self.strip_bom = false;
                if ch == BYTE_ORDER_MARK {
                    continue;
                }
            }
            buf.push(ch);
            if ch == '\n' {
                break;
            }
        }
        self.strip_bom = false;
        Ok(buf.len() - before)
    }

    /// The next line without its terminator, or `None` at end of input.
    pub fn next_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        if self.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(Some(line))
    }
}

impl<R: Read + Seek> Iterator for LineReader<R> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_line().transpose()
    }
}
