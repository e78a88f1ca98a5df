//! Encoding detection from a leading byte-order mark.

use std::io::{Read, Seek, SeekFrom};

use log::debug;

use crate::codec::Codec;
use crate::error::Result;

/// The codec whose byte-order mark `prefix` starts with, if any.
pub fn codec_from_bom(prefix: &[u8]) -> Option<Codec> {
    [Codec::Utf8, Codec::Utf16Le, Codec::Utf16Be]
        .into_iter()
        .find(|codec| prefix.starts_with(codec.bom()))
}

/// Sniffs the first bytes of `source` for a byte-order mark, falling back to
/// UTF-8. The source is left at position 0.
pub fn detect_codec<R: Read + Seek>(source: &mut R) -> Result<Codec> {
    source.seek(SeekFrom::Start(0))?;
    let mut prefix = Vec::with_capacity(3);
    source.by_ref().take(3).read_to_end(&mut prefix)?;
    source.seek(SeekFrom::Start(0))?;

    let codec = match codec_from_bom(&prefix) {
        Some(codec) => {
            debug!("detected {codec} byte-order mark");
            codec
        }
        None => {
            debug!("no byte-order mark, assuming {}", Codec::Utf8);
            Codec::Utf8
        }
    };
    Ok(codec)
}
