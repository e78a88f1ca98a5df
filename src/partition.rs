//! Splitting a text source into line-aligned byte ranges.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::ops::Range;
use std::path::Path;

use log::debug;

use crate::bom::detect_codec;
use crate::bounded::BoundedView;
use crate::codec::Codec;
use crate::cursor::{CharCursor, CursorOptions};
use crate::error::{PartitionError, Result};
use crate::lines::LineReader;
use crate::source::ByteSource;

/// Computes where each of `partitions` similarly sized partitions of
/// `source` starts.
///
/// Every start is the byte right after a `\n`, or the end of the source when
/// there are fewer lines than partitions; the first start is always 0. The
/// source is left at position 0.
pub fn partition_starts<R: ByteSource>(source: &mut R, partitions: usize, codec: Codec) -> Result<Vec<u64>> {
    partition_starts_with(source, partitions, codec, CursorOptions::default())
}

/// [`partition_starts`] with explicit cursor block sizes for the line scans.
pub fn partition_starts_with<R: ByteSource>(
    source: &mut R,
    partitions: usize,
    codec: Codec,
    options: CursorOptions,
) -> Result<Vec<u64>> {
    if partitions == 0 {
        return Err(PartitionError::Misconfiguration(
            "partition count must be positive".to_string(),
        ));
    }
    options.validate()?;

    let total = source.byte_len()?;
    let size = total / partitions as u64;
    let mut starts: Vec<u64> = (0..partitions as u64)
        .map(|i| i * size + codec.alignment(i * size))
        .collect();

    for i in 1..partitions {
        if starts[i - 1] >= total {
            debug!("partition {i} is empty");
            starts[i] = total;
            continue;
        }
        // an earlier line scan may already have run past this candidate
        if starts[i - 1] >= starts[i] {
            starts[i] = starts[i - 1];
        }
        source.seek(SeekFrom::Start(starts[i]))?;
        starts[i] = find_next_line_start_with(source, codec, options)?.unwrap_or(total);
        debug!("partition {i} starts at byte {}", starts[i]);
    }

    source.seek(SeekFrom::Start(0))?;
    Ok(starts)
}

/// Byte offset right after the first `\n` at or past the source's current
/// position, or `None` if no line feed follows.
pub fn find_next_line_start<R: Read + Seek>(source: &mut R, codec: Codec) -> Result<Option<u64>> {
    find_next_line_start_with(source, codec, CursorOptions::default())
}

fn find_next_line_start_with<R: Read + Seek>(
    source: &mut R,
    codec: Codec,
    options: CursorOptions,
) -> Result<Option<u64>> {
    let mut chars = CharCursor::with_options(source, codec, options)?;
    while let Some(ch) = chars.try_read_next_char()? {
        if ch == '\n' {
            return Ok(Some(chars.position()));
        }
    }
    Ok(None)
}

/// Turns partition starts into contiguous ranges, the last one ending at
/// `total`.
pub fn partition_ranges(starts: &[u64], total: u64) -> Vec<Range<u64>> {
    starts
        .iter()
        .zip(starts.iter().skip(1).chain(Some(&total)))
        .map(|(&start, &end)| start..end)
        .collect()
}

/// Partitions the data behind `sources` and restricts each source to its own
/// partition.
///
/// All sources must hold the same bytes; one partition is made per source.
/// The first source is also used for the boundary scan.
pub fn partition_byte_ranges<R: ByteSource>(mut sources: Vec<R>, codec: Codec) -> Result<Vec<BoundedView<R>>> {
    let partitions = sources.len();
    let first = sources.first_mut().ok_or_else(no_sources)?;
    let total = first.byte_len()?;
    let starts = partition_starts(first, partitions, codec)?;

    sources
        .into_iter()
        .zip(partition_ranges(&starts, total))
        .map(|(source, range)| {
            if range.start >= total {
                BoundedView::at_end(source)
            } else {
                BoundedView::new(source, range.start, range.end - range.start)
            }
        })
        .collect()
}

/// Partitions the data behind `sources` into one line reader per source.
///
/// Without an explicit `codec`, it is detected from a byte-order mark at the
/// start of the first source.
pub fn partition_readers<R: ByteSource>(
    mut sources: Vec<R>,
    codec: Option<Codec>,
) -> Result<Vec<LineReader<BoundedView<R>>>> {
    let codec = match codec {
        Some(codec) => codec,
        None => detect_codec(sources.first_mut().ok_or_else(no_sources)?)?,
    };
    partition_byte_ranges(sources, codec)?
        .into_iter()
        .map(|view| -> Result<LineReader<BoundedView<R>>> {
            let at_file_start = view.start() == 0;
            Ok(LineReader::new(view, codec)?.strip_bom(at_file_start))
        })
        .collect()
}

/// Opens `path` once per partition and returns a line reader for each.
pub fn open_partitions<P: AsRef<Path>>(
    path: P,
    partitions: usize,
    codec: Option<Codec>,
) -> Result<Vec<LineReader<BoundedView<File>>>> {
    let path = path.as_ref();
    if partitions == 0 {
        return Err(PartitionError::Misconfiguration(
            "partition count must be positive".to_string(),
        ));
    }
    let files = (0..partitions)
        .map(|_| File::open(path))
        .collect::<io::Result<Vec<_>>>()?;
    debug!("opened {} handles on {}", partitions, path.display());
    partition_readers(files, codec)
}

fn no_sources() -> PartitionError {
    PartitionError::Misconfiguration("at least one source is required".to_string())
}
