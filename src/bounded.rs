//! A read-only window onto part of another byte source.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::ops::Range;

use crate::error::{PartitionError, Result};
use crate::source::ByteSource;

/// Exposes bytes `[start, start + length)` of `inner` as a source of its
/// own. Positions are relative to `start`, and reads stop at the end of the
/// window even when `inner` has more data.
#[derive(Debug)]
pub struct BoundedView<R> {
    inner: R,
    start: u64,
    length: u64,
    /// Position relative to `start`.
    pos: u64,
}

impl<R: ByteSource> BoundedView<R> {
    /// Fails with `InvalidRange` unless `start` lies inside `inner` and the
    /// window ends at or before the end of `inner`.
    pub fn new(mut inner: R, start: u64, length: u64) -> Result<Self> {
        let total = inner.byte_len()?;
        let invalid = PartitionError::InvalidRange {
            start,
            length,
            total,
        };
        if start >= total {
            return Err(invalid);
        }
        match start.checked_add(length) {
            Some(end) if end <= total => {}
            _ => return Err(invalid),
        }
        inner.seek(SeekFrom::Start(start))?;
        Ok(BoundedView {
            inner,
            start,
            length,
            pos: 0,
        })
    }

    /// An empty window sitting at the very end of `inner`.
    pub fn at_end(mut inner: R) -> Result<Self> {
        let total = inner.byte_len()?;
        inner.seek(SeekFrom::Start(total))?;
        Ok(BoundedView {
            inner,
            start: total,
            length: 0,
            pos: 0,
        })
    }
}

impl<R> BoundedView<R> {
    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// The window in the coordinates of the underlying source.
    pub fn range(&self) -> Range<u64> {
        self.start..self.start + self.length
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for BoundedView<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.length {
            return Ok(0);
        }
        let remaining = self.length - self.pos;
        let count = (buf.len() as u64).min(remaining) as usize;
        let n = self.inner.read(&mut buf[..count])?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl<R: Seek> Seek for BoundedView<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
            SeekFrom::End(_) => {
                return Err(
                    PartitionError::UnsupportedOperation("seek from the end of a bounded view").into(),
                );
            }
        };
        let target = target
            .filter(|relative| relative.checked_add(self.start).is_some())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "invalid seek to a negative or overflowing position",
                )
            })?;
        self.inner.seek(SeekFrom::Start(self.start + target))?;
        self.pos = target;
        Ok(target)
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.pos)
    }
}

impl<R> Write for BoundedView<R> {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(PartitionError::UnsupportedOperation("write to a bounded view").into())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<R: ByteSource> ByteSource for BoundedView<R> {
    fn byte_len(&self) -> io::Result<u64> {
        Ok(self.length)
    }
}
