use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek};

/// A seekable byte container with a fixed total length.
pub trait ByteSource: Read + Seek {
    /// Total number of bytes in the source, independent of the current position.
    fn byte_len(&self) -> io::Result<u64>;
}

impl ByteSource for File {
    fn byte_len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }
}

impl<T: AsRef<[u8]>> ByteSource for Cursor<T> {
    fn byte_len(&self) -> io::Result<u64> {
        Ok(self.get_ref().as_ref().len() as u64)
    }
}

impl<R: ByteSource> ByteSource for BufReader<R> {
    fn byte_len(&self) -> io::Result<u64> {
        self.get_ref().byte_len()
    }
}

impl<R: ByteSource + ?Sized> ByteSource for &mut R {
    fn byte_len(&self) -> io::Result<u64> {
        (**self).byte_len()
    }
}
