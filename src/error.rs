use std::io;

use thiserror::Error;

use crate::codec::Codec;

pub type Result<T> = std::result::Result<T, PartitionError>;

#[derive(Error, Debug)]
pub enum PartitionError {
    #[error("byte range {start}..{start}+{length} is outside a source of {total} bytes")]
    InvalidRange { start: u64, length: u64, total: u64 },
    #[error("malformed {codec} sequence at byte offset {offset}")]
    MalformedSequence { codec: Codec, offset: u64 },
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(&'static str),
    #[error("misconfiguration: {0}")]
    Misconfiguration(String),
    #[error("IO error: {0}")]
    Io(io::Error),
}

impl PartitionError {
    /// Moves a decoding offset from stream-relative to source-absolute
    /// coordinates. Other variants pass through.
    pub(crate) fn offset_by(self, base: u64) -> Self {
        match self {
            PartitionError::MalformedSequence { codec, offset } => {
                PartitionError::MalformedSequence {
                    codec,
                    offset: base + offset,
                }
            }
            other => other,
        }
    }
}

impl From<io::Error> for PartitionError {
    fn from(err: io::Error) -> Self {
        // Errors raised by our own `Read`/`Seek` impls come back wrapped.
        if !err
            .get_ref()
            .is_some_and(|inner| inner.is::<PartitionError>())
        {
            return PartitionError::Io(err);
        }
        let kind = err.kind();
        match err.into_inner().map(|inner| inner.downcast::<PartitionError>()) {
            Some(Ok(inner)) => *inner,
            Some(Err(other)) => PartitionError::Io(io::Error::new(kind, other)),
            None => PartitionError::Io(io::Error::from(kind)),
        }
    }
}

impl From<PartitionError> for io::Error {
    fn from(err: PartitionError) -> Self {
        let kind = match err {
            PartitionError::Io(inner) => return inner,
            PartitionError::InvalidRange { .. } => io::ErrorKind::InvalidInput,
            PartitionError::MalformedSequence { .. } => io::ErrorKind::InvalidData,
            PartitionError::UnsupportedOperation(_) => io::ErrorKind::Unsupported,
            PartitionError::Misconfiguration(_) => io::ErrorKind::InvalidInput,
        };
        io::Error::new(kind, err)
    }
}
