//! Split a large text file into N contiguous byte ranges of whole lines, so
//! that N independent readers can each work through a similarly sized block
//! without scanning the whole file first.
//!
//! Supported encodings are UTF-8 and UTF-16 in either byte order. Boundaries
//! are found by decoding forward from an evenly spaced guess to the next line
//! feed, never starting mid-character.
//!
//! ```no_run
//! use text_partition::{open_partitions, Codec};
//!
//! let readers = open_partitions("big.log", 4, Some(Codec::Utf8))?;
//! for reader in readers {
//!     for line in reader {
//!         let _line = line?;
//!     }
//! }
//! # Ok::<(), text_partition::PartitionError>(())
//! ```

mod bom;
mod bounded;
mod codec;
mod cursor;
mod decoder;
mod error;
mod lines;
mod partition;
mod source;

pub use bom::{codec_from_bom, detect_codec};
pub use bounded::BoundedView;
pub use codec::{is_utf8_char_start, utf8_sequence_len, Codec};
pub use cursor::{CharCursor, CursorOptions};
pub use decoder::{Conversion, Decoder};
pub use error::{PartitionError, Result};
pub use lines::LineReader;
pub use partition::{
    find_next_line_start, open_partitions, partition_byte_ranges, partition_ranges, partition_readers,
    partition_starts, partition_starts_with,
};
pub use source::ByteSource;
