//! Containers and codecs for encapsulated DICOM pixel data.
//!
//! This crate handles the value of an encapsulated Pixel Data element
//! as a self-contained binary format:
//! a basic offset table item followed by a run of fragment items,
//! plus the run-length codec of the RLE Lossless transfer syntax.
//! It converts between that container and ordered per-frame byte buffers,
//! leaving the enclosing element's header, the data set dictionary,
//! and all pixel value interpretation to the surrounding library.
//!
//! All APIs are based on synchronous I/O over caller-owned buffers
//! or sequential readers.
//!
//! # Example
//!
//! ```
//! use std::io::Cursor;
//! use dicom_encaps::{encapsulate, BoundaryFallback, FrameIterator};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let frames = vec![
//!     vec![0x01, 0x02, 0x03, 0x04],
//!     vec![0x05, 0x06, 0x07, 0x08],
//! ];
//! let encapsulated = encapsulate(&frames, 1, true)?;
//!
//! let decoded = FrameIterator::new(Cursor::new(&encapsulated), 2, BoundaryFallback::Strict)?
//!     .collect::<Result<Vec<_>, _>>()?;
//! assert_eq!(decoded, frames);
//! # Ok(())
//! # }
//! ```

pub mod encapsulation;
pub mod fragments;
pub mod item;
pub mod offset_table;
pub mod rle;

use smallvec::SmallVec;

/// The type of collection used throughout this crate
/// for small sequences such as offset tables.
pub type C<T> = SmallVec<[T; 2]>;

pub use byteordered::Endianness;
pub use encapsulation::{encapsulate, fragment_frame, itemise_frame};
pub use fragments::{BoundaryFallback, Fragment, FragmentIterator, FrameIterator};
pub use item::{write_item, ItemCursor, ItemValue, Tag};
pub use offset_table::{build_offset_table, read_offset_table};
pub use rle::{decode_frame, encode_frame, FrameDimensions};
