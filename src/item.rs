//! Reading and writing of the length-prefixed items
//! which make up an encapsulated pixel data value:
//! the basic offset table, the pixel data fragments,
//! and the sequence delimiter closing the value.

use byteordered::byteorder::{ByteOrder, LittleEndian};
use byteordered::ByteOrdered;
use snafu::{ensure, ResultExt, Snafu};
use std::fmt;
use std::io::{Read, Write};
use tracing::warn;

/// An attribute tag, as a pair of 16-bit group and element numbers.
#[derive(PartialEq, Eq, Hash, Copy, Clone, PartialOrd, Ord)]
pub struct Tag(pub u16, pub u16);

impl Tag {
    /// Getter for the tag's group value.
    #[inline]
    pub fn group(self) -> u16 {
        self.0
    }

    /// Getter for the tag's element value.
    #[inline]
    pub fn element(self) -> u16 {
        self.1
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Tag({:#06X?}, {:#06X?})", self.0, self.1)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({:04X},{:04X})", self.0, self.1)
    }
}

/// The tag of an item in a pixel sequence.
pub const ITEM: Tag = Tag(0xFFFE, 0xE000);

/// The tag of the delimiter terminating a pixel sequence.
pub const SEQUENCE_DELIMITER: Tag = Tag(0xFFFE, 0xE0DD);

/// The length value reserved for elements of undefined length,
/// which is not admissible in offset table or fragment items.
const UNDEFINED_LENGTH: u32 = 0xFFFF_FFFF;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display(
        "Unexpected tag {} at offset {:#x}, expected item or sequence delimiter",
        tag,
        offset
    ))]
    UnexpectedTag { tag: Tag, offset: u64 },

    #[snafu(display("Undefined length in item at offset {:#x}", offset))]
    UndefinedLength { offset: u64 },

    #[snafu(display("Could not read item header at offset {:#x}", offset))]
    ReadHeader { offset: u64, source: std::io::Error },

    #[snafu(display(
        "Could not read {} bytes of item value at offset {:#x}",
        length,
        offset
    ))]
    ReadValue {
        length: u32,
        offset: u64,
        source: std::io::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The outcome of reading a single item from a pixel sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemValue {
    /// the value bytes of an offset table or fragment item
    Value(Vec<u8>),
    /// the sequence delimiter, closing the pixel sequence
    Delimiter,
}

/// A pull-based reader over the value bytes of an encapsulated
/// pixel data element, yielding one item at a time
/// while keeping track of the number of bytes read so far.
///
/// The source is only required to support sequential reading.
/// Since it is advanced as items are read out,
/// the cursor is single-pass and not restartable,
/// but multiple cursors over independent sources
/// of the same read-only data are safe.
#[derive(Debug)]
pub struct ItemCursor<S> {
    source: S,
    position: u64,
}

impl<S> ItemCursor<S>
where
    S: Read,
{
    /// Create a new cursor reading from the given source,
    /// which should be positioned at the beginning of an item header.
    pub fn new(source: S) -> Self {
        ItemCursor {
            source,
            position: 0,
        }
    }

    /// Retrieve the number of bytes consumed so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Retrieve the underlying source.
    pub fn into_inner(self) -> S {
        self.source
    }

    /// Read one item from the source.
    ///
    /// Returns `Ok(None)` if the source is exhausted
    /// exactly at an item boundary.
    /// A sequence delimiter is reported without reading a value,
    /// even if its length field is not zero.
    pub fn read_item(&mut self) -> Result<Option<ItemValue>> {
        let offset = self.position;
        let mut header = [0u8; 8];
        let n = self
            .source
            .read(&mut header)
            .context(ReadHeaderSnafu { offset })?;
        if n == 0 {
            return Ok(None);
        }
        self.source
            .read_exact(&mut header[n..])
            .context(ReadHeaderSnafu { offset })?;
        self.position += 8;

        let tag = Tag(
            LittleEndian::read_u16(&header[0..2]),
            LittleEndian::read_u16(&header[2..4]),
        );
        let length = LittleEndian::read_u32(&header[4..8]);

        match tag {
            SEQUENCE_DELIMITER => {
                if length != 0 {
                    // tolerated, the delimiter carries no value regardless
                    warn!(
                        "Sequence delimiter at offset {:#x} has non-zero length {}",
                        offset, length
                    );
                }
                Ok(Some(ItemValue::Delimiter))
            }
            ITEM => {
                ensure!(length != UNDEFINED_LENGTH, UndefinedLengthSnafu { offset });
                let mut value = vec![0; length as usize];
                self.source
                    .read_exact(&mut value)
                    .context(ReadValueSnafu { length, offset })?;
                self.position += u64::from(length);
                Ok(Some(ItemValue::Value(value)))
            }
            tag => UnexpectedTagSnafu { tag, offset }.fail(),
        }
    }
}

/// Serialize one item with the given value bytes,
/// including the item header.
///
/// The caller is responsible for providing a value of even length.
pub fn write_item<W>(to: W, value: &[u8]) -> std::io::Result<()>
where
    W: Write,
{
    let mut to = ByteOrdered::le(to);
    to.write_u16(ITEM.group())?;
    to.write_u16(ITEM.element())?;
    to.write_u32(value.len() as u32)?;
    to.write_all(value)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn read_single_item() {
        let data = [
            0xFE, 0xFF, 0x00, 0xE0, 0x04, 0x00, 0x00, 0x00, // item, length 4
            0x01, 0x02, 0x03, 0x04,
        ];
        let mut cursor = ItemCursor::new(Cursor::new(&data[..]));
        assert_eq!(
            cursor.read_item().unwrap(),
            Some(ItemValue::Value(vec![0x01, 0x02, 0x03, 0x04])),
        );
        assert_eq!(cursor.position(), 12);
        assert_eq!(cursor.read_item().unwrap(), None);
    }

    #[test]
    fn delimiter_with_non_zero_length_is_tolerated() {
        let data = [
            0xFE, 0xFF, 0xDD, 0xE0, 0x0A, 0x00, 0x00, 0x00, // delimiter, length 10
        ];
        let mut cursor = ItemCursor::new(Cursor::new(&data[..]));
        assert_eq!(cursor.read_item().unwrap(), Some(ItemValue::Delimiter));
    }

    #[test]
    fn undefined_length_is_reported_at_the_item_offset() {
        let data = [
            0xFE, 0xFF, 0x00, 0xE0, 0x02, 0x00, 0x00, 0x00, // item, length 2
            0xAA, 0xBB, //
            0xFE, 0xFF, 0x00, 0xE0, 0xFF, 0xFF, 0xFF, 0xFF, // item, undefined length
        ];
        let mut cursor = ItemCursor::new(Cursor::new(&data[..]));
        cursor.read_item().unwrap();
        match cursor.read_item() {
            Err(Error::UndefinedLength { offset }) => assert_eq!(offset, 10),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn unexpected_tag_is_an_error() {
        let data = [
            0x08, 0x00, 0x18, 0x00, 0x02, 0x00, 0x00, 0x00, // not an item tag
            0x41, 0x42,
        ];
        let mut cursor = ItemCursor::new(Cursor::new(&data[..]));
        match cursor.read_item() {
            Err(Error::UnexpectedTag { tag, offset }) => {
                assert_eq!(tag, Tag(0x0008, 0x0018));
                assert_eq!(offset, 0);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn write_item_serializes_header_and_value() {
        let mut out = Vec::new();
        write_item(&mut out, &[0x01, 0x02, 0x03, 0x04]).unwrap();
        assert_eq!(
            out,
            vec![0xFE, 0xFF, 0x00, 0xE0, 0x04, 0x00, 0x00, 0x00, 0x01, 0x02, 0x03, 0x04],
        );
    }
}
