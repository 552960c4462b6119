//! Reading and building of the basic offset table,
//! the mandatory first item of an encapsulated pixel data value.
//!
//! When the table is non-empty, it carries one 32-bit byte offset per frame,
//! counted from the first byte after the offset table item
//! to the header of the frame's first fragment.

use crate::item::{self, ItemCursor, ItemValue};
use crate::C;
use byteordered::byteorder::{ByteOrder, LittleEndian};
use snafu::{ensure, ResultExt, Snafu};
use std::io::Read;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Offset table length {} is not a multiple of 4", length))]
    Misaligned { length: usize },

    #[snafu(display("Missing offset table item"))]
    MissingTable,

    #[snafu(display("Could not read offset table item"))]
    ReadItem { source: item::Error },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Read the basic offset table from a cursor positioned
/// at the beginning of the encapsulated pixel data value.
///
/// Returns `None` if the offset table item is present but empty,
/// meaning that the frame boundaries are not declared.
pub fn read_offset_table<S>(cursor: &mut ItemCursor<S>) -> Result<Option<C<u32>>>
where
    S: Read,
{
    let value = match cursor.read_item().context(ReadItemSnafu)? {
        Some(ItemValue::Value(value)) => value,
        Some(ItemValue::Delimiter) | None => return MissingTableSnafu.fail(),
    };
    ensure!(
        value.len() % 4 == 0,
        MisalignedSnafu {
            length: value.len()
        }
    );
    if value.is_empty() {
        return Ok(None);
    }
    let mut offsets = vec![0u32; value.len() / 4];
    LittleEndian::read_u32_into(&value, &mut offsets);
    Ok(Some(C::from_vec(offsets)))
}

/// Compute the starting byte offset of each frame
/// from the byte lengths of every frame's fragments,
/// accounting for the 8-byte item header preceding each fragment.
///
/// The fragment lengths are expected to already include
/// any trailing padding to an even length.
pub fn build_offset_table<F, I>(fragment_lengths: F) -> C<u32>
where
    F: IntoIterator<Item = I>,
    I: IntoIterator<Item = u32>,
{
    let mut offsets = C::new();
    let mut current = 0;
    for frame in fragment_lengths {
        offsets.push(current);
        for length in frame {
            current += 8 + length;
        }
    }
    offsets
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn empty_table_means_unknown_boundaries() {
        let data = [0xFE, 0xFF, 0x00, 0xE0, 0x00, 0x00, 0x00, 0x00];
        let mut cursor = ItemCursor::new(Cursor::new(&data[..]));
        assert_eq!(read_offset_table(&mut cursor).unwrap(), None);
        assert_eq!(cursor.position(), 8);
    }

    #[test]
    fn offsets_are_decoded_in_order() {
        let data = [
            0xFE, 0xFF, 0x00, 0xE0, 0x0C, 0x00, 0x00, 0x00, // table, length 12
            0x00, 0x00, 0x00, 0x00, // 0
            0x0C, 0x00, 0x00, 0x00, // 12
            0x18, 0x00, 0x00, 0x00, // 24
        ];
        let mut cursor = ItemCursor::new(Cursor::new(&data[..]));
        let offsets = read_offset_table(&mut cursor).unwrap().unwrap();
        assert_eq!(&offsets[..], &[0, 12, 24]);
    }

    #[test]
    fn misaligned_table_is_an_error() {
        let data = [
            0xFE, 0xFF, 0x00, 0xE0, 0x06, 0x00, 0x00, 0x00, // table, length 6
            0x00, 0x00, 0x00, 0x00, 0x0C, 0x00,
        ];
        let mut cursor = ItemCursor::new(Cursor::new(&data[..]));
        assert!(matches!(
            read_offset_table(&mut cursor),
            Err(Error::Misaligned { length: 6 }),
        ));
    }

    #[test]
    fn offsets_accumulate_fragment_and_header_lengths() {
        // 3 frames of a single 4-byte fragment each
        let offsets = build_offset_table(vec![vec![4], vec![4], vec![4]]);
        assert_eq!(&offsets[..], &[0, 12, 24]);

        // 2 frames split into uneven fragments
        let offsets = build_offset_table(vec![vec![6, 2], vec![10]]);
        assert_eq!(&offsets[..], &[0, 24]);
    }
}
