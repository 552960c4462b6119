//! Encapsulation of compressed frame data into a pixel sequence.
//!
//! Frames are split into even-length fragments,
//! wrapped in items and preceded by a basic offset table,
//! producing the value bytes of an encapsulated pixel data element.
//! Wrapping the result in the element's own header
//! and appending the sequence delimiter
//! is left to the enclosing data set writer.

use crate::item::write_item;
use crate::offset_table::build_offset_table;
use crate::C;
use snafu::{ensure, ResultExt, Snafu};

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Cannot split a frame into zero fragments"))]
    ZeroFragments,

    #[snafu(display(
        "Cannot split a frame of {} bytes into {} fragments",
        frame_length,
        nr_fragments
    ))]
    TooManyFragments {
        frame_length: usize,
        nr_fragments: u32,
    },

    #[snafu(display("Could not write item"))]
    WriteItem { source: std::io::Error },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Split a frame into `nr_fragments` fragments of even length.
///
/// All fragments take the same byte budget,
/// the frame length divided by the fragment count,
/// rounded up to the next even number;
/// the last fragment takes the remainder
/// and a single zero byte of padding if that remainder is odd.
///
/// Every fragment needs at least two bytes after padding,
/// so at most `1 + frame.len() / 2` fragments can be requested.
pub fn fragment_frame(frame: &[u8], nr_fragments: u32) -> Result<C<Vec<u8>>> {
    ensure!(nr_fragments != 0, ZeroFragmentsSnafu);
    let frame_length = frame.len();
    ensure!(
        u64::from(nr_fragments) <= 1 + frame_length as u64 / 2,
        TooManyFragmentsSnafu {
            frame_length,
            nr_fragments,
        }
    );
    let nr_fragments = nr_fragments as usize;
    let mut budget = (frame_length + nr_fragments - 1) / nr_fragments;
    if budget % 2 != 0 {
        budget += 1;
    }

    let mut fragments = C::with_capacity(nr_fragments);
    let mut rest = frame;
    for _ in 0..nr_fragments - 1 {
        // never carve an odd prefix, the spare byte shifts to the last fragment
        let taken = budget.min(rest.len() & !1);
        let (piece, tail) = rest.split_at(taken);
        fragments.push(piece.to_vec());
        rest = tail;
    }
    let mut last = rest.to_vec();
    if last.len() % 2 != 0 {
        last.push(0);
    }
    fragments.push(last);
    Ok(fragments)
}

/// Split a frame into `nr_fragments` fragments
/// and serialize them as a run of items.
pub fn itemise_frame(frame: &[u8], nr_fragments: u32) -> Result<Vec<u8>> {
    let fragments = fragment_frame(frame, nr_fragments)?;
    let mut out = Vec::with_capacity(fragments.iter().map(|f| 8 + f.len()).sum());
    for fragment in &fragments {
        write_item(&mut out, fragment).context(WriteItemSnafu)?;
    }
    Ok(out)
}

/// Serialize the full encapsulated pixel data value for the given frames,
/// splitting every frame into `fragments_per_frame` fragments.
///
/// The first item is always the basic offset table:
/// a table of frame starting offsets if `include_offset_table` is set,
/// an empty item otherwise.
pub fn encapsulate(
    frames: &[Vec<u8>],
    fragments_per_frame: u32,
    include_offset_table: bool,
) -> Result<Vec<u8>> {
    let mut frame_fragments = Vec::with_capacity(frames.len());
    for frame in frames {
        frame_fragments.push(fragment_frame(frame, fragments_per_frame)?);
    }

    let mut out = Vec::new();
    if include_offset_table {
        let offsets = build_offset_table(
            frame_fragments
                .iter()
                .map(|fragments| fragments.iter().map(|f| f.len() as u32)),
        );
        let mut table = Vec::with_capacity(offsets.len() * 4);
        for offset in offsets {
            table.extend_from_slice(&offset.to_le_bytes());
        }
        write_item(&mut out, &table).context(WriteItemSnafu)?;
    } else {
        write_item(&mut out, &[]).context(WriteItemSnafu)?;
    }

    for fragments in &frame_fragments {
        for fragment in fragments {
            write_item(&mut out, fragment).context(WriteItemSnafu)?;
        }
    }
    Ok(out)
}
