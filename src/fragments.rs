//! Lazy assembly of encapsulated pixel data fragments into frames.
//!
//! [`FragmentIterator`] walks the fragment items of a pixel sequence
//! one at a time, while [`FrameIterator`] concatenates them
//! into one byte buffer per frame,
//! using the basic offset table to locate the frame boundaries
//! whenever one is declared.

use crate::item::{self, ItemCursor, ItemValue};
use crate::offset_table::{self, read_offset_table};
use crate::C;
use snafu::{ensure, ResultExt, Snafu};
use std::collections::VecDeque;
use std::io::Read;
use tracing::warn;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Could not read fragment item"))]
    ReadFragment { source: item::Error },

    #[snafu(display("Could not read basic offset table"))]
    ReadOffsetTable { source: offset_table::Error },

    #[snafu(display("Offset table is not strictly increasing from 0"))]
    InvalidOffsetTable,

    #[snafu(display(
        "Frame boundary at offset {} falls inside a fragment (next fragment starts at {})",
        boundary,
        fragment_offset
    ))]
    FragmentStraddlesBoundary { fragment_offset: u64, boundary: u64 },

    #[snafu(display("Fragment data ended before all {} frames were assembled", nr_frames))]
    MissingFrameData { nr_frames: usize },

    #[snafu(display(
        "Cannot determine the boundaries of {} frames without an offset table",
        nr_frames
    ))]
    UndeterminedBoundaries { nr_frames: u32 },

    #[snafu(display(
        "{} fragments cannot be evenly split into {} frames",
        nr_fragments,
        nr_frames
    ))]
    UnevenFragmentSplit { nr_fragments: usize, nr_frames: u32 },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A single pixel data fragment as read from the container.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    /// the byte offset of the fragment's item header,
    /// counted from the first byte after the basic offset table
    pub offset: u64,
    /// the fragment's value bytes
    pub data: Vec<u8>,
}

/// A lazy, single-pass iterator over the fragments of a pixel sequence.
///
/// Iteration ends at the sequence delimiter
/// or when the source is exhausted, whichever comes first.
#[derive(Debug)]
pub struct FragmentIterator<S> {
    cursor: ItemCursor<S>,
    base: u64,
    done: bool,
}

impl<S> FragmentIterator<S>
where
    S: Read,
{
    /// Create a fragment iterator over a source positioned
    /// at the first fragment item, just after the basic offset table.
    pub fn new(source: S) -> Self {
        Self::with_cursor(ItemCursor::new(source))
    }

    fn with_cursor(cursor: ItemCursor<S>) -> Self {
        FragmentIterator {
            base: cursor.position(),
            cursor,
            done: false,
        }
    }
}

impl<S> Iterator for FragmentIterator<S>
where
    S: Read,
{
    type Item = Result<Fragment>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let offset = self.cursor.position() - self.base;
        match self.cursor.read_item() {
            Ok(Some(ItemValue::Value(data))) => Some(Ok(Fragment { offset, data })),
            Ok(Some(ItemValue::Delimiter)) | Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e).context(ReadFragmentSnafu))
            }
        }
    }
}

/// How to assemble a multi-frame pixel sequence
/// when the basic offset table is empty.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BoundaryFallback {
    /// fail, since the frame boundaries cannot be determined
    #[default]
    Strict,
    /// assume that every frame spans the same number of fragments
    EvenSplit,
}

#[derive(Debug)]
enum Boundaries {
    /// boundaries declared by the offset table
    Offsets {
        offsets: C<u32>,
        next_frame: usize,
        pending: Option<Fragment>,
    },
    /// no boundaries, all fragments form a single frame
    Single,
    /// frames already assembled by the even split fallback
    Split(VecDeque<Vec<u8>>),
}

/// A lazy, single-pass iterator yielding one byte buffer per frame,
/// in frame order.
///
/// A failure while assembling one frame ends the iteration,
/// but assembling the same data again with an independent source
/// is unaffected.
#[derive(Debug)]
pub struct FrameIterator<S> {
    fragments: FragmentIterator<S>,
    boundaries: Boundaries,
    done: bool,
}

impl<S> FrameIterator<S>
where
    S: Read,
{
    /// Read the basic offset table from a source positioned
    /// at the beginning of the encapsulated pixel data value
    /// and set up frame assembly over the remaining fragments.
    ///
    /// A non-empty offset table takes precedence over `number_of_frames`.
    /// Without one, `number_of_frames` worth of frames are produced:
    /// a single frame takes all fragments,
    /// whereas multiple frames are only admitted
    /// under [`BoundaryFallback::EvenSplit`].
    pub fn new(source: S, number_of_frames: u32, fallback: BoundaryFallback) -> Result<Self> {
        let mut cursor = ItemCursor::new(source);
        let table = read_offset_table(&mut cursor).context(ReadOffsetTableSnafu)?;
        let mut fragments = FragmentIterator::with_cursor(cursor);

        let boundaries = match table {
            Some(offsets) => {
                ensure!(
                    offsets[0] == 0 && offsets.windows(2).all(|w| w[0] < w[1]),
                    InvalidOffsetTableSnafu
                );
                if offsets.len() as u32 != number_of_frames {
                    warn!(
                        "Offset table declares {} frames, but {} were expected",
                        offsets.len(),
                        number_of_frames
                    );
                }
                Boundaries::Offsets {
                    offsets,
                    next_frame: 0,
                    pending: None,
                }
            }
            None if number_of_frames <= 1 => Boundaries::Single,
            None => match fallback {
                BoundaryFallback::Strict => {
                    return UndeterminedBoundariesSnafu {
                        nr_frames: number_of_frames,
                    }
                    .fail();
                }
                BoundaryFallback::EvenSplit => {
                    Boundaries::Split(split_evenly(&mut fragments, number_of_frames)?)
                }
            },
        };

        Ok(FrameIterator {
            fragments,
            boundaries,
            done: false,
        })
    }

    /// Concatenate every remaining fragment into a single frame.
    fn collect_single(fragments: &mut FragmentIterator<S>) -> Result<Vec<u8>> {
        let mut frame = Vec::new();
        for fragment in fragments {
            let mut fragment = fragment?;
            frame.append(&mut fragment.data);
        }
        Ok(frame)
    }

    /// Assemble the next frame by walking fragments
    /// up to the boundary declared by the offset table.
    fn next_bounded(
        fragments: &mut FragmentIterator<S>,
        offsets: &C<u32>,
        next_frame: &mut usize,
        pending: &mut Option<Fragment>,
    ) -> Option<Result<Vec<u8>>> {
        if *next_frame >= offsets.len() {
            return None;
        }
        let mut frame = match pending.take() {
            Some(fragment) => fragment.data,
            None => Vec::new(),
        };
        let boundary = offsets.get(*next_frame + 1).map(|&o| u64::from(o));
        loop {
            match fragments.next() {
                Some(Ok(mut fragment)) => match boundary {
                    Some(b) if fragment.offset == b => {
                        // this fragment opens the next frame
                        *pending = Some(fragment);
                        *next_frame += 1;
                        return Some(Ok(frame));
                    }
                    Some(b) if fragment.offset > b => {
                        return Some(
                            FragmentStraddlesBoundarySnafu {
                                fragment_offset: fragment.offset,
                                boundary: b,
                            }
                            .fail(),
                        );
                    }
                    _ => frame.append(&mut fragment.data),
                },
                Some(Err(e)) => return Some(Err(e)),
                None => {
                    if boundary.is_some() {
                        return Some(
                            MissingFrameDataSnafu {
                                nr_frames: offsets.len(),
                            }
                            .fail(),
                        );
                    }
                    *next_frame += 1;
                    return Some(Ok(frame));
                }
            }
        }
    }
}

impl<S> Iterator for FrameIterator<S>
where
    S: Read,
{
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let (out, last) = match &mut self.boundaries {
            Boundaries::Split(frames) => {
                let out = frames.pop_front().map(Ok);
                let last = frames.is_empty();
                (out, last)
            }
            Boundaries::Single => (Some(Self::collect_single(&mut self.fragments)), true),
            Boundaries::Offsets {
                offsets,
                next_frame,
                pending,
            } => {
                let out = Self::next_bounded(&mut self.fragments, offsets, next_frame, pending);
                (out, false)
            }
        };
        if last || matches!(out, None | Some(Err(_))) {
            self.done = true;
        }
        out
    }
}

/// Eagerly divide the fragment stream into `number_of_frames` frames
/// of the same number of fragments each.
fn split_evenly<S>(
    fragments: &mut FragmentIterator<S>,
    number_of_frames: u32,
) -> Result<VecDeque<Vec<u8>>>
where
    S: Read,
{
    let collected: Vec<Fragment> = fragments.collect::<Result<_>>()?;
    ensure!(
        !collected.is_empty(),
        MissingFrameDataSnafu {
            nr_frames: number_of_frames as usize,
        }
    );
    ensure!(
        collected.len() % number_of_frames as usize == 0,
        UnevenFragmentSplitSnafu {
            nr_fragments: collected.len(),
            nr_frames: number_of_frames,
        }
    );
    let per_frame = collected.len() / number_of_frames as usize;
    Ok(collected
        .chunks(per_frame)
        .map(|chunk| {
            let mut frame = Vec::new();
            for fragment in chunk {
                frame.extend_from_slice(&fragment.data);
            }
            frame
        })
        .collect())
}
