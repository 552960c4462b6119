//! Codec for the frame layout of the RLE Lossless transfer syntax.
//!
//! An RLE compressed frame is a 64-byte header
//! declaring up to 15 segment start offsets,
//! followed by one run-length encoded segment
//! per (sample, byte position) plane of the image.
//! Decoded frames are laid out as little endian pixel data
//! in planar configuration 1.
//!
//! See <http://dicom.nema.org/medical/Dicom/2018d/output/chtml/part05/chapter_G.html>

pub mod segment;

use self::segment::{decode_segment, encode_segment};
use byteordered::byteorder::{ByteOrder, LittleEndian};
use byteordered::Endianness;
use snafu::{ensure, Snafu};
use tracing::warn;

/// The fixed byte length of the RLE header.
pub const HEADER_LENGTH: usize = 64;

/// The maximum number of segments the RLE header can declare.
pub const MAX_SEGMENTS: usize = 15;

/// The image attributes ruling the layout of a single frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct FrameDimensions {
    pub rows: u16,
    pub columns: u16,
    pub samples_per_pixel: u16,
    pub bits_allocated: u16,
}

impl FrameDimensions {
    /// The number of bytes of a single decoded sample value.
    pub fn bytes_per_sample(&self) -> usize {
        (self.bits_allocated / 8) as usize
    }

    /// The number of RLE segments a frame of these dimensions occupies,
    /// one per sample and byte position.
    pub fn segment_count(&self) -> usize {
        self.samples_per_pixel as usize * self.bytes_per_sample()
    }

    /// The number of bytes of one decoded plane: rows × columns.
    pub fn plane_length(&self) -> usize {
        self.rows as usize * self.columns as usize
    }

    /// The total byte length of a decoded frame.
    pub fn frame_length(&self) -> usize {
        self.plane_length() * self.segment_count()
    }
}

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum DecodeError {
    #[snafu(display("Bits allocated {} is not a multiple of 8", bits_allocated))]
    UnsupportedBitsAllocated { bits_allocated: u16 },

    #[snafu(display(
        "Frame of {} bytes is too short for the {}-byte RLE header",
        length,
        HEADER_LENGTH
    ))]
    HeaderOutOfBounds { length: usize },

    #[snafu(display(
        "RLE header declares {} segments, expected between 1 and {}",
        nr_segments,
        MAX_SEGMENTS
    ))]
    InvalidSegmentCount { nr_segments: u32 },

    #[snafu(display("RLE header declares {} segments, expected {}", nr_segments, expected))]
    SegmentCountMismatch { nr_segments: u32, expected: usize },

    #[snafu(display("Segment {} starts at invalid offset {}", index, offset))]
    InvalidSegmentOffset { index: usize, offset: u32 },

    #[snafu(display(
        "Decoded segment {} has {} bytes, expected at least {}",
        index,
        length,
        expected
    ))]
    SegmentTooShort {
        index: usize,
        length: usize,
        expected: usize,
    },
}

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum EncodeError {
    #[snafu(display("Bits allocated {} is not a multiple of 8", bits_allocated))]
    #[snafu(context(suffix(EncodeSnafu)))]
    UnsupportedBitsAllocated { bits_allocated: u16 },

    #[snafu(display(
        "Frame layout requires {} segments, but the RLE header fits at most {}",
        nr_segments,
        MAX_SEGMENTS
    ))]
    TooManySegments { nr_segments: usize },

    #[snafu(display("Pixel buffer has {} bytes, expected {}", length, expected))]
    FrameLengthMismatch { length: usize, expected: usize },
}

pub type DecodeResult<T, E = DecodeError> = Result<T, E>;

pub type EncodeResult<T, E = EncodeError> = Result<T, E>;

/// Read the segment start offsets declared by the RLE header
/// and append the frame length as a sentinel end offset,
/// so that segment `i` spans `offsets[i]..offsets[i + 1]`.
fn read_segment_offsets(data: &[u8], expected: usize) -> DecodeResult<Vec<usize>> {
    ensure!(
        data.len() >= HEADER_LENGTH,
        HeaderOutOfBoundsSnafu { length: data.len() }
    );
    let nr_segments = LittleEndian::read_u32(&data[0..4]);
    ensure!(
        (1..=MAX_SEGMENTS as u32).contains(&nr_segments),
        InvalidSegmentCountSnafu { nr_segments }
    );
    ensure!(
        nr_segments as usize == expected,
        SegmentCountMismatchSnafu {
            nr_segments,
            expected,
        }
    );
    let mut declared = vec![0u32; expected];
    LittleEndian::read_u32_into(&data[4..4 + 4 * expected], &mut declared);

    let mut offsets = Vec::with_capacity(expected + 1);
    let mut previous = HEADER_LENGTH as u32;
    for (index, &offset) in declared.iter().enumerate() {
        ensure!(
            offset >= previous && offset as usize <= data.len(),
            InvalidSegmentOffsetSnafu { index, offset }
        );
        offsets.push(offset as usize);
        previous = offset;
    }
    offsets.push(data.len());
    Ok(offsets)
}

/// Decode a full RLE frame into little endian pixel data
/// in planar configuration 1.
///
/// `segment_order` selects the byte significance order of the stored planes:
/// [`Endianness::Big`] for the standard order,
/// where the most significant byte's plane of each sample comes first,
/// or [`Endianness::Little`] to accept data from non-conformant encoders
/// which store the least significant plane first.
pub fn decode_frame(
    data: &[u8],
    dimensions: FrameDimensions,
    segment_order: Endianness,
) -> DecodeResult<Vec<u8>> {
    ensure!(
        dimensions.bits_allocated != 0 && dimensions.bits_allocated % 8 == 0,
        UnsupportedBitsAllocatedSnafu {
            bits_allocated: dimensions.bits_allocated,
        }
    );
    let bytes_per_sample = dimensions.bytes_per_sample();
    let plane_length = dimensions.plane_length();
    let stride = bytes_per_sample * plane_length;
    let offsets = read_segment_offsets(data, dimensions.segment_count())?;

    let mut dst = vec![0; dimensions.samples_per_pixel as usize * stride];
    for sample in 0..dimensions.samples_per_pixel as usize {
        for byte_position in 0..bytes_per_sample {
            // byte_position counts from the least significant byte,
            // while conformant data stores the most significant plane first
            let index = match segment_order {
                Endianness::Big => {
                    sample * bytes_per_sample + bytes_per_sample - 1 - byte_position
                }
                Endianness::Little => sample * bytes_per_sample + byte_position,
            };
            let mut decoded = decode_segment(&data[offsets[index]..offsets[index + 1]]);
            ensure!(
                decoded.len() >= plane_length,
                SegmentTooShortSnafu {
                    index,
                    length: decoded.len(),
                    expected: plane_length,
                }
            );
            if decoded.len() > plane_length {
                warn!(
                    "Decoded RLE segment {} has {} bytes, expected {}: truncating",
                    index,
                    decoded.len(),
                    plane_length
                );
                decoded.truncate(plane_length);
            }

            let start = sample * stride + byte_position;
            for (i, value) in decoded.into_iter().enumerate() {
                dst[start + i * bytes_per_sample] = value;
            }
        }
    }
    Ok(dst)
}

/// Encode one frame of little endian, planar configuration 1 pixel data
/// (the layout produced by [`decode_frame`]) as an RLE compressed frame.
///
/// Planes are stored in the standard order,
/// with the most significant byte's plane of each sample first.
pub fn encode_frame(pixel_data: &[u8], dimensions: FrameDimensions) -> EncodeResult<Vec<u8>> {
    ensure!(
        dimensions.bits_allocated != 0 && dimensions.bits_allocated % 8 == 0,
        UnsupportedBitsAllocatedEncodeSnafu {
            bits_allocated: dimensions.bits_allocated,
        }
    );
    let nr_segments = dimensions.segment_count();
    ensure!(
        nr_segments <= MAX_SEGMENTS,
        TooManySegmentsSnafu { nr_segments }
    );
    ensure!(
        pixel_data.len() == dimensions.frame_length(),
        FrameLengthMismatchSnafu {
            length: pixel_data.len(),
            expected: dimensions.frame_length(),
        }
    );
    let bytes_per_sample = dimensions.bytes_per_sample();
    let stride = bytes_per_sample * dimensions.plane_length();

    let mut segments = Vec::with_capacity(nr_segments);
    for sample in 0..dimensions.samples_per_pixel as usize {
        let sample_data = &pixel_data[sample * stride..(sample + 1) * stride];
        // most significant plane first
        for byte_position in (0..bytes_per_sample).rev() {
            let plane: Vec<u8> = sample_data
                .iter()
                .skip(byte_position)
                .step_by(bytes_per_sample)
                .copied()
                .collect();
            segments.push(encode_segment(&plane));
        }
    }

    let mut header = [0u8; HEADER_LENGTH];
    LittleEndian::write_u32(&mut header[0..4], nr_segments as u32);
    let mut offset = HEADER_LENGTH as u32;
    for (index, segment) in segments.iter().enumerate() {
        LittleEndian::write_u32(&mut header[4 + 4 * index..8 + 4 * index], offset);
        offset += segment.len() as u32;
    }

    let mut out = Vec::with_capacity(offset as usize);
    out.extend_from_slice(&header);
    for segment in &segments {
        out.extend_from_slice(segment);
    }
    Ok(out)
}
