//! Byte-oriented run-length codec for a single RLE segment,
//! the PackBits scheme used by the RLE Lossless transfer syntax.
//!
//! A segment is a sequence of runs, each introduced by a header byte `h`:
//! `0..=127` copies the next `h + 1` bytes literally,
//! `129..=255` replicates the next byte `257 - h` times,
//! and `128` does nothing.
//! There is no end marker, a segment ends with its byte range.

/// Decode one run-length encoded segment.
pub fn decode_segment(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len().saturating_mul(2));
    decode_segment_into(data, &mut out);
    out
}

/// Decode one run-length encoded segment,
/// appending the decoded bytes to `out`.
pub fn decode_segment_into(data: &[u8], out: &mut Vec<u8>) {
    let mut pos = 0;
    while pos < data.len() {
        let header = data[pos] as i8;
        pos += 1;
        if header >= 0 {
            let length = header as usize + 1;
            // a literal run truncated by the end of the segment
            // yields whatever bytes are left
            let end = (pos + length).min(data.len());
            out.extend_from_slice(&data[pos..end]);
            pos = end;
        } else if header != -128 {
            let length = (1 - header as isize) as usize;
            if let Some(&value) = data.get(pos) {
                out.resize(out.len() + length, value);
                pos += 1;
            } else {
                pos = data.len();
            }
        }
        // header == -128 is a no-op
    }
}

/// Encode a byte sequence as a single run-length encoded segment.
///
/// Replicate runs are used for two or more consecutive equal bytes;
/// both literal and replicate runs are capped at 128 bytes,
/// as dictated by the header byte range.
/// Odd-length output receives a trailing no-op byte
/// so that the serialized segment is always of even length.
pub fn encode_segment(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 128 + 2);
    let mut pos = 0;
    while pos < data.len() {
        let value = data[pos];
        let mut run = 1;
        while run < 128 && pos + run < data.len() && data[pos + run] == value {
            run += 1;
        }
        if run > 1 {
            out.push((257 - run) as u8);
            out.push(value);
            pos += run;
        } else {
            // literal run up to the next replicate run or the cap
            let start = pos;
            pos += 1;
            while pos < data.len() && pos - start < 128 {
                if pos + 1 < data.len() && data[pos] == data[pos + 1] {
                    break;
                }
                pos += 1;
            }
            out.push((pos - start - 1) as u8);
            out.extend_from_slice(&data[start..pos]);
        }
    }
    if out.len() % 2 != 0 {
        out.push(0x80);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn single_literal_byte() {
        assert_eq!(decode_segment(&[0x00, 0xAB]), vec![0xAB]);
    }

    #[test]
    fn replicate_runs_expand() {
        // 0xFD replicates the next byte 4 times
        assert_eq!(decode_segment(&[0xFD, 0x42]), vec![0x42; 4]);
        // 0x81 replicates the next byte 128 times
        assert_eq!(decode_segment(&[0x81, 0x42]), vec![0x42; 128]);
    }

    #[test]
    fn no_op_headers_are_skipped() {
        assert_eq!(
            decode_segment(&[0x80, 0x01, 0xAA, 0xBB, 0x80]),
            vec![0xAA, 0xBB],
        );
    }

    #[test]
    fn mixed_runs() {
        let encoded = [
            0xFE, 0xAA, 0x02, 0x80, 0x00, 0x2A, 0xFD, 0xAA, 0x03, 0x80, 0x00, 0x2A, 0x22, 0xF7,
            0xAA,
        ];
        let expected = [
            0xAA, 0xAA, 0xAA, 0x80, 0x00, 0x2A, 0xAA, 0xAA, 0xAA, 0xAA, 0x80, 0x00, 0x2A, 0x22,
            0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA,
        ];
        assert_eq!(decode_segment(&encoded), expected);
    }

    #[test]
    fn encoded_segments_are_even_length() {
        assert_eq!(encode_segment(&[]), vec![]);
        let out = encode_segment(&[0xAB]);
        assert_eq!(out, vec![0x00, 0xAB]);
        let out = encode_segment(&[0x01, 0x02, 0x03]);
        assert_eq!(out.len() % 2, 0);
    }

    fn arbitrary_bytes(length: usize, mut seed: u32) -> Vec<u8> {
        (0..length)
            .map(|_| {
                seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (seed >> 24) as u8
            })
            .collect()
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(128)]
    #[case(129)]
    #[case(256)]
    #[case(257)]
    fn round_trip(#[case] length: usize) {
        let uniform = vec![0x55u8; length];
        assert_eq!(decode_segment(&encode_segment(&uniform)), uniform);

        let mixed = arbitrary_bytes(length, length as u32 + 1);
        assert_eq!(decode_segment(&encode_segment(&mixed)), mixed);

        // short runs of every length interleaved with distinct bytes
        let runs: Vec<u8> = (0..length)
            .flat_map(|i| std::iter::repeat((i % 7) as u8).take(i % 5 + 1))
            .collect();
        assert_eq!(decode_segment(&encode_segment(&runs)), runs);
    }
}
