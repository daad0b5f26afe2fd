//! Little-endian bit-span extraction over raw block bytes.
//!
//! Compressed blocks are treated as a little-endian bit stream: bit `i` of
//! the stream is bit `i % 8` of byte `i / 8`. Spans may cross byte
//! boundaries. Callers only request offsets that are valid for the current
//! block mode, so no bounds checking beyond the slice itself happens here.

/// Reads `count` bits starting at `*cursor` and advances the cursor.
///
/// Used for sequential parsing of header fields and index streams.
#[inline]
pub(crate) fn extract_bits(block: &[u8], cursor: &mut u32, count: u32) -> u32 {
    let result = extract_bit_segment(block, *cursor, count);
    *cursor += count;
    result
}

/// Reads `count` bits at the absolute offset `start` without a cursor.
///
/// Used for the scattered endpoint layouts where fields are assembled from
/// disjoint spans.
#[inline]
pub(crate) fn extract_bit_segment(block: &[u8], start: u32, count: u32) -> u32 {
    let mut result = 0;

    for i in 0..count {
        let offset = (start + i) as usize;
        let bit = (block[offset / 8] >> (offset % 8)) & 0x1;
        result |= (bit as u32) << i;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_bits_are_little_endian() {
        let data = [0b0000_0001u8, 0b1000_0000];

        assert_eq!(extract_bit_segment(&data, 0, 1), 1);
        assert_eq!(extract_bit_segment(&data, 1, 1), 0);
        assert_eq!(extract_bit_segment(&data, 15, 1), 1);
    }

    #[test]
    fn spans_cross_byte_boundaries() {
        // Bits 4..12 pick the high nibble of byte 0 and low nibble of byte 1.
        let data = [0xA5u8, 0x3C];

        assert_eq!(extract_bit_segment(&data, 4, 8), 0xCA);
        assert_eq!(extract_bit_segment(&data, 0, 16), 0x3CA5);
    }

    #[test]
    fn cursor_advances_by_read_width() {
        let data = [0xFFu8, 0x00, 0xFF];
        let mut cursor = 0;

        assert_eq!(extract_bits(&data, &mut cursor, 5), 0b11111);
        assert_eq!(cursor, 5);
        assert_eq!(extract_bits(&data, &mut cursor, 5), 0b00111);
        assert_eq!(cursor, 10);
        assert_eq!(extract_bits(&data, &mut cursor, 6), 0);
        assert_eq!(cursor, 16);
        assert_eq!(extract_bits(&data, &mut cursor, 8), 0xFF);
    }
}
