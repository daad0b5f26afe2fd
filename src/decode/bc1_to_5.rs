//! Block decoders for BC1, BC2, BC3, BC4 and BC5, including the signed
//! BC4/BC5 variants.

/// Expands a 565 color to 888 by bit replication.
///
/// Scaling by pure shifts would never reach 255 (31 * 8 = 248), so the top
/// bits of each channel are replicated into the vacated low bits. True
/// rounding (`255 * r / 31`) would space the values slightly differently;
/// reference decoders use the replication form, so it has to be reproduced
/// exactly.
#[inline]
pub(crate) fn expand_565(color: u16) -> (u32, u32, u32) {
    let mut r = ((color & 0xF800) >> 8) as u32;
    r += r >> 5;
    let mut g = ((color & 0x07E0) >> 3) as u32;
    g += g >> 6;
    let mut b = ((color & 0x001F) << 3) as u32;
    b += b >> 5;
    (r, g, b)
}

/// Decodes a BC1 block by reading 8 bytes from `compressed_block` and writing
/// the RGBA8 data into `decompressed_block` with `destination_pitch` many
/// bytes per output row.
pub fn decode_block_bc1(
    compressed_block: &[u8],
    decompressed_block: &mut [u8],
    destination_pitch: usize,
) {
    let c0 = u16::from_le_bytes([compressed_block[0], compressed_block[1]]);
    let c1 = u16::from_le_bytes([compressed_block[2], compressed_block[3]]);

    let (r0, g0, b0) = expand_565(c0);
    let (r1, g1, b1) = expand_565(c1);

    let mut ref_colors = [0u32; 4];
    ref_colors[0] = 0xFF000000 | (b0 << 16) | (g0 << 8) | r0;
    ref_colors[1] = 0xFF000000 | (b1 << 16) | (g1 << 8) | r1;

    if c0 > c1 {
        // Two interpolated colors at 1/3 and 2/3. The +1 rounds the integer
        // division by 3 (2/3 should become 1, not 0).
        let r = (2 * r0 + r1 + 1) / 3;
        let g = (2 * g0 + g1 + 1) / 3;
        let b = (2 * b0 + b1 + 1) / 3;
        ref_colors[2] = 0xFF000000 | (b << 16) | (g << 8) | r;

        let r = (r0 + 2 * r1 + 1) / 3;
        let g = (g0 + 2 * g1 + 1) / 3;
        let b = (b0 + 2 * b1 + 1) / 3;
        ref_colors[3] = 0xFF000000 | (b << 16) | (g << 8) | r;
    } else {
        // Punch-through mode: one midpoint color, index 3 is transparent
        // black.
        let r = (r0 + r1) / 2;
        let g = (g0 + g1) / 2;
        let b = (b0 + b1) / 2;
        ref_colors[2] = 0xFF000000 | (b << 16) | (g << 8) | r;
        ref_colors[3] = 0x00000000;
    }

    let mut color_indices = u32::from_le_bytes([
        compressed_block[4],
        compressed_block[5],
        compressed_block[6],
        compressed_block[7],
    ]);

    for i in 0..4 {
        for j in 0..4 {
            let color = ref_colors[(color_indices & 0x03) as usize];
            decompressed_block[i * destination_pitch + j * 4..][..4]
                .copy_from_slice(&color.to_le_bytes());
            color_indices >>= 2;
        }
    }
}

/// Decodes a BC2 block by reading 16 bytes from `compressed_block` and
/// writing the RGBA8 data into `decompressed_block` with `destination_pitch`
/// many bytes per output row.
pub fn decode_block_bc2(
    compressed_block: &[u8],
    decompressed_block: &mut [u8],
    destination_pitch: usize,
) {
    decode_block_bc1(
        &compressed_block[8..],
        decompressed_block,
        destination_pitch,
    );

    // 4 bits of alpha per pixel, replicated into the high and low nibble.
    for i in 0..4 {
        for j in 0..4 {
            let byte_index = i * 2 + (j / 2);
            let shift = (j % 2) * 4;
            let alpha = (compressed_block[byte_index] >> shift) & 0x0F;
            decompressed_block[i * destination_pitch + j * 4 + 3] = (alpha << 4) | alpha;
        }
    }
}

/// Decodes a BC3 block by reading 16 bytes from `compressed_block` and
/// writing the RGBA8 data into `decompressed_block` with `destination_pitch`
/// many bytes per output row.
pub fn decode_block_bc3(
    compressed_block: &[u8],
    decompressed_block: &mut [u8],
    destination_pitch: usize,
) {
    decode_block_bc1(
        &compressed_block[8..],
        decompressed_block,
        destination_pitch,
    );
    decode_smooth_alpha_block::<4>(
        compressed_block,
        &mut decompressed_block[3..],
        destination_pitch,
    );
}

/// Decodes a BC4 block by reading 8 bytes from `compressed_block` and writing
/// the R8 data into `decompressed_block` with `destination_pitch` many bytes
/// per output row.
pub fn decode_block_bc4(
    compressed_block: &[u8],
    decompressed_block: &mut [u8],
    destination_pitch: usize,
) {
    decode_smooth_alpha_block::<1>(compressed_block, decompressed_block, destination_pitch);
}

/// Decodes a signed BC4 block. The output bytes are `i8` values reinterpreted
/// as `u8`.
pub fn decode_block_bc4_signed(
    compressed_block: &[u8],
    decompressed_block: &mut [u8],
    destination_pitch: usize,
) {
    decode_smooth_alpha_block_signed::<1>(compressed_block, decompressed_block, destination_pitch);
}

/// Decodes a BC5 block by reading 16 bytes from `compressed_block` and
/// writing the RG8 data into `decompressed_block` with `destination_pitch`
/// many bytes per output row.
pub fn decode_block_bc5(
    compressed_block: &[u8],
    decompressed_block: &mut [u8],
    destination_pitch: usize,
) {
    decode_smooth_alpha_block::<2>(compressed_block, decompressed_block, destination_pitch);
    decode_smooth_alpha_block::<2>(
        &compressed_block[8..],
        &mut decompressed_block[1..],
        destination_pitch,
    );
}

/// Decodes a signed BC5 block. The output bytes are `i8` values reinterpreted
/// as `u8`.
pub fn decode_block_bc5_signed(
    compressed_block: &[u8],
    decompressed_block: &mut [u8],
    destination_pitch: usize,
) {
    decode_smooth_alpha_block_signed::<2>(compressed_block, decompressed_block, destination_pitch);
    decode_smooth_alpha_block_signed::<2>(
        &compressed_block[8..],
        &mut decompressed_block[1..],
        destination_pitch,
    );
}

/// Decodes a BC4-style 8-level alpha/luminance block (unsigned).
#[rustfmt::skip]
fn decode_smooth_alpha_block<const PIXEL_SIZE: usize>(
    compressed_block: &[u8],
    decompressed_block: &mut [u8],
    destination_pitch: usize,
) {
    let block = u64::from_le_bytes(compressed_block[0..8].try_into().unwrap());

    let p0 = (block & 0xFF) as u32;
    let p1 = ((block >> 8) & 0xFF) as u32;

    let mut palette = [0u8; 8];
    palette[0] = p0 as u8;
    palette[1] = p1 as u8;

    if p0 > p1 {
        // 6 interpolated values; the +3 rounds the integer division by 7.
        palette[2] = ((6 * p0 +     p1 + 3) / 7) as u8;
        palette[3] = ((5 * p0 + 2 * p1 + 3) / 7) as u8;
        palette[4] = ((4 * p0 + 3 * p1 + 3) / 7) as u8;
        palette[5] = ((3 * p0 + 4 * p1 + 3) / 7) as u8;
        palette[6] = ((2 * p0 + 5 * p1 + 3) / 7) as u8;
        palette[7] = ((    p0 + 6 * p1 + 3) / 7) as u8;
    } else {
        // 4 interpolated values plus the two sentinels.
        palette[2] = ((4 * p0 +     p1 + 2) / 5) as u8;
        palette[3] = ((3 * p0 + 2 * p1 + 2) / 5) as u8;
        palette[4] = ((2 * p0 + 3 * p1 + 2) / 5) as u8;
        palette[5] = ((    p0 + 4 * p1 + 2) / 5) as u8;
        palette[6] = 0x00;
        palette[7] = 0xFF;
    }

    let mut indices = block >> 16;

    for i in 0..4 {
        for j in 0..4 {
            decompressed_block[i * destination_pitch + j * PIXEL_SIZE] =
                palette[(indices & 0x07) as usize];
            indices >>= 3;
        }
    }
}

/// Decodes a BC4-style 8-level block with signed endpoints.
///
/// Mirrors the unsigned logic with the endpoints widened to i32 before any
/// arithmetic; the host language's truncating integer division then matches
/// the reference behavior for negative values.
#[rustfmt::skip]
fn decode_smooth_alpha_block_signed<const PIXEL_SIZE: usize>(
    compressed_block: &[u8],
    decompressed_block: &mut [u8],
    destination_pitch: usize,
) {
    let block = u64::from_le_bytes(compressed_block[0..8].try_into().unwrap());

    let p0 = (block & 0xFF) as u8 as i8 as i32;
    let p1 = ((block >> 8) & 0xFF) as u8 as i8 as i32;

    let mut palette = [0i32; 8];
    palette[0] = p0;
    palette[1] = p1;

    if p0 > p1 {
        palette[2] = (6 * p0 +     p1 + 3) / 7;
        palette[3] = (5 * p0 + 2 * p1 + 3) / 7;
        palette[4] = (4 * p0 + 3 * p1 + 3) / 7;
        palette[5] = (3 * p0 + 4 * p1 + 3) / 7;
        palette[6] = (2 * p0 + 5 * p1 + 3) / 7;
        palette[7] = (    p0 + 6 * p1 + 3) / 7;
    } else {
        palette[2] = (4 * p0 +     p1 + 2) / 5;
        palette[3] = (3 * p0 + 2 * p1 + 2) / 5;
        palette[4] = (2 * p0 + 3 * p1 + 2) / 5;
        palette[5] = (    p0 + 4 * p1 + 2) / 5;
        palette[6] = -128;
        palette[7] = 127;
    }

    let mut indices = block >> 16;

    for i in 0..4 {
        for j in 0..4 {
            decompressed_block[i * destination_pitch + j * PIXEL_SIZE] =
                palette[(indices & 0x07) as usize] as i8 as u8;
            indices >>= 3;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_block(
        decode_block: fn(&[u8], &mut [u8], usize),
        pitch: usize,
        compressed_block: &[u8],
        expected_output: &[u8],
        name: &str,
    ) {
        let mut decoded = [0u8; 64];
        decode_block(compressed_block, &mut decoded, pitch);

        for y in 0..4 {
            let start = y * pitch;
            let end = start + pitch;
            assert_eq!(
                &decoded[start..end],
                &expected_output[start..end],
                "{}: Mismatch at row {}",
                name,
                y
            );
        }
    }

    #[test]
    fn bc1_block_black() {
        let compressed_block = [0u8; 8];
        let expected_output = [
            0x0, 0x0, 0x0, 0xFF, 0x0, 0x0, 0x0, 0xFF, 0x0, 0x0, 0x0, 0xFF, 0x0, 0x0, 0x0, 0xFF,
            0x0, 0x0, 0x0, 0xFF, 0x0, 0x0, 0x0, 0xFF, 0x0, 0x0, 0x0, 0xFF, 0x0, 0x0, 0x0, 0xFF,
            0x0, 0x0, 0x0, 0xFF, 0x0, 0x0, 0x0, 0xFF, 0x0, 0x0, 0x0, 0xFF, 0x0, 0x0, 0x0, 0xFF,
            0x0, 0x0, 0x0, 0xFF, 0x0, 0x0, 0x0, 0xFF, 0x0, 0x0, 0x0, 0xFF, 0x0, 0x0, 0x0, 0xFF,
        ];
        test_block(
            decode_block_bc1,
            16,
            &compressed_block,
            &expected_output,
            "Black block",
        );
    }

    #[test]
    fn bc1_block_red() {
        let compressed_block = [0x00, 0xF8, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        let expected_output = [
            0xFF, 0x0, 0x0, 0xFF, 0xFF, 0x0, 0x0, 0xFF, 0xFF, 0x0, 0x0, 0xFF, 0xFF, 0x0, 0x0, 0xFF,
            0xFF, 0x0, 0x0, 0xFF, 0xFF, 0x0, 0x0, 0xFF, 0xFF, 0x0, 0x0, 0xFF, 0xFF, 0x0, 0x0, 0xFF,
            0xFF, 0x0, 0x0, 0xFF, 0xFF, 0x0, 0x0, 0xFF, 0xFF, 0x0, 0x0, 0xFF, 0xFF, 0x0, 0x0, 0xFF,
            0xFF, 0x0, 0x0, 0xFF, 0xFF, 0x0, 0x0, 0xFF, 0xFF, 0x0, 0x0, 0xFF, 0xFF, 0x0, 0x0, 0xFF,
        ];
        test_block(
            decode_block_bc1,
            16,
            &compressed_block,
            &expected_output,
            "Red block",
        );
    }

    #[test]
    fn bc1_interpolated_thirds() {
        // c0 = pure red, c1 = pure blue, c0 > c1, every pixel uses an
        // interpolated palette entry. (2*255 + 0 + 1) / 3 = 170,
        // (255 + 0 + 1) / 3 = 85.
        let compressed_block = [0x00, 0xF8, 0x1F, 0x00, 0x0E, 0xAA, 0xAA, 0xAA];
        let mut decoded = [0u8; 64];
        decode_block_bc1(&compressed_block, &mut decoded, 16);

        assert_eq!(&decoded[0..4], &[170, 0, 85, 0xFF]);
        assert_eq!(&decoded[4..8], &[85, 0, 170, 0xFF]);
    }

    #[test]
    fn bc1_punch_through_produces_three_colors_and_transparent_black() {
        // c0 <= c1 selects the punch-through palette: c0, c1, one midpoint
        // and transparent black. Index order 0, 1, 2, 3 in the first row.
        let compressed_block = [0x1F, 0x00, 0x00, 0xF8, 0xE4, 0x00, 0x00, 0x00];
        let mut decoded = [0u8; 64];
        decode_block_bc1(&compressed_block, &mut decoded, 16);

        assert_eq!(&decoded[0..4], &[0, 0, 255, 0xFF]);
        assert_eq!(&decoded[4..8], &[255, 0, 0, 0xFF]);
        assert_eq!(&decoded[8..12], &[127, 0, 127, 0xFF]);
        assert_eq!(&decoded[12..16], &[0, 0, 0, 0]);

        let distinct: std::collections::HashSet<[u8; 4]> = decoded
            .chunks_exact(4)
            .map(|px| [px[0], px[1], px[2], px[3]])
            .collect();
        assert_eq!(distinct.len(), 4);
        assert!(distinct.contains(&[0, 0, 0, 0]));
        assert_eq!(distinct.iter().filter(|px| px[3] == 0xFF).count(), 3);
    }

    #[test]
    fn expansion_565_matches_replication_table() {
        for value in 0u16..32 {
            let expected = {
                let mut v = (value as u32) << 3;
                v += v >> 5;
                v
            };
            let (r, _, b) = expand_565((value << 11) | value);
            assert_eq!(r, expected);
            assert_eq!(b, expected);
        }

        assert_eq!(expand_565(0x0000), (0, 0, 0));
        assert_eq!(expand_565(0xFFFF), (255, 255, 255));
        // Spot checks against hand-computed values.
        assert_eq!(expand_565(0x0801).0, 8);
        assert_eq!(expand_565(0x2003).0, 33);
        assert_eq!(expand_565(0x0004).2, 33);
    }

    #[test]
    fn bc2_alpha_gradient() {
        let compressed_block = [
            0x10, 0x32, 0x54, 0x76, 0x98, 0xBA, 0xDC, 0xFE, 0x00, 0xF8, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00,
        ];
        let expected_output = [
            0xFF, 0x0, 0x0, 0x0, 0xFF, 0x0, 0x0, 0x11, 0xFF, 0x0, 0x0, 0x22, 0xFF, 0x0, 0x0, 0x33,
            0xFF, 0x0, 0x0, 0x44, 0xFF, 0x0, 0x0, 0x55, 0xFF, 0x0, 0x0, 0x66, 0xFF, 0x0, 0x0, 0x77,
            0xFF, 0x0, 0x0, 0x88, 0xFF, 0x0, 0x0, 0x99, 0xFF, 0x0, 0x0, 0xAA, 0xFF, 0x0, 0x0, 0xBB,
            0xFF, 0x0, 0x0, 0xCC, 0xFF, 0x0, 0x0, 0xDD, 0xFF, 0x0, 0x0, 0xEE, 0xFF, 0x0, 0x0, 0xFF,
        ];
        test_block(
            decode_block_bc2,
            16,
            &compressed_block,
            &expected_output,
            "Alpha gradient",
        );
    }

    #[test]
    fn bc3_alpha_gradient() {
        let compressed_block = [
            0x00, 0xFF, 0xFF, 0xFF, 0x55, 0x55, 0x55, 0x55, 0x00, 0xF8, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00,
        ];
        let expected_output = [
            0xFF, 0x0, 0x0, 0xFF, 0xFF, 0x0, 0x0, 0xFF, 0xFF, 0x0, 0x0, 0xFF, 0xFF, 0x0, 0x0, 0xFF,
            0xFF, 0x0, 0x0, 0xFF, 0xFF, 0x0, 0x0, 0x66, 0xFF, 0x0, 0x0, 0xCC, 0xFF, 0x0, 0x0, 0x33,
            0xFF, 0x0, 0x0, 0xCC, 0xFF, 0x0, 0x0, 0x33, 0xFF, 0x0, 0x0, 0xCC, 0xFF, 0x0, 0x0, 0x33,
            0xFF, 0x0, 0x0, 0xCC, 0xFF, 0x0, 0x0, 0x33, 0xFF, 0x0, 0x0, 0xCC, 0xFF, 0x0, 0x0, 0x33,
        ];
        test_block(
            decode_block_bc3,
            16,
            &compressed_block,
            &expected_output,
            "Red with alpha gradient",
        );
    }

    #[test]
    fn bc4_rounding_biases() {
        // p0 > p1 branch: (6*200 + 40 + 3) / 7 = 177, (5*200 + 2*40 + 3) / 7
        // = 154, (200 + 6*40 + 3) / 7 = 63.
        let compressed_block = [200, 40, 0x5A, 0x0E, 0, 0, 0, 0];
        let mut decoded = [0u8; 16];
        decode_block_bc4(&compressed_block, &mut decoded, 4);
        assert_eq!(decoded[0], 177); // index 2
        assert_eq!(decoded[1], 154); // index 3
        assert_eq!(decoded[2], 40); // index 1
        assert_eq!(decoded[3], 63); // index 7

        // p0 <= p1 branch: (4*50 + 250 + 2) / 5 = 90, (3*50 + 2*250 + 2) / 5
        // = 130, and the sentinels 0 and 255.
        let compressed_block = [50, 250, 0x5A, 0xEA, 0x03, 0, 0, 0];
        let mut decoded = [0u8; 16];
        decode_block_bc4(&compressed_block, &mut decoded, 4);
        assert_eq!(decoded[0], 90); // index 2
        assert_eq!(decoded[1], 130); // index 3
        assert_eq!(decoded[2], 250); // index 1
        assert_eq!(decoded[3], 210); // index 5: (50 + 4*250 + 2) / 5
        assert_eq!(decoded[4], 0); // index 6 sentinel
        assert_eq!(decoded[5], 255); // index 7 sentinel
    }

    #[test]
    fn bc4_signed_sentinels_and_rounding() {
        // p0 = 100, p1 = -100, p0 > p1: (6*100 - 100 + 3) / 7 = 71,
        // (100 - 6*100 + 3) / 7 = -71 (truncation toward zero).
        let compressed_block = [100, 156, 0b01_111_010, 0, 0, 0, 0, 0];
        let mut decoded = [0u8; 16];
        decode_block_bc4_signed(&compressed_block, &mut decoded, 4);
        assert_eq!(decoded[0] as i8, 71);
        assert_eq!(decoded[1] as i8, -71);
        assert_eq!(decoded[2] as i8, -100);

        // p0 <= p1 selects the signed sentinels -128 and 127.
        let compressed_block = [156, 100, 0b00_111_110, 0, 0, 0, 0, 0];
        let mut decoded = [0u8; 16];
        decode_block_bc4_signed(&compressed_block, &mut decoded, 4);
        assert_eq!(decoded[0] as i8, -128);
        assert_eq!(decoded[1] as i8, 127);
        assert_eq!(decoded[2] as i8, -100);
    }

    #[test]
    fn bc5_interpolated() {
        let compressed_block = [
            0x00, 0xFF, 0x92, 0x24, 0x49, 0x92, 0x00, 0x00, 0xFF, 0x00, 0x92, 0x24, 0x49, 0x92,
            0x00, 0x00,
        ];
        let expected_output = [
            0x33, 0xDB, 0x33, 0xDB, 0x33, 0xDB, 0x33, 0xDB, 0x33, 0xDB, 0x33, 0xDB, 0x33, 0xDB,
            0x33, 0xDB, 0x33, 0xDB, 0x33, 0xDB, 0x33, 0xDB, 0x0, 0xFF, 0x0, 0xFF, 0x0, 0xFF, 0x0,
            0xFF, 0x0, 0xFF, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0,
            0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0,
            0x0,
        ];
        test_block(
            decode_block_bc5,
            8,
            &compressed_block,
            &expected_output,
            "BC5 interpolated",
        );
    }
}
