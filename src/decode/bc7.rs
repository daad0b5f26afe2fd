//! BC7 block decoder.

use crate::bits::extract_bits;
use crate::decode::tables::{
    anchor_index, interpolate, subset_index, PARTITIONS_2_SUBSET, PARTITIONS_3_SUBSET, WEIGHT2,
    WEIGHT3, WEIGHT4,
};

struct ModeDescriptor {
    num_subsets: u32,
    partition_bits: u32,
    rotation_bits: u32,
    index_selection_bits: u32,
    color_bits: u32,
    alpha_bits: u32,
    separate_p_bits: bool,
    shared_p_bits: bool,
    index_bits: u32,
    secondary_index_bits: u32,
}

#[rustfmt::skip]
static MODE_TABLE: [ModeDescriptor; 8] = [
    ModeDescriptor { num_subsets: 3, partition_bits: 4, rotation_bits: 0, index_selection_bits: 0, color_bits: 4, alpha_bits: 0, separate_p_bits: true,  shared_p_bits: false, index_bits: 3, secondary_index_bits: 0 },
    ModeDescriptor { num_subsets: 2, partition_bits: 6, rotation_bits: 0, index_selection_bits: 0, color_bits: 6, alpha_bits: 0, separate_p_bits: false, shared_p_bits: true,  index_bits: 3, secondary_index_bits: 0 },
    ModeDescriptor { num_subsets: 3, partition_bits: 6, rotation_bits: 0, index_selection_bits: 0, color_bits: 5, alpha_bits: 0, separate_p_bits: false, shared_p_bits: false, index_bits: 2, secondary_index_bits: 0 },
    ModeDescriptor { num_subsets: 2, partition_bits: 6, rotation_bits: 0, index_selection_bits: 0, color_bits: 7, alpha_bits: 0, separate_p_bits: true,  shared_p_bits: false, index_bits: 2, secondary_index_bits: 0 },
    ModeDescriptor { num_subsets: 1, partition_bits: 0, rotation_bits: 2, index_selection_bits: 1, color_bits: 5, alpha_bits: 6, separate_p_bits: false, shared_p_bits: false, index_bits: 2, secondary_index_bits: 3 },
    ModeDescriptor { num_subsets: 1, partition_bits: 0, rotation_bits: 2, index_selection_bits: 0, color_bits: 7, alpha_bits: 8, separate_p_bits: false, shared_p_bits: false, index_bits: 2, secondary_index_bits: 2 },
    ModeDescriptor { num_subsets: 1, partition_bits: 0, rotation_bits: 0, index_selection_bits: 0, color_bits: 7, alpha_bits: 7, separate_p_bits: true,  shared_p_bits: false, index_bits: 4, secondary_index_bits: 0 },
    ModeDescriptor { num_subsets: 2, partition_bits: 6, rotation_bits: 0, index_selection_bits: 0, color_bits: 5, alpha_bits: 5, separate_p_bits: true,  shared_p_bits: false, index_bits: 2, secondary_index_bits: 0 },
];

/// Reads the packed endpoints of up to 3 subsets, color channels first, then
/// alpha for the modes that store it.
fn extract_endpoints(
    mode: usize,
    block: &[u8],
    cursor: &mut u32,
    endpoints: &mut [[[u32; 4]; 2]; 3],
) {
    let info = &MODE_TABLE[mode];

    for channel in 0..3 {
        for subset in 0..info.num_subsets as usize {
            endpoints[subset][0][channel] = extract_bits(block, cursor, info.color_bits);
            endpoints[subset][1][channel] = extract_bits(block, cursor, info.color_bits);
        }
    }

    if mode >= 4 {
        for subset in 0..info.num_subsets as usize {
            endpoints[subset][0][3] = extract_bits(block, cursor, info.alpha_bits);
            endpoints[subset][1][3] = extract_bits(block, cursor, info.alpha_bits);
        }
    }
}

/// Appends the p-bits and expands every endpoint channel to 8 bits by
/// replicating the top bits into the vacated low bits.
fn decode_endpoints(
    mode: usize,
    block: &[u8],
    cursor: &mut u32,
    endpoints: &mut [[[u32; 4]; 2]; 3],
) {
    let info = &MODE_TABLE[mode];
    let mut color_precision = info.color_bits;
    let mut alpha_precision = info.alpha_bits;

    if info.separate_p_bits || info.shared_p_bits {
        // The p-bit becomes the low bit of every channel, so precision
        // increases by one.
        color_precision += 1;
        if mode >= 4 {
            alpha_precision += 1;
        }
        for subset in endpoints.iter_mut().take(info.num_subsets as usize) {
            let p_bit0 = extract_bits(block, cursor, 1);
            let p_bit1 = if info.separate_p_bits {
                extract_bits(block, cursor, 1)
            } else {
                p_bit0
            };
            for channel in 0..4 {
                subset[0][channel] = (subset[0][channel] << 1) | p_bit0;
                subset[1][channel] = (subset[1][channel] << 1) | p_bit1;
            }
        }
    }

    for subset in endpoints.iter_mut().take(info.num_subsets as usize) {
        for endpoint in subset.iter_mut() {
            for channel in 0..3 {
                endpoint[channel] <<= 8 - color_precision;
                endpoint[channel] |= endpoint[channel] >> color_precision;
            }
            if mode >= 4 {
                endpoint[3] <<= 8 - alpha_precision;
                endpoint[3] |= endpoint[3] >> alpha_precision;
            }
        }
    }

    // Modes 0 to 3 carry no alpha data and decode fully opaque.
    if mode < 4 {
        for subset in endpoints.iter_mut() {
            subset[0][3] = 255;
            subset[1][3] = 255;
        }
    }
}

fn weights_for(bits_per_index: u32) -> &'static [i32] {
    match bits_per_index {
        2 => &WEIGHT2,
        3 => &WEIGHT3,
        _ => &WEIGHT4,
    }
}

/// Decodes a BC7 block by reading 16 bytes from `compressed_block` and
/// writing the RGBA8 data into `decompressed_block` with `destination_pitch`
/// many bytes per output row. A block with no set bit in its first byte has
/// no valid mode and decodes to all zeroes.
pub fn decode_block_bc7(
    compressed_block: &[u8],
    decompressed_block: &mut [u8],
    destination_pitch: usize,
) {
    let mode = compressed_block[0].trailing_zeros() as usize;
    if mode > 7 {
        for i in 0..4 {
            decompressed_block[i * destination_pitch..][..16].fill(0);
        }
        return;
    }

    let info = &MODE_TABLE[mode];
    let mut cursor = mode as u32 + 1;

    let partition = extract_bits(compressed_block, &mut cursor, info.partition_bits) as usize;
    let rotation = extract_bits(compressed_block, &mut cursor, info.rotation_bits) as usize;
    let index_selection = extract_bits(compressed_block, &mut cursor, info.index_selection_bits);

    let mut endpoints = [[[0u32; 4]; 2]; 3];
    extract_endpoints(mode, compressed_block, &mut cursor, &mut endpoints);
    decode_endpoints(mode, compressed_block, &mut cursor, &mut endpoints);

    let mut pixel_subsets = [0usize; 16];
    if info.num_subsets == 2 {
        for (pixel, subset) in pixel_subsets.iter_mut().enumerate() {
            *subset = subset_index(&PARTITIONS_2_SUBSET[partition], pixel);
        }
    } else if info.num_subsets == 3 {
        for (pixel, subset) in pixel_subsets.iter_mut().enumerate() {
            *subset = subset_index(&PARTITIONS_3_SUBSET[partition], pixel);
        }
    }

    // The first pixel of each subset has an implicit high zero bit in its
    // index, so one fewer bit is stored for it.
    let mut anchors = [0usize; 3];
    if info.num_subsets == 2 {
        anchors[1] = anchor_index(&PARTITIONS_2_SUBSET[partition], 1);
    } else if info.num_subsets == 3 {
        anchors[1] = anchor_index(&PARTITIONS_3_SUBSET[partition], 1);
        anchors[2] = anchor_index(&PARTITIONS_3_SUBSET[partition], 2);
    }

    // Modes 4 and 5 store a second index stream. In mode 4 the streams have
    // different widths and the index selection bit decides which one holds
    // the color indices.
    let mut color_indices = [0usize; 16];
    let mut alpha_indices = [0usize; 16];
    for i in 0..16 {
        let bits = if i == anchors[pixel_subsets[i]] {
            info.index_bits - 1
        } else {
            info.index_bits
        };
        let index = extract_bits(compressed_block, &mut cursor, bits) as usize;
        if mode == 4 && index_selection != 0 {
            alpha_indices[i] = index;
        } else {
            color_indices[i] = index;
            alpha_indices[i] = index;
        }
    }

    if info.secondary_index_bits > 0 {
        for i in 0..16 {
            let bits = if i == anchors[pixel_subsets[i]] {
                info.secondary_index_bits - 1
            } else {
                info.secondary_index_bits
            };
            let index = extract_bits(compressed_block, &mut cursor, bits) as usize;
            if index_selection != 0 {
                color_indices[i] = index;
            } else {
                alpha_indices[i] = index;
            }
        }
    }

    let color_weights = weights_for(if mode == 4 && index_selection != 0 {
        info.secondary_index_bits
    } else {
        info.index_bits
    });
    let alpha_weights = weights_for(if mode == 4 && index_selection == 0 {
        info.secondary_index_bits
    } else {
        info.index_bits
    });

    for i in 0..16 {
        let [e0, e1] = &endpoints[pixel_subsets[i]];
        let mut pixel = [0u8; 4];
        for channel in 0..3 {
            pixel[channel] = interpolate(
                e0[channel] as i32,
                e1[channel] as i32,
                color_weights,
                color_indices[i],
            ) as u8;
        }
        pixel[3] = interpolate(e0[3] as i32, e1[3] as i32, alpha_weights, alpha_indices[i]) as u8;

        if rotation != 0 {
            pixel.swap(3, rotation - 1);
        }

        decompressed_block[(i / 4) * destination_pitch + (i % 4) * 4..][..4]
            .copy_from_slice(&pixel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_block(compressed_block: &[u8], expected_output: &[u8], name: &str) {
        let pitch = 8;
        let mut decoded = [0u8; 64];
        decode_block_bc7(compressed_block, &mut decoded, pitch);

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
    fn bc7_block_0() {
        let compressed_block = [
            0x40, 0xAF, 0xF6, 0xB, 0xFD, 0x2E, 0xFF, 0xFF, 0x11, 0x71, 0x10, 0xA1, 0x21, 0xF2,
            0x33, 0x73,
        ];
        let expected_output = [
            0xBD, 0xBF, 0xBF, 0xFF, 0xBD, 0xBD, 0xBD, 0xFF, 0xBD, 0xBF, 0xBF, 0xFF, 0xBD, 0xBD,
            0xBD, 0xFF, 0xBD, 0xBD, 0xBD, 0xFF, 0xBC, 0xBB, 0xB9, 0xFF, 0xBB, 0xB9, 0xB7, 0xFF,
            0xBB, 0xB9, 0xB7, 0xFF, 0xBB, 0xB9, 0xB7, 0xFF, 0xB9, 0xB1, 0xAC, 0xFF, 0x0, 0x0, 0x0,
            0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0,
            0x0, 0x0, 0x0, 0x0,
        ];
        test_block(&compressed_block, &expected_output, "BC7 block 0");
    }

    #[test]
    fn bc7_block_1() {
        let compressed_block = [
            0xC0, 0x8C, 0xEF, 0xA2, 0xBB, 0xDC, 0xFE, 0x7F, 0x6C, 0x55, 0x6A, 0x34, 0x4F, 0x0,
            0x5D, 0x0,
        ];
        let expected_output = [
            0x50, 0x4A, 0x48, 0xFE, 0x50, 0x4A, 0x48, 0xFE, 0x64, 0x5D, 0x59, 0xFE, 0x50, 0x4A,
            0x48, 0xFE, 0x7C, 0x74, 0x6E, 0xFE, 0x46, 0x41, 0x3F, 0xFE, 0x72, 0x6A, 0x65, 0xFE,
            0x4A, 0x45, 0x43, 0xFE, 0x32, 0x2E, 0x2E, 0xFE, 0x32, 0x2E, 0x2E, 0xFE, 0x0, 0x0, 0x0,
            0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0,
            0x0, 0x0, 0x0, 0x0,
        ];
        test_block(&compressed_block, &expected_output, "BC7 block 1");
    }

    #[test]
    fn bc7_all_zero_first_byte_decodes_to_zero() {
        let mut compressed_block = [0xFFu8; 16];
        compressed_block[0] = 0x00;

        let mut decoded = [0xAAu8; 64];
        decode_block_bc7(&compressed_block, &mut decoded, 16);
        assert_eq!(decoded, [0u8; 64]);
    }
}
