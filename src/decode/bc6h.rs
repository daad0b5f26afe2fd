//! BC6H block decoder for both the unsigned and signed float variants.
//!
//! Output pixels are RGB triples of f16 bit patterns written as little-endian
//! u16 values, 6 bytes per pixel.

use crate::bits::{extract_bit_segment, extract_bits};
use crate::decode::tables::{
    anchor_index, interpolate, subset_index, PARTITIONS_2_SUBSET, WEIGHT3, WEIGHT4,
};

struct ModeInfo {
    mode_bits: u32,
    region_count: u8,
    transformed_endpoints: bool,
    endpoint_bits: u32,
    delta_bits: [u32; 3],
}

/// Mode lookup keyed by the raw 2 or 5 bit pattern at the start of the block.
/// Field layout follows the D3D ordering of the 14 BC6H modes.
#[rustfmt::skip]
static MODE_TABLE: [ModeInfo; 14] = [
    ModeInfo { mode_bits: 0b00,    region_count: 2, transformed_endpoints: true,  endpoint_bits: 10, delta_bits: [5, 5, 5] },
    ModeInfo { mode_bits: 0b01,    region_count: 2, transformed_endpoints: true,  endpoint_bits: 7,  delta_bits: [6, 6, 6] },
    ModeInfo { mode_bits: 0b00010, region_count: 2, transformed_endpoints: true,  endpoint_bits: 11, delta_bits: [5, 4, 4] },
    ModeInfo { mode_bits: 0b00110, region_count: 2, transformed_endpoints: true,  endpoint_bits: 11, delta_bits: [4, 5, 4] },
    ModeInfo { mode_bits: 0b01010, region_count: 2, transformed_endpoints: true,  endpoint_bits: 11, delta_bits: [4, 4, 5] },
    ModeInfo { mode_bits: 0b01110, region_count: 2, transformed_endpoints: true,  endpoint_bits: 9,  delta_bits: [5, 5, 5] },
    ModeInfo { mode_bits: 0b10010, region_count: 2, transformed_endpoints: true,  endpoint_bits: 8,  delta_bits: [6, 5, 5] },
    ModeInfo { mode_bits: 0b10110, region_count: 2, transformed_endpoints: true,  endpoint_bits: 8,  delta_bits: [5, 6, 5] },
    ModeInfo { mode_bits: 0b11010, region_count: 2, transformed_endpoints: true,  endpoint_bits: 8,  delta_bits: [5, 5, 6] },
    ModeInfo { mode_bits: 0b11110, region_count: 2, transformed_endpoints: false, endpoint_bits: 6,  delta_bits: [6, 6, 6] },
    ModeInfo { mode_bits: 0b00011, region_count: 1, transformed_endpoints: false, endpoint_bits: 10, delta_bits: [10, 10, 10] },
    ModeInfo { mode_bits: 0b00111, region_count: 1, transformed_endpoints: true,  endpoint_bits: 11, delta_bits: [9, 9, 9] },
    ModeInfo { mode_bits: 0b01011, region_count: 1, transformed_endpoints: true,  endpoint_bits: 12, delta_bits: [8, 8, 8] },
    ModeInfo { mode_bits: 0b01111, region_count: 1, transformed_endpoints: true,  endpoint_bits: 16, delta_bits: [4, 4, 4] },
];

fn get_mode_info(mode_bits: u32) -> Option<&'static ModeInfo> {
    MODE_TABLE.iter().find(|info| info.mode_bits == mode_bits)
}

/// Reads the four packed endpoints of the block.
///
/// The endpoint fields are scattered across the block in a different fixed
/// layout per mode. `endpoints[0]`/`endpoints[1]` are the two ends of the
/// first line segment, `endpoints[2]`/`endpoints[3]` of the second (unused in
/// the one-region modes).
#[rustfmt::skip]
fn extract_endpoints(mode_bits: u32, block: &[u8]) -> [[i32; 3]; 4] {
    let seg = |start: u32, count: u32| extract_bit_segment(block, start, count) as i32;
    let mut ep = [[0i32; 3]; 4];

    match mode_bits {
        // Two line segment modes.
        0b00 => {
            // 10:5:5:5
            ep[0][0] = seg(5, 10);
            ep[0][1] = seg(15, 10);
            ep[0][2] = seg(25, 10);
            ep[1][0] = seg(35, 5);
            ep[1][1] = seg(45, 5);
            ep[1][2] = seg(55, 5);
            ep[2][0] = seg(65, 5);
            ep[2][1] = seg(41, 4) | (seg(2, 1) << 4);
            ep[2][2] = seg(61, 4) | (seg(3, 1) << 4);
            ep[3][0] = seg(71, 5);
            ep[3][1] = seg(51, 4) | (seg(40, 1) << 4);
            ep[3][2] = seg(50, 1) | (seg(60, 1) << 1) | (seg(70, 1) << 2)
                | (seg(76, 1) << 3) | (seg(4, 1) << 4);
        }
        0b01 => {
            // 7:6:6:6
            ep[0][0] = seg(5, 7);
            ep[0][1] = seg(15, 7);
            ep[0][2] = seg(25, 7);
            ep[1][0] = seg(35, 6);
            ep[1][1] = seg(45, 6);
            ep[1][2] = seg(55, 6);
            ep[2][0] = seg(65, 6);
            ep[2][1] = seg(41, 4) | (seg(24, 1) << 4) | (seg(2, 1) << 5);
            ep[2][2] = seg(61, 4) | (seg(14, 1) << 4) | (seg(22, 1) << 5);
            ep[3][0] = seg(71, 6);
            ep[3][1] = seg(51, 4) | (seg(3, 2) << 4);
            ep[3][2] = seg(12, 2) | (seg(23, 1) << 2) | (seg(32, 1) << 3)
                | (seg(34, 1) << 4) | (seg(33, 1) << 5);
        }
        0b00010 => {
            // 11:5:4:4
            ep[0][0] = seg(5, 10) | (seg(40, 1) << 10);
            ep[0][1] = seg(15, 10) | (seg(49, 1) << 10);
            ep[0][2] = seg(25, 10) | (seg(59, 1) << 10);
            ep[1][0] = seg(35, 5);
            ep[1][1] = seg(45, 4);
            ep[1][2] = seg(55, 4);
            ep[2][0] = seg(65, 5);
            ep[2][1] = seg(41, 4);
            ep[2][2] = seg(61, 4);
            ep[3][0] = seg(71, 5);
            ep[3][1] = seg(51, 4);
            ep[3][2] = seg(50, 1) | (seg(60, 1) << 1) | (seg(70, 1) << 2) | (seg(76, 1) << 3);
        }
        0b00110 => {
            // 11:4:5:4
            ep[0][0] = seg(5, 10) | (seg(39, 1) << 10);
            ep[0][1] = seg(15, 10) | (seg(50, 1) << 10);
            ep[0][2] = seg(25, 10) | (seg(59, 1) << 10);
            ep[1][0] = seg(35, 4);
            ep[1][1] = seg(45, 5);
            ep[1][2] = seg(55, 4);
            ep[2][0] = seg(65, 4);
            ep[2][1] = seg(41, 4) | (seg(75, 1) << 4);
            ep[2][2] = seg(61, 4);
            ep[3][0] = seg(71, 4);
            ep[3][1] = seg(51, 4) | (seg(40, 1) << 4);
            ep[3][2] = seg(69, 1) | (seg(60, 1) << 1) | (seg(70, 1) << 2) | (seg(76, 1) << 3);
        }
        0b01010 => {
            // 11:4:4:5
            ep[0][0] = seg(5, 10) | (seg(39, 1) << 10);
            ep[0][1] = seg(15, 10) | (seg(49, 1) << 10);
            ep[0][2] = seg(25, 10) | (seg(60, 1) << 10);
            ep[1][0] = seg(35, 4);
            ep[1][1] = seg(45, 4);
            ep[1][2] = seg(55, 5);
            ep[2][0] = seg(65, 4);
            ep[2][1] = seg(41, 4);
            ep[2][2] = seg(61, 4) | (seg(40, 1) << 4);
            ep[3][0] = seg(71, 4);
            ep[3][1] = seg(51, 4);
            ep[3][2] = seg(50, 1) | (seg(69, 1) << 1) | (seg(70, 1) << 2)
                | (seg(76, 1) << 3) | (seg(75, 1) << 4);
        }
        0b01110 => {
            // 9:5:5:5
            ep[0][0] = seg(5, 9);
            ep[0][1] = seg(15, 9);
            ep[0][2] = seg(25, 9);
            ep[1][0] = seg(35, 5);
            ep[1][1] = seg(45, 5);
            ep[1][2] = seg(55, 5);
            ep[2][0] = seg(65, 5);
            ep[2][1] = seg(41, 4) | (seg(24, 1) << 4);
            ep[2][2] = seg(61, 4) | (seg(14, 1) << 4);
            ep[3][0] = seg(71, 5);
            ep[3][1] = seg(51, 4) | (seg(40, 1) << 4);
            ep[3][2] = seg(50, 1) | (seg(60, 1) << 1) | (seg(70, 1) << 2)
                | (seg(76, 1) << 3) | (seg(34, 1) << 4);
        }
        0b10010 => {
            // 8:6:5:5
            ep[0][0] = seg(5, 8);
            ep[0][1] = seg(15, 8);
            ep[0][2] = seg(25, 8);
            ep[1][0] = seg(35, 6);
            ep[1][1] = seg(45, 5);
            ep[1][2] = seg(55, 5);
            ep[2][0] = seg(65, 6);
            ep[2][1] = seg(41, 4) | (seg(24, 1) << 4);
            ep[2][2] = seg(61, 4) | (seg(14, 1) << 4);
            ep[3][0] = seg(71, 6);
            ep[3][1] = seg(51, 4) | (seg(13, 1) << 4);
            ep[3][2] = seg(50, 1) | (seg(60, 1) << 1) | (seg(23, 1) << 2) | (seg(33, 2) << 3);
        }
        0b10110 => {
            // 8:5:6:5
            ep[0][0] = seg(5, 8);
            ep[0][1] = seg(15, 8);
            ep[0][2] = seg(25, 8);
            ep[1][0] = seg(35, 5);
            ep[1][1] = seg(45, 6);
            ep[1][2] = seg(55, 5);
            ep[2][0] = seg(65, 5);
            ep[2][1] = seg(41, 4) | (seg(24, 1) << 4) | (seg(23, 1) << 5);
            ep[2][2] = seg(61, 4) | (seg(14, 1) << 4);
            ep[3][0] = seg(71, 5);
            ep[3][1] = seg(51, 4) | (seg(40, 1) << 4) | (seg(33, 1) << 5);
            ep[3][2] = seg(13, 1) | (seg(60, 1) << 1) | (seg(70, 1) << 2)
                | (seg(76, 1) << 3) | (seg(34, 1) << 4);
        }
        0b11010 => {
            // 8:5:5:6
            ep[0][0] = seg(5, 8);
            ep[0][1] = seg(15, 8);
            ep[0][2] = seg(25, 8);
            ep[1][0] = seg(35, 5);
            ep[1][1] = seg(45, 5);
            ep[1][2] = seg(55, 6);
            ep[2][0] = seg(65, 5);
            ep[2][1] = seg(41, 4) | (seg(24, 1) << 4);
            ep[2][2] = seg(61, 4) | (seg(14, 1) << 4) | (seg(23, 1) << 5);
            ep[3][0] = seg(71, 5);
            ep[3][1] = seg(51, 4) | (seg(40, 1) << 4);
            ep[3][2] = seg(50, 1) | (seg(13, 1) << 1) | (seg(70, 1) << 2)
                | (seg(76, 1) << 3) | (seg(34, 1) << 4) | (seg(33, 1) << 5);
        }
        0b11110 => {
            // 6:6:6:6
            ep[0][0] = seg(5, 6);
            ep[0][1] = seg(15, 6);
            ep[0][2] = seg(25, 6);
            ep[1][0] = seg(35, 6);
            ep[1][1] = seg(45, 6);
            ep[1][2] = seg(55, 6);
            ep[2][0] = seg(65, 6);
            ep[2][1] = seg(41, 4) | (seg(24, 1) << 4) | (seg(21, 1) << 5);
            ep[2][2] = seg(61, 4) | (seg(14, 1) << 4) | (seg(22, 1) << 5);
            ep[3][0] = seg(71, 6);
            ep[3][1] = seg(51, 4) | (seg(11, 1) << 4) | (seg(31, 1) << 5);
            ep[3][2] = seg(12, 2) | (seg(23, 1) << 2) | (seg(32, 2) << 3)
                | (seg(34, 1) << 4) | (seg(33, 1) << 5);
        }
        // One line segment modes.
        0b00011 => {
            // 10:10
            ep[0][0] = seg(5, 10);
            ep[0][1] = seg(15, 10);
            ep[0][2] = seg(25, 10);
            ep[1][0] = seg(35, 10);
            ep[1][1] = seg(45, 10);
            ep[1][2] = seg(55, 10);
        }
        0b00111 => {
            // 11:9
            ep[0][0] = seg(5, 10) | (seg(44, 1) << 10);
            ep[0][1] = seg(15, 10) | (seg(54, 1) << 10);
            ep[0][2] = seg(25, 10) | (seg(64, 1) << 10);
            ep[1][0] = seg(35, 9);
            ep[1][1] = seg(45, 9);
            ep[1][2] = seg(55, 9);
        }
        0b01011 => {
            // 12:8
            ep[0][0] = seg(5, 10) | (seg(43, 1) << 10);
            ep[0][1] = seg(15, 10) | (seg(53, 1) << 10);
            ep[0][2] = seg(25, 10) | (seg(63, 1) << 10);
            ep[1][0] = seg(35, 8);
            ep[1][1] = seg(45, 8);
            ep[1][2] = seg(55, 8);
        }
        0b01111 => {
            // 16:4
            ep[0][0] = seg(5, 10) | (seg(39, 6) << 10);
            ep[0][1] = seg(15, 10) | (seg(49, 6) << 10);
            ep[0][2] = seg(25, 10) | (seg(59, 6) << 10);
            ep[1][0] = seg(35, 4);
            ep[1][1] = seg(45, 4);
            ep[1][2] = seg(55, 4);
        }
        _ => {}
    }

    ep
}

/// Reads the 16 palette indices. The first index of each region has one
/// implicit high zero bit, so one fewer bit is read for it. Index 0 always
/// anchors region 0; the region 1 anchor position depends on the shape.
fn extract_indices(block: &[u8], shape_index: usize, region_count: u8) -> [u8; 16] {
    let mut indices = [0u8; 16];

    if region_count == 1 {
        let mut cursor = 65;
        indices[0] = extract_bits(block, &mut cursor, 3) as u8;
        for index in indices.iter_mut().skip(1) {
            *index = extract_bits(block, &mut cursor, 4) as u8;
        }
    } else {
        let anchor = anchor_index(&PARTITIONS_2_SUBSET[shape_index], 1);
        let mut cursor = 82;
        indices[0] = extract_bits(block, &mut cursor, 2) as u8;
        for (i, index) in indices.iter_mut().enumerate().skip(1) {
            let bits = if i == anchor { 2 } else { 3 };
            *index = extract_bits(block, &mut cursor, bits) as u8;
        }
    }

    indices
}

fn extend_sign(value: i32, bits: u32) -> i32 {
    let shift = 32 - bits;
    (value << shift) >> shift
}

fn sign_extend_endpoints(info: &ModeInfo, signed: bool, endpoints: &mut [[i32; 3]; 4]) {
    let segment_count = if info.region_count == 2 { 4 } else { 2 };
    for channel in 0..3 {
        if signed {
            endpoints[0][channel] = extend_sign(endpoints[0][channel], info.endpoint_bits);
        }
        if info.transformed_endpoints || signed {
            for endpoint in endpoints.iter_mut().take(segment_count).skip(1) {
                endpoint[channel] = extend_sign(endpoint[channel], info.delta_bits[channel]);
            }
        }
    }
}

/// Adds the base endpoint to the deltas, wrapping at the endpoint precision.
fn transform_inverse(info: &ModeInfo, signed: bool, endpoints: &mut [[i32; 3]; 4]) {
    if !info.transformed_endpoints {
        return;
    }

    let mask = (1i32 << info.endpoint_bits) - 1;
    let segment_count = if info.region_count == 2 { 4 } else { 2 };
    for channel in 0..3 {
        let base = endpoints[0][channel];
        for endpoint in endpoints.iter_mut().take(segment_count).skip(1) {
            let value = (base.wrapping_add(endpoint[channel])) & mask;
            endpoint[channel] = if signed {
                extend_sign(value, info.endpoint_bits)
            } else {
                value
            };
        }
    }
}

fn unquantize(component: i32, bits_per_component: u32, signed: bool) -> i32 {
    if !signed {
        if bits_per_component >= 15 {
            component
        } else if component == 0 {
            0
        } else if component == (1 << bits_per_component) - 1 {
            0xFFFF
        } else {
            ((component << 16) + 0x8000) >> bits_per_component
        }
    } else if bits_per_component >= 16 {
        component
    } else {
        let magnitude = component.abs();
        let unq = if magnitude == 0 {
            0
        } else if magnitude >= (1 << (bits_per_component - 1)) - 1 {
            0x7FFF
        } else {
            ((magnitude << 15) + 0x4000) >> (bits_per_component - 1)
        };
        if component < 0 {
            -unq
        } else {
            unq
        }
    }
}

fn finish_unquantize(component: i32, signed: bool) -> u16 {
    if !signed {
        // Scale the magnitude by 31/64.
        ((component * 31) >> 6) as u16
    } else {
        // Scale the magnitude by 31/32 and store sign-magnitude, which is the
        // f16 bit pattern.
        let scaled = if component < 0 {
            -((-component * 31) >> 5)
        } else {
            (component * 31) >> 5
        };
        if scaled < 0 {
            (0x8000 | -scaled) as u16
        } else {
            scaled as u16
        }
    }
}

fn generate_palette(
    info: &ModeInfo,
    region: usize,
    signed: bool,
    endpoints: &[[i32; 3]; 4],
    palette: &mut [[u16; 3]; 16],
) {
    let (num_indices, weights): (usize, &[i32]) = if info.region_count == 2 {
        (8, &WEIGHT3)
    } else {
        (16, &WEIGHT4)
    };

    for channel in 0..3 {
        let a = unquantize(endpoints[2 * region][channel], info.endpoint_bits, signed);
        let b = unquantize(endpoints[2 * region + 1][channel], info.endpoint_bits, signed);

        for index in 0..num_indices {
            palette[8 * region + index][channel] =
                finish_unquantize(interpolate(a, b, weights, index), signed);
        }
    }
}

/// Decodes a BC6H block by reading 16 bytes from `compressed_block` and
/// writing the RGB16F data into `decompressed_block` with `destination_pitch`
/// many bytes per output row. A block with an unrecognized mode decodes to
/// all zeroes.
pub fn decode_block_bc6h(
    compressed_block: &[u8],
    decompressed_block: &mut [u8],
    destination_pitch: usize,
    signed: bool,
) {
    let num_mode_bits = if (compressed_block[0] & 0x3) < 2 { 2 } else { 5 };
    let mut cursor = 0;
    let mode_bits = extract_bits(compressed_block, &mut cursor, num_mode_bits);

    let Some(info) = get_mode_info(mode_bits) else {
        for i in 0..4 {
            decompressed_block[i * destination_pitch..][..24].fill(0);
        }
        return;
    };

    let mut endpoints = extract_endpoints(info.mode_bits, compressed_block);

    let shape_index = if info.region_count == 2 {
        extract_bit_segment(compressed_block, 77, 5) as usize
    } else {
        0
    };

    let indices = extract_indices(compressed_block, shape_index, info.region_count);

    sign_extend_endpoints(info, signed, &mut endpoints);
    transform_inverse(info, signed, &mut endpoints);

    let mut palette = [[0u16; 3]; 16];
    for region in 0..info.region_count as usize {
        generate_palette(info, region, signed, &endpoints, &mut palette);
    }

    let partition = &PARTITIONS_2_SUBSET[shape_index];
    for i in 0..16 {
        let region = if info.region_count == 1 {
            0
        } else {
            subset_index(partition, i)
        };
        let color = palette[8 * region + indices[i] as usize];

        let output = &mut decompressed_block[(i / 4) * destination_pitch + (i % 4) * 6..][..6];
        output[0..2].copy_from_slice(&color[0].to_le_bytes());
        output[2..4].copy_from_slice(&color[1].to_le_bytes());
        output[4..6].copy_from_slice(&color[2].to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_to_u16(compressed_block: &[u8], signed: bool) -> [u16; 48] {
        let mut decoded = [0u8; 96];
        decode_block_bc6h(compressed_block, &mut decoded, 24, signed);

        let mut values = [0u16; 48];
        for (value, bytes) in values.iter_mut().zip(decoded.chunks_exact(2)) {
            *value = u16::from_le_bytes([bytes[0], bytes[1]]);
        }
        values
    }

    #[test]
    fn bc6h_signed_two_region_block() {
        let compressed_block = [
            0x40, 0xAF, 0xF6, 0x0B, 0xFD, 0x2E, 0xFF, 0xFF, 0x11, 0x71, 0x10, 0xA1, 0x21, 0xF2,
            0x33, 0x73,
        ];
        let expected: [u16; 48] = [
            0x5BAB, 0x84B9, 0xDBE9, 0x5BA2, 0x84F6, 0xDBF1, 0x5B99, 0x8533, 0xDBFA, 0x5D9B,
            0x8307, 0xD847, 0x5B7E, 0x85F0, 0xDC15, 0x5BA2, 0x84F6, 0xDBF1, 0x5CC3, 0x81E8,
            0xD8D6, 0x5D9B, 0x8307, 0xD847, 0x5BA2, 0x84F6, 0xDBF1, 0x5B6D, 0x866B, 0xDC27,
            0x5C27, 0x8117, 0xD93F, 0x5CC3, 0x81E8, 0xD8D6, 0x5BA2, 0x84F6, 0xDBF1, 0x5CFE,
            0x8235, 0xD8AF, 0x5C5B, 0x815C, 0xD91C, 0x5D66, 0x82C1, 0xD869,
        ];

        assert_eq!(decode_to_u16(&compressed_block, true), expected);
    }

    #[test]
    fn bc6h_unrecognized_mode_decodes_to_zero() {
        // 5-bit mode patterns ending in 0b11 above 0b01111 are reserved.
        let mut compressed_block = [0xFFu8; 16];
        compressed_block[0] = 0b11111;

        assert_eq!(decode_to_u16(&compressed_block, false), [0u16; 48]);
        assert_eq!(decode_to_u16(&compressed_block, true), [0u16; 48]);
    }

    #[test]
    fn bc6h_one_region_anchor_uses_fewer_bits() {
        // Mode 0b00011 stores raw 10-bit endpoints and untransformed values.
        // Endpoint A = 0 and B = 1023 in every channel, all indices at the
        // maximum weight, so every pixel unquantizes to 0xFFFF scaled by
        // 31/64.
        let mut compressed_block = [0u8; 16];
        compressed_block[0] = 0b00011;
        // Endpoint A spans bits 5..35 (zero), endpoint B spans bits 35..65.
        for bit in 35..65u32 {
            compressed_block[(bit / 8) as usize] |= 1 << (bit % 8);
        }
        // Index stream: 3 bits for the anchor, 4 bits for the rest, all ones.
        for bit in 65..128u32 {
            compressed_block[(bit / 8) as usize] |= 1 << (bit % 8);
        }

        // The anchor pixel reads 3 bits (index 7, weight 30); the rest read
        // the full 4 bits (index 15, weight 64).
        let full = ((0xFFFF * 31) >> 6) as u16;
        let anchor = (((((0xFFFF * 30) + 32) >> 6) * 31) >> 6) as u16;
        let mut expected = [full; 48];
        expected[..3].fill(anchor);
        assert_eq!(decode_to_u16(&compressed_block, false), expected);
    }
}
