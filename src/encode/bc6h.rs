use super::common::*;
use crate::settings::BC6HSettings;

/// One scattered endpoint field of a BC6H mode: `bits` bits of endpoint
/// `ep`, channel `ch`, starting at endpoint bit `shift`, stored at stream
/// bit `pos`. Listed as `(ep, ch, pos, bits, shift)`.
type Field = (u8, u8, u8, u8, u8);

struct ModeDesc {
    prefix: u32,
    prefix_bits: u32,
    endpoint_bits: u32,
    delta_bits: [u32; 3],
    transformed: bool,
    fields: &'static [Field],
}

/// Field layout of the 14 D3D BC6H modes, in encoder order: the ten
/// two-region modes first, then the four one-region modes. Transcribed
/// from the extraction order of the decode side so the two stay in
/// agreement.
#[rustfmt::skip]
static MODES: [ModeDesc; 14] = [
    // 10:5:5:5
    ModeDesc { prefix: 0, prefix_bits: 2, endpoint_bits: 10, delta_bits: [5, 5, 5], transformed: true, fields: &[
        (0, 0, 5, 10, 0), (0, 1, 15, 10, 0), (0, 2, 25, 10, 0),
        (1, 0, 35, 5, 0), (1, 1, 45, 5, 0), (1, 2, 55, 5, 0),
        (2, 0, 65, 5, 0), (2, 1, 41, 4, 0), (2, 1, 2, 1, 4), (2, 2, 61, 4, 0), (2, 2, 3, 1, 4),
        (3, 0, 71, 5, 0), (3, 1, 51, 4, 0), (3, 1, 40, 1, 4),
        (3, 2, 50, 1, 0), (3, 2, 60, 1, 1), (3, 2, 70, 1, 2), (3, 2, 76, 1, 3), (3, 2, 4, 1, 4),
    ] },
    // 7:6:6:6
    ModeDesc { prefix: 1, prefix_bits: 2, endpoint_bits: 7, delta_bits: [6, 6, 6], transformed: true, fields: &[
        (0, 0, 5, 7, 0), (0, 1, 15, 7, 0), (0, 2, 25, 7, 0),
        (1, 0, 35, 6, 0), (1, 1, 45, 6, 0), (1, 2, 55, 6, 0),
        (2, 0, 65, 6, 0), (2, 1, 41, 4, 0), (2, 1, 24, 1, 4), (2, 1, 2, 1, 5),
        (2, 2, 61, 4, 0), (2, 2, 14, 1, 4), (2, 2, 22, 1, 5),
        (3, 0, 71, 6, 0), (3, 1, 51, 4, 0), (3, 1, 3, 2, 4),
        (3, 2, 12, 2, 0), (3, 2, 23, 1, 2), (3, 2, 32, 1, 3), (3, 2, 34, 1, 4), (3, 2, 33, 1, 5),
    ] },
    // 11:5:4:4
    ModeDesc { prefix: 2, prefix_bits: 5, endpoint_bits: 11, delta_bits: [5, 4, 4], transformed: true, fields: &[
        (0, 0, 5, 10, 0), (0, 0, 40, 1, 10), (0, 1, 15, 10, 0), (0, 1, 49, 1, 10),
        (0, 2, 25, 10, 0), (0, 2, 59, 1, 10),
        (1, 0, 35, 5, 0), (1, 1, 45, 4, 0), (1, 2, 55, 4, 0),
        (2, 0, 65, 5, 0), (2, 1, 41, 4, 0), (2, 2, 61, 4, 0),
        (3, 0, 71, 5, 0), (3, 1, 51, 4, 0),
        (3, 2, 50, 1, 0), (3, 2, 60, 1, 1), (3, 2, 70, 1, 2), (3, 2, 76, 1, 3),
    ] },
    // 11:4:5:4
    ModeDesc { prefix: 6, prefix_bits: 5, endpoint_bits: 11, delta_bits: [4, 5, 4], transformed: true, fields: &[
        (0, 0, 5, 10, 0), (0, 0, 39, 1, 10), (0, 1, 15, 10, 0), (0, 1, 50, 1, 10),
        (0, 2, 25, 10, 0), (0, 2, 59, 1, 10),
        (1, 0, 35, 4, 0), (1, 1, 45, 5, 0), (1, 2, 55, 4, 0),
        (2, 0, 65, 4, 0), (2, 1, 41, 4, 0), (2, 1, 75, 1, 4), (2, 2, 61, 4, 0),
        (3, 0, 71, 4, 0), (3, 1, 51, 4, 0), (3, 1, 40, 1, 4),
        (3, 2, 69, 1, 0), (3, 2, 60, 1, 1), (3, 2, 70, 1, 2), (3, 2, 76, 1, 3),
    ] },
    // 11:4:4:5
    ModeDesc { prefix: 10, prefix_bits: 5, endpoint_bits: 11, delta_bits: [4, 4, 5], transformed: true, fields: &[
        (0, 0, 5, 10, 0), (0, 0, 39, 1, 10), (0, 1, 15, 10, 0), (0, 1, 49, 1, 10),
        (0, 2, 25, 10, 0), (0, 2, 60, 1, 10),
        (1, 0, 35, 4, 0), (1, 1, 45, 4, 0), (1, 2, 55, 5, 0),
        (2, 0, 65, 4, 0), (2, 1, 41, 4, 0), (2, 2, 61, 4, 0), (2, 2, 40, 1, 4),
        (3, 0, 71, 4, 0), (3, 1, 51, 4, 0),
        (3, 2, 50, 1, 0), (3, 2, 69, 1, 1), (3, 2, 70, 1, 2), (3, 2, 76, 1, 3), (3, 2, 75, 1, 4),
    ] },
    // 9:5:5:5
    ModeDesc { prefix: 14, prefix_bits: 5, endpoint_bits: 9, delta_bits: [5, 5, 5], transformed: true, fields: &[
        (0, 0, 5, 9, 0), (0, 1, 15, 9, 0), (0, 2, 25, 9, 0),
        (1, 0, 35, 5, 0), (1, 1, 45, 5, 0), (1, 2, 55, 5, 0),
        (2, 0, 65, 5, 0), (2, 1, 41, 4, 0), (2, 1, 24, 1, 4), (2, 2, 61, 4, 0), (2, 2, 14, 1, 4),
        (3, 0, 71, 5, 0), (3, 1, 51, 4, 0), (3, 1, 40, 1, 4),
        (3, 2, 50, 1, 0), (3, 2, 60, 1, 1), (3, 2, 70, 1, 2), (3, 2, 76, 1, 3), (3, 2, 34, 1, 4),
    ] },
    // 8:6:5:5
    ModeDesc { prefix: 18, prefix_bits: 5, endpoint_bits: 8, delta_bits: [6, 5, 5], transformed: true, fields: &[
        (0, 0, 5, 8, 0), (0, 1, 15, 8, 0), (0, 2, 25, 8, 0),
        (1, 0, 35, 6, 0), (1, 1, 45, 5, 0), (1, 2, 55, 5, 0),
        (2, 0, 65, 6, 0), (2, 1, 41, 4, 0), (2, 1, 24, 1, 4), (2, 2, 61, 4, 0), (2, 2, 14, 1, 4),
        (3, 0, 71, 6, 0), (3, 1, 51, 4, 0), (3, 1, 13, 1, 4),
        (3, 2, 50, 1, 0), (3, 2, 60, 1, 1), (3, 2, 23, 1, 2), (3, 2, 33, 2, 3),
    ] },
    // 8:5:6:5
    ModeDesc { prefix: 22, prefix_bits: 5, endpoint_bits: 8, delta_bits: [5, 6, 5], transformed: true, fields: &[
        (0, 0, 5, 8, 0), (0, 1, 15, 8, 0), (0, 2, 25, 8, 0),
        (1, 0, 35, 5, 0), (1, 1, 45, 6, 0), (1, 2, 55, 5, 0),
        (2, 0, 65, 5, 0), (2, 1, 41, 4, 0), (2, 1, 24, 1, 4), (2, 1, 23, 1, 5),
        (2, 2, 61, 4, 0), (2, 2, 14, 1, 4),
        (3, 0, 71, 5, 0), (3, 1, 51, 4, 0), (3, 1, 40, 1, 4), (3, 1, 33, 1, 5),
        (3, 2, 13, 1, 0), (3, 2, 60, 1, 1), (3, 2, 70, 1, 2), (3, 2, 76, 1, 3), (3, 2, 34, 1, 4),
    ] },
    // 8:5:5:6
    ModeDesc { prefix: 26, prefix_bits: 5, endpoint_bits: 8, delta_bits: [5, 5, 6], transformed: true, fields: &[
        (0, 0, 5, 8, 0), (0, 1, 15, 8, 0), (0, 2, 25, 8, 0),
        (1, 0, 35, 5, 0), (1, 1, 45, 5, 0), (1, 2, 55, 6, 0),
        (2, 0, 65, 5, 0), (2, 1, 41, 4, 0), (2, 1, 24, 1, 4),
        (2, 2, 61, 4, 0), (2, 2, 14, 1, 4), (2, 2, 23, 1, 5),
        (3, 0, 71, 5, 0), (3, 1, 51, 4, 0), (3, 1, 40, 1, 4),
        (3, 2, 50, 1, 0), (3, 2, 13, 1, 1), (3, 2, 70, 1, 2), (3, 2, 76, 1, 3),
        (3, 2, 34, 1, 4), (3, 2, 33, 1, 5),
    ] },
    // 6:6:6:6, untransformed
    ModeDesc { prefix: 30, prefix_bits: 5, endpoint_bits: 6, delta_bits: [6, 6, 6], transformed: false, fields: &[
        (0, 0, 5, 6, 0), (0, 1, 15, 6, 0), (0, 2, 25, 6, 0),
        (1, 0, 35, 6, 0), (1, 1, 45, 6, 0), (1, 2, 55, 6, 0),
        (2, 0, 65, 6, 0), (2, 1, 41, 4, 0), (2, 1, 24, 1, 4), (2, 1, 21, 1, 5),
        (2, 2, 61, 4, 0), (2, 2, 14, 1, 4), (2, 2, 22, 1, 5),
        (3, 0, 71, 6, 0), (3, 1, 51, 4, 0), (3, 1, 11, 1, 4), (3, 1, 31, 1, 5),
        (3, 2, 12, 2, 0), (3, 2, 23, 1, 2), (3, 2, 32, 1, 3), (3, 2, 34, 1, 4), (3, 2, 33, 1, 5),
    ] },
    // 10:10, untransformed
    ModeDesc { prefix: 3, prefix_bits: 5, endpoint_bits: 10, delta_bits: [10, 10, 10], transformed: false, fields: &[
        (0, 0, 5, 10, 0), (0, 1, 15, 10, 0), (0, 2, 25, 10, 0),
        (1, 0, 35, 10, 0), (1, 1, 45, 10, 0), (1, 2, 55, 10, 0),
    ] },
    // 11:9
    ModeDesc { prefix: 7, prefix_bits: 5, endpoint_bits: 11, delta_bits: [9, 9, 9], transformed: true, fields: &[
        (0, 0, 5, 10, 0), (0, 0, 44, 1, 10), (0, 1, 15, 10, 0), (0, 1, 54, 1, 10),
        (0, 2, 25, 10, 0), (0, 2, 64, 1, 10),
        (1, 0, 35, 9, 0), (1, 1, 45, 9, 0), (1, 2, 55, 9, 0),
    ] },
    // 12:8, base bit 11 has no slot
    ModeDesc { prefix: 11, prefix_bits: 5, endpoint_bits: 12, delta_bits: [8, 8, 8], transformed: true, fields: &[
        (0, 0, 5, 10, 0), (0, 0, 43, 1, 10), (0, 1, 15, 10, 0), (0, 1, 53, 1, 10),
        (0, 2, 25, 10, 0), (0, 2, 63, 1, 10),
        (1, 0, 35, 8, 0), (1, 1, 45, 8, 0), (1, 2, 55, 8, 0),
    ] },
    // 16:4
    ModeDesc { prefix: 15, prefix_bits: 5, endpoint_bits: 16, delta_bits: [4, 4, 4], transformed: true, fields: &[
        (0, 0, 5, 10, 0), (0, 0, 39, 6, 10), (0, 1, 15, 10, 0), (0, 1, 49, 6, 10),
        (0, 2, 25, 10, 0), (0, 2, 59, 6, 10),
        (1, 0, 35, 4, 0), (1, 1, 45, 4, 0), (1, 2, 55, 4, 0),
    ] },
];

/// BC6H mode ladder encoder.
///
/// The working block holds half float bit patterns widened to f32. For the
/// signed variant the sign-magnitude patterns are mapped to `-magnitude`,
/// which keeps the working domain monotonic so the shared PCA and least
/// squares machinery applies unchanged.
pub(crate) struct BlockCompressorBC6H<'a> {
    block: [f32; 64],
    data: [u32; 5],
    best_err: f32,

    rgb_bounds: [f32; 6],
    max_span: f32,
    max_span_idx: usize,

    mode: usize,
    epb: u32,
    qbounds: [i32; 8],
    signed: bool,
    settings: &'a BC6HSettings,
}

impl<'a> BlockCompressorBC6H<'a> {
    pub(crate) fn new(settings: &'a BC6HSettings, signed: bool) -> Self {
        Self {
            block: [0.0; 64],
            data: [0; 5],
            best_err: f32::INFINITY,
            rgb_bounds: [0.0; 6],
            max_span: 0.0,
            max_span_idx: 0,
            mode: 0,
            epb: 0,
            qbounds: [0; 8],
            signed,
            settings,
        }
    }

    /// Loads a 4x4 block of half float pixels, clamping pixel coordinates to
    /// the image bounds. Alpha is ignored.
    ///
    /// Unsigned encoding clamps negative inputs to zero. Signed encoding
    /// maps the sign-magnitude bit patterns to a monotonic integer scale,
    /// which also folds negative zero onto positive zero.
    pub(crate) fn load_block_interleaved_16bit(
        &mut self,
        rgba_data: &[half::f16],
        xx: usize,
        yy: usize,
        width: usize,
        height: usize,
        stride: usize,
    ) {
        for y in 0..4 {
            for x in 0..4 {
                let pixel_x = usize::min(xx * 4 + x, width - 1);
                let pixel_y = usize::min(yy * 4 + y, height - 1);

                let offset = pixel_y * stride + pixel_x * 4;

                for p in 0..3 {
                    let bits = rgba_data[offset + p].to_bits();
                    let value = if self.signed {
                        let magnitude = (bits & 0x7FFF) as f32;
                        if bits & 0x8000 != 0 {
                            -magnitude
                        } else {
                            magnitude
                        }
                    } else if bits & 0x8000 != 0 {
                        0.0
                    } else {
                        bits as f32
                    };

                    self.block[p * 16 + y * 4 + x] = value;
                }

                self.block[48 + y * 4 + x] = 0.0;
            }
        }
    }

    pub(crate) fn store_data(
        &self,
        blocks_buffer: &mut [u8],
        block_width: usize,
        xx: usize,
        yy: usize,
    ) {
        let offset = (yy * block_width + xx) * 16;

        for (index, &value) in self.data[..4].iter().enumerate() {
            let byte_offset = offset + index * 4;
            blocks_buffer[byte_offset] = value as u8;
            blocks_buffer[byte_offset + 1] = (value >> 8) as u8;
            blocks_buffer[byte_offset + 2] = (value >> 16) as u8;
            blocks_buffer[byte_offset + 3] = (value >> 24) as u8;
        }
    }

    /// Largest endpoint span a mode's delta width can still track, in the
    /// working domain. Modes 3/4 and 7/8 are reached through their group's
    /// base mode and carry no entry of their own.
    fn mode_span(mode: usize) -> f32 {
        const SPAN_TABLE: [f32; 14] = [
            0.9 * 65535.0 / 64.0,  // (0) 4 / 10
            0.9 * 65535.0 / 4.0,   // (1) 5 / 7
            0.8 * 65535.0 / 256.0, // (2) 3 / 11
            -1.0,
            -1.0,
            0.9 * 65535.0 / 32.0, // (5) 4 / 9
            0.9 * 65535.0 / 16.0, // (6) 4 / 8
            -1.0,
            -1.0,
            65535.0,               // (9) absolute
            65535.0,               // (10) absolute
            0.95 * 65535.0 / 8.0,  // (11) 8 / 11
            0.95 * 65535.0 / 32.0, // (12) 7 / 12
            6.0,                   // (13) 3 / 16
        ];

        SPAN_TABLE[mode]
    }

    /// Full working range of the unquantized domain: 16 bits unsigned,
    /// 15 bits of magnitude signed.
    fn quant_range(&self) -> f32 {
        if self.signed {
            0x7FFF as f32
        } else {
            0xFFFF as f32
        }
    }

    fn quant_value(v: f32, bits: u32, range: f32, signed: bool) -> i32 {
        if signed {
            let max_q = (1 << (bits - 1)) - 1;
            let scaled = v / range * max_q as f32;
            let rounded = if scaled >= 0.0 {
                (scaled + 0.5) as i32
            } else {
                (scaled - 0.5) as i32
            };
            i32::clamp(rounded, -max_q, max_q)
        } else {
            let levels = 1 << bits;
            let scaled = (v / range * (levels - 1) as f32 + 0.5) as i32;
            i32::clamp(scaled, 0, levels - 1)
        }
    }

    fn compute_qbounds_core(&mut self, rgb_span: [f32; 3]) {
        let mut bounds = [0.0; 8];

        for p in 0..3 {
            let middle = (self.rgb_bounds[p] + self.rgb_bounds[3 + p]) / 2.0;
            bounds[p] = middle - rgb_span[p] / 2.0;
            bounds[4 + p] = middle + rgb_span[p] / 2.0;
        }

        let range = self.quant_range();
        for i in 0..8 {
            self.qbounds[i] = Self::quant_value(bounds[i], self.epb, range, self.signed);
        }
    }

    fn compute_qbounds(&mut self, span: f32) {
        self.compute_qbounds_core([span, span, span]);
    }

    fn compute_qbounds2(&mut self, span: f32, max_span_idx: usize) {
        let mut rgb_span = [span, span, span];
        if max_span_idx < 3 {
            rgb_span[max_span_idx] *= 2.0;
        }
        self.compute_qbounds_core(rgb_span);
    }

    fn unpack_to_uf16(v: u32, bits: u32) -> u32 {
        if bits >= 15 {
            return v;
        }
        if v == 0 {
            return 0;
        }
        if v == (1 << bits) - 1 {
            return 0xFFFF;
        }

        (v * 2 + 1) << (15 - bits)
    }

    fn unpack_to_sf16(v: i32, bits: u32) -> i32 {
        if bits >= 16 {
            return v;
        }

        let negative = v < 0;
        let magnitude = if negative { -v } else { v };

        let unpacked = if magnitude == 0 {
            0
        } else if magnitude >= (1 << (bits - 1)) - 1 {
            0x7FFF
        } else {
            (magnitude * 2 + 1) << (15 - bits)
        };

        if negative {
            -unpacked
        } else {
            unpacked
        }
    }

    fn quantize_endpoints(&self, qep: &mut [i32; 24], ep: &[f32; 24], bits: u32, pairs: usize) {
        let range = self.quant_range();
        for i in 0..8 * pairs {
            qep[i] = Self::quant_value(ep[i], bits, range, self.signed);
        }
    }

    fn dequantize_endpoints(&self, ep: &mut [f32; 24], qep: &[i32; 24], bits: u32, pairs: usize) {
        for i in 0..8 * pairs {
            ep[i] = if self.signed {
                Self::unpack_to_sf16(qep[i], bits) as f32
            } else {
                Self::unpack_to_uf16(qep[i] as u32, bits) as f32
            };
        }
    }

    fn quantize_dequantize(&self, qep: &mut [i32; 24], ep: &mut [f32; 24], pairs: usize) {
        let bits = self.epb;
        self.quantize_endpoints(qep, ep, bits, pairs);

        for i in 0..2 * pairs {
            for p in 0..3 {
                qep[i * 4 + p] = i32::clamp(qep[i * 4 + p], self.qbounds[p], self.qbounds[4 + p]);
            }
        }

        self.dequantize_endpoints(ep, qep, bits, pairs);
    }

    /// Scatters the quantized endpoints of `mode` into the stream, prefix
    /// included. Non-base endpoints of transformed modes are stored as
    /// deltas modulo their channel's delta width.
    fn pack_endpoints(stream: &mut BlockStream, qep: &[i32; 24], mode: usize) {
        let desc = &MODES[mode];
        stream.put_at(0, desc.prefix_bits, desc.prefix);

        let base_mask = (1i32 << desc.endpoint_bits) - 1;
        let segments = if mode <= 9 { 4 } else { 2 };

        let mut packed = [[0i32; 3]; 4];
        for (i, value) in packed.iter_mut().take(segments).enumerate() {
            for ch in 0..3 {
                let raw = qep[i * 4 + ch];
                value[ch] = if i == 0 || !desc.transformed {
                    raw & base_mask
                } else {
                    (raw - qep[ch]) & ((1 << desc.delta_bits[ch]) - 1)
                };
            }
        }

        for &(ep, ch, pos, bits, shift) in desc.fields {
            let v = (packed[ep as usize][ch as usize] >> shift) as u32 & ((1 << bits) - 1);
            stream.put_at(pos as u32, bits as u32, v);
        }
    }

    fn code_2p(&mut self, qep: &mut [i32; 24], qblock: [u32; 2], part_id: i32) {
        let flips = flip_subset_indices(qep, qblock, 3, 2, part_id);

        let mut stream = BlockStream::new();
        Self::pack_endpoints(&mut stream, qep, self.mode);
        stream.put_at(77, 5, part_id as u32);
        stream.seek(82);
        stream.put_indices(qblock, 3, flips);
        stream.compact_anchors(2, 3, part_id);
        self.data = stream.into_data();
    }

    fn code_1p(&mut self, qep: &mut [i32; 24], qblock: &mut [u32; 2]) {
        flip_single_indices(qep, 4, qblock, 4);

        let mut stream = BlockStream::new();
        Self::pack_endpoints(&mut stream, qep, self.mode);
        stream.seek(65);
        stream.put_indices(*qblock, 4, 0);
        self.data = stream.into_data();
    }

    fn encode_2p(&mut self) {
        let mut full_stats = [0.0; 15];
        masked_moments(&mut full_stats, &self.block, 0xFFFFFFFF, 3);

        let mut part_list = [0; 32];
        for part in 0..32 {
            let mask = subset_mask(part, 0);
            let bound12 = split_pca_bound(&self.block, mask, full_stats, 3);
            let bound = bound12 as i32;
            part_list[part as usize] = part + bound * 64;
        }

        partial_sort(&mut part_list, 32, self.settings.fast_skip_threshold);
        self.encode_2p_ranked(&part_list, self.settings.fast_skip_threshold);
    }

    fn encode_2p_partition(
        &self,
        qep: &mut [i32; 24],
        qblock: &mut [u32; 2],
        part_id: i32,
    ) -> f32 {
        let pattern = subset_pattern(part_id);
        let bits = 3;
        let pairs = 2;
        let channels = 3;

        let mut ep = [0.0; 24];
        for j in 0..pairs as usize {
            let mask = subset_mask(part_id, j as u32);
            fit_segment(&mut ep[j * 8..], &self.block, mask, channels);
        }

        self.quantize_dequantize(qep, &mut ep, 2);

        quantize_block(qblock, &self.block, bits, &ep, pattern, channels)
    }

    fn encode_2p_ranked(&mut self, part_list: &[i32; 32], part_count: u32) {
        if part_count == 0 {
            return;
        }

        let bits = 3;
        let pairs = 2;
        let channels = 3;

        let mut best_qep = [0; 24];
        let mut best_qblock = [0; 2];
        let mut best_part_id = -1;
        let mut best_err = f32::INFINITY;

        for part in 0..part_count as usize {
            let part_id = (*part_list)[part] & 31;

            let mut qep = [0; 24];
            let mut qblock = [0; 2];
            let err = self.encode_2p_partition(&mut qep, &mut qblock, part_id);

            if err < best_err {
                best_qep[..(8 * pairs)].copy_from_slice(&qep[..(8 * pairs)]);
                best_qblock.copy_from_slice(&qblock);
                best_part_id = part_id;
                best_err = err;
            }
        }

        // Refine
        for _ in 0..self.settings.refine_iterations_2p {
            let mut ep = [0.0; 24];
            for j in 0..pairs {
                let mask = subset_mask(best_part_id, j as u32);
                least_squares_endpoints(
                    &mut ep[j * 8..],
                    &self.block,
                    bits,
                    best_qblock,
                    mask,
                    channels,
                );
            }

            let mut qep = [0; 24];
            let mut qblock = [0; 2];
            self.quantize_dequantize(&mut qep, &mut ep, 2);

            let pattern = subset_pattern(best_part_id);
            let err = quantize_block(&mut qblock, &self.block, bits, &ep, pattern, channels);

            if err < best_err {
                best_qep[..(8 * pairs)].copy_from_slice(&qep[..(8 * pairs)]);
                best_qblock.copy_from_slice(&qblock);
                best_err = err;
            }
        }

        if best_err < self.best_err {
            self.best_err = best_err;
            self.code_2p(&mut best_qep, best_qblock, best_part_id);
        }
    }

    fn encode_1p(&mut self) {
        let mut ep = [0.0; 24];
        fit_segment(&mut ep, &self.block, 0xFFFFFFFF, 3);

        let mut qep = [0; 24];
        self.quantize_dequantize(&mut qep, &mut ep, 1);

        let mut qblock = [0; 2];
        let mut err = quantize_block(&mut qblock, &self.block, 4, &ep, 0, 3);

        // Refine
        let refine_iterations = self.settings.refine_iterations_1p;
        for _ in 0..refine_iterations {
            least_squares_endpoints(&mut ep, &self.block, 4, qblock, 0xFFFFFFFF, 3);
            self.quantize_dequantize(&mut qep, &mut ep, 1);
            err = quantize_block(&mut qblock, &self.block, 4, &ep, 0, 3);
        }

        if err < self.best_err {
            self.best_err = err;
            self.code_1p(&mut qep, &mut qblock);
        }
    }

    /// Whether the block's endpoints stay inside the 11 base bits the 12:8
    /// layout can actually store. Its twelfth bit has no slot in the
    /// stream, so endpoints past the low half of the quantized range (or
    /// below zero, signed) would come back corrupted.
    fn mode12_fits(&self) -> bool {
        let range = self.quant_range();
        let limit = if self.signed {
            range
        } else {
            range * 2047.0 / 4095.0
        };

        (0..3).all(|p| self.rgb_bounds[p] >= 0.0 && self.rgb_bounds[3 + p] <= limit)
    }

    fn consider_mode(&mut self, mode: usize, enc: bool, margin: f32) {
        let span = Self::mode_span(mode);
        let max_span = self.max_span;
        let max_span_idx = self.max_span_idx;

        if max_span * margin > span {
            return;
        }
        if mode == 12 && !self.mode12_fits() {
            return;
        }

        if mode >= 10 {
            self.epb = MODES[mode].endpoint_bits;
            self.mode = mode;
            self.compute_qbounds(span);
            if mode == 12 {
                for q in self.qbounds.iter_mut() {
                    *q = (*q).clamp(0, 0x7FF);
                }
            }
            if enc {
                self.encode_1p();
            }
        } else if mode <= 1 || mode == 5 || mode == 9 {
            self.epb = MODES[mode].endpoint_bits;
            self.mode = mode;
            self.compute_qbounds(span);
            if enc {
                self.encode_2p();
            }
        } else {
            self.epb = MODES[mode].endpoint_bits;
            self.mode = mode + max_span_idx;
            self.compute_qbounds2(span, max_span_idx);
            if enc {
                self.encode_2p();
            }
        }
    }

    fn setup(&mut self) {
        for p in 0..3 {
            self.rgb_bounds[p] = 0xFFFF as f32;
            self.rgb_bounds[3 + p] = -(0xFFFF as f32);
        }

        // The decode side scales unquantized values by 31/64 unsigned and
        // 31/32 signed; working in the inverse-scaled domain makes the
        // quantizer a plain division by the full range.
        let scale = if self.signed { 32.0 / 31.0 } else { 64.0 / 31.0 };

        for p in 0..3 {
            for k in 0..16 {
                let value = self.block[p * 16 + k] * scale;
                self.block[p * 16 + k] = value;
                self.rgb_bounds[p] = f32::min(self.rgb_bounds[p], value);
                self.rgb_bounds[3 + p] = f32::max(self.rgb_bounds[3 + p], value);
            }
        }

        self.max_span = 0.0;
        self.max_span_idx = 0;

        for p in 0..3 {
            let span = self.rgb_bounds[3 + p] - self.rgb_bounds[p];
            if span > self.max_span {
                self.max_span_idx = p;
                self.max_span = span;
            }
        }
    }

    pub(crate) fn compress_block(&mut self) {
        self.setup();

        if self.settings.slow_mode != 0 {
            self.consider_mode(0, true, 0.0);
            self.consider_mode(1, true, 0.0);
            self.consider_mode(2, true, 0.0);
            self.consider_mode(5, true, 0.0);
            self.consider_mode(6, true, 0.0);
            self.consider_mode(9, true, 0.0);
            self.consider_mode(10, true, 0.0);
            self.consider_mode(11, true, 0.0);
            self.consider_mode(12, true, 0.0);
            self.consider_mode(13, true, 0.0);
        } else {
            if self.settings.fast_skip_threshold > 0 {
                self.consider_mode(9, false, 0.0);

                if self.settings.fast_mode != 0 {
                    self.consider_mode(1, false, 1.0);
                }

                self.consider_mode(6, false, 1.0 / 1.2);
                self.consider_mode(5, false, 1.0 / 1.2);
                self.consider_mode(0, false, 1.0 / 1.2);
                self.consider_mode(2, false, 1.0);
                self.encode_2p();

                if self.settings.fast_mode == 0 {
                    self.consider_mode(1, true, 0.0);
                }
            }

            self.consider_mode(10, false, 0.0);
            self.consider_mode(11, false, 1.0);
            self.consider_mode(12, false, 1.0);
            self.consider_mode(13, false, 1.0);
            self.encode_1p();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsigned_unpack_hits_range_ends() {
        assert_eq!(BlockCompressorBC6H::unpack_to_uf16(0, 10), 0);
        assert_eq!(BlockCompressorBC6H::unpack_to_uf16(1023, 10), 0xFFFF);
        assert_eq!(BlockCompressorBC6H::unpack_to_uf16(512, 10), (512 * 2 + 1) << 5);
    }

    #[test]
    fn signed_unpack_is_symmetric_and_saturates() {
        assert_eq!(BlockCompressorBC6H::unpack_to_sf16(0, 10), 0);
        assert_eq!(BlockCompressorBC6H::unpack_to_sf16(511, 10), 0x7FFF);
        assert_eq!(BlockCompressorBC6H::unpack_to_sf16(-511, 10), -0x7FFF);
        assert_eq!(
            BlockCompressorBC6H::unpack_to_sf16(100, 10),
            -BlockCompressorBC6H::unpack_to_sf16(-100, 10)
        );
    }

    #[test]
    fn signed_quantization_rounds_away_from_zero() {
        let range = 0x7FFF as f32;
        let q_pos = BlockCompressorBC6H::quant_value(range / 2.0, 10, range, true);
        let q_neg = BlockCompressorBC6H::quant_value(-range / 2.0, 10, range, true);
        assert_eq!(q_pos, 256);
        assert_eq!(q_neg, -256);
    }

    #[test]
    fn signed_load_folds_negative_zero() {
        let settings = BC6HSettings::basic();
        let mut compressor = BlockCompressorBC6H::new(&settings, true);

        let mut pixels = vec![half::f16::from_f32(1.0); 4 * 4 * 4];
        pixels[0] = half::f16::from_f32(-0.0);

        compressor.load_block_interleaved_16bit(&pixels, 0, 0, 4, 4, 16);
        assert_eq!(compressor.block[0], 0.0);
    }

    #[test]
    fn mode_12_base_high_bit_lands_in_its_slot() {
        let mut qep = [0i32; 24];
        qep[0] = 0x500;
        qep[1] = 0x400;
        qep[2] = 0x400;
        qep[4] = 0x510;
        qep[5] = 0x400;
        qep[6] = 0x400;

        let mut stream = BlockStream::new();
        BlockCompressorBC6H::pack_endpoints(&mut stream, &qep, 12);
        let data = stream.into_data();

        assert_eq!(data[0] & 31, 0b01011);
        // low ten bits of the red base at stream bit 5
        assert_eq!((data[0] >> 5) & 1023, 0x100);
        // bit 10 of each base at stream bits 43, 53 and 63
        assert_eq!((data[1] >> 11) & 1, 1);
        assert_eq!((data[1] >> 21) & 1, 1);
        assert_eq!((data[1] >> 31) & 1, 1);
        // 8-bit red delta at stream bit 35
        assert_eq!((data[1] >> 3) & 255, 0x10);
    }

    #[test]
    fn mode_13_base_high_bits_stay_ascending() {
        let mut qep = [0i32; 24];
        qep[0] = 0x400;
        qep[4] = 0x400;

        let mut stream = BlockStream::new();
        BlockCompressorBC6H::pack_endpoints(&mut stream, &qep, 13);
        let data = stream.into_data();

        assert_eq!(data[0] & 31, 0b01111);
        // bits 10..16 of the red base occupy stream bits 39..45, low first
        assert_eq!((data[1] >> 7) & 63, 1);

        let mut qep = [0i32; 24];
        qep[0] = 0x8000;
        qep[4] = 0x8000;

        let mut stream = BlockStream::new();
        BlockCompressorBC6H::pack_endpoints(&mut stream, &qep, 13);
        let data = stream.into_data();

        assert_eq!((data[1] >> 7) & 63, 32);
    }

    #[test]
    fn bright_unsigned_blocks_skip_the_narrow_base_mode() {
        let settings = BC6HSettings::basic();
        let mut compressor = BlockCompressorBC6H::new(&settings, false);

        let pixels = vec![half::f16::from_f32(8.0); 4 * 4 * 4];
        compressor.load_block_interleaved_16bit(&pixels, 0, 0, 4, 4, 16);
        compressor.setup();

        compressor.consider_mode(11, false, 1.0);
        assert_eq!(compressor.mode, 11);
        compressor.consider_mode(12, false, 1.0);
        assert_eq!(compressor.mode, 11);
    }

    #[test]
    fn negative_signed_blocks_skip_the_narrow_base_mode() {
        let settings = BC6HSettings::basic();
        let mut compressor = BlockCompressorBC6H::new(&settings, true);

        let pixels = vec![half::f16::from_f32(-0.5); 4 * 4 * 4];
        compressor.load_block_interleaved_16bit(&pixels, 0, 0, 4, 4, 16);
        compressor.setup();

        compressor.consider_mode(11, false, 1.0);
        assert_eq!(compressor.mode, 11);
        compressor.consider_mode(12, false, 1.0);
        assert_eq!(compressor.mode, 11);
    }
}
