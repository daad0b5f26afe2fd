pub(crate) struct BlockCompressorBC15 {
    block: [f32; 64],
}

impl Default for BlockCompressorBC15 {
    fn default() -> Self {
        Self { block: [0.0; 64] }
    }
}

impl BlockCompressorBC15 {
    /// Loads a 4x4 RGBA block. Pixel coordinates are clamped to the image
    /// bounds, so edge blocks of non multiple-of-4 images repeat the last
    /// valid row and column.
    pub(crate) fn load_block_interleaved_rgba(
        &mut self,
        rgba_data: &[u8],
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

                let red = rgba_data[offset] as f32;
                let green = rgba_data[offset + 1] as f32;
                let blue = rgba_data[offset + 2] as f32;
                let alpha = rgba_data[offset + 3] as f32;

                self.block[y * 4 + x] = red;
                self.block[16 + y * 4 + x] = green;
                self.block[32 + y * 4 + x] = blue;
                self.block[48 + y * 4 + x] = alpha;
            }
        }
    }

    /// Loads one source channel into the alpha plane of the working block,
    /// where the smooth alpha fitter expects its input.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn load_block_channel_8bit(
        &mut self,
        rgba_data: &[u8],
        channel: usize,
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
                let value = rgba_data[offset + channel] as f32;

                self.block[48 + y * 4 + x] = value;
            }
        }
    }

    /// Like [`Self::load_block_channel_8bit`], but the source bytes are
    /// two's complement. Values are biased into the unsigned range so the
    /// same fitter works on them; the endpoint store undoes the bias.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn load_block_channel_8bit_signed(
        &mut self,
        rgba_data: &[u8],
        channel: usize,
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
                let value = rgba_data[offset + channel] as i8 as i32 + 128;

                self.block[48 + y * 4 + x] = value as f32;
            }
        }
    }

    pub(crate) fn store_data(
        &self,
        blocks_buffer: &mut [u8],
        block_width: usize,
        xx: usize,
        yy: usize,
        data: &[u32],
    ) {
        let offset = (yy * block_width + xx) * (data.len() * 4);

        for (index, &value) in data.iter().enumerate() {
            let byte_offset = offset + index * 4;
            blocks_buffer[byte_offset] = value as u8;
            blocks_buffer[byte_offset + 1] = (value >> 8) as u8;
            blocks_buffer[byte_offset + 2] = (value >> 16) as u8;
            blocks_buffer[byte_offset + 3] = (value >> 24) as u8;
        }
    }

    fn covar_dc(&self, covar: &mut [f32; 6], dc: &mut [f32; 3]) {
        for (p, value) in dc.iter_mut().enumerate() {
            let mut acc = 0.0;
            for k in 0..16 {
                acc += self.block[k + p * 16];
            }
            *value = acc / 16.0;
        }

        let mut acc = [0.0f32; 6];
        for k in 0..16 {
            let rgb = [
                self.block[k] - dc[0],
                self.block[k + 16] - dc[1],
                self.block[k + 32] - dc[2],
            ];

            acc[0] += rgb[0] * rgb[0];
            acc[1] += rgb[0] * rgb[1];
            acc[2] += rgb[0] * rgb[2];
            acc[3] += rgb[1] * rgb[1];
            acc[4] += rgb[1] * rgb[2];
            acc[5] += rgb[2] * rgb[2];
        }

        covar.copy_from_slice(&acc);
    }

    fn covar_mul(result: &mut [f32; 3], covar: &[f32; 6], a_vector: &[f32; 3]) {
        result[0] = covar[0] * a_vector[0] + covar[1] * a_vector[1] + covar[2] * a_vector[2];
        result[1] = covar[1] * a_vector[0] + covar[3] * a_vector[1] + covar[4] * a_vector[2];
        result[2] = covar[2] * a_vector[0] + covar[4] * a_vector[1] + covar[5] * a_vector[2];
    }

    fn power_iterate_axis(axis: &mut [f32; 3], covar: &[f32; 6], power_iterations: i32) {
        let mut a_vector = [1.0; 3];

        for i in 0..power_iterations {
            Self::covar_mul(axis, covar, &a_vector);

            a_vector.copy_from_slice(&axis[..]);

            if i % 2 == 1 {
                let mut norm_sq = 0.0;
                for value in axis.iter() {
                    norm_sq += value * value;
                }

                let rnorm = 1.0 / norm_sq.sqrt();

                for value in a_vector.iter_mut() {
                    *value *= rnorm;
                }
            }
        }

        axis.copy_from_slice(&a_vector);
    }

    fn pick_endpoints(&self, c0: &mut [f32; 3], c1: &mut [f32; 3], axis: &[f32; 3], dc: &[f32; 3]) {
        let mut min_dot: f32 = 256.0 * 256.0;
        let mut max_dot: f32 = 0.0;

        for y in 0..4 {
            for x in 0..4 {
                let mut dot = 0.0;
                for p in 0..3 {
                    dot += (self.block[p * 16 + y * 4 + x] - dc[p]) * axis[p];
                }

                min_dot = f32::min(min_dot, dot);
                max_dot = f32::max(max_dot, dot);
            }
        }

        if max_dot - min_dot < 1.0 {
            min_dot -= 0.5;
            max_dot += 0.5;
        }

        let mut norm_sq = 0.0;
        for value in axis.iter() {
            norm_sq += *value * *value;
        }

        let rnorm_sq = norm_sq.recip();
        for p in 0..3 {
            c0[p] = f32::clamp(dc[p] + min_dot * rnorm_sq * axis[p], 0.0, 255.0);
            c1[p] = f32::clamp(dc[p] + max_dot * rnorm_sq * axis[p], 0.0, 255.0);
        }
    }

    fn dec_rgb565(c: &mut [f32; 3], p: i32) {
        let b5 = p & 31;
        let g6 = (p >> 5) & 63;
        let r5 = (p >> 11) & 31;

        c[0] = ((r5 << 3) + (r5 >> 2)) as f32;
        c[1] = ((g6 << 2) + (g6 >> 4)) as f32;
        c[2] = ((b5 << 3) + (b5 >> 2)) as f32;
    }

    fn enc_rgb565(c: &[f32; 3]) -> i32 {
        let r = c[0] as i32;
        let g = c[1] as i32;
        let b = c[2] as i32;

        let r5 = (r * 31 + 128 + ((r * 31) >> 8)) >> 8;
        let g6 = (g * 63 + 128 + ((g * 63) >> 8)) >> 8;
        let b5 = (b * 31 + 128 + ((b * 31) >> 8)) >> 8;

        (r5 << 11) + (g6 << 5) + b5
    }

    fn quantize_indices(&self, p0: i32, p1: i32) -> u32 {
        let mut c0 = [0.0; 3];
        let mut c1 = [0.0; 3];
        Self::dec_rgb565(&mut c0, p0);
        Self::dec_rgb565(&mut c1, p1);

        let mut dir = [0.0; 3];
        for p in 0..3 {
            dir[p] = c1[p] - c0[p];
        }

        let mut sq_norm = 0.0;
        for value in dir.iter() {
            sq_norm += value.powi(2);
        }

        let rsq_norm = sq_norm.recip();

        for value in dir.iter_mut() {
            *value *= rsq_norm * 3.0;
        }

        let mut bias = 0.5;
        for p in 0..3 {
            bias -= c0[p] * dir[p];
        }

        let mut bits = 0;
        let mut scaler = 1;
        for k in 0..16 {
            let mut dot = 0.0;
            for (p, value) in dir.iter().enumerate() {
                dot += self.block[k + p * 16] * value;
            }

            let q = i32::clamp((dot + bias) as i32, 0, 3);
            bits += q as u32 * scaler;
            scaler = scaler.wrapping_mul(4);
        }

        bits
    }

    fn refine_color(&self, pe: &mut [i32; 2], bits: u32, dc: &[f32; 3]) {
        let mut c0 = [0.0; 3];
        let mut c1 = [0.0; 3];

        if (bits ^ (bits.wrapping_mul(4))) < 4 {
            // All pixels use the same index, least squares degenerates
            c0.copy_from_slice(&dc[..]);
            c1.copy_from_slice(&dc[..]);
        } else {
            let mut atb1 = [0.0; 3];
            let mut sum_q = 0.0;
            let mut sum_qq = 0.0;
            let mut shifted_bits = bits;

            for k in 0..16 {
                let q = (shifted_bits & 3) as f32;
                shifted_bits >>= 2;

                let x = 3.0 - q;

                sum_q += q;
                sum_qq += q * q;

                for (p, value) in atb1.iter_mut().enumerate() {
                    *value += x * self.block[k + p * 16];
                }
            }

            let mut sum = [0.0; 3];
            let mut atb2 = [0.0; 3];

            for p in 0..3 {
                sum[p] = dc[p] * 16.0;
                atb2[p] = 3.0 * sum[p] - atb1[p];
            }

            let cxx = 16.0 * 9.0 - 2.0 * 3.0 * sum_q + sum_qq;
            let cyy = sum_qq;
            let cxy = 3.0 * sum_q - sum_qq;
            let scale = 3.0 * (cxx * cyy - cxy * cxy).recip();

            for p in 0..3 {
                c0[p] = (atb1[p] * cyy - atb2[p] * cxy) * scale;
                c1[p] = (atb2[p] * cxx - atb1[p] * cxy) * scale;

                c0[p] = f32::clamp(c0[p], 0.0, 255.0);
                c1[p] = f32::clamp(c1[p], 0.0, 255.0);
            }
        }

        pe[0] = Self::enc_rgb565(&c0);
        pe[1] = Self::enc_rgb565(&c1);
    }

    fn fix_qbits(qbits: u32) -> u32 {
        const MASK_01B: u32 = 0x55555555;
        const MASK_10B: u32 = 0xAAAAAAAA;

        let qbits0 = qbits & MASK_01B;
        let qbits1 = qbits & MASK_10B;

        (qbits1 >> 1) + (qbits1 ^ (qbits0 << 1))
    }

    /// PCA endpoint estimation followed by `refine_iterations` rounds of
    /// least squares refinement.
    pub(crate) fn compress_color(&self, refine_iterations: u32) -> [u32; 2] {
        let power_iterations = 4;

        let mut covar = [0.0; 6];
        let mut dc = [0.0; 3];
        self.covar_dc(&mut covar, &mut dc);

        const EPS: f32 = f32::EPSILON;
        covar[0] += EPS;
        covar[3] += EPS;
        covar[5] += EPS;

        let mut axis = [0.0; 3];
        Self::power_iterate_axis(&mut axis, &covar, power_iterations);

        let mut c0 = [0.0; 3];
        let mut c1 = [0.0; 3];
        self.pick_endpoints(&mut c0, &mut c1, &axis, &dc);

        let mut p = [0; 2];
        p[0] = Self::enc_rgb565(&c0);
        p[1] = Self::enc_rgb565(&c1);
        if p[0] < p[1] {
            p.swap(0, 1);
        }

        let mut data = [0; 2];
        data[0] = ((p[1] as u32) << 16) | p[0] as u32;
        data[1] = self.quantize_indices(p[0], p[1]);

        for _ in 0..refine_iterations {
            self.refine_color(&mut p, data[1], &dc);
            if p[0] < p[1] {
                p.swap(0, 1);
            }
            data[0] = ((p[1] as u32) << 16) | p[0] as u32;
            data[1] = self.quantize_indices(p[0], p[1]);
        }

        data[1] = Self::fix_qbits(data[1]);

        data
    }

    /// Fits min/max endpoints to the alpha plane and quantizes every pixel
    /// against the 8-value interpolated palette. Returns the endpoints and
    /// the raw 3-bit indices before storage remapping.
    fn fit_smooth_alpha(&self) -> ([f32; 2], [u32; 2]) {
        let mut ep = [255.0, 0.0];

        for k in 0..16 {
            ep[0] = f32::min(ep[0], self.block[48 + k]);
            ep[1] = f32::max(ep[1], self.block[48 + k]);
        }

        // Prevent division by zero
        if ep[0] == ep[1] {
            ep[1] = ep[0] + 0.1;
        }

        let mut qblock = [0; 2];
        let scale = 7.0 / (ep[1] - ep[0]);

        for k in 0..16 {
            let v = self.block[48 + k];
            let proj = (v - ep[0]) * scale + 0.5;

            let mut q = i32::clamp(proj as i32, 0, 7);

            // Storage order: index 0 is the max endpoint, indices 2..7 walk
            // towards the min endpoint.
            q = 7 - q;

            if q > 0 {
                q += 1;
            }
            if q == 8 {
                q = 1;
            }

            qblock[k / 8] |= (q as u32) << ((k % 8) * 3);
        }

        (ep, qblock)
    }

    pub(crate) fn compress_smooth_alpha(&self) -> [u32; 2] {
        let (ep, qblock) = self.fit_smooth_alpha();

        let mut data = [0; 2];
        data[0] = (u32::clamp(ep[0] as u32, 0, 255) << 8) | u32::clamp(ep[1] as u32, 0, 255);
        data[0] |= qblock[0] << 16;
        data[1] = qblock[0] >> 16;
        data[1] |= qblock[1] << 8;

        data
    }

    /// Signed variant. The block was loaded biased by +128; the palette
    /// interpolation formulas are bias invariant, so only the stored
    /// endpoint bytes need to move back into the two's complement range.
    pub(crate) fn compress_smooth_alpha_signed(&self) -> [u32; 2] {
        let (ep, qblock) = self.fit_smooth_alpha();

        let ep0 = (i32::clamp(ep[0] as i32, 0, 255) - 128) as i8 as u8 as u32;
        let ep1 = (i32::clamp(ep[1] as i32, 0, 255) - 128) as i8 as u8 as u32;

        let mut data = [0; 2];
        data[0] = (ep0 << 8) | ep1;
        data[0] |= qblock[0] << 16;
        data[1] = qblock[0] >> 16;
        data[1] |= qblock[1] << 8;

        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_block(r: u8, g: u8, b: u8, a: u8) -> BlockCompressorBC15 {
        let mut compressor = BlockCompressorBC15::default();
        let pixel = [r, g, b, a];
        let data: Vec<u8> = pixel.iter().copied().cycle().take(4 * 4 * 4).collect();
        compressor.load_block_interleaved_rgba(&data, 0, 0, 4, 4, 16);
        compressor
    }

    #[test]
    fn bc1_solid_red_endpoints() {
        let compressor = solid_block(255, 0, 0, 255);
        let data = compressor.compress_color(1);

        let ep0 = (data[0] & 0xFFFF) as u16;
        let ep1 = (data[0] >> 16) as u16;
        assert_eq!(ep0, 0xF800);
        assert_eq!(ep1, 0xF800);
    }

    #[test]
    fn smooth_alpha_flat_block_is_exact() {
        let compressor = solid_block(0, 0, 0, 180);
        let data = compressor.compress_smooth_alpha();

        let ep1 = data[0] & 0xFF;
        let ep0 = (data[0] >> 8) & 0xFF;
        // Flat input, both endpoints land on the source value.
        assert_eq!(ep0, 180);
        assert_eq!(ep1, 180);
    }

    #[test]
    fn smooth_alpha_signed_endpoints_are_twos_complement() {
        let mut compressor = BlockCompressorBC15::default();
        let mut data = [0u8; 64];
        for pixel in data.chunks_exact_mut(4) {
            pixel[0] = -100i8 as u8;
        }
        data[0] = 100;

        compressor.load_block_channel_8bit_signed(&data, 0, 0, 0, 4, 4, 16);
        let packed = compressor.compress_smooth_alpha_signed();

        // Byte 0 carries the max endpoint, byte 1 the min endpoint.
        let e0 = (packed[0] & 0xFF) as u8 as i8;
        let e1 = ((packed[0] >> 8) & 0xFF) as u8 as i8;
        assert_eq!(e0, 100);
        assert_eq!(e1, -100);
    }

    #[test]
    fn loads_clamp_to_image_bounds() {
        let mut compressor = BlockCompressorBC15::default();
        // 2x2 image, bottom right pixel green
        let data = [
            10, 0, 0, 255, 20, 0, 0, 255, //
            30, 0, 0, 255, 0, 200, 0, 255,
        ];
        compressor.load_block_interleaved_rgba(&data, 0, 0, 2, 2, 8);

        // Column 1 repeats into columns 2 and 3, row 1 into rows 2 and 3.
        assert_eq!(compressor.block[5], 0.0);
        assert_eq!(compressor.block[16 + 5], 200.0);
        assert_eq!(compressor.block[16 + 7], 200.0);
        assert_eq!(compressor.block[16 + 15], 200.0);
    }
}
