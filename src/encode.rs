//! Block compression encoders.
//!
//! [`compress`] consumes interleaved RGBA8 pixel data, [`compress_f16`]
//! consumes interleaved RGBA half float data for the two BC6H variants.
//! Both validate buffer sizes up front and then process independent rows of
//! 4x4 blocks, in parallel when the `rayon` feature is enabled.

#[cfg(feature = "bc15")]
mod bc1_to_5;
#[cfg(feature = "bc6h")]
mod bc6h;
#[cfg(feature = "bc7")]
mod bc7;
#[cfg(any(feature = "bc6h", feature = "bc7"))]
mod common;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

#[cfg(feature = "bc15")]
use self::bc1_to_5::BlockCompressorBC15;
#[cfg(feature = "bc6h")]
use self::bc6h::BlockCompressorBC6H;
#[cfg(feature = "bc7")]
use self::bc7::BlockCompressorBC7;
#[cfg(feature = "bc6h")]
use crate::settings::BC6HSettings;
#[cfg(feature = "bc7")]
use crate::settings::BC7Settings;
#[cfg(feature = "bc15")]
use crate::Quality;
use crate::{CompressionSettings, CompressionVariant, Error};

/// Compresses interleaved RGBA8 pixel data into `blocks_buffer`.
///
/// `stride` is the byte distance between pixel rows. Images whose dimensions
/// are not multiples of 4 are padded by repeating the last valid row and
/// column of each edge block.
///
/// BC2 and the BC6H variants are rejected with
/// [`Error::UnsupportedVariant`]: BC3 supersedes BC2 at the same memory
/// cost, and BC6H needs half float input through [`compress_f16`].
pub fn compress(
    variant: CompressionVariant,
    settings: &CompressionSettings,
    rgba_data: &[u8],
    blocks_buffer: &mut [u8],
    width: u32,
    height: u32,
    stride: u32,
) -> Result<(), Error> {
    match variant {
        CompressionVariant::BC2
        | CompressionVariant::BC6H
        | CompressionVariant::BC6HSigned => {
            return Err(Error::UnsupportedVariant(variant));
        }
        CompressionVariant::BC4 | CompressionVariant::BC4Signed => {
            if settings.bc4_source_channel > 3 {
                return Err(Error::InvalidChannel(settings.bc4_source_channel));
            }
        }
        CompressionVariant::BC5 | CompressionVariant::BC5Signed => {
            let (channel0, channel1) = settings.bc5_source_channels;
            for channel in [channel0, channel1] {
                if channel > 3 {
                    return Err(Error::InvalidChannel(channel));
                }
            }
        }
        _ => {}
    }

    if width == 0 || height == 0 {
        return Ok(());
    }

    let required_input = (height as usize - 1) * stride as usize + width as usize * 4;
    if rgba_data.len() < required_input {
        return Err(Error::BufferSize {
            required: required_input,
            actual: rgba_data.len(),
        });
    }

    let required_output = variant.blocks_byte_size(width, height);
    if blocks_buffer.len() < required_output {
        return Err(Error::BufferSize {
            required: required_output,
            actual: blocks_buffer.len(),
        });
    }

    let blocks_buffer = &mut blocks_buffer[..required_output];
    let width = width as usize;
    let height = height as usize;
    let stride = stride as usize;

    match variant {
        #[cfg(feature = "bc15")]
        CompressionVariant::BC1 => {
            compress_bc1(settings, rgba_data, blocks_buffer, width, height, stride);
        }
        #[cfg(feature = "bc15")]
        CompressionVariant::BC3 => {
            compress_bc3(settings, rgba_data, blocks_buffer, width, height, stride);
        }
        #[cfg(feature = "bc15")]
        CompressionVariant::BC4 | CompressionVariant::BC4Signed => {
            let signed = variant == CompressionVariant::BC4Signed;
            compress_bc4(
                settings,
                rgba_data,
                blocks_buffer,
                width,
                height,
                stride,
                signed,
            );
        }
        #[cfg(feature = "bc15")]
        CompressionVariant::BC5 | CompressionVariant::BC5Signed => {
            let signed = variant == CompressionVariant::BC5Signed;
            compress_bc5(
                settings,
                rgba_data,
                blocks_buffer,
                width,
                height,
                stride,
                signed,
            );
        }
        #[cfg(feature = "bc7")]
        CompressionVariant::BC7 => {
            compress_bc7(settings, rgba_data, blocks_buffer, width, height, stride);
        }
        #[allow(unreachable_patterns)]
        _ => return Err(Error::UnsupportedVariant(variant)),
    }

    Ok(())
}

/// Compresses interleaved RGBA half float pixel data into `blocks_buffer`.
///
/// Only the BC6H variants are accepted; the alpha channel is ignored.
/// `stride` is the distance between pixel rows in `f16` elements. Negative
/// zero inputs are folded onto positive zero before fitting, and unsigned
/// encoding clamps negative inputs to zero.
#[cfg(feature = "bc6h")]
pub fn compress_f16(
    variant: CompressionVariant,
    settings: &CompressionSettings,
    rgba_data: &[half::f16],
    blocks_buffer: &mut [u8],
    width: u32,
    height: u32,
    stride: u32,
) -> Result<(), Error> {
    let signed = match variant {
        CompressionVariant::BC6H => false,
        CompressionVariant::BC6HSigned => true,
        _ => return Err(Error::UnsupportedVariant(variant)),
    };

    if width == 0 || height == 0 {
        return Ok(());
    }

    let required_input = (height as usize - 1) * stride as usize + width as usize * 4;
    if rgba_data.len() < required_input {
        return Err(Error::BufferSize {
            required: required_input,
            actual: rgba_data.len(),
        });
    }

    let required_output = variant.blocks_byte_size(width, height);
    if blocks_buffer.len() < required_output {
        return Err(Error::BufferSize {
            required: required_output,
            actual: blocks_buffer.len(),
        });
    }

    let bc6h_settings = BC6HSettings::from_quality(settings.quality);

    let width = width as usize;
    let height = height as usize;
    let stride = stride as usize;
    let block_width = width.div_ceil(4);

    let compress_row = |(yy, row): (usize, &mut [u8])| {
        for xx in 0..block_width {
            let mut compressor = BlockCompressorBC6H::new(&bc6h_settings, signed);
            compressor.load_block_interleaved_16bit(rgba_data, xx, yy, width, height, stride);
            compressor.compress_block();
            compressor.store_data(row, block_width, xx, 0);
        }
    };

    let blocks_buffer = &mut blocks_buffer[..required_output];
    per_block_row(blocks_buffer, block_width * 16, compress_row);

    Ok(())
}

/// Refinement rounds for the BC1-5 fitters per quality tier.
#[cfg(feature = "bc15")]
const fn refine_iterations(quality: Quality) -> u32 {
    match quality {
        Quality::Lowest => 0,
        Quality::Medium => 1,
        Quality::Highest => 2,
    }
}

#[cfg(feature = "bc15")]
fn compress_bc1(
    settings: &CompressionSettings,
    rgba_data: &[u8],
    blocks_buffer: &mut [u8],
    width: usize,
    height: usize,
    stride: usize,
) {
    let refine = refine_iterations(settings.quality);
    let block_width = width.div_ceil(4);

    let compress_row = |(yy, row): (usize, &mut [u8])| {
        let mut compressor = BlockCompressorBC15::default();
        for xx in 0..block_width {
            compressor.load_block_interleaved_rgba(rgba_data, xx, yy, width, height, stride);
            let data = compressor.compress_color(refine);
            compressor.store_data(row, block_width, xx, 0, &data);
        }
    };

    per_block_row(blocks_buffer, block_width * 8, compress_row);
}

#[cfg(feature = "bc15")]
fn compress_bc3(
    settings: &CompressionSettings,
    rgba_data: &[u8],
    blocks_buffer: &mut [u8],
    width: usize,
    height: usize,
    stride: usize,
) {
    let refine = refine_iterations(settings.quality);
    let block_width = width.div_ceil(4);

    let compress_row = |(yy, row): (usize, &mut [u8])| {
        let mut compressor = BlockCompressorBC15::default();
        for xx in 0..block_width {
            compressor.load_block_interleaved_rgba(rgba_data, xx, yy, width, height, stride);

            let alpha = compressor.compress_smooth_alpha();
            let color = compressor.compress_color(refine);
            let data = [alpha[0], alpha[1], color[0], color[1]];

            compressor.store_data(row, block_width, xx, 0, &data);
        }
    };

    per_block_row(blocks_buffer, block_width * 16, compress_row);
}

#[cfg(feature = "bc15")]
#[allow(clippy::too_many_arguments)]
fn compress_bc4(
    settings: &CompressionSettings,
    rgba_data: &[u8],
    blocks_buffer: &mut [u8],
    width: usize,
    height: usize,
    stride: usize,
    signed: bool,
) {
    let channel = settings.bc4_source_channel;
    let block_width = width.div_ceil(4);

    let compress_row = |(yy, row): (usize, &mut [u8])| {
        let mut compressor = BlockCompressorBC15::default();
        for xx in 0..block_width {
            let data = if signed {
                compressor.load_block_channel_8bit_signed(
                    rgba_data, channel, xx, yy, width, height, stride,
                );
                compressor.compress_smooth_alpha_signed()
            } else {
                compressor
                    .load_block_channel_8bit(rgba_data, channel, xx, yy, width, height, stride);
                compressor.compress_smooth_alpha()
            };

            compressor.store_data(row, block_width, xx, 0, &data);
        }
    };

    per_block_row(blocks_buffer, block_width * 8, compress_row);
}

#[cfg(feature = "bc15")]
#[allow(clippy::too_many_arguments)]
fn compress_bc5(
    settings: &CompressionSettings,
    rgba_data: &[u8],
    blocks_buffer: &mut [u8],
    width: usize,
    height: usize,
    stride: usize,
    signed: bool,
) {
    let (channel0, channel1) = settings.bc5_source_channels;
    let block_width = width.div_ceil(4);

    let compress_row = |(yy, row): (usize, &mut [u8])| {
        let mut compressor = BlockCompressorBC15::default();
        for xx in 0..block_width {
            let mut data = [0u32; 4];
            for (sub_block, channel) in [channel0, channel1].into_iter().enumerate() {
                let half_block = if signed {
                    compressor.load_block_channel_8bit_signed(
                        rgba_data, channel, xx, yy, width, height, stride,
                    );
                    compressor.compress_smooth_alpha_signed()
                } else {
                    compressor
                        .load_block_channel_8bit(rgba_data, channel, xx, yy, width, height, stride);
                    compressor.compress_smooth_alpha()
                };
                data[sub_block * 2] = half_block[0];
                data[sub_block * 2 + 1] = half_block[1];
            }

            compressor.store_data(row, block_width, xx, 0, &data);
        }
    };

    per_block_row(blocks_buffer, block_width * 16, compress_row);
}

#[cfg(feature = "bc7")]
fn compress_bc7(
    settings: &CompressionSettings,
    rgba_data: &[u8],
    blocks_buffer: &mut [u8],
    width: usize,
    height: usize,
    stride: usize,
) {
    let bc7_settings = BC7Settings::from_quality(settings.quality);
    let block_width = width.div_ceil(4);

    let compress_row = |(yy, row): (usize, &mut [u8])| {
        for xx in 0..block_width {
            let mut compressor = BlockCompressorBC7::new(&bc7_settings);
            compressor.load_block_interleaved_rgba(rgba_data, xx, yy, width, height, stride);
            compressor.compute_opaque_err();
            compressor.compress_block();
            compressor.store_data(row, block_width, xx, 0);
        }
    };

    per_block_row(blocks_buffer, block_width * 16, compress_row);
}

/// Runs `compress_row` over every row of blocks, in parallel when the
/// `rayon` feature is enabled.
#[cfg(any(feature = "bc15", feature = "bc6h", feature = "bc7"))]
fn per_block_row(
    blocks_buffer: &mut [u8],
    bytes_per_row: usize,
    compress_row: impl Fn((usize, &mut [u8])) + Send + Sync,
) {
    #[cfg(feature = "rayon")]
    blocks_buffer
        .par_chunks_mut(bytes_per_row)
        .enumerate()
        .for_each(compress_row);
    #[cfg(not(feature = "rayon"))]
    blocks_buffer
        .chunks_mut(bytes_per_row)
        .enumerate()
        .for_each(compress_row);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_image(width: u32, height: u32, pixel: [u8; 4]) -> Vec<u8> {
        pixel
            .iter()
            .copied()
            .cycle()
            .take((width * height * 4) as usize)
            .collect()
    }

    #[test]
    fn bc2_encoding_is_rejected() {
        let image = solid_image(4, 4, [255, 0, 0, 255]);
        let mut blocks = [0u8; 16];

        let result = compress(
            CompressionVariant::BC2,
            &CompressionSettings::default(),
            &image,
            &mut blocks,
            4,
            4,
            16,
        );
        assert!(matches!(
            result,
            Err(Error::UnsupportedVariant(CompressionVariant::BC2))
        ));
    }

    #[test]
    fn bc6h_requires_the_half_float_entry() {
        let image = solid_image(4, 4, [255, 0, 0, 255]);
        let mut blocks = [0u8; 16];

        let result = compress(
            CompressionVariant::BC6H,
            &CompressionSettings::default(),
            &image,
            &mut blocks,
            4,
            4,
            16,
        );
        assert!(matches!(result, Err(Error::UnsupportedVariant(_))));
    }

    #[cfg(feature = "bc15")]
    #[test]
    fn out_of_range_source_channels_are_rejected() {
        let image = solid_image(4, 4, [10, 20, 30, 40]);
        let mut blocks = [0u8; 16];

        let mut settings = CompressionSettings::default();
        settings.bc4_source_channel = 7;
        let result = compress(
            CompressionVariant::BC4,
            &settings,
            &image,
            &mut blocks[..8],
            4,
            4,
            16,
        );
        assert!(matches!(result, Err(Error::InvalidChannel(7))));

        let mut settings = CompressionSettings::default();
        settings.bc5_source_channels = (0, 4);
        let result = compress(
            CompressionVariant::BC5Signed,
            &settings,
            &image,
            &mut blocks,
            4,
            4,
            16,
        );
        assert!(matches!(result, Err(Error::InvalidChannel(4))));
    }

    #[cfg(feature = "bc15")]
    #[test]
    fn compress_rejects_short_buffers() {
        let image = solid_image(4, 4, [0, 0, 0, 255]);

        let mut short_output = [0u8; 4];
        let result = compress(
            CompressionVariant::BC1,
            &CompressionSettings::default(),
            &image,
            &mut short_output,
            4,
            4,
            16,
        );
        assert!(matches!(
            result,
            Err(Error::BufferSize {
                required: 8,
                actual: 4
            })
        ));

        let mut blocks = [0u8; 8];
        let result = compress(
            CompressionVariant::BC1,
            &CompressionSettings::default(),
            &image[..32],
            &mut blocks,
            4,
            4,
            16,
        );
        assert!(matches!(result, Err(Error::BufferSize { .. })));
    }

    #[cfg(feature = "bc15")]
    #[test]
    fn compress_zero_sized_image_is_a_no_op() {
        let mut blocks = [0u8; 0];
        let result = compress(
            CompressionVariant::BC1,
            &CompressionSettings::default(),
            &[],
            &mut blocks,
            0,
            4,
            0,
        );
        assert!(result.is_ok());
    }

    #[cfg(feature = "bc15")]
    #[test]
    fn bc1_solid_color_block_bytes() {
        let image = solid_image(4, 4, [255, 0, 0, 255]);
        let mut blocks = [0u8; 8];

        compress(
            CompressionVariant::BC1,
            &CompressionSettings::default(),
            &image,
            &mut blocks,
            4,
            4,
            16,
        )
        .unwrap();

        // Both endpoints are pure red in 565.
        assert_eq!(&blocks[..4], &[0x00, 0xF8, 0x00, 0xF8]);
    }
}
