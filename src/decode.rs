//! Block decompression.

#[cfg(feature = "bc15")]
mod bc1_to_5;
#[cfg(feature = "bc6h")]
mod bc6h;
#[cfg(feature = "bc7")]
mod bc7;
#[cfg(any(feature = "bc6h", feature = "bc7"))]
mod tables;

use crate::{CompressionVariant, Error};

#[cfg(feature = "bc6h")]
fn decode_block_bc6h_unsigned(
    compressed_block: &[u8],
    decompressed_block: &mut [u8],
    destination_pitch: usize,
) {
    bc6h::decode_block_bc6h(compressed_block, decompressed_block, destination_pitch, false);
}

#[cfg(feature = "bc6h")]
fn decode_block_bc6h_signed(
    compressed_block: &[u8],
    decompressed_block: &mut [u8],
    destination_pitch: usize,
) {
    bc6h::decode_block_bc6h(compressed_block, decompressed_block, destination_pitch, true);
}

/// Decompresses the given block data into raw pixel data.
///
/// `decompressed_data` receives exactly `width * height` pixels, so images
/// whose dimensions are not multiples of 4 only get the in-bounds part of
/// their edge blocks written back.
///
/// # Errors
///
/// Returns an error if either buffer is smaller than the size computed from
/// `variant` and the image dimensions. Corrupt BC6H/BC7 blocks are not an
/// error; they decode to all-zero pixels.
pub fn decompress(
    variant: CompressionVariant,
    width: u32,
    height: u32,
    blocks_data: &[u8],
    decompressed_data: &mut [u8],
) -> Result<(), Error> {
    let required = variant.blocks_byte_size(width, height);
    if blocks_data.len() < required {
        return Err(Error::BufferSize {
            required,
            actual: blocks_data.len(),
        });
    }

    let required_output = variant.decompressed_byte_size(width, height);
    if decompressed_data.len() < required_output {
        return Err(Error::BufferSize {
            required: required_output,
            actual: decompressed_data.len(),
        });
    }

    let decode_block: fn(&[u8], &mut [u8], usize) = match variant {
        #[cfg(feature = "bc15")]
        CompressionVariant::BC1 => bc1_to_5::decode_block_bc1,
        #[cfg(feature = "bc15")]
        CompressionVariant::BC2 => bc1_to_5::decode_block_bc2,
        #[cfg(feature = "bc15")]
        CompressionVariant::BC3 => bc1_to_5::decode_block_bc3,
        #[cfg(feature = "bc15")]
        CompressionVariant::BC4 => bc1_to_5::decode_block_bc4,
        #[cfg(feature = "bc15")]
        CompressionVariant::BC4Signed => bc1_to_5::decode_block_bc4_signed,
        #[cfg(feature = "bc15")]
        CompressionVariant::BC5 => bc1_to_5::decode_block_bc5,
        #[cfg(feature = "bc15")]
        CompressionVariant::BC5Signed => bc1_to_5::decode_block_bc5_signed,
        #[cfg(feature = "bc6h")]
        CompressionVariant::BC6H => decode_block_bc6h_unsigned,
        #[cfg(feature = "bc6h")]
        CompressionVariant::BC6HSigned => decode_block_bc6h_signed,
        #[cfg(feature = "bc7")]
        CompressionVariant::BC7 => bc7::decode_block_bc7,
        #[allow(unreachable_patterns)]
        _ => return Err(Error::UnsupportedVariant(variant)),
    };

    if width == 0 || height == 0 {
        return Ok(());
    }

    decompress_blocks(
        decode_block,
        variant.block_byte_size() as usize,
        variant.decompressed_bytes_per_pixel(),
        width,
        blocks_data,
        &mut decompressed_data[..required_output],
    );

    Ok(())
}

/// Walks the block grid row by row. Every block decodes into a fixed scratch
/// buffer first and only the in-bounds pixels are copied out, which keeps the
/// block decoders free of any edge handling.
fn decompress_blocks(
    decode_block: fn(&[u8], &mut [u8], usize),
    block_byte_size: usize,
    bytes_per_pixel: usize,
    width: u32,
    blocks_data: &[u8],
    output: &mut [u8],
) {
    let blocks_x = width.div_ceil(4) as usize;
    let row_pitch = width as usize * bytes_per_pixel;
    let block_pitch = 4 * bytes_per_pixel;

    let decompress_block_row = |(block_y, output_rows): (usize, &mut [u8])| {
        // The last block row of an image whose height is not a multiple of 4
        // gets a short chunk.
        let rows_to_copy = output_rows.len() / row_pitch;

        // Large enough for the widest output format, 16 pixels of 6 bytes.
        let mut scratch = [0u8; 96];

        for block_x in 0..blocks_x {
            let block_offset = (block_y * blocks_x + block_x) * block_byte_size;
            decode_block(
                &blocks_data[block_offset..block_offset + block_byte_size],
                &mut scratch,
                block_pitch,
            );

            let cols_to_copy = (width as usize - 4 * block_x).min(4);
            for row in 0..rows_to_copy {
                let destination = row * row_pitch + 4 * block_x * bytes_per_pixel;
                let source = row * block_pitch;
                output_rows[destination..destination + cols_to_copy * bytes_per_pixel]
                    .copy_from_slice(&scratch[source..source + cols_to_copy * bytes_per_pixel]);
            }
        }
    };

    #[cfg(feature = "rayon")]
    {
        use rayon::prelude::*;
        output
            .par_chunks_mut(4 * row_pitch)
            .enumerate()
            .for_each(decompress_block_row);
    }

    #[cfg(not(feature = "rayon"))]
    output
        .chunks_mut(4 * row_pitch)
        .enumerate()
        .for_each(decompress_block_row);
}

#[cfg(test)]
#[cfg(feature = "bc15")]
mod tests {
    use super::*;

    fn solid_bc1_block(color: u16) -> [u8; 8] {
        let [lo, hi] = color.to_le_bytes();
        [lo, hi, lo, hi, 0, 0, 0, 0]
    }

    #[test]
    fn decompress_clamps_partial_edge_blocks() {
        // A 7x5 image needs 2x2 blocks; the right blocks contribute 3
        // columns and the bottom blocks a single row.
        let mut blocks = Vec::new();
        blocks.extend_from_slice(&solid_bc1_block(0xF800)); // red
        blocks.extend_from_slice(&solid_bc1_block(0x07E0)); // green
        blocks.extend_from_slice(&solid_bc1_block(0x001F)); // blue
        blocks.extend_from_slice(&solid_bc1_block(0xFFFF)); // white

        let mut output = vec![0u8; CompressionVariant::BC1.decompressed_byte_size(7, 5)];
        decompress(CompressionVariant::BC1, 7, 5, &blocks, &mut output).unwrap();

        let pixel = |x: usize, y: usize| &output[(y * 7 + x) * 4..][..4];
        assert_eq!(pixel(0, 0), &[255, 0, 0, 255]);
        assert_eq!(pixel(3, 3), &[255, 0, 0, 255]);
        assert_eq!(pixel(4, 0), &[0, 255, 0, 255]);
        assert_eq!(pixel(6, 3), &[0, 255, 0, 255]);
        assert_eq!(pixel(0, 4), &[0, 0, 255, 255]);
        assert_eq!(pixel(6, 4), &[255, 255, 255, 255]);
    }

    #[test]
    fn decompress_rejects_short_buffers() {
        let blocks = [0u8; 8];
        let mut output = vec![0u8; CompressionVariant::BC1.decompressed_byte_size(4, 4)];
        assert!(matches!(
            decompress(CompressionVariant::BC1, 8, 4, &blocks, &mut output),
            Err(Error::BufferSize {
                required: 16,
                actual: 8
            })
        ));

        let blocks = [0u8; 16];
        let mut short_output = vec![0u8; 32];
        assert!(matches!(
            decompress(CompressionVariant::BC1, 4, 4, &blocks, &mut short_output),
            Err(Error::BufferSize {
                required: 64,
                actual: 32
            })
        ));
    }

    #[test]
    fn decompress_zero_sized_image_is_a_no_op() {
        decompress(CompressionVariant::BC1, 0, 0, &[], &mut []).unwrap();
    }
}
