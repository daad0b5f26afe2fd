//! Encode/decode round trips over in-memory images.

use bcn::{decode, encode, CompressionSettings, CompressionVariant, Error, Quality};

fn solid_rgba(width: u32, height: u32, pixel: [u8; 4]) -> Vec<u8> {
    pixel
        .iter()
        .copied()
        .cycle()
        .take((width * height * 4) as usize)
        .collect()
}

fn roundtrip_rgba8(
    variant: CompressionVariant,
    settings: &CompressionSettings,
    image: &[u8],
    width: u32,
    height: u32,
) -> Vec<u8> {
    let mut blocks = vec![0u8; variant.blocks_byte_size(width, height)];
    encode::compress(
        variant,
        settings,
        image,
        &mut blocks,
        width,
        height,
        width * 4,
    )
    .unwrap();

    let mut decoded = vec![0u8; variant.decompressed_byte_size(width, height)];
    decode::decompress(variant, width, height, &blocks, &mut decoded).unwrap();
    decoded
}

fn assert_within(actual: u8, expected: u8, tolerance: u8, context: &str) {
    let difference = (actual as i32 - expected as i32).unsigned_abs();
    assert!(
        difference <= tolerance as u32,
        "{context}: {actual} not within {tolerance} of {expected}"
    );
}

#[cfg(feature = "bc15")]
#[test]
fn bc1_solid_red_roundtrips_within_one() {
    let image = solid_rgba(8, 8, [255, 0, 0, 255]);
    let decoded = roundtrip_rgba8(
        CompressionVariant::BC1,
        &CompressionSettings::default(),
        &image,
        8,
        8,
    );

    for pixel in decoded.chunks_exact(4) {
        assert_within(pixel[0], 255, 1, "red");
        assert_within(pixel[1], 0, 1, "green");
        assert_within(pixel[2], 0, 1, "blue");
        assert_eq!(pixel[3], 255);
    }
}

#[cfg(feature = "bc15")]
#[test]
fn bc1_non_multiple_of_four_image_roundtrips() {
    let image = solid_rgba(6, 6, [0, 200, 60, 255]);
    let decoded = roundtrip_rgba8(
        CompressionVariant::BC1,
        &CompressionSettings::default(),
        &image,
        6,
        6,
    );

    assert_eq!(decoded.len(), 6 * 6 * 4);
    for pixel in decoded.chunks_exact(4) {
        assert_within(pixel[0], 0, 4, "red");
        assert_within(pixel[1], 200, 4, "green");
        assert_within(pixel[2], 60, 4, "blue");
    }
}

#[cfg(feature = "bc15")]
#[test]
fn bc3_preserves_flat_alpha_exactly() {
    let mut image = solid_rgba(8, 8, [40, 80, 120, 0]);
    for pixel in image.chunks_exact_mut(4) {
        pixel[3] = 160;
    }

    let decoded = roundtrip_rgba8(
        CompressionVariant::BC3,
        &CompressionSettings::default(),
        &image,
        8,
        8,
    );

    for pixel in decoded.chunks_exact(4) {
        assert_within(pixel[0], 40, 4, "red");
        assert_within(pixel[1], 80, 4, "green");
        assert_within(pixel[2], 120, 4, "blue");
        assert_eq!(pixel[3], 160);
    }
}

#[cfg(feature = "bc15")]
#[test]
fn bc4_roundtrips_selected_channel() {
    // Red channel carries a two-value pattern, green is noise that must be
    // ignored with the default channel selection.
    let mut image = solid_rgba(4, 4, [0, 77, 0, 255]);
    for (index, pixel) in image.chunks_exact_mut(4).enumerate() {
        pixel[0] = if index % 2 == 0 { 32 } else { 224 };
    }

    let decoded = roundtrip_rgba8(
        CompressionVariant::BC4,
        &CompressionSettings::default(),
        &image,
        4,
        4,
    );

    assert_eq!(decoded.len(), 16);
    for (index, &value) in decoded.iter().enumerate() {
        let expected = if index % 2 == 0 { 32 } else { 224 };
        assert_within(value, expected, 2, "bc4 channel");
    }
}

#[cfg(feature = "bc15")]
#[test]
fn bc4_signed_roundtrips_flat_negative_block() {
    let mut image = solid_rgba(4, 4, [0, 0, 0, 255]);
    for pixel in image.chunks_exact_mut(4) {
        pixel[0] = -100i8 as u8;
    }

    let decoded = roundtrip_rgba8(
        CompressionVariant::BC4Signed,
        &CompressionSettings::default(),
        &image,
        4,
        4,
    );

    for &value in decoded.iter() {
        assert_eq!(value as i8, -100);
    }
}

#[cfg(feature = "bc15")]
#[test]
fn bc5_roundtrips_two_channels() {
    let image = solid_rgba(8, 4, [90, 200, 0, 255]);
    let decoded = roundtrip_rgba8(
        CompressionVariant::BC5,
        &CompressionSettings::default(),
        &image,
        8,
        4,
    );

    for pixel in decoded.chunks_exact(2) {
        assert_within(pixel[0], 90, 2, "bc5 first channel");
        assert_within(pixel[1], 200, 2, "bc5 second channel");
    }
}

#[cfg(feature = "bc15")]
#[test]
fn bc5_signed_roundtrips_mixed_signs() {
    let mut image = solid_rgba(4, 4, [0, 0, 0, 255]);
    for pixel in image.chunks_exact_mut(4) {
        pixel[0] = 60;
        pixel[1] = -60i8 as u8;
    }

    let decoded = roundtrip_rgba8(
        CompressionVariant::BC5Signed,
        &CompressionSettings::default(),
        &image,
        4,
        4,
    );

    for pixel in decoded.chunks_exact(2) {
        assert_eq!(pixel[0] as i8, 60);
        assert_eq!(pixel[1] as i8, -60);
    }
}

#[cfg(feature = "bc7")]
#[test]
fn bc7_solid_color_roundtrips_within_one() {
    let image = solid_rgba(8, 8, [180, 90, 30, 255]);
    let decoded = roundtrip_rgba8(
        CompressionVariant::BC7,
        &CompressionSettings::default(),
        &image,
        8,
        8,
    );

    for pixel in decoded.chunks_exact(4) {
        assert_within(pixel[0], 180, 1, "red");
        assert_within(pixel[1], 90, 1, "green");
        assert_within(pixel[2], 30, 1, "blue");
        assert_within(pixel[3], 255, 1, "alpha");
    }
}

#[cfg(feature = "bc7")]
#[test]
fn bc7_translucent_block_keeps_alpha() {
    let image = solid_rgba(4, 4, [200, 100, 50, 128]);
    let decoded = roundtrip_rgba8(
        CompressionVariant::BC7,
        &CompressionSettings::with_quality(Quality::Highest),
        &image,
        4,
        4,
    );

    for pixel in decoded.chunks_exact(4) {
        assert_within(pixel[3], 128, 2, "alpha");
    }
}

#[cfg(feature = "bc6h")]
mod bc6h {
    use super::*;
    use half::f16;

    fn roundtrip_f16(
        variant: CompressionVariant,
        image: &[f16],
        width: u32,
        height: u32,
    ) -> Vec<u16> {
        roundtrip_f16_with(
            variant,
            &CompressionSettings::default(),
            image,
            width,
            height,
        )
    }

    fn roundtrip_f16_with(
        variant: CompressionVariant,
        settings: &CompressionSettings,
        image: &[f16],
        width: u32,
        height: u32,
    ) -> Vec<u16> {
        let mut blocks = vec![0u8; variant.blocks_byte_size(width, height)];
        encode::compress_f16(
            variant,
            settings,
            image,
            &mut blocks,
            width,
            height,
            width * 4,
        )
        .unwrap();

        let mut decoded = vec![0u8; variant.decompressed_byte_size(width, height)];
        decode::decompress(variant, width, height, &blocks, &mut decoded).unwrap();

        decoded
            .chunks_exact(2)
            .map(|bytes| u16::from_le_bytes([bytes[0], bytes[1]]))
            .collect()
    }

    fn assert_half_bits_close(actual: u16, expected: u16, tolerance: u16) {
        let difference = (actual as i32 - expected as i32).unsigned_abs();
        assert!(
            difference <= tolerance as u32,
            "{actual:#06x} not within {tolerance} half bits of {expected:#06x}"
        );
    }

    #[test]
    fn unsigned_solid_color_roundtrips() {
        let pixel = [
            f16::from_f32(1.0),
            f16::from_f32(0.5),
            f16::from_f32(0.25),
            f16::from_f32(1.0),
        ];
        let image: Vec<f16> = pixel.iter().copied().cycle().take(4 * 4 * 4).collect();

        let values = roundtrip_f16(CompressionVariant::BC6H, &image, 4, 4);
        for triple in values.chunks_exact(3) {
            assert_half_bits_close(triple[0], f16::from_f32(1.0).to_bits(), 2);
            assert_half_bits_close(triple[1], f16::from_f32(0.5).to_bits(), 2);
            assert_half_bits_close(triple[2], f16::from_f32(0.25).to_bits(), 2);
        }
    }

    #[test]
    fn signed_solid_color_roundtrips_with_sign() {
        let pixel = [
            f16::from_f32(-1.0),
            f16::from_f32(0.75),
            f16::from_f32(-0.25),
            f16::from_f32(1.0),
        ];
        let image: Vec<f16> = pixel.iter().copied().cycle().take(4 * 4 * 4).collect();

        let values = roundtrip_f16(CompressionVariant::BC6HSigned, &image, 4, 4);
        for triple in values.chunks_exact(3) {
            assert_eq!(triple[0] & 0x8000, 0x8000, "red keeps its sign");
            assert_eq!(triple[1] & 0x8000, 0, "green stays positive");
            assert_eq!(triple[2] & 0x8000, 0x8000, "blue keeps its sign");

            assert_half_bits_close(triple[0] & 0x7FFF, f16::from_f32(1.0).to_bits(), 2);
            assert_half_bits_close(triple[1] & 0x7FFF, f16::from_f32(0.75).to_bits(), 2);
            assert_half_bits_close(triple[2] & 0x7FFF, f16::from_f32(0.25).to_bits(), 2);
        }
    }

    fn column_gradient(columns: [f32; 4]) -> Vec<f16> {
        let mut image = Vec::with_capacity(4 * 4 * 4);
        for _row in 0..4 {
            for value in columns {
                let half = f16::from_f32(value);
                image.extend_from_slice(&[half, half, half, f16::from_f32(1.0)]);
            }
        }
        image
    }

    fn assert_gradient_close(values: &[u16], columns: [f32; 4], tolerance: f32) {
        for (index, triple) in values.chunks_exact(3).enumerate() {
            let expected = columns[index % 4];
            for &bits in triple {
                let actual = f16::from_bits(bits).to_f32();
                assert!(
                    (actual - expected).abs() <= tolerance,
                    "pixel {index}: {actual} not within {tolerance} of {expected}"
                );
            }
        }
    }

    #[test]
    fn unsigned_bright_gradient_roundtrips() {
        let columns = [8.0, 7.5, 7.0, 6.5];
        let image = column_gradient(columns);

        let values = roundtrip_f16(CompressionVariant::BC6H, &image, 4, 4);
        assert_gradient_close(&values, columns, 0.5);
    }

    #[test]
    fn signed_negative_gradient_roundtrips() {
        let columns = [-1.0, -0.8, -0.6, -0.4];
        let image = column_gradient(columns);

        let values = roundtrip_f16(CompressionVariant::BC6HSigned, &image, 4, 4);
        assert_gradient_close(&values, columns, 0.05);
    }

    #[test]
    fn unsigned_midrange_gradient_roundtrips_at_highest_quality() {
        let columns = [0.5, 0.52, 0.54, 0.56];
        let image = column_gradient(columns);

        let values = roundtrip_f16_with(
            CompressionVariant::BC6H,
            &CompressionSettings::with_quality(Quality::Highest),
            &image,
            4,
            4,
        );
        assert_gradient_close(&values, columns, 0.05);
    }

    #[test]
    fn unsigned_rejects_u8_entry_and_f16_rejects_bc1() {
        let image: Vec<f16> = vec![f16::from_f32(0.0); 4 * 4 * 4];
        let mut blocks = [0u8; 16];

        let result = encode::compress_f16(
            CompressionVariant::BC1,
            &CompressionSettings::default(),
            &image,
            &mut blocks,
            4,
            4,
            16,
        );
        assert!(matches!(result, Err(Error::UnsupportedVariant(_))));
    }
}
