//! # bcn
//!
//! CPU encoder and decoder for the BC1-BC7 GPU texture block compression
//! formats, including the signed BC4/BC5 variants and both BC6H half-float
//! variants.
//!
//! Both pipelines work on independent 4x4 pixel blocks packed into 8 or 16
//! byte records. Images whose dimensions are not multiples of 4 are handled
//! by clamping: the encoder repeats the last valid row/column when loading an
//! edge block, and the decoder only writes back the in-bounds part of an edge
//! block.
//!
//! ## Supported formats
//!
//!  * BC1 (RGB, 1-bit punch-through alpha)
//!  * BC2 (RGB + sharp 4-bit alpha, decode only)
//!  * BC3 (RGB + smooth alpha)
//!  * BC4 (single channel, unsigned and signed)
//!  * BC5 (two channels, unsigned and signed)
//!  * BC6H (RGB HDR half floats, unsigned and signed)
//!  * BC7 (RGBA)
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

#[cfg(any(feature = "bc6h", feature = "bc7"))]
mod bits;
pub mod decode;
pub mod encode;
mod settings;

pub use settings::{CompressionSettings, Quality};

/// Compression variants supported by this crate.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Debug)]
pub enum CompressionVariant {
    /// BC1 compression (RGB)
    BC1,
    /// BC2 compression with sharp alpha (RGBA). Decode only.
    BC2,
    /// BC3 compression with smooth alpha (RGBA)
    BC3,
    /// BC4 compression (R, unsigned)
    BC4,
    /// BC4 compression (R, signed)
    BC4Signed,
    /// BC5 compression (RG, unsigned)
    BC5,
    /// BC5 compression (RG, signed)
    BC5Signed,
    /// BC6H compression (RGB HDR, unsigned half floats)
    BC6H,
    /// BC6H compression (RGB HDR, signed half floats)
    BC6HSigned,
    /// BC7 compression with smooth alpha (RGBA)
    BC7,
}

impl CompressionVariant {
    /// Returns the bytes per row of compressed blocks for the given width.
    ///
    /// Width is rounded up to the nearest multiple of 4.
    pub const fn bytes_per_row(self, width: u32) -> u32 {
        let blocks_per_row = width.div_ceil(4);
        blocks_per_row * self.block_byte_size()
    }

    /// Returns the byte size required for storing the compressed blocks of an
    /// image with the given dimensions.
    ///
    /// Width and height are rounded up to the nearest multiple of 4.
    pub const fn blocks_byte_size(self, width: u32, height: u32) -> usize {
        let block_width = width.div_ceil(4) as usize;
        let block_height = height.div_ceil(4) as usize;
        block_width * block_height * self.block_byte_size() as usize
    }

    /// Returns the size of a single compressed block in bytes.
    pub const fn block_byte_size(self) -> u32 {
        match self {
            CompressionVariant::BC1 | CompressionVariant::BC4 | CompressionVariant::BC4Signed => 8,
            CompressionVariant::BC2
            | CompressionVariant::BC3
            | CompressionVariant::BC5
            | CompressionVariant::BC5Signed
            | CompressionVariant::BC6H
            | CompressionVariant::BC6HSigned
            | CompressionVariant::BC7 => 16,
        }
    }

    /// Returns the bytes per pixel of the decompressed output.
    ///
    /// BC1/BC2/BC3/BC7 decompress to RGBA8, BC4 to a single 8-bit channel,
    /// BC5 to two 8-bit channels and BC6H to three 16-bit half-float bit
    /// patterns per pixel.
    pub const fn decompressed_bytes_per_pixel(self) -> usize {
        match self {
            CompressionVariant::BC4 | CompressionVariant::BC4Signed => 1,
            CompressionVariant::BC5 | CompressionVariant::BC5Signed => 2,
            CompressionVariant::BC6H | CompressionVariant::BC6HSigned => 6,
            CompressionVariant::BC1
            | CompressionVariant::BC2
            | CompressionVariant::BC3
            | CompressionVariant::BC7 => 4,
        }
    }

    /// Returns the byte size of the decompressed image for the given
    /// dimensions. Unlike the compressed side, this is not rounded up to
    /// whole blocks.
    pub const fn decompressed_byte_size(self, width: u32, height: u32) -> usize {
        width as usize * height as usize * self.decompressed_bytes_per_pixel()
    }
}

/// Errors reported by the encode and decode entry points.
///
/// Corrupt block contents are deliberately not an error: an unrecognized
/// mode decodes to all-zero pixels and processing continues with the next
/// block.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested variant cannot be encoded. BC2 encoding is always
    /// rejected: BC3 has the same memory cost and strictly better quality.
    #[error("compression to {0:?} is not supported")]
    UnsupportedVariant(CompressionVariant),
    /// A BC4/BC5 source channel index outside the RGBA range.
    #[error("source channel {0} is out of range, must be 0-3")]
    InvalidChannel(usize),
    /// A caller-provided buffer is smaller than the computed requirement.
    #[error("buffer of {actual} bytes is too small, {required} bytes required")]
    BufferSize {
        /// Required byte size.
        required: usize,
        /// Provided byte size.
        actual: usize,
    },
}
