//! The `szip` filter (Experimental).
//!
//! Decodes a chunk compressed with the CCSDS 121.0 adaptive entropy coder, the algorithm behind SZIP.
//! Decoding is delegated to the pure Rust [`rust_aec`] decoder.
//!
//! The encoded chunk starts with a 4-byte big endian prefix holding the decoded size in bytes.
//! Pixels of 32 or 64 bits are coded as a sequence of interleaved bytes and are de-interleaved after decoding.
//! Scanline padding (`SZIP_RAW_OPTION_MASK` without `SZIP_CHIP_OPTION_MASK`) is not applied.
//!
//! This filter requires the `szip` feature, which is disabled by default.
//!
//! ### Client data values
//! - `[0]`: the options mask.
//! - `[1]`: the bits per pixel.
//! - `[2]`: the pixels per block.
//! - `[3]`: the pixels per scanline.

mod szip_codec;

use std::sync::Arc;

pub use szip_codec::SzipCodec;

use super::{CodecError, FilterDescriptor, FilterId, FilterPlugin};

const NAME: &str = "szip";

/// Size of the decoded size prefix.
const SIZE_PREFIX: usize = core::mem::size_of::<u32>();

/// Pixels are stored most significant byte first.
pub const SZIP_MSB_OPTION_MASK: u32 = 16;

/// Nearest neighbour preprocessing was applied.
pub const SZIP_NN_OPTION_MASK: u32 = 32;

// Register the filter.
inventory::submit! {
    FilterPlugin::new(FilterId::SZIP, create_filter_szip)
}

pub(crate) fn create_filter_szip() -> FilterDescriptor {
    FilterDescriptor::new(Arc::new(SzipCodec::new()))
}

/// Validated `szip` client data values.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct SzipParameters {
    options_mask: u32,
    bits_per_pixel: u32,
    pixels_per_block: u32,
    pixels_per_scanline: u32,
}

impl SzipParameters {
    fn new(client_params: &[u32]) -> Result<Self, CodecError> {
        let [options_mask, bits_per_pixel, pixels_per_block, pixels_per_scanline, ..] =
            *client_params
        else {
            return Err(CodecError::invalid_parameters(
                NAME,
                format!("expected 4 values, got {}", client_params.len()),
            ));
        };
        if !matches!(bits_per_pixel, 1..=24 | 32 | 64) {
            return Err(CodecError::invalid_parameters(
                NAME,
                format!("unsupported bits per pixel {bits_per_pixel}"),
            ));
        }
        if pixels_per_block == 0 || pixels_per_block % 2 != 0 || pixels_per_block > 32 {
            return Err(CodecError::invalid_parameters(
                NAME,
                format!("invalid pixels per block {pixels_per_block}"),
            ));
        }
        if pixels_per_scanline == 0 {
            return Err(CodecError::invalid_parameters(
                NAME,
                "pixels per scanline is zero",
            ));
        }
        Ok(Self {
            options_mask,
            bits_per_pixel,
            pixels_per_block,
            pixels_per_scanline,
        })
    }

    fn interleave(&self) -> bool {
        matches!(self.bits_per_pixel, 32 | 64)
    }
}
