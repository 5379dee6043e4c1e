use std::borrow::Cow;

use rust_aec::{AecFlags, AecParams};

use crate::filter::{
    ensure_decode, shuffle::unshuffle, CodecError, CodecOptions, FilterCodecTraits, FilterFlags,
    FilterId, RawBytes,
};

use super::{SzipParameters, NAME, SIZE_PREFIX, SZIP_MSB_OPTION_MASK, SZIP_NN_OPTION_MASK};

/// A `szip` codec implementation.
#[derive(Clone, Debug, Default)]
pub struct SzipCodec;

impl SzipCodec {
    /// Create a new `szip` codec.
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }
}

fn aec_flags(options_mask: u32) -> AecFlags {
    let mut flags = AecFlags::empty();
    if options_mask & SZIP_MSB_OPTION_MASK != 0 {
        flags |= AecFlags::MSB;
    }
    if options_mask & SZIP_NN_OPTION_MASK != 0 {
        flags |= AecFlags::DATA_PREPROCESS;
    }
    flags
}

fn external(err: impl core::fmt::Display) -> CodecError {
    CodecError::External {
        library: "rust-aec",
        message: err.to_string(),
    }
}

impl FilterCodecTraits for SzipCodec {
    fn id(&self) -> FilterId {
        FilterId::SZIP
    }

    fn name(&self) -> &'static str {
        NAME
    }

    fn decode<'a>(
        &self,
        flags: FilterFlags,
        client_params: &[u32],
        encoded_value: RawBytes<'a>,
        _buf_size: usize,
        _options: &CodecOptions,
    ) -> Result<RawBytes<'a>, CodecError> {
        ensure_decode(flags, NAME)?;
        let parameters = SzipParameters::new(client_params)?;

        if encoded_value.len() < SIZE_PREFIX {
            return Err(CodecError::InvalidData {
                message: "szip input is shorter than its size prefix".to_string(),
                offset: Some(0),
            });
        }
        let (prefix, payload) = encoded_value.split_at(SIZE_PREFIX);
        let mut size = [0u8; SIZE_PREFIX];
        size.copy_from_slice(prefix);
        let size = usize::try_from(u32::from_be_bytes(size))
            .map_err(|_| CodecError::Other("szip decoded size overflow".to_string()))?;

        // 32 and 64-bit pixels are coded as interleaved bytes
        let interleave = parameters.interleave();
        let bits_per_sample = if interleave {
            8
        } else {
            parameters.bits_per_pixel
        };
        let bytes_per_sample = match bits_per_sample {
            0..=8 => 1,
            9..=16 => 2,
            _ => 4,
        };
        let samples = size.div_ceil(bytes_per_sample);
        let rsi = parameters
            .pixels_per_scanline
            .div_ceil(parameters.pixels_per_block);

        let aec_params = AecParams::new(
            bits_per_sample
                .try_into()
                .map_err(|_| CodecError::invalid_parameters(NAME, "bits per pixel out of range"))?,
            parameters
                .pixels_per_block
                .try_into()
                .map_err(|_| CodecError::invalid_parameters(NAME, "pixels per block out of range"))?,
            rsi.try_into().map_err(|_| {
                CodecError::invalid_parameters(NAME, "pixels per scanline out of range")
            })?,
            aec_flags(parameters.options_mask),
        );
        let mut decoded = rust_aec::decode(payload, aec_params, samples).map_err(external)?;
        if decoded.len() < size {
            return Err(CodecError::External {
                library: "rust-aec",
                message: format!(
                    "decoded {} bytes, expected {size} bytes",
                    decoded.len()
                ),
            });
        }
        decoded.truncate(size);

        if interleave {
            let element_size = if parameters.bits_per_pixel == 64 { 8 } else { 4 };
            decoded = unshuffle(&decoded, element_size)?;
        }
        Ok(Cow::Owned(decoded))
    }
}
