use std::borrow::Cow;

use crate::filter::{
    ensure_decode, CodecError, CodecOptions, FilterCodecTraits, FilterFlags, FilterId, RawBytes,
};

use super::{CHECKSUM_SIZE, NAME};

/// Number of bytes summed before the accumulators are reduced (360 pairs).
const BLOCK_SIZE: usize = 720;

/// A `fletcher32` codec implementation.
#[derive(Clone, Debug, Default)]
pub struct Fletcher32Codec;

impl Fletcher32Codec {
    /// Create a new `fletcher32` codec.
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }
}

const fn reduce(sum: u32) -> u32 {
    (sum & 0xffff) + (sum >> 16)
}

/// Compute the HDF5 Fletcher32 checksum of `data`.
///
/// Bytes are summed as big endian 16-bit words.
/// A trailing odd byte is treated as the high byte of a final word.
#[must_use]
pub fn checksum_fletcher32(data: &[u8]) -> u32 {
    let (words, remainder) = data.split_at(data.len() - data.len() % 2);
    let mut sum1: u32 = 0;
    let mut sum2: u32 = 0;

    for block in words.chunks(BLOCK_SIZE) {
        for word in block.chunks_exact(2) {
            sum1 = sum1.wrapping_add(u32::from(u16::from_be_bytes([word[0], word[1]])));
            sum2 = sum2.wrapping_add(sum1);
        }
        sum1 = reduce(sum1);
        sum2 = reduce(sum2);
    }

    if let Some(&byte) = remainder.first() {
        sum1 = sum1.wrapping_add(u32::from(byte) << 8);
        sum2 = sum2.wrapping_add(sum1);
        sum1 = reduce(sum1);
        sum2 = reduce(sum2);
    }

    // Second reduction step to reduce sums to 16 bits
    sum1 = reduce(sum1);
    sum2 = reduce(sum2);

    (sum2 << 16) | sum1
}

impl FilterCodecTraits for Fletcher32Codec {
    fn id(&self) -> FilterId {
        FilterId::FLETCHER32
    }

    fn name(&self) -> &'static str {
        NAME
    }

    fn decode<'a>(
        &self,
        flags: FilterFlags,
        _client_params: &[u32],
        encoded_value: RawBytes<'a>,
        _buf_size: usize,
        _options: &CodecOptions,
    ) -> Result<RawBytes<'a>, CodecError> {
        ensure_decode(flags, NAME)?;
        let Some(len) = encoded_value.len().checked_sub(CHECKSUM_SIZE) else {
            return Err(CodecError::InvalidData {
                message: format!(
                    "fletcher32 input of {} bytes is shorter than its checksum",
                    encoded_value.len()
                ),
                offset: Some(0),
            });
        };

        if !flags.contains(FilterFlags::SKIP_EDC) {
            let mut trailer = [0u8; CHECKSUM_SIZE];
            trailer.copy_from_slice(&encoded_value[len..]);
            let stored = u32::from_le_bytes(trailer);
            let computed = checksum_fletcher32(&encoded_value[..len]);
            // Some writers stored the checksum in big endian order
            if computed != stored && computed != stored.swap_bytes() {
                return Err(CodecError::InvalidChecksum { stored, computed });
            }
        }

        Ok(match encoded_value {
            Cow::Borrowed(bytes) => Cow::Borrowed(&bytes[..len]),
            Cow::Owned(mut bytes) => {
                bytes.truncate(len);
                Cow::Owned(bytes)
            }
        })
    }
}
