use std::borrow::Cow;

use crate::filter::{
    allocate_zeroed, ensure_decode, CodecError, CodecOptions, FilterCodecTraits, FilterFlags,
    FilterId, RawBytes,
};

use super::NAME;

/// A `shuffle` codec implementation.
#[derive(Clone, Debug, Default)]
pub struct ShuffleCodec;

impl ShuffleCodec {
    /// Create a new `shuffle` codec.
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }
}

/// Reverse a byte shuffle with an element size of `element_size` bytes.
///
/// Byte `k` of element `i` is read from `encoded[k * n + i]`, where `n` is the number of whole elements.
/// Trailing bytes that do not form a whole element are copied verbatim.
///
/// # Errors
/// Returns [`CodecError::Allocation`] if the output cannot be allocated.
pub fn unshuffle(encoded: &[u8], element_size: usize) -> Result<Vec<u8>, CodecError> {
    let mut decoded = allocate_zeroed(encoded.len())?;
    let count = if element_size == 0 {
        0
    } else {
        encoded.len() / element_size
    };
    if element_size <= 1 || count < 2 {
        decoded.copy_from_slice(encoded);
        return Ok(decoded);
    }

    let shuffled_len = count * element_size;
    for (byte_index, stripe) in encoded[..shuffled_len].chunks_exact(count).enumerate() {
        for (element_index, byte) in stripe.iter().enumerate() {
            decoded[element_index * element_size + byte_index] = *byte;
        }
    }
    decoded[shuffled_len..].copy_from_slice(&encoded[shuffled_len..]);
    Ok(decoded)
}

impl FilterCodecTraits for ShuffleCodec {
    fn id(&self) -> FilterId {
        FilterId::SHUFFLE
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
        let element_size = client_params
            .first()
            .ok_or_else(|| CodecError::invalid_parameters(NAME, "missing the element size"))?;
        let element_size = usize::try_from(*element_size)
            .map_err(|_| CodecError::invalid_parameters(NAME, "element size is too large"))?;

        if element_size <= 1 || encoded_value.len() / element_size < 2 {
            return Ok(encoded_value);
        }
        Ok(Cow::Owned(unshuffle(&encoded_value, element_size)?))
    }
}
