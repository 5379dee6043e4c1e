use std::borrow::Cow;

use flate2::{Decompress, FlushDecompress, Status};

use crate::filter::{
    ensure_decode, CodecError, CodecOptions, FilterCodecTraits, FilterFlags, FilterId, RawBytes,
};

use super::NAME;

/// A `deflate` codec implementation.
#[derive(Clone, Debug, Default)]
pub struct DeflateCodec;

impl DeflateCodec {
    /// Create a new `deflate` codec.
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }
}

fn reserve(decoded: &mut Vec<u8>, additional: usize) -> Result<(), CodecError> {
    decoded.try_reserve_exact(additional).map_err(|_| {
        CodecError::Allocation(decoded.capacity().saturating_add(additional))
    })
}

/// Inflate a zlib stream.
///
/// The output starts with a capacity of `size_hint` bytes and is doubled each time it fills before the end of the stream.
fn inflate(encoded: &[u8], size_hint: usize) -> Result<Vec<u8>, CodecError> {
    let mut decompress = Decompress::new(true);
    let mut decoded = Vec::new();
    reserve(&mut decoded, size_hint.max(1))?;

    loop {
        let progress = (decompress.total_in(), decompress.total_out());
        let consumed = usize::try_from(progress.0)
            .map_err(|_| CodecError::Inflate("input position overflow".to_string()))?;
        let input = encoded.get(consumed..).unwrap_or_default();
        let status = decompress
            .decompress_vec(input, &mut decoded, FlushDecompress::Sync)
            .map_err(|err| CodecError::Inflate(err.to_string()))?;
        if status == Status::StreamEnd {
            break;
        }

        if decoded.len() == decoded.capacity() {
            let additional = decoded.capacity();
            reserve(&mut decoded, additional)?;
        } else if status == Status::BufError
            || progress == (decompress.total_in(), decompress.total_out())
        {
            return Err(CodecError::Inflate(format!(
                "premature end of the deflate stream after {} of {} bytes",
                decompress.total_in(),
                encoded.len()
            )));
        }
    }

    log::trace!(
        "inflated {} bytes to {} bytes",
        decompress.total_in(),
        decoded.len()
    );
    Ok(decoded)
}

impl FilterCodecTraits for DeflateCodec {
    fn id(&self) -> FilterId {
        FilterId::DEFLATE
    }

    fn name(&self) -> &'static str {
        NAME
    }

    fn decode<'a>(
        &self,
        flags: FilterFlags,
        _client_params: &[u32],
        encoded_value: RawBytes<'a>,
        buf_size: usize,
        _options: &CodecOptions,
    ) -> Result<RawBytes<'a>, CodecError> {
        ensure_decode(flags, NAME)?;
        Ok(Cow::Owned(inflate(&encoded_value, buf_size)?))
    }
}
