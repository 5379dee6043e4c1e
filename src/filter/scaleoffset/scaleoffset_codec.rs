use std::borrow::Cow;

use crate::filter::{
    allocate_zeroed,
    bit_cursor::{BitCursor, PackedAtomic},
    element::{
        low_bits_mask, read_le_uint, read_native_uint, sign_extend, swap_byte_order,
        write_native_uint, ByteOrder, ElementClass, ElementKind,
    },
    ensure_decode, CodecError, CodecOptions, FilterCodecTraits, FilterFlags, FilterId, RawBytes,
};

use super::{ScaleOffsetParameters, HEADER_SIZE, MAX_MINVAL_SIZE, NAME};

/// A `scaleoffset` codec implementation.
#[derive(Clone, Debug, Default)]
pub struct ScaleOffsetCodec;

impl ScaleOffsetCodec {
    /// Create a new `scaleoffset` codec.
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }
}

/// The payload header: the number of bits per packed value and the minimum value.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Header {
    minbits: u32,
    minval: u64,
}

impl Header {
    fn parse(encoded: &[u8]) -> Result<Self, CodecError> {
        let header = encoded.get(..HEADER_SIZE).ok_or_else(|| CodecError::InvalidData {
            message: format!(
                "scaleoffset input of {} bytes is shorter than its {HEADER_SIZE} byte header",
                encoded.len()
            ),
            offset: Some(0),
        })?;
        let mut minbits = [0u8; 4];
        minbits.copy_from_slice(&header[..4]);
        let minbits = u32::from_le_bytes(minbits);
        let minval_size = usize::from(header[4]).min(MAX_MINVAL_SIZE);
        let minval = read_le_uint(&header[5..5 + minval_size]);
        Ok(Self { minbits, minval })
    }
}

/// Reconstruct an integer from its packed offset from the minimum value.
fn postprocess_integer(value: u64, minval: u64, sentinel: u64, parameters: &ScaleOffsetParameters) -> u64 {
    match parameters.fill {
        Some(fill) if value == sentinel => fill,
        _ => value.wrapping_add(minval) & parameters.kind.mask(),
    }
}

/// Reconstruct a decimally scaled float from its packed offset from the minimum value.
fn postprocess_float(value: u64, minval: u64, sentinel: u64, parameters: &ScaleOffsetParameters) -> u64 {
    if let Some(fill) = parameters.fill.filter(|_| value == sentinel) {
        return fill;
    }
    let decoded = sign_extend(value, parameters.kind.bits());
    if parameters.kind == ElementKind::Float32 {
        // f32 arithmetic, the low 32 bits hold the minimum
        #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
        let offset = (decoded as i32) as f32 / 10f32.powi(parameters.scale_factor);
        #[allow(clippy::cast_possible_truncation)]
        let min = f32::from_bits(minval as u32);
        u64::from((offset + min).to_bits())
    } else {
        #[allow(clippy::cast_precision_loss)]
        let offset = decoded as f64 / 10f64.powi(parameters.scale_factor);
        (offset + f64::from_bits(minval)).to_bits()
    }
}

impl FilterCodecTraits for ScaleOffsetCodec {
    fn id(&self) -> FilterId {
        FilterId::SCALEOFFSET
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
        let parameters = ScaleOffsetParameters::new(client_params)?;
        let header = Header::parse(&encoded_value)?;
        let payload = &encoded_value[HEADER_SIZE..];

        let element_size = parameters.kind.size();
        let bits = parameters.kind.bits();
        let size = parameters
            .elements
            .checked_mul(element_size)
            .ok_or_else(|| CodecError::invalid_parameters(NAME, "decoded size overflow"))?;
        let mut decoded = allocate_zeroed(size)?;

        if header.minbits == bits {
            // stored verbatim
            let verbatim = payload.get(..size).ok_or_else(|| CodecError::InvalidData {
                message: format!(
                    "scaleoffset payload of {} bytes is shorter than {size} bytes",
                    payload.len()
                ),
                offset: Some(HEADER_SIZE as u64),
            })?;
            decoded.copy_from_slice(verbatim);
        } else if header.minbits > bits {
            return Err(CodecError::InvalidData {
                message: format!(
                    "scaleoffset minimum bits {} exceed the {bits} bit element",
                    header.minbits
                ),
                offset: Some(0),
            });
        } else {
            if header.minbits != 0 {
                let atomic = PackedAtomic {
                    size: element_size,
                    order: ByteOrder::native(),
                    precision: header.minbits as usize,
                    offset: 0,
                };
                let mut cursor = BitCursor::new();
                for element in decoded.chunks_exact_mut(element_size) {
                    cursor
                        .unpack_atomic(payload, element, &atomic)
                        .map_err(|err| CodecError::InvalidData {
                            message: err.to_string(),
                            offset: Some((HEADER_SIZE + err.byte_index()) as u64),
                        })?;
                }
            }

            let sentinel = low_bits_mask(header.minbits);
            let postprocess = match parameters.kind.class() {
                ElementClass::Integer => postprocess_integer,
                ElementClass::Float => postprocess_float,
            };
            for element in decoded.chunks_exact_mut(element_size) {
                let value = read_native_uint(element);
                let value = postprocess(value, header.minval, sentinel, &parameters);
                write_native_uint(element, value);
            }
            log::trace!(
                "scaleoffset decoded {} elements with {} bits per value",
                parameters.elements,
                header.minbits
            );
        }

        if !parameters.order.is_native() {
            swap_byte_order(&mut decoded, element_size);
        }
        Ok(Cow::Owned(decoded))
    }
}
