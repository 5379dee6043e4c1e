//! The `scaleoffset` filter.
//!
//! Reconstructs integer and floating point elements stored as packed offsets from a minimum value.
//!
//! The encoded chunk starts with a 21 byte header:
//! - `[0..4]`: the number of bits per packed value (`minbits`), little endian,
//! - `[4]`: the size of the minimum value in bytes,
//! - `[5..]`: the minimum value, little endian.
//!
//! If `minbits` equals the element size in bits, the elements are stored verbatim.
//! Otherwise integers are reconstructed as `minimum + packed`, and floating point values as `minimum + packed / 10^scale_factor` (the "D-scale" method).
//! A packed value with all bits set denotes the fill value, if one is declared.
//! The "E-scale" floating point method is not supported.
//!
//! This filter requires the `scaleoffset` feature, which is enabled by default.
//!
//! ### Client data values
//! - `[0]`: the scale type (`0` float D-scale, `1` float E-scale, `2` integer).
//! - `[1]`: the scale factor (signed).
//! - `[2]`: the number of elements in the chunk.
//! - `[3]`: the element class (`0` integer, `1` float).
//! - `[4]`: the element size in bytes.
//! - `[5]`: the element sign (`0` unsigned, `1` two's complement).
//! - `[6]`: the byte order of the decoded elements (`0` little endian, `1` big endian).
//! - `[7]`: nonzero if a fill value is declared.
//! - `[8..]`: the fill value, copied into the client data values in memory order.

mod scaleoffset_codec;

use std::sync::Arc;

pub use scaleoffset_codec::ScaleOffsetCodec;

use super::{
    element::{value_from_params, ByteOrder, ElementClass, ElementKind},
    CodecError, FilterDescriptor, FilterId, FilterPlugin,
};

const NAME: &str = "scaleoffset";

/// The size of the payload header.
const HEADER_SIZE: usize = 21;

/// The largest minimum value that can be read.
const MAX_MINVAL_SIZE: usize = core::mem::size_of::<u64>();

const SCALEOFFSET_PARAMS_SCALE_TYPE: usize = 0;
const SCALEOFFSET_PARAMS_SCALE_FACTOR: usize = 1;
const SCALEOFFSET_PARAMS_ELEMENTS: usize = 2;
const SCALEOFFSET_PARAMS_CLASS: usize = 3;
const SCALEOFFSET_PARAMS_SIZE: usize = 4;
const SCALEOFFSET_PARAMS_SIGN: usize = 5;
const SCALEOFFSET_PARAMS_ORDER: usize = 6;
const SCALEOFFSET_PARAMS_FILL_AVAILABLE: usize = 7;
const SCALEOFFSET_PARAMS_FILL: usize = 8;

/// A scale type.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ScaleType {
    FloatDScale,
    FloatEScale,
    Int,
}

/// Validated `scaleoffset` client data values.
#[derive(Copy, Clone, Debug, PartialEq)]
struct ScaleOffsetParameters {
    scale_factor: i32,
    elements: usize,
    kind: ElementKind,
    order: ByteOrder,
    fill: Option<u64>,
}

impl ScaleOffsetParameters {
    fn new(client_params: &[u32]) -> Result<Self, CodecError> {
        if client_params.len() < SCALEOFFSET_PARAMS_FILL {
            return Err(CodecError::invalid_parameters(
                NAME,
                format!(
                    "expected at least {SCALEOFFSET_PARAMS_FILL} values, got {}",
                    client_params.len()
                ),
            ));
        }
        let param = |index: usize| client_params[index];
        let invalid = |name: &str, index: usize| {
            CodecError::invalid_parameters(NAME, format!("invalid {name} {}", param(index)))
        };

        let scale_type = match param(SCALEOFFSET_PARAMS_SCALE_TYPE) {
            0 => ScaleType::FloatDScale,
            1 => ScaleType::FloatEScale,
            2 => ScaleType::Int,
            _ => return Err(invalid("scale type", SCALEOFFSET_PARAMS_SCALE_TYPE)),
        };
        if scale_type == ScaleType::FloatEScale {
            return Err(CodecError::Unsupported(
                "the scaleoffset E-scale method".to_string(),
            ));
        }

        let class = match param(SCALEOFFSET_PARAMS_CLASS) {
            0 => ElementClass::Integer,
            1 => ElementClass::Float,
            _ => return Err(invalid("class", SCALEOFFSET_PARAMS_CLASS)),
        };
        match (class, scale_type) {
            (ElementClass::Float, ScaleType::FloatDScale)
            | (ElementClass::Integer, ScaleType::Int) => {}
            (ElementClass::Float, _) => {
                return Err(invalid("scale type for a float", SCALEOFFSET_PARAMS_SCALE_TYPE));
            }
            (ElementClass::Integer, _) => {
                return Err(invalid("scale type for an integer", SCALEOFFSET_PARAMS_SCALE_TYPE));
            }
        }
        let signed = match param(SCALEOFFSET_PARAMS_SIGN) {
            0 => false,
            1 => true,
            _ => return Err(invalid("sign", SCALEOFFSET_PARAMS_SIGN)),
        };
        let size = usize::try_from(param(SCALEOFFSET_PARAMS_SIZE))
            .map_err(|_| invalid("size", SCALEOFFSET_PARAMS_SIZE))?;
        let kind = ElementKind::new(class, size, signed)
            .ok_or_else(|| invalid("size", SCALEOFFSET_PARAMS_SIZE))?;
        let order = ByteOrder::from_parameter(param(SCALEOFFSET_PARAMS_ORDER))
            .ok_or_else(|| invalid("byte order", SCALEOFFSET_PARAMS_ORDER))?;
        let elements = usize::try_from(param(SCALEOFFSET_PARAMS_ELEMENTS))
            .map_err(|_| invalid("element count", SCALEOFFSET_PARAMS_ELEMENTS))?;

        let fill = if param(SCALEOFFSET_PARAMS_FILL_AVAILABLE) == 0 {
            None
        } else {
            Some(
                value_from_params(&client_params[SCALEOFFSET_PARAMS_FILL..], size).ok_or_else(
                    || CodecError::invalid_parameters(NAME, "the fill value is truncated"),
                )?,
            )
        };

        // two's complement bit pattern
        #[allow(clippy::cast_possible_wrap)]
        let scale_factor = param(SCALEOFFSET_PARAMS_SCALE_FACTOR) as i32;

        Ok(Self {
            scale_factor,
            elements,
            kind,
            order,
            fill,
        })
    }
}

// Register the filter.
inventory::submit! {
    FilterPlugin::new(FilterId::SCALEOFFSET, create_filter_scaleoffset)
}

pub(crate) fn create_filter_scaleoffset() -> FilterDescriptor {
    FilterDescriptor::new(Arc::new(ScaleOffsetCodec::new()))
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use crate::filter::{
        element::write_native_uint, CodecOptions, FilterCodecTraits, FilterFlags,
    };

    use super::*;

    const NATIVE: u32 = if cfg!(target_endian = "little") { 0 } else { 1 };
    const SWAPPED: u32 = 1 - NATIVE;

    #[allow(clippy::too_many_arguments)]
    fn params(
        scale_type: u32,
        scale_factor: i32,
        elements: u32,
        class: u32,
        size: u32,
        sign: u32,
        order: u32,
        fill: Option<u64>,
    ) -> Vec<u32> {
        let mut params = vec![
            scale_type,
            scale_factor as u32,
            elements,
            class,
            size,
            sign,
            order,
            u32::from(fill.is_some()),
        ];
        let mut fill_bytes = vec![0u8; (size as usize).div_ceil(4) * 4];
        if let Some(fill) = fill {
            write_native_uint(&mut fill_bytes[..size as usize], fill);
        }
        params.extend(
            fill_bytes
                .chunks_exact(4)
                .map(|word| u32::from_ne_bytes(word.try_into().unwrap())),
        );
        params
    }

    fn header(minbits: u32, minval: &[u8]) -> Vec<u8> {
        let mut header = vec![0u8; HEADER_SIZE];
        header[..4].copy_from_slice(&minbits.to_le_bytes());
        header[4] = minval.len() as u8;
        header[5..5 + minval.len()].copy_from_slice(minval);
        header
    }

    fn decode(params: &[u32], encoded: &[u8]) -> Result<Vec<u8>, CodecError> {
        ScaleOffsetCodec::new()
            .decode(
                FilterFlags::REVERSE,
                params,
                Cow::Borrowed(encoded),
                encoded.len(),
                &CodecOptions::default(),
            )
            .map(Cow::into_owned)
    }

    fn u16s(values: &[u16]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_ne_bytes()).collect()
    }

    #[test]
    fn filter_scaleoffset_parameters() {
        let parameters = ScaleOffsetParameters::new(&params(2, 0, 4, 0, 2, 1, 1, Some(7))).unwrap();
        assert_eq!(parameters.kind, ElementKind::Int16);
        assert_eq!(parameters.order, ByteOrder::Big);
        assert_eq!(parameters.elements, 4);
        assert_eq!(parameters.fill, Some(7));

        let parameters = ScaleOffsetParameters::new(&params(0, -3, 1, 1, 8, 0, 0, None)).unwrap();
        assert_eq!(parameters.kind, ElementKind::Float64);
        assert_eq!(parameters.scale_factor, -3);

        assert!(ScaleOffsetParameters::new(&[2, 0, 4, 0, 2]).is_err());
        assert!(ScaleOffsetParameters::new(&params(3, 0, 4, 0, 2, 0, 0, None)).is_err());
        assert!(ScaleOffsetParameters::new(&params(2, 0, 4, 0, 3, 0, 0, None)).is_err());
        assert!(ScaleOffsetParameters::new(&params(2, 0, 4, 1, 4, 0, 0, None)).is_err());
        assert!(ScaleOffsetParameters::new(&params(2, 0, 4, 0, 2, 0, 2, None)).is_err());
        // D-scale integer
        assert!(matches!(
            ScaleOffsetParameters::new(&[0, 3, 1, 0, 2, 0, 0, 0]),
            Err(CodecError::InvalidParameters { .. })
        ));
        // fill value declared but missing
        assert!(ScaleOffsetParameters::new(&[2, 0, 4, 0, 2, 0, 0, 1]).is_err());
    }

    #[test]
    fn filter_scaleoffset_minbits_zero() {
        let encoded = header(0, &[7, 0]);
        let decoded = decode(&params(2, 0, 3, 0, 2, 0, NATIVE, None), &encoded).unwrap();
        assert_eq!(decoded, u16s(&[7, 7, 7]));

        // the all-ones sentinel for zero bits is zero
        let decoded = decode(&params(2, 0, 3, 0, 2, 0, NATIVE, Some(0xbeef)), &encoded).unwrap();
        assert_eq!(decoded, u16s(&[0xbeef, 0xbeef, 0xbeef]));
    }

    #[test]
    fn filter_scaleoffset_verbatim() {
        let mut encoded = header(16, &[0, 0]);
        encoded.extend(u16s(&[1, 0x0203]));
        let decoded = decode(&params(2, 0, 2, 0, 2, 0, NATIVE, None), &encoded).unwrap();
        assert_eq!(decoded, u16s(&[1, 0x0203]));

        let decoded = decode(&params(2, 0, 2, 0, 2, 0, SWAPPED, None), &encoded).unwrap();
        assert_eq!(decoded, u16s(&[0x0100, 0x0302]));

        // truncated payload
        assert!(matches!(
            decode(&params(2, 0, 3, 0, 2, 0, NATIVE, None), &encoded),
            Err(CodecError::InvalidData { .. })
        ));
    }

    #[test]
    fn filter_scaleoffset_integer() {
        // packed 4-bit values 1, 2, 15 (sentinel)
        let mut encoded = header(4, &100u16.to_le_bytes());
        encoded.extend([0x12, 0xf0]);
        let decoded = decode(&params(2, 0, 3, 0, 2, 0, NATIVE, Some(9999)), &encoded).unwrap();
        assert_eq!(decoded, u16s(&[101, 102, 9999]));

        // without a fill value the sentinel is an ordinary value
        let decoded = decode(&params(2, 0, 3, 0, 2, 0, NATIVE, None), &encoded).unwrap();
        assert_eq!(decoded, u16s(&[101, 102, 115]));

        // swapped to the stored byte order
        let decoded = decode(&params(2, 0, 3, 0, 2, 0, SWAPPED, None), &encoded).unwrap();
        assert_eq!(
            decoded,
            u16s(&[101u16.swap_bytes(), 102u16.swap_bytes(), 115u16.swap_bytes()])
        );
    }

    #[test]
    fn filter_scaleoffset_signed_integer() {
        let mut encoded = header(4, &(-5i64).to_le_bytes());
        encoded.extend([0x0a]);
        let decoded = decode(&params(2, 0, 2, 0, 2, 1, NATIVE, None), &encoded).unwrap();
        let expected: Vec<u8> = [-5i16, 5].iter().flat_map(|v| v.to_ne_bytes()).collect();
        assert_eq!(decoded, expected);
    }

    #[test]
    fn filter_scaleoffset_float_dscale() {
        let mut encoded = header(8, &1.5f32.to_le_bytes());
        encoded.extend([0, 25, 250]);
        let decoded = decode(&params(0, 2, 3, 1, 4, 0, NATIVE, None), &encoded).unwrap();
        let expected: Vec<u8> = [1.5f32, 1.75, 4.0]
            .iter()
            .flat_map(|v| v.to_ne_bytes())
            .collect();
        assert_eq!(decoded, expected);

        let mut encoded = header(8, &(-1.0f64).to_le_bytes());
        encoded.extend([4, 10]);
        let decoded = decode(&params(0, 1, 2, 1, 8, 1, NATIVE, None), &encoded).unwrap();
        let expected: Vec<u8> = [-0.6f64, 0.0]
            .iter()
            .flat_map(|v| v.to_ne_bytes())
            .collect();
        assert_eq!(decoded, expected);
    }

    #[test]
    fn filter_scaleoffset_float32_precision() {
        // reconstructed in f32 arithmetic
        let mut encoded = header(8, &1.3f32.to_le_bytes());
        encoded.extend([9, 0]);
        let decoded = decode(&params(0, 1, 2, 1, 4, 0, NATIVE, None), &encoded).unwrap();
        let expected: Vec<u8> = [2.199_999_8_f32, 1.3]
            .iter()
            .flat_map(|v| v.to_ne_bytes())
            .collect();
        assert_eq!(decoded, expected);
        assert_ne!(decoded[..4], 2.2f32.to_ne_bytes());

        let mut encoded = header(16, &1.3f32.to_le_bytes());
        encoded.extend((0..4096u16).flat_map(u16::to_be_bytes));
        let decoded = decode(&params(0, 1, 4096, 1, 4, 0, NATIVE, None), &encoded).unwrap();
        for (v, element) in (0..4096u16).zip(decoded.chunks_exact(4)) {
            let expected = f32::from(v) / 10f32.powi(1) + 1.3f32;
            assert_eq!(element, expected.to_ne_bytes());
        }
    }

    #[test]
    fn filter_scaleoffset_escale_unsupported() {
        let encoded = header(0, &[0; 4]);
        let err = decode(&params(1, 2, 1, 1, 4, 0, NATIVE, None), &encoded).unwrap_err();
        assert!(matches!(err, CodecError::Unsupported(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn filter_scaleoffset_invalid_data() {
        assert!(matches!(
            decode(&params(2, 0, 1, 0, 2, 0, NATIVE, None), &[0; 10]),
            Err(CodecError::InvalidData { offset: Some(0), .. })
        ));
        assert!(matches!(
            decode(&params(2, 0, 1, 0, 2, 0, NATIVE, None), &header(17, &[0, 0])),
            Err(CodecError::InvalidData { .. })
        ));
        // packed values exhausted
        assert!(matches!(
            decode(&params(2, 0, 4, 0, 2, 0, NATIVE, None), &header(4, &[0, 0])),
            Err(CodecError::InvalidData {
                offset: Some(21),
                ..
            })
        ));
    }

    #[test]
    fn filter_scaleoffset_encode_unsupported() {
        let err = ScaleOffsetCodec::new()
            .decode(
                FilterFlags::NONE,
                &params(2, 0, 1, 0, 2, 0, NATIVE, None),
                Cow::Borrowed(&header(0, &[0, 0])),
                HEADER_SIZE,
                &CodecOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(err, CodecError::EncodeUnsupported("scaleoffset")));
    }
}
