//! The `nbit` filter.
//!
//! Unpacks elements whose significant bits were packed end to end, discarding unused high and low bits.
//!
//! The datatype of the chunk is described by a tree of client data values.
//! Atomic (integer and floating point) leaves are unpacked according to their precision, bit offset, size, and byte order.
//! Array and compound datatypes reuse the description of their base or member datatypes for each element.
//! Other datatypes are stored verbatim ("no-op").
//!
//! This filter requires the `nbit` feature, which is enabled by default.
//!
//! ### Client data values
//! - `[0]`: the number of client data values.
//! - `[1]`: nonzero if the chunk was stored without packing.
//! - `[2]`: the number of elements in the chunk.
//! - `[3]`: the datatype class.
//! - `[4..]`: the datatype description, starting with its size in bytes:
//!   - atomic: `size, order (0 little endian, 1 big endian), precision, offset`
//!   - array: `size, base class, base description`
//!   - compound: `size, members, { member offset, member class, member description }*`
//!   - no-op: `size`

mod nbit_codec;

use std::sync::Arc;

pub use nbit_codec::NbitCodec;

use super::{FilterDescriptor, FilterId, FilterPlugin};

const NAME: &str = "nbit";

const NBIT_PARAMS_COUNT: usize = 0;
const NBIT_PARAMS_NEED_NOT_COMPRESS: usize = 1;
const NBIT_PARAMS_ELEMENTS: usize = 2;
const NBIT_PARAMS_CLASS: usize = 3;
const NBIT_PARAMS_DESCRIPTION: usize = 4;

/// The maximum number of nested arrays and compounds in a datatype description.
const MAX_NESTING_DEPTH: usize = 32;

/// A datatype class in a `nbit` datatype description.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum NbitClass {
    Atomic,
    Array,
    Compound,
    NoOp,
}

impl NbitClass {
    fn from_parameter(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::Atomic),
            2 => Some(Self::Array),
            3 => Some(Self::Compound),
            4 => Some(Self::NoOp),
            _ => None,
        }
    }
}

// Register the filter.
inventory::submit! {
    FilterPlugin::new(FilterId::NBIT, create_filter_nbit)
}

pub(crate) fn create_filter_nbit() -> FilterDescriptor {
    FilterDescriptor::new(Arc::new(NbitCodec::new()))
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use crate::filter::{CodecError, CodecOptions, FilterCodecTraits, FilterFlags};

    use super::*;

    fn decode(params: &[u32], encoded: &[u8]) -> Result<Vec<u8>, CodecError> {
        NbitCodec::new()
            .decode(
                FilterFlags::REVERSE,
                params,
                Cow::Borrowed(encoded),
                encoded.len(),
                &CodecOptions::default(),
            )
            .map(Cow::into_owned)
    }

    #[test]
    fn filter_nbit_atomic() {
        // two 12-bit little endian u16 values (0xabc, 0x123) at bit offset 2
        let params = [8, 0, 2, 1, 2, 0, 12, 2];
        let decoded = decode(&params, &[0xab, 0xc1, 0x23]).unwrap();
        assert_eq!(decoded, [0xf0, 0x2a, 0x8c, 0x04]);
        assert_eq!(
            decoded,
            [(0xabcu16 << 2).to_le_bytes(), (0x123u16 << 2).to_le_bytes()].concat()
        );
    }

    #[test]
    fn filter_nbit_atomic_big_endian() {
        // three 9-bit big endian u16 values
        let params = [8, 0, 3, 1, 2, 1, 9, 0];
        let values = [259u16, 1, 511];
        // 100000011 000000001 111111111 (27 bits)
        let encoded = [0b1000_0001, 0b1000_0000, 0b0111_1111, 0b1110_0000];
        let decoded = decode(&params, &encoded).unwrap();
        let expected: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
        assert_eq!(decoded, expected);
    }

    #[test]
    fn filter_nbit_atomic_full_precision() {
        // packed values are stored most significant byte first
        let encoded: Vec<u8> = (0..8).collect();
        let big_endian = decode(&[8, 0, 2, 1, 4, 1, 32, 0], &encoded).unwrap();
        assert_eq!(big_endian, encoded);
        let little_endian = decode(&[8, 0, 2, 1, 4, 0, 32, 0], &encoded).unwrap();
        assert_eq!(little_endian, [3, 2, 1, 0, 7, 6, 5, 4]);
    }

    #[test]
    fn filter_nbit_array() {
        // two elements of [u8; 3] with 4-bit values
        let params = [10, 0, 2, 2, 3, 1, 1, 0, 4, 0];
        let decoded = decode(&params, &[0x12, 0x34, 0x56]).unwrap();
        assert_eq!(decoded, [1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn filter_nbit_array_of_compound() {
        // one element of [{a: u8 (4 bits), b: u8 (4 bits)}; 2]
        let params = [
            20, 0, 1, 2, 4, 3, 2, 2, 0, 1, 1, 0, 4, 0, 1, 1, 1, 0, 4, 0,
        ];
        let decoded = decode(&params, &[0xab, 0xcd]).unwrap();
        assert_eq!(decoded, [0x0a, 0x0b, 0x0c, 0x0d]);
    }

    #[test]
    fn filter_nbit_compound() {
        // {a: u8 (3 bits), pad: no-op (1 byte), c: big endian u16 (9 bits)}
        let params = [21, 0, 1, 3, 4, 3, 0, 1, 1, 0, 3, 0, 1, 4, 1, 2, 1, 2, 1, 9, 0];
        let decoded = decode(&params, &[0xb4, 0xb0, 0x30]).unwrap();
        assert_eq!(decoded, [5, 0xa5, 0x01, 0x03]);
    }

    #[test]
    fn filter_nbit_compound_after_nested() {
        // {a: [{b: u8 (4 bits)}; 2], c: u8 (4 bits)}
        let params = [
            24, 0, 1, 3, 3, 2, 0, 2, 2, 3, 1, 1, 0, 1, 1, 0, 4, 0, 2, 1, 1, 0, 4, 0,
        ];
        let decoded = decode(&params, &[0x12, 0x30]).unwrap();
        assert_eq!(decoded, [1, 2, 3]);
    }

    fn nested_arrays(levels: usize) -> Vec<u32> {
        // [[...[u8 (8 bits); 1]...; 1]; 1]
        let mut params = vec![0, 0, 1, 2];
        for _ in 1..levels {
            params.extend([1, 2]);
        }
        params.extend([1, 1, 1, 0, 8, 0]);
        params[0] = u32::try_from(params.len()).unwrap();
        params
    }

    #[test]
    fn filter_nbit_nesting_depth() {
        let decoded = decode(&nested_arrays(MAX_NESTING_DEPTH), &[0xab]).unwrap();
        assert_eq!(decoded, [0xab]);
        assert!(matches!(
            decode(&nested_arrays(MAX_NESTING_DEPTH + 1), &[0xab]),
            Err(CodecError::InvalidParameters { filter: "nbit", .. })
        ));
        assert!(matches!(
            decode(&nested_arrays(10_000), &[0xab]),
            Err(CodecError::InvalidParameters { .. })
        ));
    }

    #[test]
    fn filter_nbit_need_not_compress() {
        let params = [8, 1, 2, 1, 2, 0, 12, 2];
        assert_eq!(decode(&params, &[1, 2, 3, 4]).unwrap(), [1, 2, 3, 4]);
    }

    #[test]
    fn filter_nbit_invalid_parameters() {
        // wrong parameter count
        assert!(matches!(
            decode(&[9, 0, 2, 1, 2, 0, 12, 2], &[0; 3]),
            Err(CodecError::InvalidParameters { filter: "nbit", .. })
        ));
        // unused parameters
        assert!(matches!(
            decode(&[9, 0, 2, 1, 2, 0, 12, 2, 0], &[0; 3]),
            Err(CodecError::InvalidParameters { .. })
        ));
        // precision + offset exceed the size
        assert!(decode(&[8, 0, 2, 1, 2, 0, 12, 5], &[0; 3]).is_err());
        // invalid byte order
        assert!(decode(&[8, 0, 2, 1, 2, 2, 12, 2], &[0; 3]).is_err());
        // invalid top level class
        assert!(decode(&[5, 0, 2, 4, 2], &[0; 4]).is_err());
        assert!(decode(&[5, 0, 2, 9, 2], &[0; 4]).is_err());
        // member exceeds the compound
        assert!(decode(&[12, 0, 1, 3, 2, 1, 1, 1, 2, 0, 8, 0], &[0; 2]).is_err());
    }

    #[test]
    fn filter_nbit_truncated_input() {
        let params = [8, 0, 2, 1, 2, 0, 12, 2];
        assert!(matches!(
            decode(&params, &[0xab, 0xc1]),
            Err(CodecError::InvalidData {
                offset: Some(2),
                ..
            })
        ));
    }

    #[test]
    fn filter_nbit_encode_unsupported() {
        let err = NbitCodec::new()
            .decode(
                FilterFlags::NONE,
                &[8, 0, 2, 1, 2, 0, 12, 2],
                Cow::Borrowed(&[0; 3]),
                3,
                &CodecOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(err, CodecError::EncodeUnsupported("nbit")));
    }
}
