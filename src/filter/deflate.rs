//! The `deflate` filter.
//!
//! Inflates a zlib wrapped deflate stream.
//!
//! The decoded size of a chunk is not stored with the filter, so the output buffer starts at the buffer size hint passed to the filter and grows as needed.
//!
//! This filter requires the `deflate` feature, which is enabled by default.
//!
//! ### Client data values
//! - `[0]`: the compression level (unused when decoding).

mod deflate_codec;

use std::sync::Arc;

pub use deflate_codec::DeflateCodec;

use super::{FilterDescriptor, FilterId, FilterPlugin};

const NAME: &str = "deflate";

// Register the filter.
inventory::submit! {
    FilterPlugin::new(FilterId::DEFLATE, create_filter_deflate)
}

pub(crate) fn create_filter_deflate() -> FilterDescriptor {
    FilterDescriptor::new(Arc::new(DeflateCodec::new()))
}

#[cfg(test)]
mod tests {
    use std::{borrow::Cow, io::Write};

    use flate2::{write::ZlibEncoder, Compression};

    use crate::filter::{CodecError, CodecOptions, FilterCodecTraits, FilterFlags};

    use super::*;

    fn compress(bytes: &[u8], level: u32) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level));
        encoder.write_all(bytes).unwrap();
        encoder.finish().unwrap()
    }

    fn decode(encoded: &[u8], buf_size: usize) -> Result<Vec<u8>, CodecError> {
        DeflateCodec::new()
            .decode(
                FilterFlags::REVERSE,
                &[6],
                Cow::Borrowed(encoded),
                buf_size,
                &CodecOptions::default(),
            )
            .map(Cow::into_owned)
    }

    #[test]
    fn filter_deflate_python_zlib() {
        // python3 -c "import zlib; print(list(zlib.compress(bytes(range(10)), 6)))"
        let encoded = [
            120, 156, 99, 96, 100, 98, 102, 97, 101, 99, 231, 224, 4, 0, 0, 175, 0, 46,
        ];
        assert_eq!(
            decode(&encoded, encoded.len()).unwrap(),
            (0..10).collect::<Vec<u8>>()
        );
    }

    #[test]
    fn filter_deflate_levels() {
        let bytes: Vec<u8> = (0..10_000u32).map(|i| (i % 97) as u8).collect();
        for level in [1, 6, 9] {
            let encoded = compress(&bytes, level);
            // the output buffer grows from a tiny hint
            assert_eq!(decode(&encoded, 1).unwrap(), bytes);
            assert_eq!(decode(&encoded, bytes.len()).unwrap(), bytes);
        }
    }

    #[test]
    fn filter_deflate_empty() {
        let encoded = compress(&[], 6);
        assert!(decode(&encoded, 0).unwrap().is_empty());
    }

    #[test]
    fn filter_deflate_truncated() {
        let bytes: Vec<u8> = (0..1000u32).map(|i| (i * 7 % 256) as u8).collect();
        let encoded = compress(&bytes, 6);
        let err = decode(&encoded[..encoded.len() / 2], 16).unwrap_err();
        assert!(matches!(err, CodecError::Inflate(_)));
    }

    #[test]
    fn filter_deflate_corrupt() {
        assert!(matches!(
            decode(&[0, 1, 2, 3, 4, 5], 16),
            Err(CodecError::Inflate(_))
        ));
    }

    #[test]
    fn filter_deflate_encode_unsupported() {
        let err = DeflateCodec::new()
            .decode(
                FilterFlags::NONE,
                &[],
                Cow::Borrowed(&[]),
                0,
                &CodecOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(err, CodecError::EncodeUnsupported("deflate")));
    }
}
