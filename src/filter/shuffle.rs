//! The `shuffle` filter.
//!
//! Reverses a byte shuffle: the encoded chunk stores byte 0 of every element, then byte 1 of every element, and so on.
//! Shuffling groups bytes of similar significance together, which improves the compression ratio of a following `deflate` or `szip` filter.
//!
//! This filter requires the `shuffle` feature, which is enabled by default.
//!
//! ### Client data values
//! - `[0]`: the element size in bytes.

mod shuffle_codec;

use std::sync::Arc;

pub use shuffle_codec::{unshuffle, ShuffleCodec};

use super::{FilterDescriptor, FilterId, FilterPlugin};

const NAME: &str = "shuffle";

// Register the filter.
inventory::submit! {
    FilterPlugin::new(FilterId::SHUFFLE, create_filter_shuffle)
}

pub(crate) fn create_filter_shuffle() -> FilterDescriptor {
    FilterDescriptor::new(Arc::new(ShuffleCodec::new()))
}
